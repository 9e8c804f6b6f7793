//! Specifier classification.
//!
//! Decides whether a specifier addresses a native built-in of the full
//! server-side runtime, which the sandboxed target does not provide.

use super::alias::AliasTable;
use super::oracle::ResolutionOracle;
use regex_lite::Regex;
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::warn;

/// Prefix that addresses a built-in explicitly.
pub const NODE_PREFIX: &str = "node:";

/// Node's `require('module').builtinModules`.
pub const NODE_BUILTINS: &[&str] = &[
    "_http_agent",
    "_http_client",
    "_http_common",
    "_http_incoming",
    "_http_outgoing",
    "_http_server",
    "_stream_duplex",
    "_stream_passthrough",
    "_stream_readable",
    "_stream_transform",
    "_stream_wrap",
    "_stream_writable",
    "_tls_common",
    "_tls_wrap",
    "assert",
    "assert/strict",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "dns/promises",
    "domain",
    "events",
    "fs",
    "fs/promises",
    "http",
    "http2",
    "https",
    "inspector",
    "inspector/promises",
    "module",
    "net",
    "os",
    "path",
    "path/posix",
    "path/win32",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "readline/promises",
    "repl",
    "stream",
    "stream/consumers",
    "stream/promises",
    "stream/web",
    "string_decoder",
    "sys",
    "timers",
    "timers/promises",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "util/types",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

/// Outcome of classifying one specifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub is_builtin: bool,
    pub is_aliased: bool,
    /// Alias target chosen by the preset, if any.
    pub matched_alias: Option<String>,
    /// Whether the specifier ends up as an external import of the bundle.
    pub should_externalize: bool,
}

/// Built-in module classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    names: FxHashSet<String>,
    pattern: Option<Regex>,
    bare: Option<Regex>,
}

impl Classifier {
    /// Classifier over an explicit set of built-in names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();

        let pattern = if names.is_empty() {
            None
        } else {
            let alternation = names
                .iter()
                .map(|n| regex_lite::escape(n))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&format!("^(node:)?({alternation})$")).ok()
        };

        Self {
            names: names.into_iter().collect(),
            pattern,
            bare: Regex::new("^[a-z_]+$").ok(),
        }
    }

    /// Classifier over the static Node built-in list.
    #[must_use]
    pub fn node_default() -> Self {
        Self::new(NODE_BUILTINS.iter().copied())
    }

    /// Classifier over the names the oracle enumerates.
    ///
    /// Falls back to the static list when enumeration fails.
    pub fn from_oracle(oracle: &dyn ResolutionOracle) -> Self {
        match oracle.builtin_modules() {
            Ok(names) if !names.is_empty() => Self::new(names),
            Ok(_) => {
                warn!("runtime reported no built-in modules, using static list");
                Self::node_default()
            }
            Err(e) => {
                warn!(error = %e, "failed to enumerate built-in modules, using static list");
                Self::node_default()
            }
        }
    }

    /// Number of canonical names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether the specifier addresses a built-in.
    #[must_use]
    pub fn is_builtin(&self, specifier: &str) -> bool {
        self.matches_prefixed(specifier) || self.matches_bare(specifier)
    }

    /// `(node:)?name` against the canonical set.
    fn matches_prefixed(&self, specifier: &str) -> bool {
        match &self.pattern {
            Some(re) => re.is_match(specifier),
            None => {
                let name = specifier.strip_prefix(NODE_PREFIX).unwrap_or(specifier);
                self.names.contains(name)
            }
        }
    }

    /// Bare lowercase identifiers, still only when canonical.
    fn matches_bare(&self, specifier: &str) -> bool {
        let shaped = match &self.bare {
            Some(re) => re.is_match(specifier),
            None => specifier
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '_'),
        };
        shaped && self.names.contains(specifier)
    }

    /// Classify a specifier against the active alias table.
    #[must_use]
    pub fn classify(&self, specifier: &str, aliases: &AliasTable) -> Classification {
        let is_builtin = self.is_builtin(specifier);
        let entry = aliases.get(specifier);
        let should_externalize = is_builtin && entry.map_or(true, |e| e.externalized);

        Classification {
            is_builtin,
            is_aliased: entry.is_some(),
            matched_alias: entry.map(|e| e.target.clone()),
            should_externalize,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::node_default()
    }
}
