//! Alias path resolution.
//!
//! Alias targets chosen by the preset are resolved to absolute paths once at
//! setup. The resolve hook then matches specifiers against the resolved names.

use super::error::CompatError;
use super::module::{js_string, VirtualModule, REQUIRED_ALIAS_NAMESPACE};
use super::oracle::ResolutionOracle;
use super::preset::PresetConfig;
use crate::host::{ResolveArgs, ResolveIdResult, ResolveKind};
use regex_lite::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Alias targets that are ESM re-export shims.
pub const SHIM_PREFIXES: &[&str] = &["unenv/npm/", "unenv/mock/"];

/// One active alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    /// Unresolved target specifier.
    pub target: String,
    /// Absolute path of the target. Unused when externalized.
    pub resolved: Option<PathBuf>,
    /// Whether the target is left to the runtime.
    pub externalized: bool,
}

impl AliasEntry {
    pub fn resolved(target: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            resolved: Some(path.into()),
            externalized: false,
        }
    }

    pub fn external(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            resolved: None,
            externalized: true,
        }
    }

    /// Whether the target is an ESM shim that needs CommonJS interop under `require()`.
    #[must_use]
    pub fn is_esm_shim(&self) -> bool {
        SHIM_PREFIXES.iter().any(|p| self.target.starts_with(p))
    }
}

/// Active alias table for a build.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: BTreeMap<String, AliasEntry>,
    pattern: Option<Regex>,
}

impl AliasTable {
    /// Resolve every preset alias from `base_dir`.
    ///
    /// Aliases whose target does not resolve are dropped; their specifiers fall
    /// through to default resolution. Any other oracle failure is fatal.
    pub fn resolve(
        preset: &PresetConfig,
        oracle: &dyn ResolutionOracle,
        base_dir: &Path,
    ) -> Result<Self, CompatError> {
        let mut entries = BTreeMap::new();
        let mut dropped = 0usize;

        for (name, target) in &preset.alias {
            if preset.is_external(target) {
                entries.insert(name.clone(), AliasEntry::external(target.clone()));
                continue;
            }

            match oracle.resolve(target, base_dir) {
                Ok(path) => {
                    let path = if path.is_absolute() {
                        path
                    } else {
                        base_dir.join(path)
                    };
                    entries.insert(name.clone(), AliasEntry::resolved(target.clone(), path));
                }
                Err(e) if e.is_unresolvable() => {
                    debug!(alias = %name, target = %target, "dropping unresolvable alias");
                    dropped += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(active = entries.len(), dropped, "resolved aliases");
        Ok(Self::from_entries(entries))
    }

    /// Build a table from already-resolved entries.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, AliasEntry)>) -> Self {
        let entries: BTreeMap<String, AliasEntry> = entries.into_iter().collect();
        let pattern = if entries.is_empty() {
            None
        } else {
            let keys = entries
                .keys()
                .map(|k| regex_lite::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&format!("^({keys})$")).ok()
        };
        Self { entries, pattern }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AliasEntry> {
        self.entries.get(name)
    }

    /// Whether `specifier` is an active alias.
    #[must_use]
    pub fn matches(&self, specifier: &str) -> bool {
        match &self.pattern {
            Some(re) => re.is_match(specifier),
            None => self.entries.contains_key(specifier),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AliasEntry)> {
        self.entries.iter()
    }

    /// Resolution of an aliased specifier.
    ///
    /// Externalized targets stay external. A `require()` of an ESM shim goes
    /// to the interop namespace, keyed by the shim's absolute path.
    #[must_use]
    pub fn redirect(&self, args: &ResolveArgs) -> Option<ResolveIdResult> {
        let entry = self.get(&args.specifier)?;
        if entry.externalized {
            return Some(ResolveIdResult::external(entry.target.clone()));
        }

        let path = entry.resolved.as_ref()?.to_string_lossy().into_owned();
        if args.kind == ResolveKind::Require && entry.is_esm_shim() {
            return Some(ResolveIdResult::virtual_module(REQUIRED_ALIAS_NAMESPACE, path));
        }
        Some(ResolveIdResult::resolved(path))
    }
}

/// CommonJS wrapper around an ESM shim at `path`.
///
/// The export object is the shim's default export (or `{}`), extended with
/// every named export as an enumerable property.
#[must_use]
pub fn interop_module(path: &str) -> VirtualModule {
    let contents = format!(
        r#"import * as esm from {path};
module.exports = Object.entries(esm)
  .filter(([k]) => k !== "default")
  .reduce(
    (cjs, [k, value]) => Object.defineProperty(cjs, k, {{ value, enumerable: true }}),
    "default" in esm ? esm.default : {{}}
  );
"#,
        path = js_string(path)
    );
    VirtualModule::js(REQUIRED_ALIAS_NAMESPACE, path, contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::oracle::OracleError;
    use crate::compat::preset::PresetConfig;

    struct Oracle;

    impl ResolutionOracle for Oracle {
        fn resolve(&self, specifier: &str, dir: &Path) -> Result<PathBuf, OracleError> {
            match specifier {
                "missing" => Err(OracleError::Unresolvable {
                    specifier: specifier.to_string(),
                    dir: dir.to_path_buf(),
                }),
                "broken" => Err(OracleError::Malformed {
                    message: "bad".to_string(),
                }),
                "node:fs" => panic!("externalized targets must not hit the oracle"),
                other => Ok(dir.join("node_modules").join(other).join("index.mjs")),
            }
        }
    }

    fn preset(alias: &[(&str, &str)], external: &[&str]) -> PresetConfig {
        PresetConfig {
            alias: alias
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            external: external.iter().map(|s| (*s).to_string()).collect(),
            ..PresetConfig::default()
        }
    }

    #[test]
    fn test_resolve_drops_unresolvable_and_keeps_external() {
        let preset = preset(
            &[
                ("debug", "unenv/npm/debug"),
                ("fs", "node:fs"),
                ("gone", "missing"),
            ],
            &["node:fs"],
        );
        let table = AliasTable::resolve(&preset, &Oracle, Path::new("/app")).unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.matches("debug"));
        assert!(table.matches("fs"));
        assert!(!table.matches("gone"));
        assert!(!table.matches("debugger"));
        assert!(table.get("fs").unwrap().externalized);
        assert_eq!(
            table.get("debug").unwrap().resolved.as_deref(),
            Some(Path::new("/app/node_modules/unenv/npm/debug/index.mjs"))
        );
    }

    #[test]
    fn test_resolve_propagates_oracle_failure() {
        let preset = preset(&[("x", "broken")], &[]);
        let err = AliasTable::resolve(&preset, &Oracle, Path::new("/app")).unwrap_err();
        assert!(matches!(err, CompatError::Oracle(_)));
    }

    #[test]
    fn test_redirect_by_kind() {
        let table = AliasTable::from_entries([
            (
                "debug".to_string(),
                AliasEntry::resolved("unenv/npm/debug", "/app/debug.mjs"),
            ),
            (
                "buffer".to_string(),
                AliasEntry::resolved("unenv/node/buffer", "/app/buffer.mjs"),
            ),
            ("node:fs".to_string(), AliasEntry::external("node:fs")),
        ]);

        let required = table
            .redirect(&ResolveArgs::new("debug", ResolveKind::Require))
            .unwrap();
        assert_eq!(
            required,
            ResolveIdResult::virtual_module(REQUIRED_ALIAS_NAMESPACE, "/app/debug.mjs")
        );

        let imported = table
            .redirect(&ResolveArgs::new("debug", ResolveKind::Import))
            .unwrap();
        assert_eq!(imported, ResolveIdResult::resolved("/app/debug.mjs"));

        let not_shim = table
            .redirect(&ResolveArgs::new("buffer", ResolveKind::Require))
            .unwrap();
        assert_eq!(not_shim, ResolveIdResult::resolved("/app/buffer.mjs"));

        let external = table
            .redirect(&ResolveArgs::new("node:fs", ResolveKind::Require))
            .unwrap();
        assert_eq!(external, ResolveIdResult::external("node:fs"));

        assert!(table
            .redirect(&ResolveArgs::new("lodash", ResolveKind::Import))
            .is_none());
    }

    #[test]
    fn test_interop_module_imports_shim_path() {
        let module = interop_module("/app/node_modules/unenv/npm/debug.mjs");
        assert_eq!(module.namespace, REQUIRED_ALIAS_NAMESPACE);
        assert!(module
            .contents
            .starts_with(r#"import * as esm from "/app/node_modules/unenv/npm/debug.mjs";"#));
        assert!(module.contents.contains(r#"k !== "default""#));
        assert!(module.contents.contains(r#""default" in esm ? esm.default : {}"#));
    }
}
