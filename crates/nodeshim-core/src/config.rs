use crate::error::Error;
use crate::host::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the optional project config file.
pub const CONFIG_FILE: &str = "nodeshim.json";

/// Default timeout for out-of-process calls, in seconds.
pub const DEFAULT_PROCESS_TIMEOUT_SECS: u64 = 60;

/// Runtime configuration for the nodeshim CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }
}

/// Compatibility settings for a project, read from `nodeshim.json`.
///
/// Every field is optional in the file. CLI flags override file values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompatOptions {
    /// Target runtime compatibility date (`YYYY-MM-DD`).
    pub compatibility_date: Option<String>,
    /// Ordered compatibility flags.
    pub compatibility_flags: Vec<String>,
    /// Output format of the bundle.
    pub format: OutputFormat,
    /// File extensions left external with their path preserved.
    pub external_extensions: Vec<String>,
    /// Specifier prefixes provided by the target runtime.
    pub runtime_prefixes: Vec<String>,
    /// Exact specifiers provided by the target runtime.
    pub runtime_externals: Vec<String>,
    /// Timeout for each out-of-process call.
    pub process_timeout_secs: u64,
    /// Package manager used to install the preset packages before querying.
    pub install_with: Option<String>,
}

impl Default for CompatOptions {
    fn default() -> Self {
        Self {
            compatibility_date: None,
            compatibility_flags: Vec::new(),
            format: OutputFormat::Esm,
            external_extensions: [".wasm", ".bin", ".html", ".txt"]
                .into_iter()
                .map(String::from)
                .collect(),
            runtime_prefixes: vec!["cloudflare:".to_string()],
            runtime_externals: vec!["__STATIC_CONTENT_MANIFEST".to_string()],
            process_timeout_secs: DEFAULT_PROCESS_TIMEOUT_SECS,
            install_with: None,
        }
    }
}

impl CompatOptions {
    /// Load `nodeshim.json` from `root`, or defaults when the file is absent.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load options from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Timeout for out-of-process calls.
    #[must_use]
    pub fn process_timeout(&self) -> Duration {
        Duration::from_secs(self.process_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let options = CompatOptions::load(dir.path()).unwrap();
        assert_eq!(options, CompatOptions::default());
        assert_eq!(options.process_timeout(), Duration::from_secs(60));
        assert_eq!(options.runtime_prefixes, vec!["cloudflare:"]);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "compatibility_date": "2024-09-23", "compatibility_flags": ["nodejs_compat"], "format": "iife" }"#,
        )
        .unwrap();

        let options = CompatOptions::load(dir.path()).unwrap();
        assert_eq!(options.compatibility_date.as_deref(), Some("2024-09-23"));
        assert_eq!(options.compatibility_flags, vec!["nodejs_compat"]);
        assert_eq!(options.format, OutputFormat::Iife);
        assert_eq!(options.external_extensions.len(), 4);
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), r#"{ "unknown": 1 }"#).unwrap();

        let err = CompatOptions::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_config_builder() {
        let config = Config::new(PathBuf::from("/app"))
            .with_verbosity(2)
            .with_json_logs(true);
        assert_eq!(config.cwd, PathBuf::from("/app"));
        assert_eq!(config.verbosity, 2);
        assert!(config.json_logs);
    }
}
