//! Compatibility preset resolution.
//!
//! A preset is the alias/inject/external/polyfill catalog for a target
//! runtime, keyed by compatibility date and flags. It is produced by an
//! external provider and treated as a black box.

use super::error::CompatError;
use super::process;
use chrono::NaiveDate;
use nodeshim_util::hash::blake3_key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info};

/// `unenv` release the preset packages are installed at.
pub const UNENV_VERSION: &str = "2.0.0-rc.24";

/// Default timeout of the optional install step, in seconds.
pub const DEFAULT_INSTALL_TIMEOUT_SECS: u64 = 300;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Where a global's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InjectSource {
    /// Default export of `module`.
    Default { module: String },
    /// Named export, imported under its own name.
    Named { module: String, export: String },
    /// Named export, imported under a different local name.
    Renamed {
        module: String,
        export: String,
        local: String,
    },
}

impl InjectSource {
    #[must_use]
    pub fn module(&self) -> &str {
        match self {
            Self::Default { module } | Self::Named { module, .. } | Self::Renamed { module, .. } => {
                module
            }
        }
    }

    /// Name the module exports the value under.
    #[must_use]
    pub fn export_name(&self) -> &str {
        match self {
            Self::Default { .. } => "default",
            Self::Named { export, .. } | Self::Renamed { export, .. } => export,
        }
    }

    /// Name the value is bound to inside the prelude.
    #[must_use]
    pub fn local_name(&self) -> &str {
        match self {
            Self::Default { .. } => "defaultExport",
            Self::Named { export, .. } => export,
            Self::Renamed { local, .. } => local,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInject {
    Module(String),
    Tuple(Vec<String>),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPreset {
    alias: BTreeMap<String, String>,
    inject: BTreeMap<String, RawInject>,
    external: Vec<String>,
    polyfill: Vec<String>,
}

fn normalize_inject(global: &str, raw: RawInject) -> Result<InjectSource, CompatError> {
    match raw {
        RawInject::Module(module) => Ok(InjectSource::Default { module }),
        RawInject::Tuple(parts) => match <[String; 2]>::try_from(parts) {
            Ok([module, export]) => Ok(InjectSource::Named { module, export }),
            Err(parts) => match <[String; 3]>::try_from(parts) {
                Ok([module, export, local]) if export == local => {
                    Ok(InjectSource::Named { module, export })
                }
                Ok([module, export, local]) => Ok(InjectSource::Renamed {
                    module,
                    export,
                    local,
                }),
                Err(parts) => Err(CompatError::malformed(format!(
                    "inject entry for '{global}' has {} elements, expected 2 or 3",
                    parts.len()
                ))),
            },
        },
    }
}

/// Immutable preset snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PresetConfig {
    /// Logical name to target specifier.
    pub alias: BTreeMap<String, String>,
    /// Global name to value source.
    pub inject: BTreeMap<String, InjectSource>,
    /// Targets provided by the runtime.
    pub external: Vec<String>,
    /// Side-effect modules loaded before user code.
    pub polyfill: Vec<String>,
}

impl PresetConfig {
    /// Parse provider output.
    pub fn from_json(text: &str) -> Result<Self, CompatError> {
        let raw: RawPreset =
            serde_json::from_str(text.trim()).map_err(|e| CompatError::malformed(e.to_string()))?;

        let inject = raw
            .inject
            .into_iter()
            .map(|(global, source)| {
                let source = normalize_inject(&global, source)?;
                Ok((global, source))
            })
            .collect::<Result<BTreeMap<_, _>, CompatError>>()?;

        Ok(Self {
            alias: raw.alias,
            inject,
            external: raw.external,
            polyfill: raw.polyfill,
        })
    }

    /// Whether `target` is provided by the runtime.
    #[must_use]
    pub fn is_external(&self, target: &str) -> bool {
        self.external.iter().any(|e| e == target)
    }
}

/// Input of a preset query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetRequest {
    compatibility_date: String,
    compatibility_flags: Vec<String>,
    base_dir: PathBuf,
}

impl PresetRequest {
    /// Create a request, validating the date.
    pub fn new(
        compatibility_date: &str,
        compatibility_flags: Vec<String>,
        base_dir: impl Into<PathBuf>,
    ) -> Result<Self, CompatError> {
        let invalid = || CompatError::InvalidDate {
            date: compatibility_date.to_string(),
        };
        if compatibility_date.len() != 10 {
            return Err(invalid());
        }
        let date = NaiveDate::parse_from_str(compatibility_date, DATE_FORMAT).map_err(|_| invalid())?;

        Ok(Self {
            compatibility_date: date.format(DATE_FORMAT).to_string(),
            compatibility_flags,
            base_dir: base_dir.into(),
        })
    }

    #[must_use]
    pub fn compatibility_date(&self) -> &str {
        &self.compatibility_date
    }

    #[must_use]
    pub fn compatibility_flags(&self) -> &[String] {
        &self.compatibility_flags
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Cache key over (date, flags, base path).
    #[must_use]
    pub fn cache_key(&self) -> String {
        let count = self.compatibility_flags.len().to_string();
        let base = self.base_dir.to_string_lossy();
        let parts = [self.compatibility_date.as_str(), count.as_str()]
            .into_iter()
            .chain(self.compatibility_flags.iter().map(String::as_str))
            .chain(std::iter::once(base.as_ref()));
        blake3_key(parts)
    }
}

/// Today's local date, used when no compatibility date is configured.
#[must_use]
pub fn default_compatibility_date() -> String {
    chrono::Local::now().date_naive().format(DATE_FORMAT).to_string()
}

/// Source of preset snapshots.
pub trait PresetProvider: Send + Sync {
    fn fetch(&self, request: &PresetRequest) -> Result<PresetConfig, CompatError>;
}

/// Provider that evaluates the preset with `node` in the base directory.
#[derive(Debug, Clone)]
pub struct NodePresetProvider {
    node: PathBuf,
    timeout: Duration,
    install_with: Option<String>,
    install_timeout: Duration,
}

impl Default for NodePresetProvider {
    fn default() -> Self {
        Self {
            node: PathBuf::from("node"),
            timeout: Duration::from_secs(crate::config::DEFAULT_PROCESS_TIMEOUT_SECS),
            install_with: None,
            install_timeout: Duration::from_secs(DEFAULT_INSTALL_TIMEOUT_SECS),
        }
    }
}

impl NodePresetProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `node` binary.
    #[must_use]
    pub fn with_node(mut self, node: impl Into<PathBuf>) -> Self {
        self.node = node.into();
        self
    }

    /// Set the timeout of the query.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Install the preset packages with this package manager before querying.
    #[must_use]
    pub fn with_install(mut self, package_manager: Option<String>) -> Self {
        self.install_with = package_manager;
        self
    }

    fn install(&self, package_manager: &str, dir: &Path) -> Result<(), CompatError> {
        info!(package_manager, dir = %dir.display(), "installing preset packages");
        let unenv = format!("unenv@{UNENV_VERSION}");
        let mut cmd = Command::new(package_manager);
        cmd.args(["install", "-D", unenv.as_str(), "@cloudflare/unenv-preset@latest"])
            .current_dir(dir);

        let output = process::run(cmd, self.install_timeout).map_err(CompatError::PresetProcess)?;
        if !output.success() {
            return Err(CompatError::PresetInstall {
                program: package_manager.to_string(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Module script printing the preset as JSON.
#[must_use]
pub fn preset_script(request: &PresetRequest) -> String {
    let date = serde_json::Value::from(request.compatibility_date()).to_string();
    let flags = serde_json::Value::from(request.compatibility_flags().to_vec()).to_string();
    format!(
        r#"import {{ defineEnv }} from "unenv";
import {{ getCloudflarePreset }} from "@cloudflare/unenv-preset";

const {{ alias, inject, external, polyfill }} = defineEnv({{
  presets: [
    getCloudflarePreset({{ compatibilityDate: {date}, compatibilityFlags: {flags} }}),
    {{ alias: {{ debug: "debug" }} }},
  ],
  npmShims: true,
}}).env;
console.log(JSON.stringify({{ alias, inject, external, polyfill }}));
"#
    )
}

impl PresetProvider for NodePresetProvider {
    fn fetch(&self, request: &PresetRequest) -> Result<PresetConfig, CompatError> {
        if let Some(pm) = &self.install_with {
            self.install(pm, request.base_dir())?;
        }

        debug!(
            date = request.compatibility_date(),
            flags = ?request.compatibility_flags(),
            "querying preset provider"
        );
        let mut cmd = Command::new(&self.node);
        cmd.arg("--input-type=module")
            .arg("-e")
            .arg(preset_script(request))
            .current_dir(request.base_dir());

        let output = process::run(cmd, self.timeout).map_err(CompatError::PresetProcess)?;
        if !output.success() {
            return Err(CompatError::PresetExit {
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        PresetConfig::from_json(&output.stdout)
    }
}

/// Provider reading a preset snapshot from disk.
#[derive(Debug, Clone)]
pub struct FilePresetProvider {
    path: PathBuf,
}

impl FilePresetProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PresetProvider for FilePresetProvider {
    fn fetch(&self, request: &PresetRequest) -> Result<PresetConfig, CompatError> {
        debug!(
            path = %self.path.display(),
            date = request.compatibility_date(),
            "reading preset file"
        );
        let text = std::fs::read_to_string(&self.path).map_err(|source| CompatError::PresetRead {
            path: self.path.clone(),
            source,
        })?;
        PresetConfig::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "alias": { "debug": "unenv/npm/debug", "node:fs": "node:fs" },
        "inject": {
            "process": "unenv/node/process",
            "Buffer": ["unenv/node/buffer", "Buffer"],
            "performance": ["unenv/node/perf_hooks", "performance", "perf"],
            "global": ["unenv/polyfill/globalthis", "default", "default"]
        },
        "external": ["node:fs"],
        "polyfill": ["unenv/polyfill/timers"]
    }"#;

    #[test]
    fn test_inject_shapes_are_normalized() {
        let preset = PresetConfig::from_json(SAMPLE).unwrap();

        let process = &preset.inject["process"];
        assert_eq!(
            (process.module(), process.export_name(), process.local_name()),
            ("unenv/node/process", "default", "defaultExport")
        );

        let buffer = &preset.inject["Buffer"];
        assert_eq!(
            (buffer.export_name(), buffer.local_name()),
            ("Buffer", "Buffer")
        );

        let perf = &preset.inject["performance"];
        assert_eq!((perf.export_name(), perf.local_name()), ("performance", "perf"));

        assert!(matches!(preset.inject["global"], InjectSource::Named { .. }));
        assert!(preset.is_external("node:fs"));
        assert!(!preset.is_external("unenv/npm/debug"));
    }

    #[test]
    fn test_malformed_presets_are_rejected() {
        for text in [
            "not json",
            r#"{ "alias": {}, "inject": {}, "external": [] }"#,
            r#"{ "alias": {}, "inject": {}, "external": [], "polyfill": [], "extra": 1 }"#,
            r#"{ "alias": {}, "inject": { "x": ["only-module"] }, "external": [], "polyfill": [] }"#,
            r#"{ "alias": {}, "inject": { "x": 3 }, "external": [], "polyfill": [] }"#,
        ] {
            let err = PresetConfig::from_json(text).unwrap_err();
            assert!(matches!(err, CompatError::PresetMalformed { .. }), "{text}");
        }
    }

    #[test]
    fn test_request_validates_date() {
        assert!(PresetRequest::new("2024-09-23", Vec::new(), "/app").is_ok());
        for bad in ["2024-9-23", "2024-02-30", "yesterday", "", "2024-09-23T00:00"] {
            let err = PresetRequest::new(bad, Vec::new(), "/app").unwrap_err();
            assert!(matches!(err, CompatError::InvalidDate { .. }), "{bad}");
        }
    }

    #[test]
    fn test_default_date_is_valid() {
        let date = default_compatibility_date();
        assert!(PresetRequest::new(&date, Vec::new(), "/app").is_ok());
    }

    #[test]
    fn test_cache_key_covers_every_input() {
        let flags = vec!["nodejs_compat".to_string()];
        let base = PresetRequest::new("2024-09-23", flags.clone(), "/app").unwrap();

        assert_eq!(
            base.cache_key(),
            PresetRequest::new("2024-09-23", flags.clone(), "/app")
                .unwrap()
                .cache_key()
        );
        assert_ne!(
            base.cache_key(),
            PresetRequest::new("2024-09-24", flags.clone(), "/app")
                .unwrap()
                .cache_key()
        );
        assert_ne!(
            base.cache_key(),
            PresetRequest::new("2024-09-23", Vec::new(), "/app")
                .unwrap()
                .cache_key()
        );
        assert_ne!(
            base.cache_key(),
            PresetRequest::new("2024-09-23", flags, "/other")
                .unwrap()
                .cache_key()
        );
    }

    #[test]
    fn test_preset_script_embeds_request() {
        let request = PresetRequest::new(
            "2024-09-23",
            vec!["nodejs_compat".to_string(), "no_x".to_string()],
            "/app",
        )
        .unwrap();
        let script = preset_script(&request);
        assert!(script.contains(r#"compatibilityDate: "2024-09-23""#));
        assert!(script.contains(r#"compatibilityFlags: ["nodejs_compat","no_x"]"#));
        assert!(script.contains("npmShims: true"));
        assert!(script.contains(r#"{ alias: { debug: "debug" } }"#));
    }

    #[test]
    fn test_file_provider_reads_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preset.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let request = PresetRequest::new("2024-09-23", Vec::new(), dir.path()).unwrap();

        let preset = FilePresetProvider::new(&path).fetch(&request).unwrap();
        assert_eq!(preset.polyfill, vec!["unenv/polyfill/timers"]);

        let missing = FilePresetProvider::new(dir.path().join("nope.json"))
            .fetch(&request)
            .unwrap_err();
        assert!(matches!(missing, CompatError::PresetRead { .. }));
    }
}
