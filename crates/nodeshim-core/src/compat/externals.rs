//! Specifiers provided by the target runtime or left on disk.

use crate::host::{HookResult, Plugin, PluginContext, PluginEnforce, ResolveArgs, ResolveIdResult};
use tracing::debug;

/// Externalizes non-JS assets by file extension, keeping their path.
#[derive(Debug, Clone)]
pub struct ExternalFilesPlugin {
    extensions: Vec<String>,
}

impl ExternalFilesPlugin {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| {
                let ext: String = ext.into();
                let ext = ext.to_ascii_lowercase();
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                }
            })
            .collect();
        Self { extensions }
    }

    fn matches(&self, specifier: &str) -> bool {
        let lower = specifier.to_ascii_lowercase();
        self.extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
    }
}

impl Default for ExternalFilesPlugin {
    fn default() -> Self {
        Self::new([".wasm", ".bin", ".html", ".txt"])
    }
}

impl Plugin for ExternalFilesPlugin {
    fn name(&self) -> &str {
        "external-files"
    }

    fn enforce(&self) -> PluginEnforce {
        PluginEnforce::Pre
    }

    fn resolve_id(
        &self,
        args: &ResolveArgs,
        _ctx: &PluginContext,
    ) -> HookResult<Option<ResolveIdResult>> {
        if self.matches(&args.specifier) {
            debug!(specifier = %args.specifier, "external file");
            return Ok(Some(ResolveIdResult::external(&args.specifier)));
        }
        Ok(None)
    }
}

/// Externalizes modules the target runtime provides itself.
#[derive(Debug, Clone)]
pub struct RuntimeModulesPlugin {
    prefixes: Vec<String>,
    names: Vec<String>,
}

impl RuntimeModulesPlugin {
    #[must_use]
    pub fn new(prefixes: Vec<String>, names: Vec<String>) -> Self {
        Self { prefixes, names }
    }

    fn matches(&self, specifier: &str) -> bool {
        self.prefixes.iter().any(|p| specifier.starts_with(p.as_str()))
            || self.names.iter().any(|n| n == specifier)
    }
}

impl Default for RuntimeModulesPlugin {
    fn default() -> Self {
        Self::new(
            vec!["cloudflare:".to_string()],
            vec!["__STATIC_CONTENT_MANIFEST".to_string()],
        )
    }
}

impl Plugin for RuntimeModulesPlugin {
    fn name(&self) -> &str {
        "runtime-modules"
    }

    fn enforce(&self) -> PluginEnforce {
        PluginEnforce::Pre
    }

    fn resolve_id(
        &self,
        args: &ResolveArgs,
        _ctx: &PluginContext,
    ) -> HookResult<Option<ResolveIdResult>> {
        if self.matches(&args.specifier) {
            return Ok(Some(ResolveIdResult::external(&args.specifier)));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{OutputFormat, ResolveKind};

    fn resolve(plugin: &dyn Plugin, specifier: &str) -> Option<ResolveIdResult> {
        let ctx = PluginContext::new("/app", OutputFormat::Esm);
        plugin
            .resolve_id(&ResolveArgs::new(specifier, ResolveKind::Import), &ctx)
            .unwrap()
    }

    #[test]
    fn test_external_files_by_extension() {
        let plugin = ExternalFilesPlugin::default();
        assert_eq!(
            resolve(&plugin, "./module.WASM"),
            Some(ResolveIdResult::external("./module.WASM"))
        );
        assert!(resolve(&plugin, "./page.html").is_some());
        assert!(resolve(&plugin, "./index.js").is_none());

        let custom = ExternalFilesPlugin::new(["bin"]);
        assert!(resolve(&custom, "./data.bin").is_some());
        assert!(resolve(&custom, "./data.txt").is_none());
    }

    #[test]
    fn test_runtime_modules() {
        let plugin = RuntimeModulesPlugin::default();
        assert!(resolve(&plugin, "cloudflare:sockets").is_some());
        assert!(resolve(&plugin, "__STATIC_CONTENT_MANIFEST").is_some());
        assert!(resolve(&plugin, "cloudflare").is_none());
        assert!(resolve(&plugin, "fs").is_none());
    }
}
