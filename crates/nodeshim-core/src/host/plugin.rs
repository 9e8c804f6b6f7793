//! Plugin surface of the host bundler.
//!
//! Provides an esbuild/Rollup-style plugin interface with the four hook kinds the
//! compatibility engine plugs into: resolve-specifier, load-module-body,
//! inject-default-modules (the `config` hook) and finalize-build.
//!
//! ## Example
//!
//! ```ignore
//! use nodeshim_core::host::{Plugin, PluginContext, ResolveArgs, ResolveIdResult, HookResult};
//!
//! struct WasmExternal;
//!
//! impl Plugin for WasmExternal {
//!     fn name(&self) -> &str { "wasm-external" }
//!
//!     fn resolve_id(&self, args: &ResolveArgs, _ctx: &PluginContext) -> HookResult<Option<ResolveIdResult>> {
//!         if args.specifier.ends_with(".wasm") {
//!             return Ok(Some(ResolveIdResult::external(&args.specifier)));
//!         }
//!         Ok(None)
//!     }
//! }
//! ```

#![allow(clippy::unused_self)]
#![allow(clippy::unnecessary_literal_bound)]

use rustc_hash::FxHashMap as HashMap;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Namespace of modules that live on disk.
pub const FILE_NAMESPACE: &str = "file";

/// Result type for plugin hooks.
pub type HookResult<T> = Result<T, PluginError>;

/// Error from a plugin.
#[derive(Debug)]
pub struct PluginError {
    /// Plugin name that caused the error.
    pub plugin: String,
    /// Hook that failed.
    pub hook: &'static str,
    /// Error message.
    pub message: String,
}

impl PluginError {
    /// Create a new plugin error.
    pub fn new(plugin: impl Into<String>, hook: &'static str, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            hook,
            message: message.into(),
        }
    }
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.plugin, self.hook, self.message)
    }
}

impl std::error::Error for PluginError {}

/// How a specifier was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveKind {
    /// Static `import` / `export ... from`.
    Import,
    /// CommonJS `require()` call.
    Require,
    /// Dynamic `import()` expression.
    Dynamic,
}

impl ResolveKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Require => "require",
            Self::Dynamic => "dynamic",
        }
    }
}

impl FromStr for ResolveKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "import" => Ok(Self::Import),
            "require" => Ok(Self::Require),
            "dynamic" | "dynamic-import" => Ok(Self::Dynamic),
            other => Err(format!(
                "invalid resolve kind '{other}'. Use: import, require, or dynamic"
            )),
        }
    }
}

/// Output format of the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// ES Modules (import/export).
    #[default]
    Esm,
    /// CommonJS (require/module.exports).
    Cjs,
    /// IIFE: a self-contained single script.
    Iife,
}

impl OutputFormat {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Esm => "esm",
            Self::Cjs => "cjs",
            Self::Iife => "iife",
        }
    }

    /// Whether a bundle in this format can still reference external modules.
    #[must_use]
    pub fn can_carry_imports(&self) -> bool {
        !matches!(self, Self::Iife)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "esm" | "es" | "module" => Ok(Self::Esm),
            "cjs" | "commonjs" => Ok(Self::Cjs),
            "iife" | "service-worker" => Ok(Self::Iife),
            other => Err(format!("invalid format '{other}'. Use: esm, cjs, or iife")),
        }
    }
}

/// Loader used to parse a module body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Loader {
    #[default]
    Js,
}

impl Loader {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Js => "js",
        }
    }
}

/// Arguments of a resolve event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolveArgs {
    /// Raw import text.
    pub specifier: String,
    /// How the specifier was reached.
    pub kind: ResolveKind,
    /// Path of the importing module, if any.
    pub importer: Option<String>,
    /// Namespace of the importing module.
    pub importer_namespace: String,
    /// Directory the specifier is resolved from.
    pub resolve_dir: PathBuf,
}

impl ResolveArgs {
    /// Create resolve args for a specifier with no importer.
    pub fn new(specifier: impl Into<String>, kind: ResolveKind) -> Self {
        Self {
            specifier: specifier.into(),
            kind,
            importer: None,
            importer_namespace: FILE_NAMESPACE.to_string(),
            resolve_dir: PathBuf::new(),
        }
    }

    /// Set the importing module.
    #[must_use]
    pub fn with_importer(mut self, importer: impl Into<String>) -> Self {
        self.importer = Some(importer.into());
        self
    }

    /// Set the namespace of the importing module.
    #[must_use]
    pub fn with_importer_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.importer_namespace = namespace.into();
        self
    }

    /// Set the resolve directory.
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resolve_dir = dir.into();
        self
    }

    /// Importer path for diagnostics.
    #[must_use]
    pub fn importer_label(&self) -> &str {
        self.importer.as_deref().unwrap_or("<entry>")
    }
}

/// Result of resolve hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolveIdResult {
    /// Resolved module ID (a file path, or a virtual path within `namespace`).
    pub id: String,
    /// Namespace the ID lives in.
    pub namespace: String,
    /// Whether this module is external (don't bundle).
    pub external: bool,
}

impl ResolveIdResult {
    /// Create a resolved module result.
    pub fn resolved(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            namespace: FILE_NAMESPACE.to_string(),
            external: false,
        }
    }

    /// Create an external module result.
    pub fn external(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            namespace: FILE_NAMESPACE.to_string(),
            external: true,
        }
    }

    /// Create a result pointing into a virtual namespace.
    pub fn virtual_module(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.into(),
            external: false,
        }
    }
}

/// Arguments of a load event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadArgs {
    /// Module ID as returned by resolution.
    pub path: String,
    /// Namespace of the module.
    pub namespace: String,
}

impl LoadArgs {
    /// Load args for a module in the given namespace.
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            namespace: namespace.into(),
        }
    }

    /// Load args for an on-disk module.
    pub fn file(path: impl Into<String>) -> Self {
        Self::new(FILE_NAMESPACE, path)
    }
}

impl From<&ResolveIdResult> for LoadArgs {
    fn from(result: &ResolveIdResult) -> Self {
        Self::new(result.namespace.clone(), result.id.clone())
    }
}

/// Result of load hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    /// Module source code.
    pub code: String,
    /// Loader used to parse the code.
    pub loader: Loader,
}

/// Diagnostics returned from `build_end`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Errors abort the pass.
    pub errors: Vec<String>,
    /// Warnings are reported without aborting.
    pub warnings: Vec<String>,
}

/// A diagnostic attributed to a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Plugin that produced the message.
    pub plugin: String,
    /// Message text.
    pub text: String,
}

/// Outcome of a finished pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub errors: Vec<Message>,
    pub warnings: Vec<Message>,
}

impl BuildReport {
    /// Whether the pass succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Initial build options.
///
/// Passed to the `config` hook so plugins can register always-inject modules.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Working directory.
    pub cwd: PathBuf,
    /// Output format.
    pub format: OutputFormat,
    /// Modules loaded before any user module, in order.
    pub inject: Vec<String>,
}

impl BuildOptions {
    /// Create build options.
    pub fn new(cwd: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            cwd: cwd.into(),
            format,
            inject: Vec::new(),
        }
    }

    /// Append an always-inject module unless it is already registered.
    pub fn add_inject(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.inject.contains(&path) {
            self.inject.push(path);
        }
    }
}

/// Context passed to plugin hooks for one pass.
///
/// Carries typed per-pass state: a plugin stores its state in `build_start`
/// and every later hook of the same pass reads it back.
pub struct PluginContext {
    /// Working directory.
    pub cwd: PathBuf,
    /// Output format of the pass.
    pub format: OutputFormat,
    state: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl PluginContext {
    /// Create a new plugin context.
    pub fn new(cwd: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            cwd: cwd.into(),
            format,
            state: HashMap::default(),
        }
    }

    /// Store per-pass state, replacing any previous value of the same type.
    pub fn insert_state<T: Any + Send + Sync>(&mut self, value: T) {
        self.state.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Get per-pass state.
    #[must_use]
    pub fn state<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.state
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("cwd", &self.cwd)
            .field("format", &self.format)
            .field("state_entries", &self.state.len())
            .finish()
    }
}

/// Plugin enforcement ordering.
///
/// Controls where a plugin runs relative to others in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PluginEnforce {
    /// Runs before normal plugins.
    Pre,
    /// Default ordering (no enforcement).
    #[default]
    Normal,
    /// Runs after normal plugins.
    Post,
}

/// The main plugin trait.
///
/// All methods have default implementations that do nothing, so a plugin only
/// implements the hooks it cares about.
pub trait Plugin: Send + Sync {
    /// Plugin name for debugging and error messages.
    fn name(&self) -> &str;

    /// Plugin ordering: `Pre`, `Normal` (default), or `Post`.
    fn enforce(&self) -> PluginEnforce {
        PluginEnforce::Normal
    }

    /// Adjust the initial build options (e.g. register always-inject modules).
    fn config(&self, _options: &mut BuildOptions) -> HookResult<()> {
        Ok(())
    }

    /// Called at the start of every pass.
    fn build_start(&self, _ctx: &mut PluginContext) -> HookResult<()> {
        Ok(())
    }

    /// Resolve a module specifier.
    ///
    /// Return `Some(result)` to handle this resolution, or `None` to let
    /// the next plugin or default resolver handle it.
    fn resolve_id(
        &self,
        _args: &ResolveArgs,
        _ctx: &PluginContext,
    ) -> HookResult<Option<ResolveIdResult>> {
        Ok(None)
    }

    /// Load a module by ID.
    ///
    /// Return `Some(result)` to provide the module source, or `None` to let
    /// the next plugin or default loader handle it.
    fn load(&self, _args: &LoadArgs, _ctx: &PluginContext) -> HookResult<Option<LoadResult>> {
        Ok(None)
    }

    /// Called once at the end of every pass.
    fn build_end(&self, _ctx: &PluginContext) -> HookResult<Diagnostics> {
        Ok(Diagnostics::default())
    }
}

/// A container for managing multiple plugins.
///
/// Plugins are sorted by their `enforce()` ordering: `Pre` → `Normal` → `Post`.
/// Within the same enforcement level, insertion order is preserved.
#[derive(Default)]
pub struct PluginContainer {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginContainer {
    /// Create an empty plugin container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin. Plugins are kept sorted by enforce order.
    pub fn add(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
        // Stable sort preserves insertion order within each level.
        self.plugins.sort_by_key(|p| p.enforce());
    }

    /// Plugin names in dispatch order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Run `config` on all plugins and return the final options.
    pub fn configure(&self, mut options: BuildOptions) -> HookResult<BuildOptions> {
        for plugin in &self.plugins {
            plugin.config(&mut options)?;
        }
        Ok(options)
    }

    /// Call `build_start` on all plugins.
    pub fn build_start(&self, ctx: &mut PluginContext) -> HookResult<()> {
        for plugin in &self.plugins {
            plugin.build_start(ctx)?;
        }
        Ok(())
    }

    /// Try to resolve a specifier through plugins.
    /// Returns None if no plugin handled the resolution.
    pub fn resolve_id(
        &self,
        args: &ResolveArgs,
        ctx: &PluginContext,
    ) -> HookResult<Option<ResolveIdResult>> {
        for plugin in &self.plugins {
            if let Some(result) = plugin.resolve_id(args, ctx)? {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    /// Try to load a module through plugins.
    /// Returns None if no plugin handled the load.
    pub fn load(&self, args: &LoadArgs, ctx: &PluginContext) -> HookResult<Option<LoadResult>> {
        for plugin in &self.plugins {
            if let Some(result) = plugin.load(args, ctx)? {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    /// Call `build_end` on all plugins and collect their diagnostics.
    pub fn build_end(&self, ctx: &PluginContext) -> HookResult<BuildReport> {
        let mut report = BuildReport::default();
        for plugin in &self.plugins {
            let diagnostics = plugin.build_end(ctx)?;
            let name = plugin.name();
            report
                .errors
                .extend(diagnostics.errors.into_iter().map(|text| Message {
                    plugin: name.to_string(),
                    text,
                }));
            report
                .warnings
                .extend(diagnostics.warnings.into_iter().map(|text| Message {
                    plugin: name.to_string(),
                    text,
                }));
        }
        Ok(report)
    }
}
