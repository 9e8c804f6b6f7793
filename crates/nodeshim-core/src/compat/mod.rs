//! Node.js built-in compatibility engine.
//!
//! Intercepts specifiers the host bundler cannot satisfy in a sandboxed
//! runtime and substitutes generated modules:
//!
//! - `require()` of a built-in becomes an ES module re-exporting its default
//!   binding ([`require`]).
//! - Aliases chosen by the compatibility preset resolve to shim files, with a
//!   CommonJS interop wrapper when an ESM shim is `require()`d ([`alias`]).
//! - Globals from the preset are assigned by prelude modules loaded before
//!   user code ([`globals`]).
//! - Built-ins that stay external are reported, and rejected for output
//!   formats that cannot import them ([`guard`]).
//!
//! Setup queries the preset provider and resolution oracle once. Everything
//! after that is in-memory and safe to call from several threads.

pub mod alias;
pub mod builtins;
pub mod cache;
pub mod codes;
pub mod context;
mod error;
pub mod externals;
pub mod globals;
pub mod guard;
pub mod hooks;
pub mod module;
pub mod oracle;
pub mod preset;
pub mod process;
pub mod require;

pub use alias::{AliasEntry, AliasTable};
pub use builtins::{Classification, Classifier};
pub use cache::PresetCache;
pub use context::PassContext;
pub use error::CompatError;
pub use externals::{ExternalFilesPlugin, RuntimeModulesPlugin};
pub use globals::GlobalInjector;
pub use module::{VirtualModule, REQUIRED_ALIAS_NAMESPACE, REQUIRED_BUILTIN_NAMESPACE};
pub use oracle::{NodeOracle, OracleError, ResolutionOracle};
pub use preset::{
    FilePresetProvider, InjectSource, NodePresetProvider, PresetConfig, PresetProvider,
    PresetRequest,
};

use crate::host::{
    BuildOptions, Diagnostics, HookResult, LoadArgs, LoadResult, OutputFormat, Plugin,
    PluginContext, PluginError, ResolveArgs, ResolveIdResult, FILE_NAMESPACE,
};
use hooks::HookChain;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Setup-time state shared by every hook.
#[derive(Debug)]
pub struct CompatState {
    pub classifier: Classifier,
    pub aliases: AliasTable,
    pub globals: GlobalInjector,
    pub preset: Arc<PresetConfig>,
}

impl CompatState {
    /// Record `args` in the pass when it leaves a built-in external.
    ///
    /// Requests coming from the `require()` shim itself are attributed to the
    /// user module that was recorded when the `require()` was rewritten.
    fn record_builtin(&self, args: &ResolveArgs, pass: &PassContext) {
        if args.importer_namespace == REQUIRED_BUILTIN_NAMESPACE {
            return;
        }
        let class = self.classifier.classify(&args.specifier, &self.aliases);
        if !class.should_externalize {
            return;
        }
        debug!(specifier = %args.specifier, importer = args.importer_label(), "external built-in");
        pass.record_external(&args.specifier, args.importer_label());
        if !class.is_aliased {
            pass.record_unshimmed(&args.specifier, args.importer_label());
        }
    }
}

type ResolveChain = HookChain<CompatState, ResolveArgs, ResolveIdResult>;
type LoadChain = HookChain<CompatState, LoadArgs, Arc<VirtualModule>>;

fn resolve_chain() -> ResolveChain {
    ResolveChain::new()
        .with(
            "require-builtin",
            |s, a| require::is_required_builtin(&s.classifier, a),
            |s, a, pass| {
                s.record_builtin(a, pass);
                Ok(Some(require::redirect(a)))
            },
        )
        .with(
            "unenv-alias",
            |s, a| s.aliases.matches(&a.specifier),
            |s, a, pass| {
                s.record_builtin(a, pass);
                Ok(s.aliases.redirect(a))
            },
        )
        .with(
            "builtin-external",
            |s, a| s.classifier.is_builtin(&a.specifier),
            |s, a, pass| {
                s.record_builtin(a, pass);
                Ok(Some(ResolveIdResult::external(a.specifier.clone())))
            },
        )
        .with(
            "global-polyfill",
            |s, a| s.globals.matches(&a.specifier),
            |_, a, _| Ok(Some(ResolveIdResult::resolved(a.specifier.clone()))),
        )
}

fn load_chain() -> LoadChain {
    LoadChain::new()
        .with(
            "require-builtin",
            |_, a| a.namespace == REQUIRED_BUILTIN_NAMESPACE,
            |_, a, pass| {
                pass.module(&a.namespace, &a.path, || Ok(require::require_shim(&a.path)))
                    .map(Some)
            },
        )
        .with(
            "unenv-alias",
            |_, a| a.namespace == REQUIRED_ALIAS_NAMESPACE,
            |_, a, pass| {
                pass.module(&a.namespace, &a.path, || Ok(alias::interop_module(&a.path)))
                    .map(Some)
            },
        )
        .with(
            "global-polyfill",
            |s, a| a.namespace == FILE_NAMESPACE && s.globals.matches(&a.path),
            |s, a, pass| {
                pass.module(&a.namespace, &a.path, || s.globals.generate(&a.path))
                    .map(Some)
            },
        )
}

/// The configured compatibility engine for one build.
#[derive(Debug)]
pub struct NodeCompat {
    state: CompatState,
    resolve_hooks: ResolveChain,
    load_hooks: LoadChain,
}

impl NodeCompat {
    /// Query the preset and resolve every alias and polyfill.
    pub fn setup(
        request: &PresetRequest,
        provider: &dyn PresetProvider,
        oracle: &dyn ResolutionOracle,
        classifier: Classifier,
    ) -> Result<Self, CompatError> {
        let preset = Arc::new(provider.fetch(request)?);
        Self::from_preset(preset, oracle, request.base_dir(), classifier)
    }

    /// Like [`NodeCompat::setup`], reusing a cached snapshot when available.
    pub fn setup_cached(
        request: &PresetRequest,
        cache: &PresetCache,
        provider: &dyn PresetProvider,
        oracle: &dyn ResolutionOracle,
        classifier: Classifier,
    ) -> Result<Self, CompatError> {
        let preset = cache.get_or_fetch(request, provider)?;
        Self::from_preset(preset, oracle, request.base_dir(), classifier)
    }

    /// Build the engine from an already-fetched preset.
    pub fn from_preset(
        preset: Arc<PresetConfig>,
        oracle: &dyn ResolutionOracle,
        base_dir: &Path,
        classifier: Classifier,
    ) -> Result<Self, CompatError> {
        let aliases = AliasTable::resolve(&preset, oracle, base_dir)?;
        let polyfills = resolve_polyfills(&preset.polyfill, oracle, base_dir)?;
        let globals = GlobalInjector::new(base_dir, &preset.inject, &polyfills);

        info!(
            builtins = classifier.len(),
            aliases = aliases.len(),
            preludes = globals.len(),
            "node compat ready"
        );

        Ok(Self {
            state: CompatState {
                classifier,
                aliases,
                globals,
                preset,
            },
            resolve_hooks: resolve_chain(),
            load_hooks: load_chain(),
        })
    }

    #[must_use]
    pub fn state(&self) -> &CompatState {
        &self.state
    }

    /// Always-inject module paths.
    #[must_use]
    pub fn inject_paths(&self) -> &[String] {
        self.state.globals.inject_paths()
    }

    /// Resolve hook names in dispatch order.
    #[must_use]
    pub fn resolve_hook_names(&self) -> Vec<&'static str> {
        self.resolve_hooks.names()
    }

    /// Classify a specifier against the active aliases.
    #[must_use]
    pub fn classify(&self, specifier: &str) -> Classification {
        self.state.classifier.classify(specifier, &self.state.aliases)
    }

    /// Handle a resolve event. `None` leaves it to default resolution.
    pub fn resolve(
        &self,
        args: &ResolveArgs,
        pass: &PassContext,
    ) -> Result<Option<ResolveIdResult>, CompatError> {
        pass.resolve_once(args, || self.resolve_hooks.dispatch(&self.state, args, pass))
    }

    /// Handle a load event. `None` means the module is not virtual.
    pub fn load(
        &self,
        args: &LoadArgs,
        pass: &PassContext,
    ) -> Result<Option<Arc<VirtualModule>>, CompatError> {
        self.load_hooks.dispatch(&self.state, args, pass)
    }

    /// End-of-pass diagnostics.
    #[must_use]
    pub fn finish(&self, format: OutputFormat, pass: &PassContext) -> Diagnostics {
        let mut diagnostics = Diagnostics {
            errors: Vec::new(),
            warnings: guard::builtin_warnings(&pass.unshimmed()),
        };
        if let Err(e) = guard::check_output_format(format, &pass.externalized()) {
            diagnostics.errors.push(e.to_string());
        }
        diagnostics
    }
}

fn resolve_polyfills(
    polyfills: &[String],
    oracle: &dyn ResolutionOracle,
    base_dir: &Path,
) -> Result<Vec<(String, PathBuf)>, CompatError> {
    let resolved = oracle
        .resolve_many(polyfills, base_dir)
        .map_err(|e| match e {
            OracleError::Unresolvable { specifier, dir } => CompatError::PolyfillUnresolvable {
                module: specifier,
                dir,
            },
            other => CompatError::Oracle(other),
        })?;

    Ok(polyfills
        .iter()
        .cloned()
        .zip(resolved.into_iter().map(|p| {
            if p.is_absolute() {
                p
            } else {
                base_dir.join(p)
            }
        }))
        .collect())
}

/// Host plugin running the engine.
#[derive(Debug)]
pub struct NodeCompatPlugin {
    compat: NodeCompat,
}

impl NodeCompatPlugin {
    pub const NAME: &'static str = "hybrid-nodejs_compat";

    #[must_use]
    pub fn new(compat: NodeCompat) -> Self {
        Self { compat }
    }

    #[must_use]
    pub fn compat(&self) -> &NodeCompat {
        &self.compat
    }

    fn pass<'c>(&self, ctx: &'c PluginContext, hook: &'static str) -> HookResult<&'c PassContext> {
        ctx.state::<PassContext>()
            .ok_or_else(|| self.error(hook, &CompatError::MissingPassContext))
    }

    fn error(&self, hook: &'static str, e: &CompatError) -> PluginError {
        PluginError::new(Self::NAME, hook, format!("{} ({})", e, e.code()))
    }
}

impl Plugin for NodeCompatPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn config(&self, options: &mut BuildOptions) -> HookResult<()> {
        for path in self.compat.inject_paths() {
            options.add_inject(path.clone());
        }
        Ok(())
    }

    fn build_start(&self, ctx: &mut PluginContext) -> HookResult<()> {
        ctx.insert_state(PassContext::new());
        Ok(())
    }

    fn resolve_id(
        &self,
        args: &ResolveArgs,
        ctx: &PluginContext,
    ) -> HookResult<Option<ResolveIdResult>> {
        let pass = self.pass(ctx, "resolve_id")?;
        self.compat
            .resolve(args, pass)
            .map_err(|e| self.error("resolve_id", &e))
    }

    fn load(&self, args: &LoadArgs, ctx: &PluginContext) -> HookResult<Option<LoadResult>> {
        let pass = self.pass(ctx, "load")?;
        let module = self
            .compat
            .load(args, pass)
            .map_err(|e| self.error("load", &e))?;
        Ok(module.map(|m| m.to_load_result()))
    }

    fn build_end(&self, ctx: &PluginContext) -> HookResult<Diagnostics> {
        let pass = self.pass(ctx, "build_end")?;
        Ok(self.compat.finish(ctx.format, pass))
    }
}
