//! Single build pass driver.

use super::plugin::{
    BuildOptions, BuildReport, HookResult, LoadArgs, LoadResult, PluginContainer, PluginContext,
    ResolveArgs, ResolveIdResult,
};

/// One pass over a plugin container.
///
/// Created by [`BuildPass::start`], which runs `build_start` on every plugin.
/// Resolve and load events may be dispatched from several threads at once.
/// [`BuildPass::finish`] consumes the pass and runs `build_end`.
pub struct BuildPass<'a> {
    plugins: &'a PluginContainer,
    ctx: PluginContext,
    inject: Vec<String>,
}

impl<'a> BuildPass<'a> {
    /// Start a pass with options already run through [`PluginContainer::configure`].
    pub fn start(plugins: &'a PluginContainer, options: &BuildOptions) -> HookResult<Self> {
        let mut ctx = PluginContext::new(options.cwd.clone(), options.format);
        plugins.build_start(&mut ctx)?;
        Ok(Self {
            plugins,
            ctx,
            inject: options.inject.clone(),
        })
    }

    /// Context shared by all hooks of this pass.
    #[must_use]
    pub fn context(&self) -> &PluginContext {
        &self.ctx
    }

    /// Always-inject modules, in load order.
    #[must_use]
    pub fn inject(&self) -> &[String] {
        &self.inject
    }

    /// Dispatch a resolve event.
    pub fn resolve(&self, args: &ResolveArgs) -> HookResult<Option<ResolveIdResult>> {
        self.plugins.resolve_id(args, &self.ctx)
    }

    /// Dispatch a load event.
    pub fn load(&self, args: &LoadArgs) -> HookResult<Option<LoadResult>> {
        self.plugins.load(args, &self.ctx)
    }

    /// End the pass and collect diagnostics.
    pub fn finish(self) -> HookResult<BuildReport> {
        self.plugins.build_end(&self.ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::plugin::{Diagnostics, OutputFormat, Plugin, ResolveKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        resolves: AtomicUsize,
    }

    struct Counting;

    impl Plugin for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn config(&self, options: &mut BuildOptions) -> HookResult<()> {
            options.add_inject("/virtual/prelude");
            Ok(())
        }

        fn build_start(&self, ctx: &mut PluginContext) -> HookResult<()> {
            ctx.insert_state(Counter::default());
            Ok(())
        }

        fn resolve_id(
            &self,
            _args: &ResolveArgs,
            ctx: &PluginContext,
        ) -> HookResult<Option<ResolveIdResult>> {
            if let Some(counter) = ctx.state::<Counter>() {
                counter.resolves.fetch_add(1, Ordering::SeqCst);
            }
            Ok(None)
        }

        fn build_end(&self, ctx: &PluginContext) -> HookResult<Diagnostics> {
            let count = ctx
                .state::<Counter>()
                .map_or(0, |c| c.resolves.load(Ordering::SeqCst));
            Ok(Diagnostics {
                errors: Vec::new(),
                warnings: vec![format!("{count} resolves")],
            })
        }
    }

    #[test]
    fn test_pass_state_is_fresh_per_pass() {
        let mut container = PluginContainer::new();
        container.add(Box::new(Counting));
        let options = container
            .configure(BuildOptions::new("/app", OutputFormat::Esm))
            .unwrap();
        assert_eq!(options.inject, vec!["/virtual/prelude"]);

        for _ in 0..2 {
            let pass = BuildPass::start(&container, &options).unwrap();
            assert_eq!(pass.inject(), ["/virtual/prelude"]);
            pass.resolve(&ResolveArgs::new("a", ResolveKind::Import))
                .unwrap();
            let report = pass.finish().unwrap();
            assert_eq!(report.warnings[0].text, "1 resolves");
        }
    }
}
