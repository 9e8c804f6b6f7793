//! Host bundler surface.
//!
//! The compatibility engine never drives a build itself. A host bundler owns
//! the build and calls into registered plugins through the hooks defined here.

mod pass;
mod plugin;

pub use pass::BuildPass;
pub use plugin::{
    BuildOptions, BuildReport, Diagnostics, HookResult, LoadArgs, LoadResult, Loader, Message,
    OutputFormat, Plugin, PluginContainer, PluginContext, PluginEnforce, PluginError, ResolveArgs,
    ResolveIdResult, ResolveKind, FILE_NAMESPACE,
};
