//! `require()` rewriting for built-ins.
//!
//! Static imports of built-ins pass through. A `require()` of a built-in is
//! redirected into [`REQUIRED_BUILTIN_NAMESPACE`] with the original specifier
//! as payload, and loads as an ES module re-exporting the default binding.

use super::builtins::Classifier;
use super::module::{js_string, VirtualModule, REQUIRED_BUILTIN_NAMESPACE};
use crate::host::{ResolveArgs, ResolveIdResult, ResolveKind};

/// Whether the resolve event is a `require()` of a built-in from user code.
#[must_use]
pub fn is_required_builtin(classifier: &Classifier, args: &ResolveArgs) -> bool {
    args.kind == ResolveKind::Require
        && args.importer_namespace != REQUIRED_BUILTIN_NAMESPACE
        && classifier.is_builtin(&args.specifier)
}

#[must_use]
pub fn redirect(args: &ResolveArgs) -> ResolveIdResult {
    ResolveIdResult::virtual_module(REQUIRED_BUILTIN_NAMESPACE, args.specifier.clone())
}

/// Module whose CommonJS export object is the built-in's default export.
#[must_use]
pub fn require_shim(specifier: &str) -> VirtualModule {
    let contents = format!(
        "import libDefault from {};\nmodule.exports = libDefault;\n",
        js_string(specifier)
    );
    VirtualModule::js(REQUIRED_BUILTIN_NAMESPACE, specifier, contents)
}
