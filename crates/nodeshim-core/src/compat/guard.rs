//! End-of-pass checks over externalized built-ins.

use super::error::CompatError;
use crate::host::OutputFormat;
use std::collections::{BTreeMap, BTreeSet};

/// Externalized specifier to the importers that reached it.
pub type ImporterMap = BTreeMap<String, BTreeSet<String>>;

fn describe(specifier: &str, importers: &BTreeSet<String>) -> String {
    let importers = importers.iter().cloned().collect::<Vec<_>>().join(", ");
    format!("\"{specifier}\" (imported by {importers})")
}

/// Fail when `format` cannot carry the external built-in imports left in the bundle.
///
/// Reports every offending specifier in one error.
pub fn check_output_format(
    format: OutputFormat,
    externalized: &ImporterMap,
) -> Result<(), CompatError> {
    if format.can_carry_imports() || externalized.is_empty() {
        return Ok(());
    }

    let offending = externalized
        .iter()
        .map(|(specifier, importers)| describe(specifier, importers))
        .collect::<Vec<_>>()
        .join(", ");

    Err(CompatError::FormatIncompatible {
        message: format!(
            "Unexpected external import of {offending}.\n\
             Your worker has no default export, which means it is assumed to be a Service Worker format Worker.\n\
             Did you mean to create an ES Module format Worker?\n\
             If so, try adding `export default {{ ... }}` in your entry-point.\n\
             See https://developers.cloudflare.com/workers/reference/migrate-to-module-workers/."
        ),
    })
}

/// One warning per built-in that was left external without a shim.
#[must_use]
pub fn builtin_warnings(unshimmed: &ImporterMap) -> Vec<String> {
    unshimmed
        .iter()
        .map(|(specifier, importers)| {
            format!(
                "Node built-in {} has no shim for the target runtime and was left as an external import",
                describe(specifier, importers)
            )
        })
        .collect()
}
