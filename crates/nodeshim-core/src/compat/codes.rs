//! Stable error codes for the compatibility engine.
//!
//! All codes are SCREAMING_SNAKE_CASE and stable across versions.

/// Compatibility date is not a valid `YYYY-MM-DD` date.
pub const COMPAT_INVALID_DATE: &str = "COMPAT_INVALID_DATE";

/// Preset packages could not be installed.
pub const COMPAT_PRESET_INSTALL: &str = "COMPAT_PRESET_INSTALL";

/// Preset provider could not be spawned or timed out.
pub const COMPAT_PRESET_PROCESS: &str = "COMPAT_PRESET_PROCESS";

/// Preset provider exited with non-zero status.
pub const COMPAT_PRESET_EXIT: &str = "COMPAT_PRESET_EXIT";

/// Preset provider output is not a valid preset.
pub const COMPAT_PRESET_MALFORMED: &str = "COMPAT_PRESET_MALFORMED";

/// Preset file could not be read.
pub const COMPAT_PRESET_READ: &str = "COMPAT_PRESET_READ";

/// Resolution oracle failed outside of a plain "not found".
pub const COMPAT_ORACLE_FAILED: &str = "COMPAT_ORACLE_FAILED";

/// A polyfill module could not be resolved.
pub const COMPAT_POLYFILL_UNRESOLVABLE: &str = "COMPAT_POLYFILL_UNRESOLVABLE";

/// A virtual module was requested that was never registered.
pub const COMPAT_UNREGISTERED_VIRTUAL_MODULE: &str = "COMPAT_UNREGISTERED_VIRTUAL_MODULE";

/// A hook ran outside of a started pass.
pub const COMPAT_MISSING_PASS_CONTEXT: &str = "COMPAT_MISSING_PASS_CONTEXT";

/// Output format cannot carry the remaining external built-in imports.
pub const COMPAT_FORMAT_INCOMPATIBLE: &str = "COMPAT_FORMAT_INCOMPATIBLE";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_codes_are_screaming_snake_case() {
        let codes = [
            COMPAT_INVALID_DATE,
            COMPAT_PRESET_INSTALL,
            COMPAT_PRESET_PROCESS,
            COMPAT_PRESET_EXIT,
            COMPAT_PRESET_MALFORMED,
            COMPAT_PRESET_READ,
            COMPAT_ORACLE_FAILED,
            COMPAT_POLYFILL_UNRESOLVABLE,
            COMPAT_UNREGISTERED_VIRTUAL_MODULE,
            COMPAT_MISSING_PASS_CONTEXT,
            COMPAT_FORMAT_INCOMPATIBLE,
        ];

        for code in codes {
            assert!(
                code.chars().all(|c| c.is_uppercase() || c == '_'),
                "Code '{code}' should be SCREAMING_SNAKE_CASE"
            );
        }
    }
}
