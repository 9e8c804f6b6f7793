//! Generated module bodies.

use crate::host::{LoadResult, Loader};
use serde::Serialize;

/// Namespace of `require()`-rewritten built-ins.
pub const REQUIRED_BUILTIN_NAMESPACE: &str = "node-built-in-modules";

/// Namespace of CommonJS-interop wrappers around aliased ESM shims.
pub const REQUIRED_ALIAS_NAMESPACE: &str = "required-unenv-alias";

/// A module whose text is generated in memory for one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualModule {
    pub namespace: String,
    pub path: String,
    pub contents: String,
    pub loader: Loader,
}

impl VirtualModule {
    pub fn js(namespace: impl Into<String>, path: impl Into<String>, contents: String) -> Self {
        Self {
            namespace: namespace.into(),
            path: path.into(),
            contents,
            loader: Loader::Js,
        }
    }

    /// Host load result carrying this module's text.
    #[must_use]
    pub fn to_load_result(&self) -> LoadResult {
        LoadResult {
            code: self.contents.clone(),
            loader: self.loader,
        }
    }
}

/// Quote `s` as a JavaScript string literal.
pub(crate) fn js_string(s: &str) -> String {
    // JSON strings are valid JS string literals; serializing a &str cannot fail.
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s.escape_default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes() {
        assert_eq!(js_string("fs"), r#""fs""#);
        assert_eq!(js_string(r"C:\dir\a'b"), r#""C:\\dir\\a'b""#);
        assert_eq!(js_string("a\"b"), r#""a\"b""#);
    }

    #[test]
    fn test_load_result_is_javascript() {
        let module = VirtualModule::js(REQUIRED_BUILTIN_NAMESPACE, "fs", "export {};\n".to_string());
        let load = module.to_load_result();
        assert_eq!(load.loader, Loader::Js);
        assert_eq!(load.loader.as_str(), "js");
        assert_eq!(load.code, "export {};\n");
    }
}
