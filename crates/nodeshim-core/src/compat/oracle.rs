//! Module resolution oracle.
//!
//! Alias targets and polyfills are resolved to absolute paths with the same
//! algorithm the package manager uses. The oracle answers with a single path,
//! or reports the specifier as unavailable.

use super::builtins::NODE_BUILTINS;
use super::process::{self, ProcessError};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failure of a resolution query.
#[derive(Error, Debug)]
pub enum OracleError {
    /// The specifier does not resolve from the directory. Not fatal for aliases.
    #[error("cannot resolve '{specifier}' from {dir}")]
    Unresolvable { specifier: String, dir: PathBuf },

    #[error("resolution oracle failed: {0}")]
    Process(#[from] ProcessError),

    #[error("resolution oracle returned malformed output: {message}")]
    Malformed { message: String },
}

impl OracleError {
    #[must_use]
    pub fn is_unresolvable(&self) -> bool {
        matches!(self, Self::Unresolvable { .. })
    }
}

/// Resolves module specifiers to absolute paths.
pub trait ResolutionOracle: Send + Sync {
    /// Resolve one specifier from `dir`.
    fn resolve(&self, specifier: &str, dir: &Path) -> Result<PathBuf, OracleError>;

    /// Resolve several specifiers, failing on the first one that does not resolve.
    fn resolve_many(&self, specifiers: &[String], dir: &Path) -> Result<Vec<PathBuf>, OracleError> {
        specifiers.iter().map(|s| self.resolve(s, dir)).collect()
    }

    /// Names of the runtime's built-in modules.
    fn builtin_modules(&self) -> Result<Vec<String>, OracleError> {
        Ok(NODE_BUILTINS.iter().map(|s| (*s).to_string()).collect())
    }
}

/// Oracle backed by `node -e "require.resolve(...)"`.
#[derive(Debug, Clone)]
pub struct NodeOracle {
    node: PathBuf,
    timeout: Duration,
}

impl NodeOracle {
    /// Create an oracle using the given `node` binary.
    pub fn new(node: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            node: node.into(),
            timeout,
        }
    }

    fn eval(&self, script: &str, dir: Option<&Path>) -> Result<process::CommandOutput, OracleError> {
        let mut cmd = Command::new(&self.node);
        cmd.arg("-e").arg(script);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        Ok(process::run(cmd, self.timeout)?)
    }
}

impl Default for NodeOracle {
    fn default() -> Self {
        Self::new("node", Duration::from_secs(crate::config::DEFAULT_PROCESS_TIMEOUT_SECS))
    }
}

impl ResolutionOracle for NodeOracle {
    fn resolve(&self, specifier: &str, dir: &Path) -> Result<PathBuf, OracleError> {
        let script = format!("console.log(require.resolve({}))", js_json(&specifier)?);
        let output = self.eval(&script, Some(dir))?;
        if !output.success() {
            debug!(specifier, dir = %dir.display(), stderr = %output.stderr.trim(), "require.resolve failed");
            return Err(OracleError::Unresolvable {
                specifier: specifier.to_string(),
                dir: dir.to_path_buf(),
            });
        }

        let resolved = output.stdout.trim();
        if resolved.is_empty() {
            return Err(OracleError::Malformed {
                message: format!("empty output resolving '{specifier}'"),
            });
        }
        Ok(PathBuf::from(resolved))
    }

    fn resolve_many(&self, specifiers: &[String], dir: &Path) -> Result<Vec<PathBuf>, OracleError> {
        if specifiers.is_empty() {
            return Ok(Vec::new());
        }

        let script = format!(
            "console.log(JSON.stringify({}.map(m => require.resolve(m))))",
            js_json(&specifiers)?
        );
        let output = self.eval(&script, Some(dir))?;
        if !output.success() {
            // Resolve one by one to name the specifier that failed.
            return specifiers.iter().map(|s| self.resolve(s, dir)).collect();
        }

        let resolved: Vec<PathBuf> =
            serde_json::from_str(output.stdout.trim()).map_err(|e| OracleError::Malformed {
                message: e.to_string(),
            })?;
        if resolved.len() != specifiers.len() {
            return Err(OracleError::Malformed {
                message: format!(
                    "expected {} paths, got {}",
                    specifiers.len(),
                    resolved.len()
                ),
            });
        }
        Ok(resolved)
    }

    fn builtin_modules(&self) -> Result<Vec<String>, OracleError> {
        let output = self.eval(
            "console.log(JSON.stringify(require('module').builtinModules))",
            None,
        )?;
        if !output.success() {
            return Err(OracleError::Malformed {
                message: format!("builtinModules query failed: {}", output.stderr.trim()),
            });
        }
        serde_json::from_str(output.stdout.trim()).map_err(|e| OracleError::Malformed {
            message: e.to_string(),
        })
    }
}

fn js_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, OracleError> {
    serde_json::to_string(value).map_err(|e| OracleError::Malformed {
        message: e.to_string(),
    })
}
