use super::codes;
use super::oracle::OracleError;
use super::process::ProcessError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the compatibility engine.
///
/// Everything except [`CompatError::FormatIncompatible`] is a setup or
/// internal-consistency fault and aborts the build.
#[derive(Error, Debug)]
pub enum CompatError {
    #[error("invalid compatibility date '{date}', expected YYYY-MM-DD")]
    InvalidDate { date: String },

    #[error("failed to install preset packages with {program} (exit code {code:?}): {stderr}")]
    PresetInstall {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("preset provider failed: {0}")]
    PresetProcess(#[source] ProcessError),

    #[error("preset provider exited with code {code:?}: {stderr}")]
    PresetExit { code: Option<i32>, stderr: String },

    #[error("malformed preset: {message}")]
    PresetMalformed { message: String },

    #[error("failed to read preset file {path}: {source}")]
    PresetRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("polyfill '{module}' could not be resolved from {dir}")]
    PolyfillUnresolvable { module: String, dir: PathBuf },

    #[error("virtual module {namespace}:{path} was never registered")]
    UnregisteredVirtualModule { namespace: String, path: String },

    #[error("hook called outside of a started build pass")]
    MissingPassContext,

    #[error("{message}")]
    FormatIncompatible { message: String },
}

impl CompatError {
    /// Stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidDate { .. } => codes::COMPAT_INVALID_DATE,
            Self::PresetInstall { .. } => codes::COMPAT_PRESET_INSTALL,
            Self::PresetProcess(_) => codes::COMPAT_PRESET_PROCESS,
            Self::PresetExit { .. } => codes::COMPAT_PRESET_EXIT,
            Self::PresetMalformed { .. } => codes::COMPAT_PRESET_MALFORMED,
            Self::PresetRead { .. } => codes::COMPAT_PRESET_READ,
            Self::Oracle(_) => codes::COMPAT_ORACLE_FAILED,
            Self::PolyfillUnresolvable { .. } => codes::COMPAT_POLYFILL_UNRESOLVABLE,
            Self::UnregisteredVirtualModule { .. } => codes::COMPAT_UNREGISTERED_VIRTUAL_MODULE,
            Self::MissingPassContext => codes::COMPAT_MISSING_PASS_CONTEXT,
            Self::FormatIncompatible { .. } => codes::COMPAT_FORMAT_INCOMPATIBLE,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::PresetMalformed {
            message: message.into(),
        }
    }
}
