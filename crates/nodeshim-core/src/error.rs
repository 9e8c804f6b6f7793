use crate::compat::CompatError;
use crate::host::PluginError;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for nodeshim operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Compat(#[from] CompatError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Stable error code for JSON output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "NODESHIM_IO_ERROR",
            Self::ConfigRead { .. } => "NODESHIM_CONFIG_READ",
            Self::ConfigParse { .. } => "NODESHIM_CONFIG_PARSE",
            Self::Compat(e) => e.code(),
            Self::Plugin(_) => "NODESHIM_PLUGIN_ERROR",
            Self::Other(_) => "NODESHIM_ERROR",
        }
    }
}
