#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Node.js built-in compatibility resolution for bundlers targeting
//! sandboxed JavaScript runtimes.

pub mod compat;
pub mod config;
pub mod error;
pub mod host;
pub mod version;

pub use compat::{CompatError, NodeCompat, NodeCompatPlugin};
pub use config::{CompatOptions, Config};
pub use error::Error;
pub use version::VERSION;
