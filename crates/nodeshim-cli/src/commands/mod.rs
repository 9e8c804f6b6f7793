pub mod preset;
pub mod resolve;
pub mod setup;
pub mod version;
