//! Configuration module
//!
//! Settings are read from a TOML file; every section and key is optional.

#[allow(clippy::module_inception)]
pub mod config;

pub use config::Config;
