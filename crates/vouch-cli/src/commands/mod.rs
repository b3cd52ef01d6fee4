//! CLI command implementations.

pub mod config;
pub mod validate;
pub mod version;
