//! Shared utilities

pub mod config;
pub mod env;

pub use config::SetupConfig;
pub use env::{Environment, MapEnvironment, ProcessEnvironment};
