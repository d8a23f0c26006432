//! # Tasknest Core
//! Shared foundation for the Tasknest workspace: configuration loading
//! and the crate-wide error type.

pub mod config;
pub mod error;

pub use config::TasknestConfig;
pub use error::{Result, TasknestError};
