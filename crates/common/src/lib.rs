//! Common types, configuration and error taxonomy shared across all crates

pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;
