//! Smith Common - Shared errors, configuration and constants
//!
//! This crate provides the error type, configuration structs,
//! defaults and small helpers used by the relay core and the binary.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::{BackendConfig, ConnectionConfig, LogConfig, ProcessorConfig, RelayConfig};
pub use constants::*;
pub use error::{Result, SmithError};
pub use types::BackendKind;
pub use utils::*;
