//! Engine configuration and constants.
//!
//! This module provides:
//! - Configuration constants (defaults, managed paths, warning texts)
//! - Request settings and the per-host certificate table
//! - Logging option types shared with the CLI

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{CertificateSpec, Cli, LogFormat, LogLevel, RequestSettings};
