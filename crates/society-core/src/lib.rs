//! Core configuration and error types shared by the Society services.
//!
//! This crate holds the process-level pieces that every service binary needs
//! regardless of which resources it exposes: the listen address, the log
//! filter and output format, and a small error type for startup failures.

mod config;
mod error;

pub use config::{LogFormat, SocietyConfig};
pub use error::{SocietyError, SocietyResult};
