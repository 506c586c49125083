//! Shared runtime plumbing for the INTeract engagement core: environment
//! configuration, tracing setup and the canonical error types used by the
//! service binary.

pub mod config;
pub mod errors;
pub mod logging;

pub use config::{CoreConfig, Environment};
pub use errors::{ConfigError, CoreError, Result};
pub use logging::init_tracing;
