//! Context Discovery daemon library
//!
//! The pieces `ctxd` is assembled from:
//! - Layered configuration (defaults, file, `CTXD__*` environment)
//! - A TCP listener speaking newline-delimited requests
//! - A multicast listener answering discoverer lookups
//! - Server lifecycle and graceful shutdown

pub mod config;
pub mod error;
pub mod server;

pub use config::{DaemonConfig, ServerConfig};
pub use error::{DaemonError, DaemonResult};
pub use server::Server;
