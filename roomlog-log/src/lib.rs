//! # roomlog-log
//!
//! The output log seam shared by the room server and its consumers.
//!
//! - [`OutputLog`]: the append-only log both sides talk to
//! - [`MemoryLog`]: an in-process log for tests and single-process setups
//! - Shared configuration ([`LogConfig`], [`LoggingConfig`], [`load_toml`])
//!   and [`init_tracing`]
//!
//! Consumers depend on this crate, not on the producer.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod memory;
pub mod telemetry;
pub mod transport;

pub use config::{load_toml, ConfigError, LogConfig, LoggingConfig};
pub use error::{LogError, LogResult};
pub use memory::MemoryLog;
pub use telemetry::init_tracing;
pub use transport::{LogEntry, OutputLog};
