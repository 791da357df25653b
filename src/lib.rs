//! # ntnulog
//!
//! Preconfigured structured loggers built on `tracing`.
//!
//! ## Features
//!
//! - JSON records with a fixed, configurable key mapping
//! - Loggers over stderr, stdout and plain files
//! - A rotating file logger that splits records between stdout and stderr
//!   by priority
//! - Runtime level changes
//!
//! ## Example
//!
//! ```rust
//! use ntnulog::{Level, build_logger};
//!
//! let logger = build_logger(["stderr"], Level::INFO, false, true)?;
//! logger.in_scope(|| tracing::info!(user = "alice", "logged in"));
//! # Ok::<(), ntnulog::Error>(())
//! ```

pub mod builder;
pub mod config;
pub mod encoder;
pub mod error;
pub mod factory;
pub mod format;
pub mod logger;
pub mod output;
pub mod rotation;
pub mod routing;
pub mod writer;

#[cfg(test)]
mod test_support;

pub use builder::RotatingLoggerBuilder;
pub use config::{Encoding, LoggerConfig, parse_level};
pub use encoder::{CallerEncoding, EncoderConfig, KeyScheme, LevelEncoding, TimeEncoding};
pub use error::{Error, Result};
pub use factory::{build_logger, build_rotating_logger, encoder_config, logger_config};
pub use format::JsonEncoder;
pub use logger::{LevelHandle, Logger, LoggerGuard};
pub use output::{OutputPath, Outputs};
pub use rotation::RotationPolicy;
pub use routing::Priority;
pub use tracing::Level;
pub use writer::RotatingWriter;
