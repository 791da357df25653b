//! One-call constructors for the common logger shapes.

use std::path::PathBuf;

use tracing::Level;

use crate::Result;
use crate::builder::RotatingLoggerBuilder;
use crate::config::LoggerConfig;
use crate::encoder::EncoderConfig;
use crate::logger::Logger;
use crate::rotation::RotationPolicy;

/// The standard encoder configuration, encoding times in UTC when `utc` is
/// set and in local time otherwise.
pub fn encoder_config(utc: bool) -> EncoderConfig {
    EncoderConfig::new(utc)
}

/// Logger configuration writing JSON to `output_files`.
///
/// With no files, records and write errors both go to stderr. Otherwise
/// records go to exactly the given paths (`"stderr"` and `"stdout"` name the
/// process streams) and write errors to stderr.
pub fn logger_config<I, S>(output_files: I, level: Level, development: bool, utc: bool) -> LoggerConfig
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    LoggerConfig::new(output_files, level, development, utc)
}

/// Build a logger from [`logger_config`].
///
/// # Errors
///
/// Returns [`crate::Error::Build`] if an output path cannot be opened.
pub fn build_logger<I, S>(output_files: I, level: Level, development: bool, utc: bool) -> Result<Logger>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    logger_config(output_files, level, development, utc).build()
}

/// Build a logger that writes info and above to a rotating `logfile`, errors
/// to stderr and everything below error to stdout.
///
/// `max_size_mb` of zero selects the default size, `max_backups` of zero
/// keeps every backup and `max_age_days` of zero disables age based removal.
///
/// # Errors
///
/// Returns [`crate::Error::Build`] if the log file cannot be created.
pub fn build_rotating_logger(
    logfile: impl Into<PathBuf>,
    max_size_mb: u64,
    max_backups: usize,
    max_age_days: u64,
    utc: bool,
) -> Result<Logger> {
    let policy = RotationPolicy::new(logfile, max_size_mb, max_backups, max_age_days);
    RotatingLoggerBuilder::new(policy).with_utc(utc).build()
}
