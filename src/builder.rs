//! Builder for the rotating logger.
//!
//! Records are encoded as JSON and split by priority: error and above go to
//! stderr, everything below error goes to stdout, and info and above is
//! appended to a size-rotated file.
//!
//! # Example
//!
//! ```rust,no_run
//! use ntnulog::{Level, RotatingLoggerBuilder, RotationPolicy};
//!
//! let logger = RotatingLoggerBuilder::new(RotationPolicy::new("/var/log/app.log", 10, 5, 30))
//!     .with_level(Level::INFO)
//!     .with_utc(true)
//!     .build()?;
//!
//! logger.in_scope(|| tracing::info!("service started"));
//! # Ok::<(), ntnulog::Error>(())
//! ```

use std::io;

use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

use crate::config::env_filter;
use crate::encoder::{EncoderConfig, KeyScheme};
use crate::format::JsonEncoder;
use crate::logger::{Logger, json_layer};
use crate::rotation::RotationPolicy;
use crate::routing::Priority;
use crate::writer::{ReportingWriter, RotatingWriter};
use crate::{Error, Result};

/// A builder for a logger over a rotating file and the process streams.
///
/// `O` and `E` are the writers receiving low and high priority records. They
/// default to the process stdout and stderr.
#[derive(Debug, Clone)]
pub struct RotatingLoggerBuilder<O = fn() -> io::Stdout, E = fn() -> io::Stderr> {
    policy: RotationPolicy,
    level: Level,
    utc: bool,
    scheme: KeyScheme,
    console: bool,
    stdout: O,
    stderr: E,
}

impl RotatingLoggerBuilder {
    /// Builder for `policy` with level `DEBUG`, local time and console output.
    pub fn new(policy: RotationPolicy) -> Self {
        Self {
            policy,
            level: Level::DEBUG,
            utc: false,
            scheme: KeyScheme::default(),
            console: true,
            stdout: io::stdout,
            stderr: io::stderr,
        }
    }
}

impl<O, E> RotatingLoggerBuilder<O, E> {
    /// Set the minimum level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Encode record times in UTC.
    pub fn with_utc(mut self, utc: bool) -> Self {
        self.utc = utc;
        self
    }

    /// Select the record key names.
    pub fn with_key_scheme(mut self, scheme: KeyScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Enable or disable the stdout/stderr copies. When disabled only the
    /// rotating file receives records.
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    /// Replace the writer for records below error.
    pub fn with_stdout<W>(self, stdout: W) -> RotatingLoggerBuilder<W, E> {
        RotatingLoggerBuilder {
            policy: self.policy,
            level: self.level,
            utc: self.utc,
            scheme: self.scheme,
            console: self.console,
            stdout,
            stderr: self.stderr,
        }
    }

    /// Replace the writer for error records.
    pub fn with_stderr<W>(self, stderr: W) -> RotatingLoggerBuilder<O, W> {
        RotatingLoggerBuilder {
            policy: self.policy,
            level: self.level,
            utc: self.utc,
            scheme: self.scheme,
            console: self.console,
            stdout: self.stdout,
            stderr,
        }
    }

    /// The rotation policy of the file sink.
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }
}

impl<O, E> RotatingLoggerBuilder<O, E>
where
    O: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    E: for<'w> MakeWriter<'w> + Clone + Send + Sync + 'static,
{
    /// Open the log file and build the logger.
    ///
    /// Failed writes to the log file are reported on the stderr writer, also
    /// when console output is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Build`] if the log file or its directory cannot be
    /// created.
    pub fn build(self) -> Result<Logger> {
        let path = self.policy.path.clone();
        let writer = RotatingWriter::new(self.policy).map_err(|e| Error::build(path.clone(), e))?;
        let (file, guard) =
            tracing_appender::non_blocking(ReportingWriter::new(writer, self.stderr.clone()));

        let encoder = JsonEncoder::new(EncoderConfig::with_scheme(self.scheme, self.utc));

        let mut layers = Vec::with_capacity(3);
        if self.console {
            layers.push(json_layer(encoder.clone(), self.stderr, Some(Priority::High)));
            layers.push(json_layer(encoder.clone(), self.stdout, Some(Priority::Low)));
        }
        layers.push(json_layer(encoder, file, Some(Priority::InfoAndAbove)));

        let filter = env_filter(self.level, None)?;
        tracing::debug!(
            path = %path.display(),
            level = %self.level,
            console = self.console,
            "built rotating logger"
        );
        Ok(Logger::assemble(
            filter,
            self.level,
            None,
            layers,
            vec![guard],
        ))
    }
}
