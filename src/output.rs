//! Output destinations of a configured logger.
//!
//! Paths are strings as they appear in configuration: `stderr` and `stdout`
//! name the process streams, anything else is a file opened for appending.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::fmt::MakeWriter;

use crate::encoder::TimeEncoding;
use crate::{Error, Result};

/// A parsed output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputPath {
    Stderr,
    Stdout,
    File(PathBuf),
}

impl From<&str> for OutputPath {
    fn from(s: &str) -> Self {
        match s {
            "stderr" => Self::Stderr,
            "stdout" => Self::Stdout,
            path => Self::File(PathBuf::from(path)),
        }
    }
}

impl fmt::Display for OutputPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stderr => f.write_str("stderr"),
            Self::Stdout => f.write_str("stdout"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// An opened destination.
#[derive(Debug, Clone)]
enum Sink {
    Stderr,
    Stdout,
    File { path: PathBuf, file: Arc<File> },
}

impl Sink {
    fn open(path: &OutputPath) -> Result<Self> {
        match path {
            OutputPath::Stderr => Ok(Self::Stderr),
            OutputPath::Stdout => Ok(Self::Stdout),
            OutputPath::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| Error::build(path, e))?;
                Ok(Self::File {
                    path: path.clone(),
                    file: Arc::new(file),
                })
            }
        }
    }

    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::Stderr => io::stderr().lock().write_all(buf),
            Self::Stdout => io::stdout().lock().write_all(buf),
            Self::File { file, .. } => (&**file).write_all(buf),
        }
    }

    fn flush(&self) -> io::Result<()> {
        match self {
            Self::Stderr => io::stderr().lock().flush(),
            Self::Stdout => io::stdout().lock().flush(),
            Self::File { file, .. } => (&**file).flush(),
        }
    }

    fn name(&self) -> String {
        match self {
            Self::Stderr => "stderr".to_string(),
            Self::Stdout => "stdout".to_string(),
            Self::File { path, .. } => path.display().to_string(),
        }
    }
}

/// Fan-out writer over every configured output.
///
/// A failed write is reported on the error outputs and does not stop the
/// record from reaching the remaining outputs.
#[derive(Debug, Clone)]
pub struct Outputs {
    sinks: Arc<[Sink]>,
    errors: Arc<[Sink]>,
}

impl Outputs {
    /// Open all output and error-output paths. Fails on the first path that
    /// cannot be opened.
    pub fn open<S: AsRef<str>>(paths: &[S], error_paths: &[S]) -> Result<Self> {
        let open_all = |paths: &[S]| -> Result<Arc<[Sink]>> {
            paths
                .iter()
                .map(|p| Sink::open(&OutputPath::from(p.as_ref())))
                .collect()
        };
        Ok(Self {
            sinks: open_all(paths)?,
            errors: open_all(error_paths)?,
        })
    }

    /// Names of the opened outputs, in configuration order.
    pub fn names(&self) -> Vec<String> {
        self.sinks.iter().map(Sink::name).collect()
    }

    /// Names of the opened error outputs.
    pub fn error_names(&self) -> Vec<String> {
        self.errors.iter().map(Sink::name).collect()
    }

    fn report(&self, sink: &Sink, err: &io::Error) {
        let line = error_line(&sink.name(), err);
        for target in self.errors.iter() {
            // Nowhere left to report a failing error output.
            let _ = target.write_all(line.as_bytes());
        }
    }
}

/// `<utc time> write error on <sink>: <error>` line for an error output.
pub(crate) fn error_line(sink: &str, err: &io::Error) -> String {
    let stamp = TimeEncoding::Utc.encode_now().unwrap_or_default();
    format!("{stamp} write error on {sink}: {err}\n")
}

/// Per-record handle returned by [`Outputs`].
#[derive(Debug)]
pub struct OutputsWriter<'a> {
    outputs: &'a Outputs,
}

impl Write for OutputsWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for sink in self.outputs.sinks.iter() {
            if let Err(e) = sink.write_all(buf) {
                self.outputs.report(sink, &e);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for sink in self.outputs.sinks.iter() {
            if let Err(e) = sink.flush() {
                self.outputs.report(sink, &e);
            }
        }
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Outputs {
    type Writer = OutputsWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        OutputsWriter { outputs: self }
    }
}
