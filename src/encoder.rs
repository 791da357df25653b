//! Encoder configuration: which JSON keys a record uses and how time, level and
//! caller values are rendered.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::Level;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

/// Preset key names for the fields every record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyScheme {
    /// `time`, `level`, `logger`, `module`, `msg`, `stack`.
    #[default]
    Classic,
    /// `ts`, `level`, `logger`, `caller`, `msg`, `stacktrace`.
    Conventional,
}

/// How record timestamps are rendered.
///
/// Both variants produce ISO-8601 with millisecond precision, e.g.
/// `2026-10-18T09:15:02.417Z` or `2026-10-18T11:15:02.417+0200`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeEncoding {
    /// Local wall clock with its offset. Falls back to UTC when the local
    /// offset cannot be determined.
    #[default]
    Local,
    /// UTC, always suffixed with `Z`.
    Utc,
}

impl TimeEncoding {
    /// Current instant in this encoding's time zone.
    pub fn now(&self) -> OffsetDateTime {
        match self {
            Self::Utc => OffsetDateTime::now_utc(),
            Self::Local => {
                OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
            }
        }
    }

    /// Render `at`, normalizing to UTC first for [`TimeEncoding::Utc`].
    pub fn encode(&self, at: OffsetDateTime) -> Result<String, time::error::Format> {
        let at = match self {
            Self::Utc => at.to_offset(UtcOffset::UTC),
            Self::Local => at,
        };
        iso8601_millis(at)
    }

    /// Render the current instant.
    pub fn encode_now(&self) -> Result<String, time::error::Format> {
        self.encode(self.now())
    }
}

impl FormatTime for TimeEncoding {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let stamp = self.encode_now().map_err(|_| fmt::Error)?;
        w.write_str(&stamp)
    }
}

fn iso8601_millis(at: OffsetDateTime) -> Result<String, time::error::Format> {
    let mut stamp = at.format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]"
    ))?;

    let offset = at.offset();
    if offset.is_utc() {
        stamp.push('Z');
    } else {
        let (hours, minutes, _) = offset.as_hms();
        let sign = if offset.is_negative() { '-' } else { '+' };
        stamp.push_str(&format!(
            "{sign}{:02}{:02}",
            hours.unsigned_abs(),
            minutes.unsigned_abs()
        ));
    }
    Ok(stamp)
}

/// How the level value is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelEncoding {
    /// `INFO`, `ERROR`, ...
    #[default]
    Capital,
    /// `info`, `error`, ...
    Lowercase,
}

impl LevelEncoding {
    pub fn encode(&self, level: &Level) -> Cow<'static, str> {
        match self {
            Self::Capital => Cow::Borrowed(level.as_str()),
            Self::Lowercase => Cow::Owned(level.as_str().to_ascii_lowercase()),
        }
    }
}

/// How the call site is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerEncoding {
    /// Last directory and file name: `src/writer.rs:42`.
    #[default]
    Short,
    /// The file path as recorded by the compiler.
    Full,
}

impl CallerEncoding {
    pub fn encode(&self, file: &str, line: Option<u32>) -> String {
        let file = match self {
            Self::Short => trim_path(file),
            Self::Full => file,
        };
        match line {
            Some(line) => format!("{file}:{line}"),
            None => file.to_string(),
        }
    }
}

fn trim_path(file: &str) -> &str {
    let mut separators = file.rmatch_indices(|c: char| c == '/' || c == '\\');
    match (separators.next(), separators.next()) {
        (Some(_), Some((idx, _))) => &file[idx + 1..],
        _ => file,
    }
}

/// Mapping from record fields to output keys plus the rendering strategies.
///
/// A key set to the empty string drops that field from the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub time_key: String,
    pub level_key: String,
    pub name_key: String,
    pub caller_key: String,
    pub message_key: String,
    pub stacktrace_key: String,
    pub line_ending: String,
    pub time_encoding: TimeEncoding,
    pub level_encoding: LevelEncoding,
    pub caller_encoding: CallerEncoding,
}

impl EncoderConfig {
    /// The default key mapping, with UTC timestamps when `utc` is set.
    pub fn new(utc: bool) -> Self {
        Self::with_scheme(KeyScheme::default(), utc)
    }

    /// Build from a preset key scheme.
    pub fn with_scheme(scheme: KeyScheme, utc: bool) -> Self {
        let (time_key, caller_key, stacktrace_key) = match scheme {
            KeyScheme::Classic => ("time", "module", "stack"),
            KeyScheme::Conventional => ("ts", "caller", "stacktrace"),
        };
        Self {
            time_key: time_key.to_string(),
            level_key: "level".to_string(),
            name_key: "logger".to_string(),
            caller_key: caller_key.to_string(),
            message_key: "msg".to_string(),
            stacktrace_key: stacktrace_key.to_string(),
            line_ending: "\n".to_string(),
            time_encoding: if utc {
                TimeEncoding::Utc
            } else {
                TimeEncoding::Local
            },
            level_encoding: LevelEncoding::Capital,
            caller_encoding: CallerEncoding::Short,
        }
    }

    /// Override the time encoding.
    pub fn with_time_encoding(mut self, time_encoding: TimeEncoding) -> Self {
        self.time_encoding = time_encoding;
        self
    }

    /// Override the level encoding.
    pub fn with_level_encoding(mut self, level_encoding: LevelEncoding) -> Self {
        self.level_encoding = level_encoding;
        self
    }

    /// Override the caller encoding.
    pub fn with_caller_encoding(mut self, caller_encoding: CallerEncoding) -> Self {
        self.caller_encoding = caller_encoding;
        self
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self::new(false)
    }
}
