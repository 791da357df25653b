use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::encoder::EncoderConfig;
use crate::format::JsonEncoder;
use crate::logger::{Logger, console_layer, json_layer};
use crate::output::Outputs;
use crate::{Error, Result};

/// Record encoding of a configured logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// One JSON object per line, keyed by the [`EncoderConfig`].
    #[default]
    Json,
    /// Human-readable lines from `tracing-subscriber`'s default formatter,
    /// using the configured time encoding.
    Console,
}

/// Configuration for a logger writing to fixed output paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Minimum level (e.g., "info", "debug")
    #[serde(with = "level_serde", default = "default_level")]
    pub level: Level,
    /// Development mode: stacktraces from `WARN` instead of `ERROR`
    #[serde(default)]
    pub development: bool,
    #[serde(default)]
    pub encoding: Encoding,
    #[serde(default)]
    pub encoder: EncoderConfig,
    /// Where records go: "stderr", "stdout" or file paths
    #[serde(default = "default_output_paths")]
    pub output_paths: Vec<String>,
    /// Where write failures are reported
    #[serde(default = "default_output_paths")]
    pub error_output_paths: Vec<String>,
    #[serde(default)]
    pub disable_caller: bool,
    #[serde(default)]
    pub disable_stacktrace: bool,
    /// Extra per-target filter directives, e.g. "hyper=warn,my_app::db=trace"
    #[serde(default)]
    pub directives: Option<String>,
    /// Fields added to every record
    #[serde(default)]
    pub initial_fields: Map<String, Value>,
}

impl LoggerConfig {
    /// Configuration writing to `output_files`, or to stderr when none are given.
    ///
    /// Error output always goes to stderr.
    pub fn new<I, S>(output_files: I, level: Level, development: bool, utc: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let files: Vec<String> = output_files.into_iter().map(Into::into).collect();
        Self {
            level,
            development,
            encoding: Encoding::Json,
            encoder: EncoderConfig::new(utc),
            output_paths: if files.is_empty() {
                default_output_paths()
            } else {
                files
            },
            error_output_paths: default_output_paths(),
            disable_caller: false,
            disable_stacktrace: false,
            directives: None,
            initial_fields: Map::new(),
        }
    }

    /// Set log level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set development mode
    pub fn with_development(mut self, development: bool) -> Self {
        self.development = development;
        self
    }

    /// Set record encoding
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Replace the encoder configuration
    pub fn with_encoder(mut self, encoder: EncoderConfig) -> Self {
        self.encoder = encoder;
        self
    }

    /// Replace the error output paths
    pub fn with_error_output_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.error_output_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Set per-target filter directives
    pub fn with_directives(mut self, directives: impl Into<String>) -> Self {
        self.directives = Some(directives.into());
        self
    }

    /// Add a field to every record
    pub fn with_initial_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.initial_fields.insert(key.into(), value.into());
        self
    }

    /// Level from which records carry a stacktrace.
    pub fn stacktrace_level(&self) -> Option<Level> {
        match (self.disable_stacktrace, self.development) {
            (true, _) => None,
            (false, true) => Some(Level::WARN),
            (false, false) => Some(Level::ERROR),
        }
    }

    /// The JSON formatter this configuration describes.
    pub fn json_encoder(&self) -> JsonEncoder {
        JsonEncoder::new(self.encoder.clone())
            .with_caller(!self.disable_caller)
            .with_stacktrace_level(self.stacktrace_level())
            .with_initial_fields(self.initial_fields.clone())
    }

    /// Open the outputs and build the logger.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - An output or error output path cannot be opened ([`Error::Build`])
    /// - The filter directives are invalid ([`Error::Config`])
    pub fn build(&self) -> Result<Logger> {
        let filter = env_filter(self.level, self.directives.as_deref())?;
        let outputs = Outputs::open(&self.output_paths, &self.error_output_paths)?;
        let names = outputs.names();

        let layer = match self.encoding {
            Encoding::Json => json_layer(self.json_encoder(), outputs, None),
            Encoding::Console => console_layer(&self.encoder, !self.disable_caller, outputs),
        };

        tracing::debug!(outputs = ?names, level = %self.level, "built logger");
        Ok(Logger::assemble(
            filter,
            self.level,
            self.directives.clone(),
            vec![layer],
            Vec::new(),
        ))
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::new(Vec::<String>::new(), default_level(), false, false)
    }
}

fn default_level() -> Level {
    Level::INFO
}

fn default_output_paths() -> Vec<String> {
    vec!["stderr".to_string()]
}

/// Parse a level name. Besides the `tracing` names this accepts `warning`
/// and maps `dpanic`, `panic` and `fatal` to `ERROR`.
pub fn parse_level(s: &str) -> Result<Level> {
    match s.trim().to_ascii_lowercase().as_str() {
        "warning" => Ok(Level::WARN),
        "dpanic" | "panic" | "fatal" => Ok(Level::ERROR),
        other => other
            .parse::<Level>()
            .map_err(|e| Error::Config(format!("invalid level {s:?}: {e}"))),
    }
}

/// Filter passing `level` and above, refined by optional per-target directives.
///
/// The level stays in force next to target directives; `EnvFilter` only falls
/// back to its default directive when no directive was given at all.
pub(crate) fn env_filter(level: Level, directives: Option<&str>) -> Result<EnvFilter> {
    let default = LevelFilter::from_level(level);
    let filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .parse(directives.unwrap_or_default())
        .map_err(|e| Error::Config(e.to_string()))?;
    Ok(filter.add_directive(default.into()))
}

mod level_serde {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&level.as_str().to_ascii_lowercase())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        super::parse_level(&name).map_err(de::Error::custom)
    }
}
