//! The built logger: a `tracing` dispatcher plus the resources it owns.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::dispatcher::DefaultGuard;
use tracing::{Dispatch, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::JsonFields;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::{EnvFilter, Layer, Registry, reload};

use crate::config::env_filter;
use crate::encoder::EncoderConfig;
use crate::format::JsonEncoder;
use crate::routing::Priority;
use crate::{Error, Result};

/// Subscriber every sink layer is stacked on: the registry behind the
/// reloadable level filter.
pub(crate) type Base = Layered<reload::Layer<EnvFilter, Registry>, Registry>;

pub(crate) type BoxedLayer = Box<dyn Layer<Base> + Send + Sync + 'static>;

/// JSON sink, optionally restricted to one priority route.
pub(crate) fn json_layer<W>(encoder: JsonEncoder, writer: W, route: Option<Priority>) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer::<Base>()
        .fmt_fields(JsonFields::new())
        .event_format(encoder)
        .with_writer(writer);
    match route {
        Some(route) => layer.with_filter(route.filter()).boxed(),
        None => layer.boxed(),
    }
}

/// Human-readable sink using the encoder's time format.
pub(crate) fn console_layer<W>(encoder: &EncoderConfig, caller: bool, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer::<Base>()
        .with_timer(encoder.time_encoding)
        .with_file(caller)
        .with_line_number(caller)
        .with_writer(writer)
        .boxed()
}

struct LevelState {
    level: Level,
    directives: Option<String>,
}

/// Changes the level of a running logger.
#[derive(Clone)]
pub struct LevelHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    state: Arc<Mutex<LevelState>>,
}

impl LevelHandle {
    /// The current minimum level.
    pub fn level(&self) -> Level {
        match self.state.lock() {
            Ok(state) => state.level,
            Err(poisoned) => poisoned.into_inner().level,
        }
    }

    /// Replace the minimum level. Per-target directives given at build time
    /// stay in force.
    pub fn set_level(&self, level: Level) -> Result<()> {
        {
            let mut state = self
                .state
                .lock()
                .map_err(|_| Error::Reload("level state lock poisoned".to_string()))?;
            let filter = env_filter(level, state.directives.as_deref())?;
            self.handle
                .reload(filter)
                .map_err(|e| Error::Reload(e.to_string()))?;
            state.level = level;
        }

        tracing::debug!(%level, "log level changed");
        Ok(())
    }
}

impl fmt::Debug for LevelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LevelHandle")
            .field("level", &format_args!("{}", self.level()))
            .finish()
    }
}

/// A ready-to-use logger.
///
/// The logger is not installed anywhere: use [`Logger::in_scope`] or
/// [`Logger::set_default`] for scoped use, or [`Logger::try_init`] to make it
/// the process-wide default. Dropping the logger (or calling
/// [`Logger::shutdown`]) flushes records still queued for a rotating file.
pub struct Logger {
    dispatch: Dispatch,
    level: LevelHandle,
    guards: Vec<WorkerGuard>,
}

impl Logger {
    pub(crate) fn assemble(
        filter: EnvFilter,
        level: Level,
        directives: Option<String>,
        layers: Vec<BoxedLayer>,
        guards: Vec<WorkerGuard>,
    ) -> Self {
        let (filter, handle) = reload::Layer::new(filter);
        let subscriber = tracing_subscriber::registry().with(filter).with(layers);

        Self {
            dispatch: Dispatch::new(subscriber),
            level: LevelHandle {
                handle,
                state: Arc::new(Mutex::new(LevelState { level, directives })),
            },
            guards,
        }
    }

    /// The underlying dispatcher.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Handle for changing the level at runtime.
    pub fn level_handle(&self) -> &LevelHandle {
        &self.level
    }

    /// Run `f` with this logger as the current default.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Make this logger the default for the current thread until the guard
    /// is dropped.
    pub fn set_default(&self) -> DefaultGuard {
        tracing::dispatcher::set_default(&self.dispatch)
    }

    /// Install this logger as the process-wide default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Init`] if a global default is already set.
    pub fn try_init(self) -> Result<LoggerGuard> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
            .map_err(|e| Error::Init(e.to_string()))?;

        Ok(LoggerGuard {
            level: self.level,
            _guards: self.guards,
        })
    }

    /// Flush pending records and release the logger.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &format_args!("{}", self.level.level()))
            .field("workers", &self.guards.len())
            .finish()
    }
}

/// Keeps a globally installed logger's background writers alive. Drop it on
/// the shutdown path to flush them.
#[derive(Debug)]
pub struct LoggerGuard {
    level: LevelHandle,
    _guards: Vec<WorkerGuard>,
}

impl LoggerGuard {
    /// Handle for changing the level at runtime.
    pub fn level_handle(&self) -> &LevelHandle {
        &self.level
    }
}
