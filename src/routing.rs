//! Severity based routing of records to sinks.
//!
//! `tracing` orders levels by verbosity (`ERROR` is the smallest), so "at
//! least as severe as" reads as `<=`. The helpers here keep that inversion in
//! one place.

use serde::{Deserialize, Serialize};
use tracing::{Level, Metadata};
use tracing_subscriber::filter::{FilterFn, filter_fn};

/// True when `level` is as severe as `threshold` or more.
pub fn is_at_least(level: &Level, threshold: &Level) -> bool {
    level <= threshold
}

/// Which records a sink accepts. Sinks are independent: one record can match
/// several routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// `ERROR` and above.
    High,
    /// Everything below `ERROR`.
    Low,
    /// `INFO` and above.
    InfoAndAbove,
}

impl Priority {
    pub fn enabled(self, level: &Level) -> bool {
        match self {
            Self::High => is_at_least(level, &Level::ERROR),
            Self::Low => !is_at_least(level, &Level::ERROR),
            Self::InfoAndAbove => is_at_least(level, &Level::INFO),
        }
    }

    /// Per-layer filter accepting this route's records.
    pub fn filter(self) -> FilterFn<impl Fn(&Metadata<'_>) -> bool + Clone> {
        filter_fn(move |meta: &Metadata<'_>| self.enabled(meta.level()))
    }
}
