//! Core domain logic for license-server log analytics.
//!
//! This crate turns a license daemon's debug log into a structured model:
//! - Line classification and event interpretation
//! - Session reconciliation (pairing checkouts with returns)
//! - Usage analytics: rollups, time series, concurrency sweeps
//! - Capacity classification and expansion ROI
//! - A codec for the license options configuration grammar
//!
//! Everything is single-threaded and synchronous: parsing and aggregation
//! are pure functions over text handed in by the caller, safe to repeat or
//! run on several logs in parallel from outside.

use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;

pub mod analytics;
pub mod capacity;
pub mod event;
pub mod line;
pub mod metadata;
pub mod options;
pub mod session;

pub use analytics::{Analytics, CousagePair, FeatureStats, HostStats, UserStats, concurrency_samples};
pub use capacity::{FeatureCapacity, RoiEstimate, SeatInputs, SeatVerdict, evaluate};
pub use event::{EventKind, LogEvent};
pub use line::{RawLine, classify_lines};
pub use metadata::{ServerMetadata, UNKNOWN};
pub use options::{
    FeatureTimeout, GlobalTimeout, Group, OptionsError, OptionsModel, Rule, RuleKind, TargetKind,
};
pub use session::{Session, reconcile};

/// Everything derived from one uploaded log. Events and sessions are
/// immutable once parsed; analytics are recomputed from them on demand.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedLog {
    pub events: Vec<LogEvent>,
    pub sessions: Vec<Session>,
    pub metadata: ServerMetadata,
}

impl ParsedLog {
    /// The denial events, for callers aggregating or filtering them.
    #[must_use]
    pub fn denials(&self) -> impl Iterator<Item = &LogEvent> {
        self.events
            .iter()
            .filter(|event| event.kind == EventKind::Denied)
    }
}

/// Log parser entry point.
///
/// Events seen before the first `TIMESTAMP` line are dated January 1 of
/// the default year; [`LogParser::new`] uses the current calendar year,
/// [`LogParser::with_default_year`] pins it for reproducible parses.
#[derive(Debug, Clone, Copy)]
pub struct LogParser {
    default_year: i32,
}

impl LogParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_year: Utc::now().year(),
        }
    }

    #[must_use]
    pub const fn with_default_year(default_year: i32) -> Self {
        Self { default_year }
    }

    /// Parses raw log text. Infallible: input with no recognizable lines
    /// yields empty collections rather than an error.
    #[must_use]
    pub fn parse(&self, text: &str) -> ParsedLog {
        let default_date =
            NaiveDate::from_ymd_opt(self.default_year, 1, 1).unwrap_or_default();
        let lines = line::classify_lines(text);
        let (events, metadata) = event::interpret(&lines, default_date);
        let sessions = session::reconcile(&events);
        tracing::debug!(
            lines = lines.len(),
            events = events.len(),
            sessions = sessions.len(),
            "parsed log"
        );
        ParsedLog {
            events,
            sessions,
            metadata,
        }
    }
}

impl Default for LogParser {
    fn default() -> Self {
        Self::new()
    }
}
