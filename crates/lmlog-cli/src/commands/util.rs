//! Shared helpers for CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use lmlog_core::{LogEvent, LogParser, ParsedLog, Session};

/// Reads and parses a log file.
pub fn load_log(path: &Path) -> Result<ParsedLog> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(LogParser::new().parse(&text))
}

/// User/feature filter applied to the session and event inputs before
/// analytics are recomputed.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub user: Option<String>,
    pub feature: Option<String>,
}

impl Filter {
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.user.is_some() || self.feature.is_some()
    }

    #[must_use]
    pub fn keep_session(&self, session: &Session) -> bool {
        self.user.as_deref().is_none_or(|user| session.user == user)
            && self
                .feature
                .as_deref()
                .is_none_or(|feature| session.feature == feature)
    }

    #[must_use]
    pub fn keep_event(&self, event: &LogEvent) -> bool {
        self.user
            .as_deref()
            .is_none_or(|user| event.user.as_deref() == Some(user))
            && self
                .feature
                .as_deref()
                .is_none_or(|feature| event.feature.as_deref() == Some(feature))
    }

    /// The filtered (sessions, events) pair analytics are computed from.
    #[must_use]
    pub fn apply(&self, parsed: &ParsedLog) -> (Vec<Session>, Vec<LogEvent>) {
        let sessions = parsed
            .sessions
            .iter()
            .filter(|session| self.keep_session(session))
            .cloned()
            .collect();
        let events = parsed
            .events
            .iter()
            .filter(|event| self.keep_event(event))
            .cloned()
            .collect();
        (sessions, events)
    }
}

/// Formats minutes as a duration string: "Xh Ym" if >= 1 hour, else "Xm".
/// Negative durations render as "0m".
#[must_use]
pub fn format_minutes(minutes: f64) -> String {
    if minutes <= 0.0 {
        return "0m".to_string();
    }
    #[expect(
        clippy::cast_possible_truncation,
        reason = "durations are far below i64::MAX minutes"
    )]
    let total = minutes.round() as i64;
    let hours = total / 60;
    let mins = total % 60;

    if hours >= 1 {
        format!("{hours}h {mins}m")
    } else {
        format!("{mins}m")
    }
}

/// Generates a 10-character progress bar.
/// Values under 5% of max get a single block for visibility.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "bar resolution is 10 cells, precision is irrelevant"
)]
#[must_use]
pub fn progress_bar(value: f64, max: f64) -> String {
    if max <= 0.0 || value < 0.0 {
        return "░░░░░░░░░░".to_string();
    }

    let ratio = value / max;
    let filled = if ratio < 0.05 && value > 0.0 {
        1
    } else {
        (ratio * 10.0).round().min(10.0) as usize
    };

    let empty = 10 - filled;
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}
