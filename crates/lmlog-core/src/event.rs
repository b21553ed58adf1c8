//! Typed log events and the interpreter that produces them.
//!
//! Classification is an explicit ordered table of (matcher, extractor)
//! rules; the first matching rule decides the event kind. The running date
//! context is threaded through a fold accumulator rather than held in
//! module state, so interpretation stays a pure function of its inputs.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::line::RawLine;
use crate::metadata::{self, ServerMetadata};

/// Event kinds, in classification priority order. A line matches at most
/// one kind; `Info` is the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Checkout,
    Return,
    Denied,
    Unsupported,
    Timestamp,
    Version,
    Reserving,
    Error,
    Info,
}

impl EventKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Checkout => "checkout",
            Self::Return => "return",
            Self::Denied => "denied",
            Self::Unsupported => "unsupported",
            Self::Timestamp => "timestamp",
            Self::Version => "version",
            Self::Reserving => "reserving",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for unknown event kind strings.
#[derive(Debug, Clone)]
pub struct UnknownEventKind(String);

impl fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event kind: {}", self.0)
    }
}

impl std::error::Error for UnknownEventKind {}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "checkout" | "out" => Ok(Self::Checkout),
            "return" | "in" => Ok(Self::Return),
            "denied" => Ok(Self::Denied),
            "unsupported" => Ok(Self::Unsupported),
            "timestamp" => Ok(Self::Timestamp),
            "version" => Ok(Self::Version),
            "reserving" => Ok(Self::Reserving),
            "error" => Ok(Self::Error),
            "info" => Ok(Self::Info),
            _ => Err(UnknownEventKind(s.to_string())),
        }
    }
}

/// One interpreted log line.
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    /// Date context in effect when the line was seen.
    pub date: NaiveDate,
    /// Time of day from the line itself.
    pub time: NaiveTime,
    pub daemon: String,
    pub kind: EventKind,
    pub feature: Option<String>,
    pub user: Option<String>,
    pub host: Option<String>,
    /// Denial reason captured from trailing parentheses.
    pub reason: Option<String>,
    /// The original line, kept for audit display.
    pub raw: String,
}

impl LogEvent {
    /// Full timestamp combining the running date context with the line time.
    #[must_use]
    pub fn timestamp(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

// ========== Classification Rules ==========

/// Fields an extractor may populate from the message body.
#[derive(Debug, Default)]
struct EventFields {
    feature: Option<String>,
    user: Option<String>,
    host: Option<String>,
    reason: Option<String>,
    date: Option<NaiveDate>,
}

struct Rule {
    kind: EventKind,
    matches: fn(&str) -> bool,
    extract: fn(&str, &mut EventFields),
}

/// The priority cascade. Order is load-bearing: earlier rules win.
static RULES: &[Rule] = &[
    Rule {
        kind: EventKind::Timestamp,
        matches: |m| m.contains("TIMESTAMP"),
        extract: extract_date,
    },
    Rule {
        kind: EventKind::Version,
        matches: |m| metadata::VERSION_RE.is_match(m),
        extract: extract_nothing,
    },
    Rule {
        kind: EventKind::Checkout,
        matches: |m| CHECKOUT_MARK_RE.is_match(m),
        extract: extract_checkout,
    },
    Rule {
        kind: EventKind::Return,
        matches: |m| RETURN_MARK_RE.is_match(m),
        extract: extract_return,
    },
    Rule {
        kind: EventKind::Denied,
        matches: |m| DENIED_MARK_RE.is_match(m),
        extract: extract_denied,
    },
    Rule {
        kind: EventKind::Unsupported,
        matches: |m| UNSUPPORTED_MARK_RE.is_match(m),
        extract: extract_unsupported,
    },
    Rule {
        kind: EventKind::Reserving,
        matches: |m| RESERVING_MARK_RE.is_match(m),
        extract: extract_nothing,
    },
    Rule {
        kind: EventKind::Error,
        matches: |m| ERROR_RE.is_match(m) || m.contains("EXITING"),
        extract: extract_nothing,
    },
    Rule {
        kind: EventKind::Info,
        matches: |_| true,
        extract: extract_nothing,
    },
];

static CHECKOUT_MARK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bOUT:").unwrap());
static RETURN_MARK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bIN:").unwrap());
static DENIED_MARK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bDENIED:").unwrap());
static UNSUPPORTED_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bUNSUPPORTED:").unwrap());
static RESERVING_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bRESERVING\b").unwrap());
static ERROR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)error").unwrap());

/// `M/D/YYYY` date inside a `TIMESTAMP` line.
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})/(\d{1,2})/(\d{4})").unwrap());

/// Marker, optionally double-quoted feature token, optional `user@host`.
static CHECKOUT_RE: LazyLock<Regex> =
    LazyLock::new(|| usage_pattern("OUT"));
static RETURN_RE: LazyLock<Regex> = LazyLock::new(|| usage_pattern("IN"));
static DENIED_RE: LazyLock<Regex> = LazyLock::new(|| usage_pattern("DENIED"));
static UNSUPPORTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bUNSUPPORTED:\s+"?([^"\s]+)"?"#).unwrap());

/// Free-text denial reason inside trailing parentheses.
static REASON_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((.+)\)\s*$").unwrap());

fn usage_pattern(marker: &str) -> Regex {
    Regex::new(&format!(
        r#"\b{marker}:\s+"?([^"\s]+)"?(?:\s+(\S+)@(\S+))?"#
    ))
    .unwrap()
}

fn extract_nothing(_message: &str, _fields: &mut EventFields) {}

fn extract_date(message: &str, fields: &mut EventFields) {
    if let Some(caps) = DATE_RE.captures(message) {
        let month: u32 = caps[1].parse().unwrap_or(0);
        let day: u32 = caps[2].parse().unwrap_or(0);
        let year: i32 = caps[3].parse().unwrap_or(0);
        fields.date = NaiveDate::from_ymd_opt(year, month, day);
    }
}

fn extract_usage(re: &Regex, message: &str, fields: &mut EventFields) {
    if let Some(caps) = re.captures(message) {
        fields.feature = Some(caps[1].to_string());
        if let (Some(user), Some(host)) = (caps.get(2), caps.get(3)) {
            fields.user = Some(user.as_str().to_string());
            fields.host = Some(host.as_str().to_string());
        }
    }
}

fn extract_checkout(message: &str, fields: &mut EventFields) {
    extract_usage(&CHECKOUT_RE, message, fields);
}

fn extract_return(message: &str, fields: &mut EventFields) {
    extract_usage(&RETURN_RE, message, fields);
}

fn extract_denied(message: &str, fields: &mut EventFields) {
    extract_usage(&DENIED_RE, message, fields);
    if let Some(caps) = REASON_RE.captures(message) {
        fields.reason = Some(caps[1].trim().to_string());
    }
}

fn extract_unsupported(message: &str, fields: &mut EventFields) {
    if let Some(caps) = UNSUPPORTED_RE.captures(message) {
        fields.feature = Some(caps[1].to_string());
    }
}

// ========== Interpreter ==========

/// Date context threaded through the interpretation fold.
#[derive(Debug, Clone, Copy)]
struct InterpreterState {
    current_date: NaiveDate,
}

/// Interprets classified lines into typed events, in order, and collects
/// server metadata along the way.
///
/// `default_date` is the date attached to events seen before the first
/// `TIMESTAMP` line — an explicit fallback, not a failure.
#[must_use]
pub fn interpret(lines: &[RawLine], default_date: NaiveDate) -> (Vec<LogEvent>, ServerMetadata) {
    let mut metadata = ServerMetadata::default();
    let initial = (
        Vec::with_capacity(lines.len()),
        InterpreterState {
            current_date: default_date,
        },
    );

    let (events, _state) = lines.iter().fold(initial, |(mut events, mut state), line| {
        metadata.observe(&line.message);

        let rule = RULES
            .iter()
            .find(|rule| (rule.matches)(&line.message))
            .unwrap_or(&RULES[RULES.len() - 1]);

        let mut fields = EventFields::default();
        (rule.extract)(&line.message, &mut fields);

        if let Some(date) = fields.date {
            state.current_date = date;
        }

        events.push(LogEvent {
            date: state.current_date,
            time: line.time,
            daemon: line.daemon.clone(),
            kind: rule.kind,
            feature: fields.feature,
            user: fields.user,
            host: fields.host,
            reason: fields.reason,
            raw: line.raw.clone(),
        });
        (events, state)
    });

    (events, metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::classify_lines;

    fn default_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn interpret_text(text: &str) -> Vec<LogEvent> {
        interpret(&classify_lines(text), default_date()).0
    }

    #[test]
    fn classifies_checkout_with_quoted_feature() {
        let events = interpret_text(r#"10:31:02 (SW_D) OUT: "solidworks" alice@WS1"#);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Checkout);
        assert_eq!(events[0].feature.as_deref(), Some("solidworks"));
        assert_eq!(events[0].user.as_deref(), Some("alice"));
        assert_eq!(events[0].host.as_deref(), Some("WS1"));
    }

    #[test]
    fn classifies_return_with_unquoted_feature() {
        let events = interpret_text("11:00:00 (SW_D) IN: cae_cwpro bob@WS2");
        assert_eq!(events[0].kind, EventKind::Return);
        assert_eq!(events[0].feature.as_deref(), Some("cae_cwpro"));
        assert_eq!(events[0].user.as_deref(), Some("bob"));
    }

    #[test]
    fn denied_captures_trailing_reason() {
        let events = interpret_text(
            r#"12:00:00 (SW_D) DENIED: "cae_cwpro" carol@WS3  (Licensed number of users already reached. (-4,342))"#,
        );
        assert_eq!(events[0].kind, EventKind::Denied);
        assert_eq!(events[0].feature.as_deref(), Some("cae_cwpro"));
        assert_eq!(events[0].user.as_deref(), Some("carol"));
        assert_eq!(
            events[0].reason.as_deref(),
            Some("Licensed number of users already reached. (-4,342)")
        );
    }

    #[test]
    fn timestamp_updates_running_date_for_later_events() {
        let events = interpret_text(
            "0:00:10 (lmgrd) TIMESTAMP 6/1/2024\n10:00:00 (SW_D) OUT: \"f\" a@h",
        );
        assert_eq!(events[0].kind, EventKind::Timestamp);
        assert_eq!(events[0].date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(events[1].date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }

    #[test]
    fn date_defaults_until_first_timestamp() {
        let events = interpret_text(
            "9:00:00 (SW_D) OUT: \"f\" a@h\n9:30:00 (lmgrd) TIMESTAMP 7/2/2024\n10:00:00 (SW_D) IN: \"f\" a@h",
        );
        assert_eq!(events[0].date, default_date());
        assert_eq!(events[2].date, NaiveDate::from_ymd_opt(2024, 7, 2).unwrap());
    }

    #[test]
    fn invalid_timestamp_date_keeps_previous_context() {
        let events = interpret_text(
            "9:00:00 (lmgrd) TIMESTAMP 13/40/2024\n10:00:00 (SW_D) OUT: \"f\" a@h",
        );
        assert_eq!(events[0].kind, EventKind::Timestamp);
        assert_eq!(events[1].date, default_date());
    }

    #[test]
    fn version_banner_classifies_and_sets_metadata() {
        let (events, metadata) = interpret(
            &classify_lines("9:00:00 (lmgrd) license manager (v11.16.2) started"),
            default_date(),
        );
        assert_eq!(events[0].kind, EventKind::Version);
        assert_eq!(metadata.version, "11.16.2");
    }

    #[test]
    fn metadata_extraction_is_not_exclusive_with_classification() {
        // An error line that also carries the server port.
        let (events, metadata) = interpret(
            &classify_lines("9:00:00 (lmgrd) error binding lmgrd tcp-port 27000"),
            default_date(),
        );
        assert_eq!(events[0].kind, EventKind::Error);
        assert_eq!(metadata.port, "27000");
    }

    #[test]
    fn partial_checkout_keeps_kind_without_fields() {
        let events = interpret_text("10:00:00 (SW_D) OUT:");
        assert_eq!(events[0].kind, EventKind::Checkout);
        assert!(events[0].feature.is_none());
        assert!(events[0].user.is_none());
        assert!(events[0].host.is_none());
    }

    #[test]
    fn priority_prefers_checkout_over_error() {
        // "error" appears in the message, but the OUT: marker wins.
        let events = interpret_text(r#"10:00:00 (SW_D) OUT: "f" a@h error recovery"#);
        assert_eq!(events[0].kind, EventKind::Checkout);
    }

    #[test]
    fn timeout_message_is_not_a_checkout() {
        // No word boundary before OUT inside TIMEOUT.
        let events = interpret_text("10:00:00 (SW_D) INACTIVITY TIMEOUT exceeded");
        assert_eq!(events[0].kind, EventKind::Info);
    }

    #[test]
    fn exiting_marker_classifies_as_error() {
        let events = interpret_text("10:00:00 (lmgrd) EXITING DUE TO SIGNAL 15");
        assert_eq!(events[0].kind, EventKind::Error);
    }

    #[test]
    fn reserving_line_classifies_without_extraction() {
        let events = interpret_text("10:00:00 (SW_D) RESERVING solidworks for GROUP eng");
        assert_eq!(events[0].kind, EventKind::Reserving);
        assert!(events[0].feature.is_none());
    }

    #[test]
    fn unsupported_extracts_feature_only() {
        let events =
            interpret_text(r#"10:00:00 (SW_D) UNSUPPORTED: "flow_sim" (PORT_AT_HOST_PLUS)"#);
        assert_eq!(events[0].kind, EventKind::Unsupported);
        assert_eq!(events[0].feature.as_deref(), Some("flow_sim"));
        assert!(events[0].user.is_none());
    }

    #[test]
    fn plain_message_defaults_to_info() {
        let events = interpret_text("10:00:00 (lmgrd) Starting vendor daemons ...");
        assert_eq!(events[0].kind, EventKind::Info);
    }

    #[test]
    fn kind_string_roundtrip() {
        for kind in [
            EventKind::Checkout,
            EventKind::Return,
            EventKind::Denied,
            EventKind::Unsupported,
            EventKind::Timestamp,
            EventKind::Version,
            EventKind::Reserving,
            EventKind::Error,
            EventKind::Info,
        ] {
            let parsed: EventKind = kind.as_str().parse().expect("should parse");
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn kind_accepts_marker_aliases() {
        assert_eq!("OUT".parse::<EventKind>().unwrap(), EventKind::Checkout);
        assert_eq!("in".parse::<EventKind>().unwrap(), EventKind::Return);
        assert!("bogus".parse::<EventKind>().is_err());
    }
}
