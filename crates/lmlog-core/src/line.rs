//! Base line grammar for license-server debug logs.

use std::sync::LazyLock;

use chrono::NaiveTime;
use regex::Regex;
use serde::Serialize;

/// One anchored pattern: optional leading whitespace, `H:MM:SS` or
/// `HH:MM:SS`, a parenthesized daemon name, then the message remainder.
static LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,2}):(\d{2}):(\d{2})\s+\(([\w .\-]+)\)\s*(.*)$").unwrap()
});

/// A log line that matched the base grammar, prior to interpretation.
#[derive(Debug, Clone, Serialize)]
pub struct RawLine {
    /// Wall-clock time of day. The date context lives in separate
    /// `TIMESTAMP` marker lines and is attached during interpretation.
    pub time: NaiveTime,
    /// Daemon name from the parenthesized field (e.g. `lmgrd`, `SW_D`).
    pub daemon: String,
    /// Message body after the daemon field.
    pub message: String,
    /// The original line, kept for audit display.
    pub raw: String,
}

/// Splits raw log text into classified lines, in input order.
///
/// Lines that do not match the base grammar are skipped, not errors:
/// license-server logs interleave banner and continuation text that carries
/// no timestamp. Handles both `\n` and `\r\n` line endings.
#[must_use]
pub fn classify_lines(text: &str) -> Vec<RawLine> {
    text.lines()
        .filter_map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            match parse_line(line) {
                Some(raw) => Some(raw),
                None => {
                    if !line.trim().is_empty() {
                        tracing::trace!(line, "skipping line outside base grammar");
                    }
                    None
                }
            }
        })
        .collect()
}

fn parse_line(line: &str) -> Option<RawLine> {
    let caps = LINE_RE.captures(line)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    let second: u32 = caps[3].parse().ok()?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;

    Some(RawLine {
        time,
        daemon: caps[4].to_string(),
        message: caps[5].to_string(),
        raw: line.to_string(),
    })
}
