//! Events command: audit view of every interpreted line.
//!
//! Unlike the session and report views, this includes partially-matched
//! events (a marker with no resolvable user@host), which is what makes it
//! useful for debugging a log dialect.

use std::fmt::Write;
use std::path::Path;

use anyhow::{Result, bail};
use lmlog_core::{EventKind, LogEvent};

use super::util;

/// Runs the events command.
pub fn run(log: &Path, kind: Option<&str>, json: bool) -> Result<()> {
    let kind = match kind {
        Some(kind) => match kind.parse::<EventKind>() {
            Ok(kind) => Some(kind),
            Err(err) => bail!("{err}"),
        },
        None => None,
    };

    let parsed = util::load_log(log)?;
    let events: Vec<&LogEvent> = parsed
        .events
        .iter()
        .filter(|event| kind.is_none_or(|kind| event.kind == kind))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else {
        print!("{}", format_events(&events));
    }

    Ok(())
}

/// Formats the event listing.
#[must_use]
pub fn format_events(events: &[&LogEvent]) -> String {
    let mut output = String::new();

    if events.is_empty() {
        writeln!(output, "No matching events.").unwrap();
        return output;
    }

    for event in events {
        writeln!(
            output,
            "{} {} {:<11} {}",
            event.date.format("%Y-%m-%d"),
            event.time.format("%H:%M:%S"),
            event.kind.as_str(),
            event.raw.trim_start(),
        )
        .unwrap();
    }
    writeln!(output).unwrap();
    writeln!(output, "{} events", events.len()).unwrap();

    output
}
