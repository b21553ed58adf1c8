//! Sessions command: the closed-session list.

use std::fmt::Write;
use std::path::Path;

use anyhow::Result;
use lmlog_core::Session;

use super::util::{self, Filter, format_minutes};

/// Runs the sessions command.
pub fn run(log: &Path, filter: &Filter, json: bool) -> Result<()> {
    let parsed = util::load_log(log)?;
    let (mut sessions, _events) = filter.apply(&parsed);
    sessions.sort_by_key(|session| session.start);

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
    } else {
        print!("{}", format_sessions(&sessions));
    }

    Ok(())
}

/// Formats the session table.
#[must_use]
pub fn format_sessions(sessions: &[Session]) -> String {
    let mut output = String::new();

    if sessions.is_empty() {
        writeln!(output, "No closed sessions in the log.").unwrap();
        return output;
    }

    writeln!(
        output,
        "{:<19}  {:<20}  {:<12}  {:<12}  {:>8}",
        "START", "FEATURE", "USER", "HOST", "TIME"
    )
    .unwrap();
    for session in sessions {
        writeln!(
            output,
            "{:<19}  {:<20}  {:<12}  {:<12}  {:>8}",
            session.start.format("%Y-%m-%d %H:%M:%S"),
            session.feature,
            session.user,
            session.host,
            format_minutes(session.minutes),
        )
        .unwrap();
    }
    writeln!(output).unwrap();
    writeln!(output, "{} sessions", sessions.len()).unwrap();

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmlog_core::LogParser;

    #[test]
    fn renders_sessions_in_start_order() {
        let parsed = LogParser::with_default_year(2024).parse(
            "0:00:01 (lmgrd) TIMESTAMP 6/1/2024\n\
             10:00:00 (SW_D) OUT: \"solidworks\" alice@WS1\n\
             11:30:00 (SW_D) IN: \"solidworks\" alice@WS1\n",
        );
        let table = format_sessions(&parsed.sessions);
        assert!(table.contains("2024-06-01 10:00:00"));
        assert!(table.contains("solidworks"));
        assert!(table.contains("1h 30m"));
        assert!(table.contains("1 sessions"));
    }

    #[test]
    fn table_layout_is_stable() {
        let parsed = LogParser::with_default_year(2024).parse(
            "0:00:01 (lmgrd) TIMESTAMP 6/1/2024\n\
             10:00:00 (SW_D) OUT: \"solidworks\" alice@WS1\n\
             11:30:00 (SW_D) IN: \"solidworks\" alice@WS1\n",
        );
        insta::assert_snapshot!(format_sessions(&parsed.sessions), @r"
        START                FEATURE               USER          HOST              TIME
        2024-06-01 10:00:00  solidworks            alice         WS1             1h 30m

        1 sessions
        ");
    }

    #[test]
    fn empty_session_list_renders_empty_state() {
        assert_eq!(format_sessions(&[]), "No closed sessions in the log.\n");
    }
}
