//! Pairing checkout/return events into finalized usage sessions.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::event::{EventKind, LogEvent};

/// Structural key for an open checkout. A composite tuple rather than a
/// joined string, so field values containing separator characters can
/// never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SessionKey {
    user: String,
    host: String,
    feature: String,
}

/// A reconstructed period of feature usage.
///
/// The published list holds only closed sessions with non-negative
/// duration; open sessions exist only transiently during reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub user: String,
    pub host: String,
    pub feature: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Duration in minutes, `(end - start) / 60000` ms.
    pub minutes: f64,
}

/// Pairs checkout and return events into closed sessions.
///
/// A second checkout for the same (user, host, feature) before a return
/// silently replaces the first — these logs do not nest same-key checkouts.
/// Returns with no matching open checkout are ignored, negative-duration
/// pairings are discarded, and sessions still open at end of log are not
/// emitted.
#[expect(
    clippy::cast_precision_loss,
    reason = "session durations are far below f64's integer precision limit"
)]
#[must_use]
pub fn reconcile(events: &[LogEvent]) -> Vec<Session> {
    let mut open: HashMap<SessionKey, NaiveDateTime> = HashMap::new();
    let mut sessions = Vec::new();

    for event in events {
        let (Some(user), Some(host), Some(feature)) = (&event.user, &event.host, &event.feature)
        else {
            // Partial marker matches are retained for audit display but
            // excluded from reconciliation.
            continue;
        };
        let key = SessionKey {
            user: user.clone(),
            host: host.clone(),
            feature: feature.clone(),
        };

        match event.kind {
            EventKind::Checkout => {
                open.insert(key, event.timestamp());
            }
            EventKind::Return => {
                let Some(start) = open.remove(&key) else {
                    continue;
                };
                let end = event.timestamp();
                let minutes = (end - start).num_milliseconds() as f64 / 60_000.0;
                if minutes < 0.0 {
                    tracing::debug!(
                        %user, %host, %feature, %start, %end,
                        "discarding negative-duration pairing"
                    );
                    continue;
                }
                sessions.push(Session {
                    user: key.user,
                    host: key.host,
                    feature: key.feature,
                    start,
                    end,
                    minutes,
                });
            }
            _ => {}
        }
    }

    sessions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogParser;
    use chrono::NaiveDate;

    fn parse(text: &str) -> Vec<Session> {
        LogParser::with_default_year(2024).parse(text).sessions
    }

    #[test]
    fn pairs_checkout_and_return_into_90_minute_session() {
        let sessions = parse(
            "0:00:01 (lmgrd) TIMESTAMP 6/1/2024\n\
             10:00:00 (SW_D) OUT: \"solidworks\" alice@WS1\n\
             11:30:00 (SW_D) IN: \"solidworks\" alice@WS1",
        );
        assert_eq!(sessions.len(), 1);
        let session = &sessions[0];
        assert_eq!(session.user, "alice");
        assert_eq!(session.host, "WS1");
        assert_eq!(session.feature, "solidworks");
        assert!((session.minutes - 90.0).abs() < f64::EPSILON);
        assert_eq!(
            session.start.date(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );
    }

    #[test]
    fn second_checkout_supersedes_the_first() {
        let sessions = parse(
            "10:00:00 (SW_D) OUT: \"f\" alice@WS1\n\
             10:30:00 (SW_D) OUT: \"f\" alice@WS1\n\
             11:00:00 (SW_D) IN: \"f\" alice@WS1",
        );
        assert_eq!(sessions.len(), 1);
        assert!((sessions[0].minutes - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn return_without_open_checkout_is_ignored() {
        let sessions = parse("10:00:00 (SW_D) IN: \"f\" alice@WS1");
        assert!(sessions.is_empty());
    }

    #[test]
    fn open_sessions_at_end_of_log_are_not_emitted() {
        let sessions = parse("10:00:00 (SW_D) OUT: \"f\" alice@WS1");
        assert!(sessions.is_empty());
    }

    #[test]
    fn negative_duration_pairing_is_discarded() {
        // Date context rolls backwards between checkout and return.
        let sessions = parse(
            "0:00:01 (lmgrd) TIMESTAMP 6/2/2024\n\
             10:00:00 (SW_D) OUT: \"f\" alice@WS1\n\
             0:00:01 (lmgrd) TIMESTAMP 6/1/2024\n\
             9:00:00 (SW_D) IN: \"f\" alice@WS1",
        );
        assert!(sessions.is_empty());
    }

    #[test]
    fn distinct_hosts_do_not_pair_with_each_other() {
        let sessions = parse(
            "10:00:00 (SW_D) OUT: \"f\" alice@WS1\n\
             11:00:00 (SW_D) IN: \"f\" alice@WS2",
        );
        assert!(sessions.is_empty());
    }

    #[test]
    fn session_spanning_a_timestamp_rollover_uses_both_dates() {
        let sessions = parse(
            "0:00:01 (lmgrd) TIMESTAMP 6/1/2024\n\
             23:00:00 (SW_D) OUT: \"f\" alice@WS1\n\
             0:00:01 (lmgrd) TIMESTAMP 6/2/2024\n\
             1:00:00 (SW_D) IN: \"f\" alice@WS1",
        );
        assert_eq!(sessions.len(), 1);
        assert!((sessions[0].minutes - 120.0).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_checkout_does_not_open_a_session() {
        let sessions = parse(
            "10:00:00 (SW_D) OUT: \"f\"\n\
             11:00:00 (SW_D) IN: \"f\" alice@WS1",
        );
        assert!(sessions.is_empty());
    }

    #[test]
    fn every_session_has_non_negative_duration_and_ordered_endpoints() {
        let sessions = parse(
            "0:00:01 (lmgrd) TIMESTAMP 6/1/2024\n\
             8:00:00 (SW_D) OUT: \"a\" u1@h1\n\
             8:00:00 (SW_D) IN: \"a\" u1@h1\n\
             9:00:00 (SW_D) OUT: \"b\" u2@h2\n\
             17:00:00 (SW_D) IN: \"b\" u2@h2",
        );
        assert_eq!(sessions.len(), 2);
        for session in &sessions {
            assert!(session.minutes >= 0.0);
            assert!(session.end >= session.start);
        }
    }
}
