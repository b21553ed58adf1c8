//! Derived usage analytics.
//!
//! Every aggregate here is a pure function of (sessions, denial events):
//! recomputing from the same inputs yields identical structures, which is
//! what lets callers re-run the aggregation on filtered inputs. All
//! containers are ordered (`BTreeMap`/sorted `Vec`), so the output is
//! deterministic by construction rather than by hash-iteration accident.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;

use crate::event::{EventKind, LogEvent};
use crate::session::Session;

/// Duration histogram bucket upper bounds in minutes; the last bucket is
/// unbounded.
const DURATION_BOUNDS: [f64; 5] = [15.0, 60.0, 120.0, 240.0, 480.0];

/// Display labels matching [`Analytics::duration_histogram`] buckets.
pub const DURATION_BUCKET_LABELS: [&str; 6] =
    ["< 15m", "15m-1h", "1-2h", "2-4h", "4-8h", "8h+"];

/// How many co-usage pairs are reported.
const TOP_PAIRS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserStats {
    pub sessions: u32,
    pub minutes: f64,
    pub denials: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureStats {
    pub checkouts: u32,
    pub denials: u32,
    pub minutes: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HostStats {
    pub sessions: u32,
    pub minutes: f64,
    pub users: std::collections::BTreeSet<String>,
}

/// Two features used by the same users, in canonical lexical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CousagePair {
    pub first: String,
    pub second: String,
    pub shared_users: u32,
}

/// The full derived aggregate. Read-only snapshot; recompute instead of
/// mutating.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analytics {
    pub users: BTreeMap<String, UserStats>,
    pub features: BTreeMap<String, FeatureStats>,
    pub hosts: BTreeMap<String, HostStats>,
    /// Session starts per ISO calendar day, lexically (= chronologically)
    /// ordered.
    pub daily_checkouts: BTreeMap<String, u32>,
    pub daily_denials: BTreeMap<String, u32>,
    /// Session starts bucketed by hour of day.
    pub hourly_checkouts: [u32; 24],
    /// Peak simultaneous checkouts per ISO calendar day.
    pub daily_peak_concurrency: BTreeMap<String, u32>,
    /// Closed-session durations in the fixed minute buckets
    /// [`DURATION_BUCKET_LABELS`] describes.
    pub duration_histogram: [u32; 6],
    pub top_cousage: Vec<CousagePair>,
    /// Integer denial percentage per feature; zero-activity features are
    /// excluded.
    pub denial_percent: BTreeMap<String, u8>,
}

impl Analytics {
    /// Computes every aggregate from the session list and the denial
    /// events found in `events`. Non-denial events are ignored, so the
    /// full interpreted event list can be passed as-is.
    #[must_use]
    pub fn compute(sessions: &[Session], events: &[LogEvent]) -> Self {
        let denials: Vec<&LogEvent> = events
            .iter()
            .filter(|event| event.kind == EventKind::Denied)
            .collect();

        Self {
            users: user_stats(sessions, &denials),
            features: feature_stats(sessions, &denials),
            hosts: host_stats(sessions),
            daily_checkouts: daily_counts(sessions.iter().map(|s| s.start.date())),
            daily_denials: daily_counts(denials.iter().map(|d| d.date)),
            hourly_checkouts: hourly_histogram(sessions),
            daily_peak_concurrency: daily_peaks(sessions),
            duration_histogram: duration_histogram(sessions),
            top_cousage: top_cousage(sessions),
            denial_percent: denial_percent(sessions, &denials),
        }
    }

    /// True when there is nothing to display.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.features.is_empty() && self.daily_denials.is_empty()
    }
}

fn user_stats(sessions: &[Session], denials: &[&LogEvent]) -> BTreeMap<String, UserStats> {
    let mut users: BTreeMap<String, UserStats> = BTreeMap::new();
    for session in sessions {
        let stats = users.entry(session.user.clone()).or_default();
        stats.sessions += 1;
        stats.minutes += session.minutes;
    }
    for denial in denials {
        if let Some(user) = &denial.user {
            users.entry(user.clone()).or_default().denials += 1;
        }
    }
    users
}

fn feature_stats(sessions: &[Session], denials: &[&LogEvent]) -> BTreeMap<String, FeatureStats> {
    let mut features: BTreeMap<String, FeatureStats> = BTreeMap::new();
    for session in sessions {
        let stats = features.entry(session.feature.clone()).or_default();
        stats.checkouts += 1;
        stats.minutes += session.minutes;
    }
    for denial in denials {
        if let Some(feature) = &denial.feature {
            features.entry(feature.clone()).or_default().denials += 1;
        }
    }
    features
}

fn host_stats(sessions: &[Session]) -> BTreeMap<String, HostStats> {
    let mut hosts: BTreeMap<String, HostStats> = BTreeMap::new();
    for session in sessions {
        let stats = hosts.entry(session.host.clone()).or_default();
        stats.sessions += 1;
        stats.minutes += session.minutes;
        stats.users.insert(session.user.clone());
    }
    hosts
}

fn daily_counts(dates: impl Iterator<Item = chrono::NaiveDate>) -> BTreeMap<String, u32> {
    let mut days: BTreeMap<String, u32> = BTreeMap::new();
    for date in dates {
        *days.entry(iso_day(date)).or_default() += 1;
    }
    days
}

fn hourly_histogram(sessions: &[Session]) -> [u32; 24] {
    let mut hours = [0u32; 24];
    for session in sessions {
        hours[session.start.time().hour() as usize] += 1;
    }
    hours
}

fn duration_histogram(sessions: &[Session]) -> [u32; 6] {
    let mut buckets = [0u32; 6];
    for session in sessions {
        buckets[duration_bucket(session.minutes)] += 1;
    }
    buckets
}

fn duration_bucket(minutes: f64) -> usize {
    DURATION_BOUNDS
        .iter()
        .position(|bound| minutes < *bound)
        .unwrap_or(DURATION_BOUNDS.len())
}

/// Sweep-line endpoint: `+1` at session start, `-1` at session end.
fn sweep_deltas(sessions: impl Iterator<Item = (NaiveDateTime, NaiveDateTime)>) -> Vec<(NaiveDateTime, i32)> {
    let mut deltas: Vec<(NaiveDateTime, i32)> = Vec::new();
    for (start, end) in sessions {
        deltas.push((start, 1));
        deltas.push((end, -1));
    }
    // Sorting -1 before +1 at equal instants keeps back-to-back
    // return/checkout pairs from inflating the running count.
    deltas.sort_unstable_by_key(|(at, delta)| (*at, *delta));
    deltas
}

fn daily_peaks(sessions: &[Session]) -> BTreeMap<String, u32> {
    let deltas = sweep_deltas(sessions.iter().map(|s| (s.start, s.end)));
    let mut peaks: BTreeMap<String, u32> = BTreeMap::new();
    let mut running: i32 = 0;
    for (at, delta) in deltas {
        running += delta;
        let peak = peaks.entry(iso_day(at.date())).or_default();
        *peak = (*peak).max(running.max(0).unsigned_abs());
    }
    peaks
}

/// The running-sum series for one feature's sessions, in time order.
///
/// Each value is the number of simultaneously open sessions after one
/// sweep event. Sorting this series and indexing at percentile positions
/// yields the capacity-planning samples.
#[must_use]
pub fn concurrency_samples(sessions: &[Session], feature: &str) -> Vec<u32> {
    let deltas = sweep_deltas(
        sessions
            .iter()
            .filter(|s| s.feature == feature)
            .map(|s| (s.start, s.end)),
    );
    let mut samples = Vec::with_capacity(deltas.len());
    let mut running: i32 = 0;
    for (_, delta) in deltas {
        running += delta;
        samples.push(running.max(0).unsigned_abs());
    }
    samples
}

fn top_cousage(sessions: &[Session]) -> Vec<CousagePair> {
    let mut user_features: BTreeMap<&str, std::collections::BTreeSet<&str>> = BTreeMap::new();
    for session in sessions {
        user_features
            .entry(&session.user)
            .or_default()
            .insert(&session.feature);
    }

    let mut pair_counts: BTreeMap<(&str, &str), u32> = BTreeMap::new();
    for features in user_features.values() {
        let features: Vec<&str> = features.iter().copied().collect();
        for (i, first) in features.iter().enumerate() {
            for second in &features[i + 1..] {
                // BTreeSet iteration is sorted, so (first, second) is
                // already the canonical lexical ordering.
                *pair_counts.entry((first, second)).or_default() += 1;
            }
        }
    }

    let mut pairs: Vec<CousagePair> = pair_counts
        .into_iter()
        .map(|((first, second), shared_users)| CousagePair {
            first: first.to_string(),
            second: second.to_string(),
            shared_users,
        })
        .collect();
    pairs.sort_by(|a, b| {
        b.shared_users
            .cmp(&a.shared_users)
            .then_with(|| (&a.first, &a.second).cmp(&(&b.first, &b.second)))
    });
    pairs.truncate(TOP_PAIRS);
    pairs
}

fn denial_percent(sessions: &[Session], denials: &[&LogEvent]) -> BTreeMap<String, u8> {
    let features = feature_stats(sessions, denials);
    features
        .into_iter()
        .filter(|(_, stats)| stats.checkouts + stats.denials > 0)
        .map(|(feature, stats)| {
            let total = f64::from(stats.checkouts + stats.denials);
            let percent = (f64::from(stats.denials) / total * 100.0).round();
            (feature, percent as u8)
        })
        .collect()
}

fn iso_day(date: chrono::NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogParser;

    const DAY_LOG: &str = "\
0:00:01 (lmgrd) TIMESTAMP 6/1/2024
8:00:00 (SW_D) OUT: \"solidworks\" alice@WS1
9:00:00 (SW_D) OUT: \"solidworks\" bob@WS2
9:30:00 (SW_D) OUT: \"cae_cwpro\" alice@WS1
10:00:00 (SW_D) IN: \"solidworks\" alice@WS1
10:30:00 (SW_D) DENIED: \"cae_cwpro\" carol@WS3  (Licensed number of users already reached. (-4,342))
11:00:00 (SW_D) IN: \"solidworks\" bob@WS2
12:00:00 (SW_D) IN: \"cae_cwpro\" alice@WS1
";

    fn compute(text: &str) -> Analytics {
        let parsed = LogParser::with_default_year(2024).parse(text);
        Analytics::compute(&parsed.sessions, &parsed.events)
    }

    #[test]
    fn rollups_count_sessions_denials_and_minutes() {
        let analytics = compute(DAY_LOG);

        let alice = &analytics.users["alice"];
        assert_eq!(alice.sessions, 2);
        assert!((alice.minutes - (120.0 + 150.0)).abs() < f64::EPSILON);
        assert_eq!(alice.denials, 0);

        let carol = &analytics.users["carol"];
        assert_eq!(carol.sessions, 0);
        assert_eq!(carol.denials, 1);

        let solidworks = &analytics.features["solidworks"];
        assert_eq!(solidworks.checkouts, 2);
        assert_eq!(solidworks.denials, 0);

        let host = &analytics.hosts["WS1"];
        assert_eq!(host.sessions, 2);
        assert_eq!(host.users.len(), 1);
    }

    #[test]
    fn denial_without_checkout_counts_only_as_denial() {
        let analytics = compute(
            "10:00:00 (SW_D) DENIED: \"cae_cwpro\" carol@WS3  (no seats)",
        );
        let stats = &analytics.features["cae_cwpro"];
        assert_eq!(stats.denials, 1);
        assert_eq!(stats.checkouts, 0);
        assert_eq!(analytics.denial_percent["cae_cwpro"], 100);
    }

    #[test]
    fn daily_series_use_iso_keys_in_chronological_order() {
        let analytics = compute(
            "0:00:01 (lmgrd) TIMESTAMP 12/31/2024\n\
             10:00:00 (SW_D) OUT: \"f\" a@h\n\
             11:00:00 (SW_D) IN: \"f\" a@h\n\
             0:00:01 (lmgrd) TIMESTAMP 1/1/2025\n\
             10:00:00 (SW_D) OUT: \"f\" a@h\n\
             11:00:00 (SW_D) IN: \"f\" a@h",
        );
        let days: Vec<&String> = analytics.daily_checkouts.keys().collect();
        assert_eq!(days, ["2024-12-31", "2025-01-01"]);
    }

    #[test]
    fn hourly_histogram_buckets_session_starts() {
        let analytics = compute(DAY_LOG);
        assert_eq!(analytics.hourly_checkouts[8], 1);
        assert_eq!(analytics.hourly_checkouts[9], 2);
        assert_eq!(analytics.hourly_checkouts[10], 0);
        assert_eq!(analytics.hourly_checkouts.iter().sum::<u32>(), 3);
    }

    #[test]
    fn daily_peak_concurrency_reports_sweep_maximum() {
        let analytics = compute(DAY_LOG);
        // 8:00 +1, 9:00 +1, 9:30 +1 -> peak 3, then returns only.
        assert_eq!(analytics.daily_peak_concurrency["2024-06-01"], 3);
    }

    #[test]
    fn duration_histogram_uses_fixed_buckets() {
        let analytics = compute(
            "8:00:00 (SW_D) OUT: \"f\" a@h\n\
             8:10:00 (SW_D) IN: \"f\" a@h\n\
             9:00:00 (SW_D) OUT: \"f\" b@h\n\
             17:30:00 (SW_D) IN: \"f\" b@h",
        );
        assert_eq!(analytics.duration_histogram[0], 1); // 10 minutes
        assert_eq!(analytics.duration_histogram[5], 1); // 8.5 hours
        assert_eq!(analytics.duration_histogram.iter().sum::<u32>(), 2);
    }

    #[test]
    fn duration_bucket_boundaries_are_half_open() {
        assert_eq!(duration_bucket(0.0), 0);
        assert_eq!(duration_bucket(14.9), 0);
        assert_eq!(duration_bucket(15.0), 1);
        assert_eq!(duration_bucket(59.9), 1);
        assert_eq!(duration_bucket(60.0), 2);
        assert_eq!(duration_bucket(120.0), 3);
        assert_eq!(duration_bucket(240.0), 4);
        assert_eq!(duration_bucket(480.0), 5);
        assert_eq!(duration_bucket(10_000.0), 5);
    }

    #[test]
    fn cousage_reports_one_canonical_ordering_per_pair() {
        let analytics = compute(DAY_LOG);
        assert_eq!(analytics.top_cousage.len(), 1);
        let pair = &analytics.top_cousage[0];
        // alice used both; canonical order is lexical.
        assert_eq!(pair.first, "cae_cwpro");
        assert_eq!(pair.second, "solidworks");
        assert_eq!(pair.shared_users, 1);
    }

    #[test]
    fn cousage_sorts_by_count_then_lexically() {
        let analytics = compute(
            "8:00:00 (SW_D) OUT: \"a\" u1@h\n\
             8:01:00 (SW_D) IN: \"a\" u1@h\n\
             8:02:00 (SW_D) OUT: \"b\" u1@h\n\
             8:03:00 (SW_D) IN: \"b\" u1@h\n\
             9:00:00 (SW_D) OUT: \"a\" u2@h\n\
             9:01:00 (SW_D) IN: \"a\" u2@h\n\
             9:02:00 (SW_D) OUT: \"b\" u2@h\n\
             9:03:00 (SW_D) IN: \"b\" u2@h\n\
             10:00:00 (SW_D) OUT: \"a\" u2@h\n\
             10:01:00 (SW_D) IN: \"a\" u2@h\n\
             10:02:00 (SW_D) OUT: \"c\" u2@h\n\
             10:03:00 (SW_D) IN: \"c\" u2@h",
        );
        let pairs: Vec<(&str, &str, u32)> = analytics
            .top_cousage
            .iter()
            .map(|p| (p.first.as_str(), p.second.as_str(), p.shared_users))
            .collect();
        assert_eq!(
            pairs,
            [("a", "b", 2), ("a", "c", 1), ("b", "c", 1)]
        );
    }

    #[test]
    fn concurrency_samples_track_one_feature() {
        let parsed = LogParser::with_default_year(2024).parse(DAY_LOG);
        let samples = concurrency_samples(&parsed.sessions, "solidworks");
        // +1 (8:00), +1 (9:00), -1 (10:00), -1 (11:00)
        assert_eq!(samples, vec![1, 2, 1, 0]);
        assert!(concurrency_samples(&parsed.sessions, "absent").is_empty());
    }

    #[test]
    fn feature_peak_bounds_its_daily_peaks() {
        let parsed = LogParser::with_default_year(2024).parse(DAY_LOG);
        let samples = concurrency_samples(&parsed.sessions, "solidworks");
        let peak = samples.iter().copied().max().unwrap_or(0);

        let feature_sessions: Vec<Session> = parsed
            .sessions
            .iter()
            .filter(|s| s.feature == "solidworks")
            .cloned()
            .collect();
        for day_peak in daily_peaks(&feature_sessions).values() {
            assert!(peak >= *day_peak);
        }
    }

    #[test]
    fn recomputation_is_bit_identical() {
        let parsed = LogParser::with_default_year(2024).parse(DAY_LOG);
        let first = Analytics::compute(&parsed.sessions, &parsed.events);
        let second = Analytics::compute(&parsed.sessions, &parsed.events);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn empty_inputs_yield_empty_aggregates() {
        let analytics = Analytics::compute(&[], &[]);
        assert!(analytics.is_empty());
        assert_eq!(analytics.hourly_checkouts, [0; 24]);
        assert_eq!(analytics.duration_histogram, [0; 6]);
        assert!(analytics.top_cousage.is_empty());
    }
}
