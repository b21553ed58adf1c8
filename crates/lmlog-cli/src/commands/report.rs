//! Report command: metadata plus the derived usage analytics.

use std::fmt::Write;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Local};
use lmlog_core::{Analytics, ServerMetadata};
use serde::Serialize;

use super::util::{self, Filter, format_minutes, progress_bar};

/// How many rows the top-N sections show.
const TOP_ROWS: usize = 10;

/// JSON payload for `report --json`.
#[derive(Debug, Serialize)]
struct ReportJson<'a> {
    metadata: &'a ServerMetadata,
    analytics: &'a Analytics,
}

/// Runs the report command.
pub fn run(log: &Path, filter: &Filter, json: bool) -> Result<()> {
    let parsed = util::load_log(log)?;
    let (sessions, events) = filter.apply(&parsed);
    let analytics = Analytics::compute(&sessions, &events);

    if json {
        let output = serde_json::to_string_pretty(&ReportJson {
            metadata: &parsed.metadata,
            analytics: &analytics,
        })?;
        println!("{output}");
    } else {
        let output = format_report(&parsed.metadata, &analytics, filter, Local::now());
        print!("{output}");
    }

    Ok(())
}

/// Formats the human-readable report output.
#[must_use]
pub fn format_report(
    metadata: &ServerMetadata,
    analytics: &Analytics,
    filter: &Filter,
    generated_at: DateTime<Local>,
) -> String {
    let mut output = String::new();

    writeln!(output, "LICENSE USAGE REPORT").unwrap();
    writeln!(
        output,
        "Generated {}",
        generated_at.format("%Y-%m-%d %H:%M")
    )
    .unwrap();
    if filter.is_active() {
        let user = filter.user.as_deref().unwrap_or("*");
        let feature = filter.feature.as_deref().unwrap_or("*");
        writeln!(output, "Filter: user={user} feature={feature}").unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "SERVER").unwrap();
    writeln!(output, "──────").unwrap();
    writeln!(output, "Name:         {}", metadata.server_name).unwrap();
    writeln!(output, "Version:      {}", metadata.version).unwrap();
    writeln!(output, "Port:         {}", metadata.port).unwrap();
    writeln!(output, "Vendor port:  {}", metadata.vendor_port).unwrap();
    writeln!(output, "PID:          {}", metadata.pid).unwrap();
    writeln!(output, "License file: {}", metadata.license_path).unwrap();

    if analytics.is_empty() {
        writeln!(output).unwrap();
        writeln!(output, "No usage data found in the log.").unwrap();
        writeln!(output).unwrap();
        writeln!(
            output,
            "Hint: Run 'lmlog events <log>' to inspect what was parsed."
        )
        .unwrap();
        return output;
    }

    let total_sessions: u32 = analytics.users.values().map(|u| u.sessions).sum();
    let total_minutes: f64 = analytics.users.values().map(|u| u.minutes).sum();
    let total_denials: u32 = analytics.features.values().map(|f| f.denials).sum();

    writeln!(output).unwrap();
    writeln!(output, "SUMMARY").unwrap();
    writeln!(output, "───────").unwrap();
    writeln!(
        output,
        "{total_sessions} sessions, {} total, {} users, {} features, {} hosts, {total_denials} denials",
        format_minutes(total_minutes),
        analytics.users.len(),
        analytics.features.len(),
        analytics.hosts.len(),
    )
    .unwrap();

    write_users(&mut output, analytics);
    write_features(&mut output, analytics);
    write_concurrency(&mut output, analytics);
    write_durations(&mut output, analytics);
    write_cousage(&mut output, analytics);

    output
}

fn write_users(output: &mut String, analytics: &Analytics) {
    let mut users: Vec<_> = analytics.users.iter().collect();
    users.sort_by(|a, b| {
        b.1.minutes
            .total_cmp(&a.1.minutes)
            .then_with(|| a.0.cmp(b.0))
    });
    let max_minutes = users.first().map_or(0.0, |(_, stats)| stats.minutes);

    writeln!(output).unwrap();
    writeln!(output, "TOP USERS").unwrap();
    writeln!(output, "─────────").unwrap();
    for (name, stats) in users.iter().take(TOP_ROWS) {
        writeln!(
            output,
            "{name:<16} {sessions:>4} sessions  {time:>8}  {bar}{denied}",
            sessions = stats.sessions,
            time = format_minutes(stats.minutes),
            bar = progress_bar(stats.minutes, max_minutes),
            denied = if stats.denials > 0 {
                format!("  ({} denied)", stats.denials)
            } else {
                String::new()
            },
        )
        .unwrap();
    }
}

fn write_features(output: &mut String, analytics: &Analytics) {
    let mut features: Vec<_> = analytics.features.iter().collect();
    features.sort_by(|a, b| {
        b.1.minutes
            .total_cmp(&a.1.minutes)
            .then_with(|| a.0.cmp(b.0))
    });

    writeln!(output).unwrap();
    writeln!(output, "FEATURES").unwrap();
    writeln!(output, "────────").unwrap();
    for (name, stats) in features.iter().take(TOP_ROWS) {
        let denial_note = analytics
            .denial_percent
            .get(*name)
            .filter(|percent| **percent > 0)
            .map_or_else(String::new, |percent| format!("  {percent}% denied"));
        writeln!(
            output,
            "{name:<20} {checkouts:>4} checkouts  {denials:>3} denials  {time:>8}{denial_note}",
            checkouts = stats.checkouts,
            denials = stats.denials,
            time = format_minutes(stats.minutes),
        )
        .unwrap();
    }
}

fn write_concurrency(output: &mut String, analytics: &Analytics) {
    if analytics.daily_peak_concurrency.is_empty() {
        return;
    }
    writeln!(output).unwrap();
    writeln!(output, "DAILY PEAK CONCURRENCY").unwrap();
    writeln!(output, "──────────────────────").unwrap();
    let max_peak = analytics
        .daily_peak_concurrency
        .values()
        .copied()
        .max()
        .unwrap_or(0);
    for (day, peak) in &analytics.daily_peak_concurrency {
        writeln!(
            output,
            "{day}  {peak:>3}  {}",
            progress_bar(f64::from(*peak), f64::from(max_peak))
        )
        .unwrap();
    }
}

fn write_durations(output: &mut String, analytics: &Analytics) {
    writeln!(output).unwrap();
    writeln!(output, "SESSION DURATIONS").unwrap();
    writeln!(output, "─────────────────").unwrap();
    let max_count = analytics
        .duration_histogram
        .iter()
        .copied()
        .max()
        .unwrap_or(0);
    for (label, count) in lmlog_core::analytics::DURATION_BUCKET_LABELS
        .iter()
        .zip(analytics.duration_histogram.iter())
    {
        writeln!(
            output,
            "{label:<8} {count:>4}  {}",
            progress_bar(f64::from(*count), f64::from(max_count))
        )
        .unwrap();
    }
}

fn write_cousage(output: &mut String, analytics: &Analytics) {
    if analytics.top_cousage.is_empty() {
        return;
    }
    writeln!(output).unwrap();
    writeln!(output, "FEATURES USED TOGETHER").unwrap();
    writeln!(output, "──────────────────────").unwrap();
    for pair in &analytics.top_cousage {
        writeln!(
            output,
            "{} + {}  ({} shared users)",
            pair.first, pair.second, pair.shared_users
        )
        .unwrap();
    }
}
