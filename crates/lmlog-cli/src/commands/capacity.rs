//! Capacity command: per-feature right-sizing classification and ROI.

use std::fmt::Write;
use std::path::Path;

use anyhow::Result;
use lmlog_core::{FeatureCapacity, SeatInputs};

use super::util::{self, format_minutes};

/// Runs the capacity command.
pub fn run(log: &Path, inputs: &SeatInputs, json: bool) -> Result<()> {
    let parsed = util::load_log(log)?;
    let report = lmlog_core::evaluate(&parsed.sessions, &parsed.events, inputs);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_capacity(&report));
    }

    Ok(())
}

/// Formats the capacity table plus ROI details for starved features.
#[must_use]
pub fn format_capacity(report: &[FeatureCapacity]) -> String {
    let mut output = String::new();

    if report.is_empty() {
        writeln!(output, "No feature activity in the log.").unwrap();
        return output;
    }

    writeln!(
        output,
        "{:<20}  {:>5}  {:>4}  {:>4}  {:>4}  {:>4}  {:>7}  VERDICT",
        "FEATURE", "SEATS", "PEAK", "P50", "P90", "P95", "DENIED"
    )
    .unwrap();
    for feature in report {
        let seats = feature
            .seats
            .map_or_else(|| "?".to_string(), |seats| seats.to_string());
        writeln!(
            output,
            "{:<20}  {seats:>5}  {:>4}  {:>4}  {:>4}  {:>4}  {:>6.1}%  {}",
            feature.feature,
            feature.peak,
            feature.p50,
            feature.p90,
            feature.p95,
            feature.denial_ratio * 100.0,
            feature.verdict,
        )
        .unwrap();
    }

    for feature in report {
        let Some(roi) = &feature.roi else { continue };
        writeln!(output).unwrap();
        writeln!(output, "{} expansion estimate", feature.feature).unwrap();
        writeln!(
            output,
            "  ~{:.0} denials/year, ~{} lost per denial",
            roi.annualized_denials,
            format_minutes(roi.wait_minutes_per_denial)
        )
        .unwrap();
        writeln!(
            output,
            "  Estimated productivity loss: ${:.0}/year",
            roi.annual_loss
        )
        .unwrap();
        writeln!(output, "  Additional seats needed: {}", roi.additional_seats).unwrap();
        match (roi.expansion_cost, roi.payback_months) {
            (Some(cost), Some(months)) => {
                writeln!(
                    output,
                    "  Expansion cost: ${cost:.0}/year, payback in {months:.1} months"
                )
                .unwrap();
            }
            _ => {
                writeln!(
                    output,
                    "  Add a per-seat cost to the config to estimate payback."
                )
                .unwrap();
            }
        }
    }

    output
}
