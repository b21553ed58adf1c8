//! Per-feature capacity classification and expansion ROI.
//!
//! Seat counts and per-seat costs are supplied by the caller; nothing here
//! is derived from the log beyond the concurrency samples and denials.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analytics::concurrency_samples;
use crate::event::{EventKind, LogEvent};
use crate::session::Session;

/// Denial-to-retry gaps larger than this are treated as unrelated, not a
/// user waiting on a seat.
const RETRY_WINDOW_MINUTES: f64 = 240.0;

/// Wait estimate used when fewer than [`MIN_WAIT_SAMPLES`] measurable
/// denial-retry pairs exist.
const FALLBACK_WAIT_MINUTES: f64 = 45.0;

const MIN_WAIT_SAMPLES: usize = 3;

/// Denial share above which a feature is considered starved.
const DENIAL_RATIO_THRESHOLD: f64 = 0.03;

fn default_hourly_rate() -> f64 {
    60.0
}

/// Externally supplied seat and cost inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatInputs {
    /// Licensed seat count per feature.
    #[serde(default)]
    pub seats: BTreeMap<String, u32>,
    /// Annual cost of one seat, per feature.
    #[serde(default)]
    pub annual_seat_cost: BTreeMap<String, f64>,
    /// Loaded hourly labor rate used for productivity-loss estimates.
    #[serde(default = "default_hourly_rate")]
    pub hourly_rate: f64,
}

impl Default for SeatInputs {
    fn default() -> Self {
        Self {
            seats: BTreeMap::new(),
            annual_seat_cost: BTreeMap::new(),
            hourly_rate: default_hourly_rate(),
        }
    }
}

/// Capacity classification, in evaluation precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeatVerdict {
    OverUtilized,
    AtCapacity,
    OverProvisioned,
    UnderUtilized,
    RightSized,
    NeedsSeatData,
}

impl SeatVerdict {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OverUtilized => "over-utilized",
            Self::AtCapacity => "at-capacity",
            Self::OverProvisioned => "over-provisioned",
            Self::UnderUtilized => "under-utilized",
            Self::RightSized => "right-sized",
            Self::NeedsSeatData => "needs-seat-data",
        }
    }
}

impl fmt::Display for SeatVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expansion estimate for an over-utilized feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoiEstimate {
    /// Observed denials scaled to a full year.
    pub annualized_denials: f64,
    /// Median denial-to-retry gap, or the fixed fallback.
    pub wait_minutes_per_denial: f64,
    /// Annualized productivity loss at the configured hourly rate.
    pub annual_loss: f64,
    /// Seats needed to eliminate the observed deficit.
    pub additional_seats: u32,
    /// Cost of the additional seats, when a per-seat cost is known.
    pub expansion_cost: Option<f64>,
    /// Months for the loss savings to cover the expansion cost.
    pub payback_months: Option<f64>,
}

/// One feature's capacity picture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureCapacity {
    pub feature: String,
    pub seats: Option<u32>,
    pub peak: u32,
    pub p50: u32,
    pub p90: u32,
    pub p95: u32,
    pub checkouts: u32,
    pub denials: u32,
    /// `denials / (checkouts + denials)`; 0 when there was no activity.
    pub denial_ratio: f64,
    pub verdict: SeatVerdict,
    /// Present only for over-utilized features.
    pub roi: Option<RoiEstimate>,
}

/// Evaluates every feature seen in the sessions or denials, sorted by
/// feature name.
#[must_use]
pub fn evaluate(sessions: &[Session], events: &[LogEvent], inputs: &SeatInputs) -> Vec<FeatureCapacity> {
    let denials: Vec<&LogEvent> = events
        .iter()
        .filter(|event| event.kind == EventKind::Denied)
        .collect();

    let mut features: BTreeSet<&str> = sessions.iter().map(|s| s.feature.as_str()).collect();
    features.extend(denials.iter().filter_map(|d| d.feature.as_deref()));

    let observed_days = observed_days(sessions, &denials);

    features
        .into_iter()
        .map(|feature| evaluate_feature(feature, sessions, &denials, inputs, observed_days))
        .collect()
}

fn evaluate_feature(
    feature: &str,
    sessions: &[Session],
    denials: &[&LogEvent],
    inputs: &SeatInputs,
    observed_days: u32,
) -> FeatureCapacity {
    let mut samples = concurrency_samples(sessions, feature);
    samples.sort_unstable();

    let peak = samples.last().copied().unwrap_or(0);
    let p50 = nearest_rank(&samples, 50.0);
    let p90 = nearest_rank(&samples, 90.0);
    let p95 = nearest_rank(&samples, 95.0);

    let checkouts =
        u32::try_from(sessions.iter().filter(|s| s.feature == feature).count()).unwrap_or(u32::MAX);
    let denial_count = u32::try_from(
        denials
            .iter()
            .filter(|d| d.feature.as_deref() == Some(feature))
            .count(),
    )
    .unwrap_or(u32::MAX);

    let activity = checkouts + denial_count;
    let denial_ratio = if activity == 0 {
        0.0
    } else {
        f64::from(denial_count) / f64::from(activity)
    };

    let seats = inputs.seats.get(feature).copied();
    let verdict = classify(peak, p90, denial_ratio, denial_count, seats);

    let roi = (verdict == SeatVerdict::OverUtilized).then(|| {
        roi_estimate(
            feature,
            sessions,
            denials,
            inputs,
            observed_days,
            denial_count,
            peak,
            seats,
        )
    });

    FeatureCapacity {
        feature: feature.to_string(),
        seats,
        peak,
        p50,
        p90,
        p95,
        checkouts,
        denials: denial_count,
        denial_ratio,
        verdict,
        roi,
    }
}

fn classify(peak: u32, p90: u32, denial_ratio: f64, denials: u32, seats: Option<u32>) -> SeatVerdict {
    if denial_ratio > DENIAL_RATIO_THRESHOLD && seats.is_none_or(|s| peak >= s) {
        return SeatVerdict::OverUtilized;
    }

    match seats {
        Some(seats) => {
            let utilization = f64::from(peak) / f64::from(seats.max(1));
            if f64::from(peak) >= 0.9 * f64::from(seats) {
                SeatVerdict::AtCapacity
            } else if seats.saturating_sub(peak) >= 2 && utilization < 0.75 {
                SeatVerdict::OverProvisioned
            } else {
                SeatVerdict::RightSized
            }
        }
        None => {
            let idle_bar = (0.4 * f64::from(peak)).ceil();
            if peak >= 3 && f64::from(p90) <= idle_bar && denials == 0 {
                SeatVerdict::UnderUtilized
            } else {
                SeatVerdict::NeedsSeatData
            }
        }
    }
}

/// Nearest-rank percentile on an ascending-sorted series.
#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "sample counts fit comfortably in f64 and ranks are small"
)]
fn nearest_rank(sorted: &[u32], percentile: f64) -> u32 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (percentile / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Distinct calendar days with any session or denial activity.
fn observed_days(sessions: &[Session], denials: &[&LogEvent]) -> u32 {
    let mut days: BTreeSet<NaiveDate> = sessions.iter().map(|s| s.start.date()).collect();
    days.extend(denials.iter().map(|d| d.date));
    u32::try_from(days.len()).unwrap_or(u32::MAX).max(1)
}

#[expect(
    clippy::too_many_arguments,
    reason = "internal helper taking the already-computed feature figures"
)]
fn roi_estimate(
    feature: &str,
    sessions: &[Session],
    denials: &[&LogEvent],
    inputs: &SeatInputs,
    observed_days: u32,
    denial_count: u32,
    peak: u32,
    seats: Option<u32>,
) -> RoiEstimate {
    let annualized_denials = f64::from(denial_count) * 365.0 / f64::from(observed_days);
    let wait_minutes_per_denial =
        median_wait_minutes(feature, sessions, denials).unwrap_or(FALLBACK_WAIT_MINUTES);
    let annual_loss =
        wait_minutes_per_denial / 60.0 * inputs.hourly_rate * annualized_denials;

    let additional_seats = seats.map_or(1, |s| peak.saturating_sub(s) + 1);
    let expansion_cost = inputs
        .annual_seat_cost
        .get(feature)
        .map(|cost| cost * f64::from(additional_seats));
    let payback_months = expansion_cost
        .filter(|_| annual_loss > 0.0)
        .map(|cost| cost / (annual_loss / 12.0));

    RoiEstimate {
        annualized_denials,
        wait_minutes_per_denial,
        annual_loss,
        additional_seats,
        expansion_cost,
        payback_months,
    }
}

/// Median gap between a denial and that user's next successful checkout of
/// the same feature, counting only gaps within the retry window. `None`
/// when fewer than [`MIN_WAIT_SAMPLES`] pairs are measurable.
#[expect(
    clippy::cast_precision_loss,
    reason = "gaps are far below f64's integer precision limit"
)]
fn median_wait_minutes(
    feature: &str,
    sessions: &[Session],
    denials: &[&LogEvent],
) -> Option<f64> {
    let mut gaps: Vec<f64> = Vec::new();
    for denial in denials {
        if denial.feature.as_deref() != Some(feature) {
            continue;
        }
        let Some(user) = &denial.user else { continue };
        let denied_at = denial.timestamp();

        let next_start = sessions
            .iter()
            .filter(|s| s.feature == feature && &s.user == user && s.start >= denied_at)
            .map(|s| s.start)
            .min();
        if let Some(start) = next_start {
            let gap = (start - denied_at).num_milliseconds() as f64 / 60_000.0;
            if gap <= RETRY_WINDOW_MINUTES {
                gaps.push(gap);
            }
        }
    }

    if gaps.len() < MIN_WAIT_SAMPLES {
        return None;
    }
    gaps.sort_unstable_by(f64::total_cmp);
    let mid = gaps.len() / 2;
    if gaps.len() % 2 == 0 {
        Some((gaps[mid - 1] + gaps[mid]) / 2.0)
    } else {
        Some(gaps[mid])
    }
}
