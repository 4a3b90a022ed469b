//! Kinematic segment analyzer: per-interval metrics over adjacent pairs of
//! time-ordered samples.

use serde::{Deserialize, Serialize};

use crate::{AnalysisParams, Sample};

/// Derived kinematics for the interval between two consecutive samples.
///
/// Speeds are in the active speed unit; distances and rates are in the unit
/// system's distance-per-second terms (ft, ft/s² or m, m/s²).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentResult {
    pub start_time_s: f64,
    pub end_time_s: f64,
    pub time_interval_s: f64,
    /// Signed speed change over the interval, active speed unit.
    pub speed_change: f64,
    /// Deceleration (negative) or acceleration (positive) rate. `None` when
    /// the interval is degenerate and the quotient is non-finite.
    pub decel_accel_rate: Option<f64>,
    /// Dimensionless deceleration as a fraction of gravity. `None` when
    /// non-finite.
    pub drag_factor: Option<f64>,
    /// Trapezoidal distance covered during the interval.
    pub segment_distance: f64,
    /// Running total of segment distances up to and including this one.
    pub cumulative_distance: f64,
    pub is_significant: bool,
}

/// Derive one [`SegmentResult`] per adjacent pair in a sorted sample set,
/// yielding exactly `n - 1` results for `n` samples.
///
/// A degenerate (zero-length) interval never aborts the run: the affected
/// rate and drag factor are recorded as `None` and the segment distance
/// collapses to zero.
pub fn compute_segments(samples: &[Sample], params: &AnalysisParams) -> Vec<SegmentResult> {
    let units = params.unit_system;
    let mut segments = Vec::with_capacity(samples.len().saturating_sub(1));
    let mut cumulative = 0.0;

    for pair in samples.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);
        let time_interval_s = (cur.time_s - prev.time_s).abs();
        let speed_change = cur.speed - prev.speed;

        let decel_accel_rate =
            finite_or_none(units.speed_to_distance_per_sec(speed_change) / time_interval_s);
        let drag_factor =
            finite_or_none((prev.speed - cur.speed) / (units.gravity() * time_interval_s));

        let mean_speed = (prev.speed + cur.speed) / 2.0;
        let segment_distance = units.speed_to_distance_per_sec(mean_speed) * time_interval_s;
        cumulative += segment_distance;

        segments.push(SegmentResult {
            start_time_s: prev.time_s,
            end_time_s: cur.time_s,
            time_interval_s,
            speed_change,
            decel_accel_rate,
            drag_factor,
            segment_distance,
            cumulative_distance: cumulative,
            is_significant: speed_change.abs() > params.significant_speed_change,
        });
    }

    segments
}

fn finite_or_none(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
