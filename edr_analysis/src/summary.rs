//! Summary aggregation: reduce the per-segment results and sample extremes
//! into one report block.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::distance::Extrapolation;
use crate::segments::SegmentResult;
use crate::Sample;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub measured_distance: f64,
    pub extrapolated_distance: f64,
    pub total_distance: f64,
    pub has_reference_sample: bool,
    pub time_to_reference_s: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub avg_speed_change: f64,
    /// Mean over segments whose rate is defined; `None` when every interval
    /// was degenerate.
    pub avg_decel_accel_rate: Option<f64>,
    /// Mean over finite drag factors only.
    pub avg_drag_factor: Option<f64>,
    pub significant_event_count: usize,
    pub time_span_s: f64,
}

/// Reduce one analysis pass into the aggregate summary. `samples` must be
/// time-ordered and non-empty.
pub fn summarize(
    samples: &[Sample],
    segments: &[SegmentResult],
    extrapolation: &Extrapolation,
) -> AnalysisSummary {
    let min_speed = samples
        .iter()
        .map(|s| OrderedFloat(s.speed))
        .min()
        .map(|v| v.0)
        .unwrap_or(0.0);
    let max_speed = samples
        .iter()
        .map(|s| OrderedFloat(s.speed))
        .max()
        .map(|v| v.0)
        .unwrap_or(0.0);

    let time_span_s = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => last.time_s - first.time_s,
        _ => 0.0,
    };

    AnalysisSummary {
        measured_distance: extrapolation.measured_distance,
        extrapolated_distance: extrapolation.extrapolated_distance,
        total_distance: extrapolation.total_distance,
        has_reference_sample: extrapolation.has_reference_sample,
        time_to_reference_s: extrapolation.time_to_reference_s,
        min_speed,
        max_speed,
        avg_speed_change: mean(segments.iter().map(|s| s.speed_change)).unwrap_or(0.0),
        avg_decel_accel_rate: mean(segments.iter().filter_map(|s| s.decel_accel_rate)),
        avg_drag_factor: mean(segments.iter().filter_map(|s| s.drag_factor)),
        significant_event_count: segments.iter().filter(|s| s.is_significant).count(),
        time_span_s,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values {
        sum += value;
        count += 1;
    }
    (count > 0).then(|| sum / count as f64)
}
