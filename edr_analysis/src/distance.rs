//! Distance accumulation and the constant-terminal-speed extrapolation to the
//! reference instant.

use serde::{Deserialize, Serialize};

use crate::segments::SegmentResult;
use crate::{AnalysisParams, Sample};

/// Distance totals plus the reference-instant gap estimate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Extrapolation {
    /// True iff some sample's time falls within the configured tolerance of
    /// zero.
    pub has_reference_sample: bool,
    pub time_to_reference_s: f64,
    /// Sum of trapezoidal segment distances.
    pub measured_distance: f64,
    /// Distance covered between the final sample and the reference instant,
    /// holding the terminal speed constant. Zero when a reference sample
    /// exists.
    pub extrapolated_distance: f64,
    pub total_distance: f64,
}

/// Integrate measured distance and estimate the remaining gap to time zero.
///
/// The engine has no information about what happens after the final sample,
/// so the gap is covered at the terminal speed. `samples` must already be
/// time-ordered; the sample closest to the reference instant is the last one.
pub fn extrapolate(
    samples: &[Sample],
    segments: &[SegmentResult],
    params: &AnalysisParams,
) -> Extrapolation {
    let measured_distance = segments
        .last()
        .map(|s| s.cumulative_distance)
        .unwrap_or(0.0);

    let has_reference_sample = samples
        .iter()
        .any(|s| s.time_s.abs() <= params.reference_epsilon_s);

    let final_sample = samples.last().copied().unwrap_or(Sample {
        time_s: 0.0,
        speed: 0.0,
    });
    let time_to_reference_s = final_sample.time_s.abs();

    let extrapolated_distance = if has_reference_sample {
        0.0
    } else {
        params
            .unit_system
            .speed_to_distance_per_sec(final_sample.speed)
            * time_to_reference_s
    };

    Extrapolation {
        has_reference_sample,
        time_to_reference_s,
        measured_distance,
        extrapolated_distance,
        total_distance: measured_distance + extrapolated_distance,
    }
}
