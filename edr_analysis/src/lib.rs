//! Core EDR time-series kinematic analysis library implemented in Rust.
//!
//! Ingests paired time/speed channels exported from an event data recorder,
//! validates and time-orders them, derives per-interval kinematics, integrates
//! traveled distance, and extrapolates the remaining gap to the reference
//! instant when no sample sits at time zero. Each invocation is a pure
//! function of its two channel blobs and the unit-system selector.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub mod distance;
pub mod segments;
pub mod summary;
pub mod units;

pub use distance::Extrapolation;
pub use segments::SegmentResult;
pub use summary::AnalysisSummary;
pub use units::UnitSystem;

#[derive(Error, Debug)]
pub enum EdrError {
    #[error("invalid numeric token: '{0}'")]
    Parse(String),
    #[error("channel length mismatch: {time_count} time samples vs {speed_count} speed samples")]
    LengthMismatch {
        time_count: usize,
        speed_count: usize,
    },
    #[error("insufficient samples: {0} (need at least 2)")]
    InsufficientSamples(usize),
    #[error("sample times after the reference instant: {0:?}")]
    InvalidTime(Vec<f64>),
    #[error("negative sample speeds: {0:?}")]
    InvalidSpeed(Vec<f64>),
}

/// Analysis knobs. All numeric constants the engine branches on live here or
/// in [`units`], never inline in the pipeline stages.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisParams {
    pub unit_system: UnitSystem,
    /// Speed-change magnitude (active speed unit) above which a segment is
    /// flagged as a significant event.
    pub significant_speed_change: f64,
    /// Tolerance in seconds when deciding whether a sample sits at the
    /// reference instant. Zero requires an exact `time == 0` match.
    pub reference_epsilon_s: f64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            unit_system: UnitSystem::Imperial,
            significant_speed_change: 10.0,
            reference_epsilon_s: 0.0,
        }
    }
}

impl AnalysisParams {
    pub fn params_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }

    /// Stable fingerprint of the parameter set, carried in reports so results
    /// can be tied back to the exact configuration that produced them.
    pub fn params_hash_sha256(&self) -> String {
        let bytes = serde_json::to_vec(&self.params_json()).unwrap_or_default();
        sha256_hex(&bytes)
    }
}

/// One recorded sample: seconds relative to the reference instant
/// (non-positive by convention) and a speed magnitude in the active speed
/// unit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time_s: f64,
    pub speed: f64,
}

/// Full result of one analysis run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Analysis {
    pub params: AnalysisParams,
    pub params_hash: String,
    /// Validated samples, ascending by time.
    pub samples: Vec<Sample>,
    /// One entry per adjacent sample pair, in time order.
    pub segments: Vec<SegmentResult>,
    pub summary: AnalysisSummary,
}

/// Iterate the tokens of a delimited channel blob: split on any run of
/// newline, carriage-return, comma, or tab characters, trimmed, empties
/// skipped.
pub fn channel_tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\n', '\r', ',', '\t'])
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Parse one channel blob into an ordered numeric sequence, preserving input
/// order. The first token that is not a valid float fails the run.
pub fn parse_channel(text: &str) -> Result<Array1<f64>, EdrError> {
    let mut values = Vec::new();
    for token in channel_tokens(text) {
        let value = token
            .parse::<f64>()
            .map_err(|_| EdrError::Parse(token.to_string()))?;
        values.push(value);
    }
    Ok(Array1::from_vec(values))
}

/// Cross-validate the two parsed channels and zip them into a time-ordered
/// sample set.
pub fn build_sample_set(
    times: &Array1<f64>,
    speeds: &Array1<f64>,
) -> Result<Vec<Sample>, EdrError> {
    if times.len() != speeds.len() {
        return Err(EdrError::LengthMismatch {
            time_count: times.len(),
            speed_count: speeds.len(),
        });
    }
    if times.len() < 2 {
        return Err(EdrError::InsufficientSamples(times.len()));
    }

    let bad_times: Vec<f64> = times.iter().copied().filter(|&t| t > 0.0).collect();
    if !bad_times.is_empty() {
        return Err(EdrError::InvalidTime(bad_times));
    }
    let bad_speeds: Vec<f64> = speeds.iter().copied().filter(|&s| s < 0.0).collect();
    if !bad_speeds.is_empty() {
        return Err(EdrError::InvalidSpeed(bad_speeds));
    }

    let mut samples: Vec<Sample> = times
        .iter()
        .zip(speeds.iter())
        .map(|(&time_s, &speed)| Sample { time_s, speed })
        .collect();
    samples.sort_by(|a, b| {
        a.time_s
            .partial_cmp(&b.time_s)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(samples)
}

/// Run the full pipeline on two raw channel blobs.
pub fn analyze(
    time_text: &str,
    speed_text: &str,
    params: &AnalysisParams,
) -> Result<Analysis, EdrError> {
    let times = parse_channel(time_text)?;
    let speeds = parse_channel(speed_text)?;
    let samples = build_sample_set(&times, &speeds)?;
    let segments = segments::compute_segments(&samples, params);
    let extrapolation = distance::extrapolate(&samples, &segments, params);
    let summary = summary::summarize(&samples, &segments, &extrapolation);
    Ok(Analysis {
        params: params.clone(),
        params_hash: params.params_hash_sha256(),
        samples,
        segments,
        summary,
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel_mixed_delimiters() {
        let parsed = parse_channel("-5.0, -4.0\n-3.0\t-2.0\r\n-1.0").unwrap();
        assert_eq!(parsed.to_vec(), vec![-5.0, -4.0, -3.0, -2.0, -1.0]);
    }

    #[test]
    fn test_parse_channel_rejects_bad_token() {
        let err = parse_channel("-2.0, n/a, 0.0").unwrap_err();
        match err {
            EdrError::Parse(token) => assert_eq!(token, "n/a"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_build_sample_set_length_mismatch() {
        let times = Array1::from_vec(vec![-2.0, -1.0, 0.0]);
        let speeds = Array1::from_vec(vec![40.0, 20.0]);
        match build_sample_set(&times, &speeds).unwrap_err() {
            EdrError::LengthMismatch {
                time_count,
                speed_count,
            } => {
                assert_eq!(time_count, 3);
                assert_eq!(speed_count, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_build_sample_set_insufficient() {
        let times = Array1::from_vec(vec![-1.0]);
        let speeds = Array1::from_vec(vec![30.0]);
        match build_sample_set(&times, &speeds).unwrap_err() {
            EdrError::InsufficientSamples(count) => assert_eq!(count, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_build_sample_set_reports_all_positive_times() {
        let times = Array1::from_vec(vec![1.0, -1.0, 0.5]);
        let speeds = Array1::from_vec(vec![10.0, 10.0, 10.0]);
        match build_sample_set(&times, &speeds).unwrap_err() {
            EdrError::InvalidTime(bad) => assert_eq!(bad, vec![1.0, 0.5]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_build_sample_set_reports_negative_speeds() {
        let times = Array1::from_vec(vec![-2.0, -1.0]);
        let speeds = Array1::from_vec(vec![-40.0, 20.0]);
        match build_sample_set(&times, &speeds).unwrap_err() {
            EdrError::InvalidSpeed(bad) => assert_eq!(bad, vec![-40.0]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_build_sample_set_sorts_ascending() {
        let times = Array1::from_vec(vec![0.0, -2.0, -1.0]);
        let speeds = Array1::from_vec(vec![0.0, 40.0, 20.0]);
        let samples = build_sample_set(&times, &speeds).unwrap();
        let order: Vec<f64> = samples.iter().map(|s| s.time_s).collect();
        assert_eq!(order, vec![-2.0, -1.0, 0.0]);
        assert_eq!(samples[0].speed, 40.0);
    }

    #[test]
    fn test_analyze_braking_to_rest_imperial() {
        let params = AnalysisParams::default();
        let analysis = analyze("-2, -1, 0", "40, 20, 0", &params).unwrap();

        assert_eq!(analysis.segments.len(), 2);
        let first = &analysis.segments[0];
        assert!((first.speed_change + 20.0).abs() < 1e-9);
        assert!((first.decel_accel_rate.unwrap() + 29.32).abs() < 1e-9);
        assert!((first.drag_factor.unwrap() - 0.621).abs() < 1e-3);
        assert!((first.segment_distance - 43.98).abs() < 1e-9);
        assert!((analysis.segments[1].segment_distance - 14.66).abs() < 1e-9);

        let summary = &analysis.summary;
        assert!((summary.measured_distance - 58.64).abs() < 1e-9);
        assert!(summary.has_reference_sample);
        assert!((summary.extrapolated_distance).abs() < 1e-12);
        assert!((summary.total_distance - 58.64).abs() < 1e-9);
        assert_eq!(summary.significant_event_count, 2);
        assert!((summary.time_span_s - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_analyze_without_reference_sample() {
        let params = AnalysisParams::default();
        let analysis = analyze("-3, -2, -1", "50, 40, 30", &params).unwrap();

        let summary = &analysis.summary;
        assert!(!summary.has_reference_sample);
        assert!((summary.time_to_reference_s - 1.0).abs() < 1e-12);
        assert!((summary.extrapolated_distance - 43.98).abs() < 1e-9);
        assert!(
            (summary.total_distance - summary.measured_distance - 43.98).abs() < 1e-9
        );
    }

    #[test]
    fn test_analyze_rejects_post_reference_time() {
        let params = AnalysisParams::default();
        match analyze("1, -1", "10, 10", &params).unwrap_err() {
            EdrError::InvalidTime(bad) => assert_eq!(bad, vec![1.0]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_analyze_reference_epsilon_tolerance() {
        let params = AnalysisParams {
            reference_epsilon_s: 0.01,
            ..AnalysisParams::default()
        };
        let analysis = analyze("-2.0, -0.005", "40, 20", &params).unwrap();
        assert!(analysis.summary.has_reference_sample);
        assert!(analysis.summary.extrapolated_distance.abs() < 1e-12);
    }

    #[test]
    fn test_analyze_typical_pre_event_trace() {
        // Five pre-event trigger speeds and the rest instant, one second apart.
        let time_text = "-5.0\n-4.0\n-3.0\n-2.0\n-1.0\n0.0";
        let speed_text = "45.2\n44.8\n44.1\n43.5\n42.9\n0.0";
        let analysis = analyze(time_text, speed_text, &AnalysisParams::default()).unwrap();

        assert_eq!(analysis.segments.len(), 5);
        assert_eq!(analysis.summary.significant_event_count, 1);
        assert!((analysis.summary.max_speed - 45.2).abs() < 1e-12);
        assert!((analysis.summary.min_speed).abs() < 1e-12);
        assert!(analysis.summary.has_reference_sample);
        assert!(analysis.summary.measured_distance > 0.0);
    }

    #[test]
    fn test_params_hash_tracks_configuration() {
        let a = AnalysisParams::default();
        let b = AnalysisParams {
            unit_system: UnitSystem::Metric,
            ..AnalysisParams::default()
        };
        assert_eq!(a.params_hash_sha256(), AnalysisParams::default().params_hash_sha256());
        assert_ne!(a.params_hash_sha256(), b.params_hash_sha256());
    }
}
