use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::tools::stats;

use super::resample::ResampledSeries;

/// Slopes within this magnitude classify as stable. The threshold is in the
/// units of the measured variable and is deliberately not auto-scaled.
pub const STABLE_SLOPE_THRESHOLD: f64 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrendResult {
    pub direction: TrendDirection,
    pub change_percentage: f64,
    /// Goodness of fit of the trend line, squared Pearson correlation
    pub confidence: f64,
}

impl TrendResult {
    fn stable() -> Self {
        TrendResult {
            direction: TrendDirection::Stable,
            change_percentage: 0.0,
            confidence: 0.0,
        }
    }

    /// Confidence rounded to two decimal places for presentation
    pub fn rounded_confidence(&self) -> f64 {
        (self.confidence * 100.0).round() / 100.0
    }
}

/// Fits a least-squares line to the bucket means of a resampled series.
///
/// Only buckets carrying aggregates contribute; forward-filled buckets count,
/// leading absent buckets are skipped. Fewer than two usable buckets, or a
/// constant series, reports a stable trend with zero confidence.
pub fn analyze_trend(series: &ResampledSeries) -> TrendResult {
    let means: Vec<f64> = series
        .buckets
        .iter()
        .filter_map(|bucket| bucket.aggregates.map(|a| a.mean))
        .collect();

    if means.len() < 2 {
        return TrendResult::stable();
    }

    let indices: Vec<f64> = (0..means.len()).map(|i| i as f64).collect();
    let (slope, _) = stats::least_squares_line(&indices, &means);

    let direction = if slope.abs() <= STABLE_SLOPE_THRESHOLD {
        TrendDirection::Stable
    } else if slope > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    let first = means[0];
    let last = means[means.len() - 1];
    let change_percentage = if first == 0.0 {
        0.0
    } else {
        (last - first) / first * 100.0
    };

    let r = stats::pearson_r(&indices, &means);

    TrendResult {
        direction,
        change_percentage,
        confidence: r * r,
    }
}
