use serde::Deserialize;
use serde::Serialize;

use crate::tools::stats;

/// Min-max scaler mapping the fitted data range onto [0, 1].
///
/// A degenerate range (constant or empty data) transforms every value to 0.5
/// and inverts back to the fitted minimum.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MinMaxScaler {
    min: f64,
    max: f64,
}

impl MinMaxScaler {
    pub fn fit(data: &[f64]) -> Self {
        if data.is_empty() {
            return MinMaxScaler { min: 0.0, max: 0.0 };
        }

        let (min, max) = stats::min_max(data);
        MinMaxScaler { min, max }
    }

    pub fn transform(&self, value: f64) -> f64 {
        let range = self.max - self.min;
        if range.abs() < f64::EPSILON {
            return 0.5;
        }

        (value - self.min) / range
    }

    pub fn inverse(&self, value: f64) -> f64 {
        let range = self.max - self.min;
        if range.abs() < f64::EPSILON {
            return self.min;
        }

        value * range + self.min
    }

    pub fn transform_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| self.transform(*v)).collect()
    }

    pub fn inverse_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| self.inverse(*v)).collect()
    }
}
