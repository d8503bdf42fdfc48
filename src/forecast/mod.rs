mod network;
pub mod scaler;

pub use scaler::MinMaxScaler;

use chrono::{DateTime, Duration, Utc};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::data::{BuoyDataTable, BuoyVariable};
use crate::tools::stats;

use self::network::SequenceNetwork;

/// Lower clamp for per-step forecast confidence
pub const CONFIDENCE_FLOOR: f64 = 0.3;
/// Upper clamp for per-step forecast confidence
pub const CONFIDENCE_CEILING: f64 = 0.95;

const VOLATILITY_CAP: f64 = 0.5;
const VALIDATION_FLOOR: usize = 5;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ForecastError {
    #[error("insufficient history: need at least {required} observed values, got {actual}")]
    InsufficientData { required: usize, actual: usize },
    #[error("forecaster has not been trained")]
    NotTrained,
}

/// Which variables feed the volatility term of the confidence model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceCoupling {
    /// Wave height and water temperature volatility jointly set the base,
    /// whichever variable is being forecast
    Joint,
    /// Only the forecast variable's own volatility sets the base
    PerVariable,
}

#[derive(Clone, Debug)]
pub struct ForecasterConfig {
    /// Length of the input window fed to the network
    pub sequence_length: usize,
    /// Number of future steps predicted per inference call
    pub horizon: usize,
    pub first_layer_units: usize,
    pub second_layer_units: usize,
    /// Inverted dropout rate between the recurrent layers, training only
    pub dropout: f64,
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
    /// Share of sliding windows held out, chronologically last, for scoring
    pub validation_split: f64,
    /// Native reporting cadence of the feed; forecast timestamps step by this
    pub step: Duration,
    pub coupling: ConfidenceCoupling,
    /// Seeds weight init, shuffling, and dropout for reproducible training
    pub seed: Option<u64>,
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        ForecasterConfig {
            sequence_length: 24,
            horizon: 24,
            first_layer_units: 32,
            second_layer_units: 16,
            dropout: 0.2,
            learning_rate: 1e-3,
            epochs: 30,
            batch_size: 32,
            validation_split: 0.2,
            step: Duration::hours(1),
            coupling: ConfidenceCoupling::Joint,
            seed: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TrainingReport {
    /// One minus the best validation MAE in scaled space; diagnostic only
    pub accuracy: f64,
    pub epochs: usize,
    pub examples: usize,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub confidence: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Forecast {
    pub location: String,
    pub variable: BuoyVariable,
    pub points: Vec<ForecastPoint>,
}

struct TrainedState {
    scaler: MinMaxScaler,
    network: SequenceNetwork,
}

/// Sequence-to-sequence forecaster for one variable of one station.
///
/// `train` fits a fresh min-max scaler and recurrent network on a history
/// table; `predict` runs one forward pass over the most recent window and
/// decorates each horizon step with a decaying confidence score. The scaler
/// and network always belong to the same training generation: a failed
/// retrain leaves the previous pair untouched.
pub struct SequenceForecaster {
    variable: BuoyVariable,
    config: ForecasterConfig,
    state: Option<TrainedState>,
}

impl SequenceForecaster {
    pub fn new(variable: BuoyVariable) -> Self {
        SequenceForecaster::with_config(variable, ForecasterConfig::default())
    }

    pub fn with_config(variable: BuoyVariable, config: ForecasterConfig) -> Self {
        SequenceForecaster {
            variable,
            config,
            state: None,
        }
    }

    pub fn variable(&self) -> BuoyVariable {
        self.variable
    }

    pub fn is_trained(&self) -> bool {
        self.state.is_some()
    }

    /// Trains a fresh scaler and network on the table's history.
    ///
    /// Needs strictly more than `sequence_length + horizon` present values of
    /// the forecast variable, enough for at least one sliding window. The
    /// returned accuracy is a rough diagnostic, not a calibrated score.
    pub fn train(&mut self, history: &BuoyDataTable) -> Result<TrainingReport, ForecastError> {
        let seq = self.config.sequence_length;
        let horizon = self.config.horizon;

        let values = history.values_chronological(self.variable);
        let required = seq + horizon + 1;
        if values.len() < required {
            return Err(ForecastError::InsufficientData {
                required,
                actual: values.len(),
            });
        }

        let scaler = MinMaxScaler::fit(&values);
        let scaled = scaler.transform_all(&values);

        let example_count = values.len() - seq - horizon;
        let mut inputs = Vec::with_capacity(example_count);
        let mut targets = Vec::with_capacity(example_count);
        for i in 0..example_count {
            inputs.push(scaled[i..i + seq].to_vec());
            targets.push(scaled[i + seq..i + seq + horizon].to_vec());
        }

        // the chronologically-latest windows score the model, the rest train it
        let val_count = if example_count < VALIDATION_FLOOR {
            0
        } else {
            (example_count as f64 * self.config.validation_split) as usize
        };
        let train_count = example_count - val_count;

        let (train_inputs, held_inputs) = inputs.split_at(train_count);
        let (train_targets, held_targets) = targets.split_at(train_count);
        let (val_inputs, val_targets) = if val_count == 0 {
            (train_inputs, train_targets)
        } else {
            (held_inputs, held_targets)
        };

        info!(
            "training {} forecaster on {} examples ({} held out)",
            self.variable, example_count, val_count
        );

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut network = SequenceNetwork::new(
            self.config.first_layer_units,
            self.config.second_layer_units,
            horizon,
            self.config.dropout,
            &mut rng,
        );
        let summary = network.fit(
            train_inputs,
            train_targets,
            val_inputs,
            val_targets,
            self.config.epochs,
            self.config.batch_size,
            self.config.learning_rate,
            &mut rng,
        );

        // scaler and weights swap in as one generation
        self.state = Some(TrainedState { scaler, network });

        Ok(TrainingReport {
            accuracy: 1.0 - summary.best_val_mae,
            epochs: self.config.epochs,
            examples: example_count,
        })
    }

    /// Predicts `horizon` future values from the most recent window.
    ///
    /// Timestamps anchor at the latest observed value of the forecast
    /// variable and advance by the configured step. Fails with `NotTrained`
    /// before the first successful `train`.
    pub fn predict(&self, recent: &BuoyDataTable) -> Result<Forecast, ForecastError> {
        let state = self.state.as_ref().ok_or(ForecastError::NotTrained)?;
        let seq = self.config.sequence_length;

        let series = recent.series_chronological(self.variable);
        if series.len() < seq {
            return Err(ForecastError::InsufficientData {
                required: seq,
                actual: series.len(),
            });
        }
        let (anchor, _) = *series.last().ok_or(ForecastError::InsufficientData {
            required: seq.max(1),
            actual: 0,
        })?;

        let window: Vec<f64> = series[series.len() - seq..]
            .iter()
            .map(|(_, value)| state.scaler.transform(*value))
            .collect();

        let scaled_outputs = state.network.forward(&window);
        let values = state.scaler.inverse_all(&scaled_outputs);

        let base = self.base_confidence(recent);
        let points = values
            .iter()
            .enumerate()
            .map(|(k, value)| {
                let decay = (-(k as f64) / seq.max(1) as f64).exp();
                ForecastPoint {
                    timestamp: anchor + self.config.step * (k as i32 + 1),
                    value: *value,
                    confidence: (base * decay).clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING),
                }
            })
            .collect();

        Ok(Forecast {
            location: recent.location.clone(),
            variable: self.variable,
            points,
        })
    }

    /// Base trust before horizon decay: one minus the recent volatility
    /// ratio, which is capped so the base never drops below one half.
    fn base_confidence(&self, recent: &BuoyDataTable) -> f64 {
        let ratio = match self.config.coupling {
            ConfidenceCoupling::Joint => {
                let heights = self.tail_values(recent, BuoyVariable::WaveHeight);
                let temps = self.tail_values(recent, BuoyVariable::WaterTemperature);
                volatility_ratio(
                    stats::population_std(&heights) + stats::population_std(&temps),
                    stats::mean(&heights) + stats::mean(&temps),
                )
            }
            ConfidenceCoupling::PerVariable => {
                let values = self.tail_values(recent, self.variable);
                volatility_ratio(stats::population_std(&values), stats::mean(&values))
            }
        };

        1.0 - ratio
    }

    fn tail_values(&self, table: &BuoyDataTable, variable: BuoyVariable) -> Vec<f64> {
        let values = table.values_chronological(variable);
        let start = values.len().saturating_sub(self.config.sequence_length);
        values[start..].to_vec()
    }
}

fn volatility_ratio(sigma: f64, mu: f64) -> f64 {
    if mu <= 0.0 {
        return VOLATILITY_CAP;
    }

    (sigma / mu).min(VOLATILITY_CAP)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use crate::data::BuoyObservation;

    use super::*;

    fn test_config() -> ForecasterConfig {
        ForecasterConfig {
            sequence_length: 6,
            horizon: 3,
            first_layer_units: 6,
            second_layer_units: 4,
            epochs: 2,
            batch_size: 8,
            seed: Some(7),
            ..Default::default()
        }
    }

    /// Newest-first table of `count` hourly reports with oscillating wave
    /// height and steady water temperature
    fn hourly_table(count: usize) -> BuoyDataTable {
        let start = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        let observations = (0..count)
            .rev()
            .map(|i| BuoyObservation {
                timestamp: start + Duration::hours(i as i64),
                wave_height: Some(1.5 + 0.5 * ((i % 2) as f64)),
                water_temp: Some(17.0),
                ..Default::default()
            })
            .collect();

        BuoyDataTable::new("Scripps", observations)
    }

    #[test]
    fn test_train_rejects_window_sized_history() {
        let mut forecaster = SequenceForecaster::with_config(BuoyVariable::WaveHeight, test_config());

        // exactly sequence_length + horizon values leave no room for a window
        let err = forecaster.train(&hourly_table(9)).unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientData {
                required: 10,
                actual: 9
            }
        );
        assert!(!forecaster.is_trained());
    }

    #[test]
    fn test_predict_before_train_fails() {
        let forecaster = SequenceForecaster::with_config(BuoyVariable::WaveHeight, test_config());

        let err = forecaster.predict(&hourly_table(24)).unwrap_err();
        assert_eq!(err, ForecastError::NotTrained);
    }

    #[test]
    fn test_train_then_predict() {
        let mut forecaster = SequenceForecaster::with_config(BuoyVariable::WaveHeight, test_config());
        let table = hourly_table(20);

        let report = forecaster.train(&table).unwrap();
        assert_eq!(report.examples, 11);
        assert!(forecaster.is_trained());

        let forecast = forecaster.predict(&table).unwrap();
        assert_eq!(forecast.points.len(), 3);
        assert_eq!(forecast.location, "Scripps");

        let anchor = table.latest().unwrap().timestamp;
        for (k, point) in forecast.points.iter().enumerate() {
            assert_eq!(point.timestamp, anchor + Duration::hours(k as i64 + 1));
            assert!(point.confidence >= CONFIDENCE_FLOOR);
            assert!(point.confidence <= CONFIDENCE_CEILING);
            assert!(point.value.is_finite());
        }
    }

    #[test]
    fn test_confidence_never_increases_along_horizon() {
        let mut forecaster = SequenceForecaster::with_config(BuoyVariable::WaveHeight, test_config());
        let table = hourly_table(20);

        forecaster.train(&table).unwrap();
        let forecast = forecaster.predict(&table).unwrap();

        for pair in forecast.points.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_predict_needs_full_window() {
        let mut forecaster = SequenceForecaster::with_config(BuoyVariable::WaveHeight, test_config());
        forecaster.train(&hourly_table(20)).unwrap();

        let err = forecaster.predict(&hourly_table(4)).unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientData {
                required: 6,
                actual: 4
            }
        );
    }

    #[test]
    fn test_failed_retrain_keeps_previous_generation() {
        let mut forecaster = SequenceForecaster::with_config(BuoyVariable::WaveHeight, test_config());
        let table = hourly_table(20);

        forecaster.train(&table).unwrap();
        let before = forecaster.predict(&table).unwrap();

        assert!(forecaster.train(&hourly_table(5)).is_err());
        assert!(forecaster.is_trained());

        let after = forecaster.predict(&table).unwrap();
        assert_eq!(before.points.len(), after.points.len());
        assert_eq!(before.points[0].value, after.points[0].value);
    }

    #[test]
    fn test_per_variable_coupling_ignores_other_columns() {
        let config = ForecasterConfig {
            coupling: ConfidenceCoupling::PerVariable,
            ..test_config()
        };
        let mut forecaster = SequenceForecaster::with_config(BuoyVariable::WaveHeight, config);

        // water temperature missing everywhere; only wave height should matter
        let start = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        let observations = (0..20)
            .rev()
            .map(|i| BuoyObservation {
                timestamp: start + Duration::hours(i as i64),
                wave_height: Some(2.0),
                ..Default::default()
            })
            .collect();
        let table = BuoyDataTable::new("Scripps", observations);

        forecaster.train(&table).unwrap();
        let forecast = forecaster.predict(&table).unwrap();

        // constant series has zero volatility, so the first step sits at the ceiling
        assert_eq!(forecast.points[0].confidence, CONFIDENCE_CEILING);
    }

    #[test]
    fn test_volatility_ratio_saturates() {
        assert_eq!(volatility_ratio(1.0, 0.0), 0.5);
        assert_eq!(volatility_ratio(1.0, -2.0), 0.5);
        assert_eq!(volatility_ratio(9.0, 2.0), 0.5);
        assert!((volatility_ratio(0.5, 2.0) - 0.25).abs() < 1e-12);
    }
}
