use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde::Serialize;

use crate::tools::stats;

use super::observation::{
    BuoyObservation, BuoyObservationCollection, BuoyVariable, ObservationParseError,
};

/// All parsed observations for one station, tagged with its logical location.
/// Rows keep the feed's most recent first ordering. An empty table is valid
/// and distinct from a failed fetch, which produces no table at all.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuoyDataTable {
    pub location: String,
    pub observations: Vec<BuoyObservation>,
}

impl BuoyDataTable {
    pub fn new(location: &str, observations: Vec<BuoyObservation>) -> Self {
        BuoyDataTable {
            location: location.into(),
            observations,
        }
    }

    /// Parses a full realtime2 feed into a table. Any structural failure,
    /// short rows or unbuildable timestamps, discards the whole feed.
    pub fn from_raw_data(location: &str, raw: &str) -> Result<Self, ObservationParseError> {
        let mut collection = BuoyObservationCollection::from_data(raw);
        let observations = collection
            .records()
            .collect::<Result<Vec<BuoyObservation>, ObservationParseError>>()?;

        Ok(BuoyDataTable::new(location, observations))
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// The most recent observation, if any
    pub fn latest(&self) -> Option<&BuoyObservation> {
        self.observations.first()
    }

    /// The most recent `count` observations, newest first
    pub fn history(&self, count: usize) -> &[BuoyObservation] {
        &self.observations[..count.min(self.observations.len())]
    }

    /// A new table holding only observations within `window` of `now`
    pub fn recent(&self, window: Duration, now: DateTime<Utc>) -> BuoyDataTable {
        let cutoff = now - window;
        let observations = self
            .observations
            .iter()
            .filter(|o| o.timestamp >= cutoff)
            .cloned()
            .collect();

        BuoyDataTable {
            location: self.location.clone(),
            observations,
        }
    }

    /// Present values of one variable in oldest to newest order
    pub fn values_chronological(&self, variable: BuoyVariable) -> Vec<f64> {
        self.observations
            .iter()
            .rev()
            .filter_map(|o| variable.value(o))
            .collect()
    }

    /// Timestamped present values of one variable in oldest to newest order
    pub fn series_chronological(
        &self,
        variable: BuoyVariable,
    ) -> Vec<(DateTime<Utc>, f64)> {
        self.observations
            .iter()
            .rev()
            .filter_map(|o| variable.value(o).map(|v| (o.timestamp, v)))
            .collect()
    }

    /// Snapshot of the latest report, `None` for an empty table
    pub fn current_conditions(&self) -> Option<CurrentConditions> {
        self.latest().map(|latest| CurrentConditions {
            location: self.location.clone(),
            timestamp: latest.timestamp,
            wave_height: latest.wave_height,
            dominant_wave_period: latest.dominant_wave_period,
            average_wave_period: latest.average_wave_period,
            water_temp: latest.water_temp,
            wind_speed: latest.wind_speed,
            wind_direction: latest.wind_direction,
        })
    }

    /// Max and average wave height and dominant period over the whole table
    pub fn condition_summary(&self) -> ConditionSummary {
        let heights = self.values_chronological(BuoyVariable::WaveHeight);
        let periods = self.values_chronological(BuoyVariable::DominantWavePeriod);

        let (height_max, height_avg) = column_summary(&heights);
        let (period_max, period_avg) = column_summary(&periods);

        ConditionSummary {
            max_wave_height: height_max,
            average_wave_height: height_avg,
            max_dominant_period: period_max,
            average_dominant_period: period_avg,
        }
    }
}

fn column_summary(values: &[f64]) -> (Option<f64>, Option<f64>) {
    if values.is_empty() {
        return (None, None);
    }

    let (_, max) = stats::min_max(values);
    (Some(max), Some(stats::mean(values)))
}

/// The latest report of one station, shaped for presentation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub wave_height: Option<f64>,
    pub dominant_wave_period: Option<f64>,
    pub average_wave_period: Option<f64>,
    pub water_temp: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConditionSummary {
    pub max_wave_height: Option<f64>,
    pub average_wave_height: Option<f64>,
    pub max_dominant_period: Option<f64>,
    pub average_dominant_period: Option<f64>,
}
