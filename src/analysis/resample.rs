use chrono::{DateTime, Duration, Utc};
use itertools::{Itertools, MinMaxResult};
use serde::Deserialize;
use serde::Serialize;

use crate::data::{BuoyDataTable, BuoyVariable};
use crate::tools::stats;

/// Fixed bucket width used to align observations onto a regular grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResampleInterval {
    Hourly,
    Daily,
    Weekly,
    /// Caller-chosen width in whole seconds
    Custom(i64),
}

impl ResampleInterval {
    pub fn width(&self) -> Duration {
        match self {
            ResampleInterval::Hourly => Duration::hours(1),
            ResampleInterval::Daily => Duration::days(1),
            ResampleInterval::Weekly => Duration::weeks(1),
            ResampleInterval::Custom(seconds) => Duration::seconds(*seconds),
        }
    }

    pub fn label(&self) -> String {
        match self {
            ResampleInterval::Hourly => "1H".into(),
            ResampleInterval::Daily => "1D".into(),
            ResampleInterval::Weekly => "1W".into(),
            ResampleInterval::Custom(seconds) => format!("{}S", seconds),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BucketAggregates {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
}

/// One fixed-width slot of the resampled grid. `aggregates` is `None` only
/// for leading slots with no earlier value to inherit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub start: DateTime<Utc>,
    pub aggregates: Option<BucketAggregates>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResampledSeries {
    pub interval: ResampleInterval,
    pub buckets: Vec<Bucket>,
}

impl ResampledSeries {
    fn empty(interval: ResampleInterval) -> Self {
        ResampledSeries {
            interval,
            buckets: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Buckets one variable of a table onto a fixed interval grid.
///
/// Observations older than `now - lookback` are dropped first. Bucket starts
/// align to epoch multiples of the interval width, and the grid runs
/// contiguously from the bucket of the earliest surviving observation through
/// the bucket of the latest. Each bucket aggregates the present values that
/// fall inside it; a bucket with none inherits the previous bucket's
/// aggregates. When nothing survives the lookback the series is empty.
pub fn resample(
    table: &BuoyDataTable,
    variable: BuoyVariable,
    interval: ResampleInterval,
    now: DateTime<Utc>,
    lookback: Duration,
) -> ResampledSeries {
    let width = interval.width().num_seconds();
    if width <= 0 {
        return ResampledSeries::empty(interval);
    }

    let cutoff = now - lookback;
    let surviving: Vec<(i64, Option<f64>)> = table
        .observations
        .iter()
        .filter(|o| o.timestamp >= cutoff)
        .map(|o| (o.timestamp.timestamp().div_euclid(width), variable.value(o)))
        .collect();

    let (first_slot, last_slot) = match surviving.iter().map(|(slot, _)| *slot).minmax() {
        MinMaxResult::NoElements => return ResampledSeries::empty(interval),
        MinMaxResult::OneElement(slot) => (slot, slot),
        MinMaxResult::MinMax(first, last) => (first, last),
    };

    let mut buckets = Vec::with_capacity((last_slot - first_slot + 1) as usize);
    let mut previous: Option<BucketAggregates> = None;

    for slot in first_slot..=last_slot {
        let values: Vec<f64> = surviving
            .iter()
            .filter(|(s, _)| *s == slot)
            .filter_map(|(_, value)| *value)
            .collect();

        let aggregates = if values.is_empty() {
            previous
        } else {
            let (min, max) = stats::min_max(&values);
            Some(BucketAggregates {
                mean: stats::mean(&values),
                min,
                max,
                std: stats::sample_std(&values),
            })
        };

        previous = aggregates;
        buckets.push(Bucket {
            start: DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(slot * width),
            aggregates,
        });
    }

    ResampledSeries { interval, buckets }
}
