use std::fmt;

use chrono::prelude::*;
use chrono::Utc;
use csv::Reader;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ObservationParseError {
    #[error("expected {expected} fields per observation row, found {actual}")]
    MissingFields { expected: usize, actual: usize },
    #[error("invalid timestamp components: {0}")]
    InvalidTimestamp(String),
    #[error("malformed feed row: {0}")]
    MalformedRow(String),
}

/// One timestamped sensor report from a buoy station. Every measured field is
/// optional; the feed's missing sentinel maps to `None`, never a placeholder.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BuoyObservation {
    pub timestamp: chrono::DateTime<Utc>,
    pub wind_direction: Option<f64>,
    pub wind_speed: Option<f64>,
    pub gust_speed: Option<f64>,
    pub wave_height: Option<f64>,
    pub dominant_wave_period: Option<f64>,
    pub average_wave_period: Option<f64>,
    pub wave_direction: Option<f64>,
    pub pressure: Option<f64>,
    pub air_temp: Option<f64>,
    pub water_temp: Option<f64>,
    pub dewpoint: Option<f64>,
    pub visibility: Option<f64>,
    pub pressure_tendency: Option<f64>,
    pub tide: Option<f64>,
}

const OBSERVATION_FIELD_COUNT: usize = 19;

impl BuoyObservation {
    /// Parses one whitespace-split realtime2 data row. The first five fields
    /// are the timestamp components; the rest are measurements in feed order.
    pub fn from_data_row(row: &[&str]) -> Result<BuoyObservation, ObservationParseError> {
        if row.len() < OBSERVATION_FIELD_COUNT {
            return Err(ObservationParseError::MissingFields {
                expected: OBSERVATION_FIELD_COUNT,
                actual: row.len(),
            });
        }

        let timestamp = parse_timestamp(&row[0..5])?;

        Ok(BuoyObservation {
            timestamp,
            wind_direction: parse_measurement(row[5]),
            wind_speed: parse_measurement(row[6]),
            gust_speed: parse_measurement(row[7]),
            wave_height: parse_measurement(row[8]),
            dominant_wave_period: parse_measurement(row[9]),
            average_wave_period: parse_measurement(row[10]),
            wave_direction: parse_measurement(row[11]),
            pressure: parse_measurement(row[12]),
            air_temp: parse_measurement(row[13]),
            water_temp: parse_measurement(row[14]),
            dewpoint: parse_measurement(row[15]),
            visibility: parse_measurement(row[16]),
            pressure_tendency: parse_measurement(row[17]),
            tide: parse_measurement(row[18]),
        })
    }
}

fn parse_timestamp(components: &[&str]) -> Result<chrono::DateTime<Utc>, ObservationParseError> {
    let invalid = || ObservationParseError::InvalidTimestamp(components.join(" "));

    let year: i32 = components[0].parse().map_err(|_| invalid())?;
    let month: u32 = components[1].parse().map_err(|_| invalid())?;
    let day: u32 = components[2].parse().map_err(|_| invalid())?;
    let hour: u32 = components[3].parse().map_err(|_| invalid())?;
    let minute: u32 = components[4].parse().map_err(|_| invalid())?;

    Utc.with_ymd_and_hms(resolve_year(year), month, day, hour, minute, 0)
        .single()
        .ok_or_else(invalid)
}

/// Two-digit years are reported relative to 2000; anything wider passes
/// through unchanged.
fn resolve_year(year: i32) -> i32 {
    if year < 100 {
        2000 + year
    } else {
        year
    }
}

fn parse_measurement(raw: &str) -> Option<f64> {
    // The feed marks missing values with "MM"; anything non-numeric reads the same
    raw.parse().ok()
}

/// Which measured column of an observation a computation runs over
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuoyVariable {
    WaveHeight,
    DominantWavePeriod,
    AverageWavePeriod,
    WaterTemperature,
    AirTemperature,
    WindSpeed,
    GustSpeed,
    Pressure,
}

impl BuoyVariable {
    pub fn value(&self, observation: &BuoyObservation) -> Option<f64> {
        match self {
            BuoyVariable::WaveHeight => observation.wave_height,
            BuoyVariable::DominantWavePeriod => observation.dominant_wave_period,
            BuoyVariable::AverageWavePeriod => observation.average_wave_period,
            BuoyVariable::WaterTemperature => observation.water_temp,
            BuoyVariable::AirTemperature => observation.air_temp,
            BuoyVariable::WindSpeed => observation.wind_speed,
            BuoyVariable::GustSpeed => observation.gust_speed,
            BuoyVariable::Pressure => observation.pressure,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuoyVariable::WaveHeight => "wave height",
            BuoyVariable::DominantWavePeriod => "dominant wave period",
            BuoyVariable::AverageWavePeriod => "average wave period",
            BuoyVariable::WaterTemperature => "water temperature",
            BuoyVariable::AirTemperature => "air temperature",
            BuoyVariable::WindSpeed => "wind speed",
            BuoyVariable::GustSpeed => "gust speed",
            BuoyVariable::Pressure => "pressure",
        }
    }
}

impl fmt::Display for BuoyVariable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub struct BuoyObservationCollection<'a> {
    reader: Reader<&'a [u8]>,
}

impl<'a> BuoyObservationCollection<'a> {
    pub fn from_data(data: &'a str) -> Self {
        let reader = csv::ReaderBuilder::new()
            .delimiter(b' ')
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .has_headers(false)
            .flexible(true)
            .from_reader(data.as_bytes());

        BuoyObservationCollection { reader }
    }

    pub fn records(
        &'a mut self,
    ) -> impl Iterator<Item = Result<BuoyObservation, ObservationParseError>> + 'a {
        self.reader.records().map(|result| match result {
            Ok(record) => {
                let fields: Vec<&str> =
                    record.iter().filter(|field| !field.is_empty()).collect();
                BuoyObservation::from_data_row(&fields)
            }
            Err(e) => Err(ObservationParseError::MalformedRow(e.to_string())),
        })
    }
}
