use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use log::warn;
use thiserror::Error;

use crate::analysis::{analyze_trend, resample, ResampleInterval, ResampledSeries, TrendResult};
use crate::data::{
    BuoyDataTable, BuoyObservation, BuoyVariable, CurrentConditions, ObservationParseError,
};
use crate::fetch::{BuoyDataProvider, FetchError};
use crate::station::BuoyStation;

#[derive(Debug, Error)]
pub enum StationError {
    #[error("no station registered for location {0:?}")]
    UnknownLocation(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ObservationParseError),
}

/// Ordered mapping from logical location names to buoy stations.
///
/// Built once and reused; fetching goes through an injected
/// [`BuoyDataProvider`] so orchestration is testable without the network.
pub struct StationRegistry {
    stations: Vec<(String, BuoyStation)>,
}

impl StationRegistry {
    pub fn new() -> Self {
        StationRegistry {
            stations: Vec::new(),
        }
    }

    /// The four Southern California nearshore stations the service launched with
    pub fn with_default_stations() -> Self {
        let mut registry = StationRegistry::new();
        registry.register("Scripps", BuoyStation::new("46254", "Scripps Nearshore"));
        registry.register("Torrey Pines", BuoyStation::new("46273", "Torrey Pines Outer"));
        registry.register("Del Mar", BuoyStation::new("46266", "Del Mar Nearshore"));
        registry.register(
            "Imperial Beach",
            BuoyStation::new("46235", "Imperial Beach Nearshore"),
        );
        registry
    }

    pub fn register(&mut self, location: &str, station: BuoyStation) {
        self.stations.push((location.into(), station));
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.stations.iter().map(|(location, _)| location.as_str())
    }

    /// Case-insensitive lookup of a registered station
    pub fn find_station(&self, location: &str) -> Option<&BuoyStation> {
        self.entry(location).map(|(_, station)| station)
    }

    /// Fetches and parses one location's feed, tagging rows with the
    /// registered location name
    pub fn fetch_location<P: BuoyDataProvider>(
        &self,
        provider: &P,
        location: &str,
    ) -> Result<BuoyDataTable, StationError> {
        let (name, station) = self
            .entry(location)
            .ok_or_else(|| StationError::UnknownLocation(location.into()))?;

        fetch_station(provider, name, station)
    }

    /// Fetches every registered station. A station whose fetch or parse fails
    /// is logged and omitted; partial success is the normal outcome.
    pub fn fetch_all<P: BuoyDataProvider>(&self, provider: &P) -> HashMap<String, BuoyDataTable> {
        let mut tables = HashMap::with_capacity(self.stations.len());

        for (location, station) in &self.stations {
            match fetch_station(provider, location, station) {
                Ok(table) => {
                    tables.insert(location.clone(), table);
                }
                Err(e) => {
                    warn!("dropping station {} ({}): {}", location, station.station_id, e);
                }
            }
        }

        tables
    }

    fn entry(&self, location: &str) -> Option<(&str, &BuoyStation)> {
        self.stations
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(location))
            .map(|(name, station)| (name.as_str(), station))
    }
}

impl Default for StationRegistry {
    fn default() -> Self {
        StationRegistry::with_default_stations()
    }
}

fn fetch_station<P: BuoyDataProvider>(
    provider: &P,
    location: &str,
    station: &BuoyStation,
) -> Result<BuoyDataTable, StationError> {
    let raw = provider.fetch_raw(station)?;
    Ok(BuoyDataTable::from_raw_data(location, &raw)?)
}

/// Latest report per station of a fetched batch; empty tables contribute nothing
pub fn batch_current_conditions(
    batch: &HashMap<String, BuoyDataTable>,
) -> HashMap<String, CurrentConditions> {
    batch
        .iter()
        .filter_map(|(location, table)| {
            table
                .current_conditions()
                .map(|conditions| (location.clone(), conditions))
        })
        .collect()
}

/// The most recent `count` observations per station of a fetched batch,
/// newest first
pub fn batch_history(
    batch: &HashMap<String, BuoyDataTable>,
    count: usize,
) -> HashMap<String, Vec<BuoyObservation>> {
    batch
        .iter()
        .map(|(location, table)| (location.clone(), table.history(count).to_vec()))
        .collect()
}

/// Resamples one variable and fits a trend per station of a fetched batch
pub fn batch_trends(
    batch: &HashMap<String, BuoyDataTable>,
    variable: BuoyVariable,
    interval: ResampleInterval,
    now: DateTime<Utc>,
    lookback: Duration,
) -> HashMap<String, (ResampledSeries, TrendResult)> {
    batch
        .iter()
        .map(|(location, table)| {
            let series = resample(table, variable, interval, now, lookback);
            let trend = analyze_trend(&series);
            (location.clone(), (series, trend))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike};

    use super::*;

    struct FakeProvider {
        feeds: HashMap<String, String>,
    }

    impl FakeProvider {
        fn new(feeds: &[(&str, &str)]) -> Self {
            FakeProvider {
                feeds: feeds
                    .iter()
                    .map(|(id, feed)| (id.to_string(), feed.to_string()))
                    .collect(),
            }
        }
    }

    impl BuoyDataProvider for FakeProvider {
        fn fetch_raw(&self, station: &BuoyStation) -> Result<String, FetchError> {
            self.feeds
                .get(&station.station_id)
                .cloned()
                .ok_or(FetchError::Status(404))
        }
    }

    const SAMPLE_FEED: &str = "\
#YY  MM DD hh mm WDIR WSPD GST  WVHT   DPD   APD MWD   PRES  ATMP  WTMP  DEWP  VIS PTDY  TIDE
#yr  mo dy hr mn degT m/s  m/s     m   sec   sec degT   hPa  degC  degC  degC  nmi  hPa    ft
2023 01 10 14 00 270  5.0  7.0   1.5    12   8.2 285 1015.2  15.0  16.1  11.2   MM -1.0    MM
2023 01 10 13 00 265  4.0  6.0   1.4    11   8.0 280 1015.8  14.8  16.0  11.0   MM -0.8    MM";

    #[test]
    fn test_find_station_is_case_insensitive() {
        let registry = StationRegistry::with_default_stations();

        assert_eq!(registry.find_station("Scripps").unwrap().station_id, "46254");
        assert_eq!(registry.find_station("scripps").unwrap().station_id, "46254");
        assert_eq!(registry.find_station("SCRIPPS").unwrap().station_id, "46254");
        assert!(registry.find_station("Mavericks").is_none());
    }

    #[test]
    fn test_fetch_location_tags_with_registered_name() {
        let registry = StationRegistry::with_default_stations();
        let provider = FakeProvider::new(&[("46254", SAMPLE_FEED)]);

        let table = registry.fetch_location(&provider, "scripps").unwrap();
        assert_eq!(table.location, "Scripps");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_fetch_location_unknown() {
        let registry = StationRegistry::with_default_stations();
        let provider = FakeProvider::new(&[]);

        let err = registry.fetch_location(&provider, "Mavericks").unwrap_err();
        assert!(matches!(err, StationError::UnknownLocation(_)));
    }

    #[test]
    fn test_fetch_all_isolates_station_failures() {
        let registry = StationRegistry::with_default_stations();

        // Del Mar's feed is unreachable; the other three respond
        let provider = FakeProvider::new(&[
            ("46254", SAMPLE_FEED),
            ("46273", SAMPLE_FEED),
            ("46235", SAMPLE_FEED),
        ]);

        let batch = registry.fetch_all(&provider);

        assert_eq!(batch.len(), 3);
        assert!(batch.contains_key("Scripps"));
        assert!(batch.contains_key("Torrey Pines"));
        assert!(batch.contains_key("Imperial Beach"));
        assert!(!batch.contains_key("Del Mar"));
    }

    #[test]
    fn test_fetch_all_drops_malformed_feeds() {
        let registry = StationRegistry::with_default_stations();
        let provider = FakeProvider::new(&[
            ("46254", SAMPLE_FEED),
            ("46273", "this is not a buoy feed"),
            ("46266", SAMPLE_FEED),
            ("46235", SAMPLE_FEED),
        ]);

        let batch = registry.fetch_all(&provider);

        assert_eq!(batch.len(), 3);
        assert!(!batch.contains_key("Torrey Pines"));
    }

    #[test]
    fn test_empty_feed_is_valid_and_distinct_from_absent() {
        let registry = StationRegistry::with_default_stations();
        let headers_only = "#YY  MM DD hh mm WDIR WSPD GST  WVHT   DPD   APD MWD   PRES  ATMP  WTMP  DEWP  VIS PTDY  TIDE\n";
        let provider = FakeProvider::new(&[
            ("46254", headers_only),
            ("46273", SAMPLE_FEED),
            ("46266", SAMPLE_FEED),
            ("46235", SAMPLE_FEED),
        ]);

        let batch = registry.fetch_all(&provider);

        assert_eq!(batch.len(), 4);
        assert!(batch.get("Scripps").unwrap().is_empty());
    }

    #[test]
    fn test_batch_current_conditions() {
        let registry = StationRegistry::with_default_stations();
        let provider = FakeProvider::new(&[("46254", SAMPLE_FEED), ("46266", SAMPLE_FEED)]);

        let batch = registry.fetch_all(&provider);
        let conditions = batch_current_conditions(&batch);

        assert_eq!(conditions.len(), 2);
        let scripps = conditions.get("Scripps").unwrap();
        assert_eq!(scripps.wave_height, Some(1.5));
        assert_eq!(scripps.timestamp.hour(), 14);
    }

    #[test]
    fn test_batch_history_caps_row_count() {
        let registry = StationRegistry::with_default_stations();
        let provider = FakeProvider::new(&[("46254", SAMPLE_FEED), ("46273", SAMPLE_FEED)]);

        let batch = registry.fetch_all(&provider);
        let history = batch_history(&batch, 1);

        assert_eq!(history.len(), 2);
        let scripps = history.get("Scripps").unwrap();
        assert_eq!(scripps.len(), 1);
        assert_eq!(scripps[0].timestamp.hour(), 14);

        // asking for more rows than exist returns what there is
        assert_eq!(batch_history(&batch, 10).get("Scripps").unwrap().len(), 2);
    }

    #[test]
    fn test_batch_trends() {
        let registry = StationRegistry::with_default_stations();
        let provider = FakeProvider::new(&[("46254", SAMPLE_FEED)]);
        let batch = registry.fetch_all(&provider);

        let now = Utc.with_ymd_and_hms(2023, 1, 10, 14, 30, 0).unwrap();
        let trends = batch_trends(
            &batch,
            BuoyVariable::WaveHeight,
            ResampleInterval::Hourly,
            now,
            Duration::hours(24),
        );

        let (series, trend) = trends.get("Scripps").unwrap();
        assert_eq!(series.len(), 2);
        assert!(trend.confidence >= 0.0 && trend.confidence <= 1.0);
    }
}
