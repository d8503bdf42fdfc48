use std::fs;

use buoycast::analysis::ResampleInterval;
use buoycast::data::BuoyVariable;
use buoycast::fetch::{BuoyDataProvider, FetchError};
use buoycast::registry::{batch_current_conditions, batch_trends, StationRegistry};
use buoycast::station::BuoyStation;
use chrono::{Duration, TimeZone, Utc};

fn read_mock_data(name: &str) -> String {
    fs::read_to_string(format!("mock/{}", name)).unwrap()
}

// Serves the canned feed for every station except one dead id.
struct MockFeedProvider {
    down: &'static str,
}

impl BuoyDataProvider for MockFeedProvider {
    fn fetch_raw(&self, station: &BuoyStation) -> Result<String, FetchError> {
        if station.station_id == self.down {
            return Err(FetchError::Status(500));
        }
        Ok(read_mock_data("46254.met.txt"))
    }
}

#[test]
fn one_dead_station_leaves_the_rest() {
    let registry = StationRegistry::with_default_stations();
    let provider = MockFeedProvider { down: "46266" };

    let batch = registry.fetch_all(&provider);

    assert_eq!(batch.len(), 3);
    assert!(!batch.contains_key("Del Mar"));
    assert!(batch.values().all(|table| table.len() == 35));
}

#[test]
fn batch_conditions_cover_every_reachable_station() {
    let registry = StationRegistry::with_default_stations();
    let provider = MockFeedProvider { down: "46266" };

    let batch = registry.fetch_all(&provider);
    let conditions = batch_current_conditions(&batch);

    assert_eq!(conditions.len(), 3);
    let scripps = &conditions["Scripps"];
    assert_eq!(scripps.location, "Scripps");
    assert_eq!(scripps.wave_height, Some(1.4));
}

#[test]
fn batch_trends_cover_every_reachable_station() {
    let registry = StationRegistry::with_default_stations();
    let provider = MockFeedProvider { down: "46266" };
    let now = Utc.with_ymd_and_hms(2023, 6, 15, 18, 30, 0).unwrap();

    let batch = registry.fetch_all(&provider);
    let trends = batch_trends(
        &batch,
        BuoyVariable::WaveHeight,
        ResampleInterval::Hourly,
        now,
        Duration::hours(24),
    );

    assert_eq!(trends.len(), 3);
    for (series, trend) in trends.values() {
        assert_eq!(series.len(), 24);
        assert!(trend.confidence >= 0.0 && trend.confidence <= 1.0);
    }
}

#[test]
fn lookup_ignores_case() {
    let registry = StationRegistry::with_default_stations();
    let provider = MockFeedProvider { down: "none" };

    let table = registry.fetch_location(&provider, "torrey pines").unwrap();
    assert_eq!(table.location, "Torrey Pines");
    assert_eq!(table.len(), 35);
}
