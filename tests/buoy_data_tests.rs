use std::fs;

use buoycast::data::{BuoyDataTable, BuoyVariable};
use chrono::{Datelike, Duration, TimeZone, Timelike, Utc};

fn read_mock_data(name: &str) -> String {
    fs::read_to_string(format!("mock/{}", name)).unwrap()
}

#[test]
fn read_meteorological_feed() {
    let raw_data = read_mock_data("46254.met.txt");
    let table = BuoyDataTable::from_raw_data("Scripps", &raw_data).unwrap();

    assert_eq!(table.len(), 35);

    let latest = table.latest().unwrap();
    assert_eq!(latest.timestamp.day(), 15);
    assert_eq!(latest.timestamp.hour(), 18);
    assert_eq!(latest.wave_height, Some(1.4));
    assert_eq!(latest.water_temp, Some(20.1));
    assert!(latest.tide.is_none());
    assert!(latest.visibility.is_none());
}

#[test]
fn missing_sentinel_maps_to_absent() {
    let raw_data = read_mock_data("46254.met.txt");
    let table = BuoyDataTable::from_raw_data("Scripps", &raw_data).unwrap();

    // three reports carry no wave height
    let heights = table.values_chronological(BuoyVariable::WaveHeight);
    assert_eq!(heights.len(), 32);
    assert!(heights.iter().all(|h| h.is_finite()));
}

#[test]
fn history_and_conditions_from_feed() {
    let raw_data = read_mock_data("46254.met.txt");
    let table = BuoyDataTable::from_raw_data("Scripps", &raw_data).unwrap();

    let history = table.history(24);
    assert_eq!(history.len(), 24);
    assert!(history[0].timestamp > history[23].timestamp);

    let conditions = table.current_conditions().unwrap();
    assert_eq!(conditions.location, "Scripps");
    assert_eq!(conditions.wave_height, Some(1.4));
    assert_eq!(conditions.wind_speed, Some(4.2));

    let summary = table.condition_summary();
    assert_eq!(summary.max_wave_height, Some(1.6));
    assert_eq!(summary.max_dominant_period, Some(15.0));
}

#[test]
fn recent_window_filters_rows() {
    let raw_data = read_mock_data("46254.met.txt");
    let table = BuoyDataTable::from_raw_data("Scripps", &raw_data).unwrap();

    let now = Utc.with_ymd_and_hms(2023, 6, 15, 18, 30, 0).unwrap();
    let recent = table.recent(Duration::hours(12), now);

    assert_eq!(recent.len(), 12);
    assert_eq!(recent.latest().unwrap().timestamp.hour(), 18);
    assert_eq!(recent.location, "Scripps");
}
