use serde::Deserialize;
use serde::Serialize;

/// A fixed buoy platform identified by its NDBC station id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuoyStation {
    pub station_id: String,
    pub name: String,
}

impl BuoyStation {
    pub fn new(station_id: &str, name: &str) -> BuoyStation {
        BuoyStation {
            station_id: station_id.into(),
            name: name.into(),
        }
    }

    /// Realtime meteorological feed for this station
    pub fn meteorological_data_url(&self) -> String {
        format!(
            "https://www.ndbc.noaa.gov/data/realtime2/{}.txt",
            self.station_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meteorological_data_url() {
        let station = BuoyStation::new("46254", "Scripps Nearshore");

        assert_eq!(
            station.meteorological_data_url(),
            "https://www.ndbc.noaa.gov/data/realtime2/46254.txt"
        );
    }
}
