use std::time::Duration;

use thiserror::Error;

use crate::station::BuoyStation;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("station request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("station feed returned status {0}")]
    Status(u16),
}

/// The raw-feed boundary: implementations return the full realtime2 text for
/// a station or a typed error. An error is distinct from a fetched feed with
/// no data rows.
pub trait BuoyDataProvider {
    fn fetch_raw(&self, station: &BuoyStation) -> Result<String, FetchError>;
}

/// Blocking HTTP provider against the public NDBC feed
pub struct HttpBuoyDataProvider {
    client: reqwest::blocking::Client,
}

impl HttpBuoyDataProvider {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()?;

        Ok(HttpBuoyDataProvider { client })
    }
}

impl BuoyDataProvider for HttpBuoyDataProvider {
    fn fetch_raw(&self, station: &BuoyStation) -> Result<String, FetchError> {
        let response = self.client.get(station.meteorological_data_url()).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(response.text()?)
    }
}
