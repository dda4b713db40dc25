//! Place lookup capability
//!
//! The resolver only needs "text in, candidates out". [`PlaceLookup`] is that
//! seam; [`OpenMeteoGeocoder`] implements it against the Open-Meteo
//! geocoding search API (no API key required).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::GeocodingConfig;
use crate::models::PlaceCandidate;

/// Failure of the outbound lookup call
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("lookup request for '{query}' failed: {message}")]
    Request { query: String, message: String },

    #[error("lookup for '{query}' returned HTTP {status}")]
    Status { query: String, status: u16 },

    #[error("lookup response for '{query}' could not be parsed: {message}")]
    Parse { query: String, message: String },
}

impl LookupError {
    /// The text that was looked up
    #[must_use]
    pub fn query(&self) -> &str {
        match self {
            Self::Request { query, .. } | Self::Status { query, .. } | Self::Parse { query, .. } => {
                query
            }
        }
    }
}

/// Anything that can turn a place name into candidate coordinates
#[async_trait]
pub trait PlaceLookup: Send + Sync {
    /// Search for places matching `text`; an empty list means nothing matched
    async fn search(&self, text: &str) -> Result<Vec<PlaceCandidate>, LookupError>;
}

/// Open-Meteo geocoding client
#[derive(Debug, Clone)]
pub struct OpenMeteoGeocoder {
    client: Client,
    base_url: String,
    max_candidates: u32,
    language: String,
}

impl OpenMeteoGeocoder {
    /// Create a new geocoding client
    pub fn new(config: &GeocodingConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("weather-chatbot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_candidates: config.max_candidates,
            language: config.language.clone(),
        })
    }

    fn search_url(&self, text: &str) -> String {
        format!(
            "{}/search?name={}&count={}&language={}&format=json",
            self.base_url,
            urlencoding::encode(text),
            self.max_candidates,
            urlencoding::encode(&self.language)
        )
    }
}

#[async_trait]
impl PlaceLookup for OpenMeteoGeocoder {
    #[instrument(skip(self), fields(location = text))]
    async fn search(&self, text: &str) -> Result<Vec<PlaceCandidate>, LookupError> {
        info!("Geocoding location: '{}'", text);
        let start_time = Instant::now();

        let url = self.search_url(text);
        debug!("Geocoding request URL: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LookupError::Request {
                query: text.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Geocoding returned HTTP {}", status);
            return Err(LookupError::Status {
                query: text.to_string(),
                status: status.as_u16(),
            });
        }

        let body: openmeteo::GeocodingResponse =
            response.json().await.map_err(|e| LookupError::Parse {
                query: text.to_string(),
                message: e.to_string(),
            })?;

        let candidates: Vec<PlaceCandidate> = body
            .results
            .unwrap_or_default()
            .into_iter()
            .map(PlaceCandidate::from)
            .collect();

        if candidates.is_empty() {
            warn!("No results found for location '{}'", text);
        } else {
            info!(
                "Found {} geocoding results for '{}' in {:.3}s",
                candidates.len(),
                text,
                start_time.elapsed().as_secs_f64()
            );
            debug!(
                "Geocoding results: {:?}",
                candidates
                    .iter()
                    .map(|c| format!("{} ({:.4}, {:.4})", c.display_name(), c.latitude, c.longitude))
                    .collect::<Vec<_>>()
            );
        }

        Ok(candidates)
    }
}

/// `OpenMeteo` geocoding response structures
mod openmeteo {
    use super::PlaceCandidate;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct GeocodingResponse {
        pub results: Option<Vec<GeocodingResult>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct GeocodingResult {
        pub name: String,
        pub latitude: f64,
        pub longitude: f64,
        pub country: Option<String>,
        pub country_code: Option<String>,
        pub admin1: Option<String>,
        pub population: Option<u64>,
    }

    impl From<GeocodingResult> for PlaceCandidate {
        fn from(result: GeocodingResult) -> Self {
            PlaceCandidate {
                name: result.name,
                latitude: result.latitude,
                longitude: result.longitude,
                region: result.admin1,
                country: result.country,
                country_code: result.country_code,
                population: result.population,
            }
        }
    }
}
