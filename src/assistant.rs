//! Conversational entry point
//!
//! [`WeatherAssistant::submit`] is the whole turn cycle: wait out the rate
//! limit, orchestrate, then append the user and assistant turns.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::config::{ChatbotConfig, ModelConfig};
use crate::geocoding::{OpenMeteoGeocoder, PlaceLookup};
use crate::orchestrator::{Orchestrator, TurnOutcome};
use crate::resolver::PlaceResolver;
use crate::session::{Session, Turn};
use crate::weather::{OpenMeteoClient, WeatherSource};

/// Assistant wired to the Open-Meteo geocoding and forecast APIs
pub type OpenMeteoAssistant = WeatherAssistant<OpenMeteoGeocoder, OpenMeteoClient>;

pub struct WeatherAssistant<L, W> {
    orchestrator: Orchestrator<L, W>,
    model: ModelConfig,
    min_turn_interval: Duration,
}

impl OpenMeteoAssistant {
    /// Build the assistant from configuration
    pub fn from_config(config: &ChatbotConfig) -> Result<Self> {
        let geocoder = OpenMeteoGeocoder::new(&config.geocoding)
            .context("Failed to create geocoding client")?;
        let weather =
            OpenMeteoClient::new(&config.weather).context("Failed to create weather client")?;
        let resolver = PlaceResolver::new(geocoder, config.geocoding.max_candidates as usize);

        info!(
            "Weather assistant ready (model: {}, temperature: {})",
            config.model.name.as_deref().unwrap_or("none"),
            config.model.temperature
        );

        Ok(Self::new(
            Orchestrator::new(resolver, weather),
            config.model.clone(),
            config.session.min_turn_interval(),
        ))
    }
}

impl<L: PlaceLookup, W: WeatherSource> WeatherAssistant<L, W> {
    pub fn new(orchestrator: Orchestrator<L, W>, model: ModelConfig, min_turn_interval: Duration) -> Self {
        Self {
            orchestrator,
            model,
            min_turn_interval,
        }
    }

    /// Model settings, unchanged from configuration
    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    /// Start a new session with this assistant's rate limit
    pub fn new_session(&self) -> Session {
        Session::create(self.min_turn_interval)
    }

    /// Process one user utterance and record both sides of the exchange
    #[instrument(skip(self, session, text), fields(session = %session.id()))]
    pub async fn submit(&self, session: &mut Session, text: &str) -> TurnOutcome {
        session.throttle_mut().wait().await;

        let outcome = self
            .orchestrator
            .handle_turn(session.id(), session.turns(), text)
            .await;
        debug!("Turn finished with status {:?}", outcome.status);

        session.append_turn(Turn::user(text));
        session.append_turn(Turn::assistant(
            outcome.response.text.clone(),
            outcome.context.clone(),
        ));
        outcome
    }
}
