//! Weather chatbot - conversational weather assistant
//!
//! A user asks about the weather at a place; the assistant resolves the place
//! to coordinates, fetches the forecast from Open-Meteo and answers with a
//! markdown report. Each session keeps its own transcript and rate limit.

pub mod assistant;
pub mod config;
pub mod error;
pub mod formatter;
pub mod geocoding;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod query;
pub mod resolver;
pub mod session;
pub mod throttle;
pub mod weather;

// Re-export core types for public API
pub use assistant::{OpenMeteoAssistant, WeatherAssistant};
pub use config::ChatbotConfig;
pub use error::AssistantError;
pub use formatter::FormattedResponse;
pub use geocoding::{OpenMeteoGeocoder, PlaceLookup};
pub use models::{PlaceQuery, ResolvedPlace, WeatherReport, describe};
pub use orchestrator::{Orchestrator, TurnOutcome, TurnStatus};
pub use resolver::{PlaceResolver, ResolutionError};
pub use session::{Session, SessionId, Turn};
pub use weather::{FetchError, OpenMeteoClient, WeatherSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, AssistantError>;
