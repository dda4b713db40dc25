//! Error types and handling for the weather chatbot

use thiserror::Error;

use crate::geocoding::LookupError;
use crate::resolver::ResolutionError;
use crate::weather::FetchError;

/// Refusal sent for questions that have nothing to do with the weather
pub const REFUSAL_MESSAGE: &str = "I'm sorry, I can only assist with weather-related queries.";

/// Generic apology used when a turn fails in an unexpected way
pub const APOLOGY_MESSAGE: &str =
    "Sorry, something went wrong while preparing your weather report. Please try again.";

/// Main error type for a conversation turn
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssistantError {
    /// The question is not about the weather
    #[error("query is not weather related")]
    OutOfDomain,

    /// Several equally plausible places share the requested name
    #[error("place '{name}' is ambiguous ({} candidates)", .candidates.len())]
    PlaceAmbiguous { name: String, candidates: Vec<String> },

    /// No place name could be identified in the query
    #[error("place not found")]
    PlaceNotFound { partial_name: Option<String> },

    /// A place name was found but its coordinates could not be determined
    #[error("coordinates not found for {partial_name:?}")]
    CoordinatesNotFound { partial_name: Option<String> },

    /// Coordinates outside the WGS84 range
    #[error("invalid coordinates: lat={latitude}, lon={longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    /// The weather provider failed or returned a malformed payload
    #[error("weather provider unavailable (status {status:?}): {body}")]
    UpstreamUnavailable { status: Option<u16>, body: String },

    /// Rendering the response failed
    #[error("formatting error: {message}")]
    InternalFormatting { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl AssistantError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new formatting error
    pub fn formatting<S: Into<String>>(message: S) -> Self {
        Self::InternalFormatting {
            message: message.into(),
        }
    }

    /// Whether the user can recover by giving more detail about the place
    #[must_use]
    pub fn needs_clarification(&self) -> bool {
        matches!(
            self,
            Self::PlaceAmbiguous { .. } | Self::PlaceNotFound { .. } | Self::CoordinatesNotFound { .. }
        )
    }

    /// Get a user-friendly error message.
    ///
    /// Upstream status codes and bodies are never part of the message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            AssistantError::OutOfDomain => REFUSAL_MESSAGE.to_string(),
            AssistantError::PlaceAmbiguous { name, candidates } => {
                let mut message = format!(
                    "I found more than one place called {name}. Can you please confirm which country or region it is located in?"
                );
                if !candidates.is_empty() {
                    message.push_str("\n\nYou might be referring to:\n");
                    for candidate in candidates {
                        message.push_str(&format!("\n- {candidate}"));
                    }
                }
                message
            }
            AssistantError::PlaceNotFound { .. } => {
                "I couldn't identify a city or place in your question. Can you please provide more details about the place?"
                    .to_string()
            }
            AssistantError::CoordinatesNotFound {
                partial_name: Some(name),
            } => format!(
                "I couldn't find the location of {name}. Can you please provide more details about the place, like the country it is located in?"
            ),
            AssistantError::CoordinatesNotFound { partial_name: None } => {
                "I couldn't find the location of that place. Can you please provide more details about it?"
                    .to_string()
            }
            AssistantError::InvalidCoordinates { .. } => {
                "The coordinates for that place are outside the valid range, so I can't look up its weather."
                    .to_string()
            }
            AssistantError::UpstreamUnavailable { .. } => {
                "The weather service is unavailable right now. Please try again in a little while."
                    .to_string()
            }
            AssistantError::InternalFormatting { .. } => APOLOGY_MESSAGE.to_string(),
            AssistantError::Config { .. } => {
                "Configuration error. Please check your config file.".to_string()
            }
        }
    }
}

impl From<ResolutionError> for AssistantError {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::PlaceNotFound { partial_name } => Self::PlaceNotFound { partial_name },
            ResolutionError::CoordinatesNotFound { partial_name } => {
                Self::CoordinatesNotFound { partial_name }
            }
            ResolutionError::Ambiguous { name, candidates } => Self::PlaceAmbiguous {
                name,
                candidates: candidates.iter().map(|c| c.display_name()).collect(),
            },
        }
    }
}

impl From<FetchError> for AssistantError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidCoordinates {
                latitude,
                longitude,
            } => Self::InvalidCoordinates {
                latitude,
                longitude,
            },
            FetchError::UpstreamUnavailable { status, body } => {
                Self::UpstreamUnavailable { status, body }
            }
        }
    }
}

impl From<LookupError> for AssistantError {
    fn from(err: LookupError) -> Self {
        Self::CoordinatesNotFound {
            partial_name: Some(err.query().to_string()),
        }
    }
}

impl From<std::fmt::Error> for AssistantError {
    fn from(err: std::fmt::Error) -> Self {
        Self::formatting(err.to_string())
    }
}
