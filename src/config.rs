//! Configuration management for the weather chatbot
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::AssistantError;
use crate::Result as ChatbotResult;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable prefix for overrides (`WEATHER_CHATBOT_WEATHER__TIMEOUT_SECONDS=5`)
pub const ENV_PREFIX: &str = "WEATHER_CHATBOT";

/// Root configuration structure for the weather chatbot
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatbotConfig {
    /// Language model settings, passed through unchanged
    #[serde(default)]
    pub model: ModelConfig,
    /// Weather API configuration
    #[serde(default)]
    pub weather: WeatherConfig,
    /// Geocoding API configuration
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    /// Session and rate-limit settings
    #[serde(default)]
    pub session: SessionConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model selection and sampling temperature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier
    pub name: Option<String>,
    /// Sampling temperature
    #[serde(default = "default_model_temperature")]
    pub temperature: f32,
}

/// Weather API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Base URL for weather API
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
}

/// Geocoding API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Base URL for geocoding API
    #[serde(default = "default_geocoding_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    /// Maximum number of candidates requested and shown to the user
    #[serde(default = "default_max_candidates")]
    pub max_candidates: u32,
    /// Result language
    #[serde(default = "default_language")]
    pub language: String,
}

/// Session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Minimum time between the processing of two user turns
    #[serde(default = "default_min_turn_interval")]
    pub min_turn_interval_seconds: u64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_model_temperature() -> f32 {
    0.7
}

fn default_weather_base_url() -> String {
    "https://api.open-meteo.com/v1".to_string()
}

fn default_geocoding_base_url() -> String {
    "https://geocoding-api.open-meteo.com/v1".to_string()
}

fn default_timeout() -> u32 {
    10
}

fn default_max_candidates() -> u32 {
    5
}

fn default_language() -> String {
    "en".to_string()
}

fn default_min_turn_interval() -> u64 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: None,
            temperature: default_model_temperature(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoding_base_url(),
            timeout_seconds: default_timeout(),
            max_candidates: default_max_candidates(),
            language: default_language(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_turn_interval_seconds: default_min_turn_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl SessionConfig {
    /// Minimum turn interval as a duration
    #[must_use]
    pub fn min_turn_interval(&self) -> Duration {
        Duration::from_secs(self.min_turn_interval_seconds)
    }
}

impl ChatbotConfig {
    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let explicit = config_path.is_some();
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if explicit && !config_file.exists() {
            return Err(AssistantError::config(format!(
                "Config file not found: {}",
                config_file.display()
            ))
            .into());
        }

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment variable overrides with WEATHER_CHATBOT_ prefix
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: ChatbotConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        // The model name has historically come from MODEL_NAME
        if config.model.name.is_none() {
            config.model.name = std::env::var("MODEL_NAME").ok().filter(|n| !n.is_empty());
        }

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("weather-chatbot").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.weather.base_url.is_empty() {
            self.weather.base_url = default_weather_base_url();
        }
        if self.weather.timeout_seconds == 0 {
            self.weather.timeout_seconds = default_timeout();
        }
        if self.geocoding.base_url.is_empty() {
            self.geocoding.base_url = default_geocoding_base_url();
        }
        if self.geocoding.timeout_seconds == 0 {
            self.geocoding.timeout_seconds = default_timeout();
        }
        if self.geocoding.max_candidates == 0 {
            self.geocoding.max_candidates = default_max_candidates();
        }
        if self.geocoding.language.is_empty() {
            self.geocoding.language = default_language();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> ChatbotResult<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> ChatbotResult<()> {
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(AssistantError::config(
                "Model temperature must be between 0.0 and 2.0",
            ));
        }

        for (name, timeout) in [
            ("Weather", self.weather.timeout_seconds),
            ("Geocoding", self.geocoding.timeout_seconds),
        ] {
            if timeout == 0 || timeout > 300 {
                return Err(AssistantError::config(format!(
                    "{name} API timeout must be between 1 and 300 seconds"
                )));
            }
        }

        if self.geocoding.max_candidates > 20 {
            return Err(AssistantError::config(
                "Geocoding max candidates cannot exceed 20",
            ));
        }

        if self.session.min_turn_interval_seconds > 60 {
            return Err(AssistantError::config(
                "Minimum turn interval cannot exceed 60 seconds",
            ));
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> ChatbotResult<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(AssistantError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(AssistantError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            )));
        }

        for (name, url) in [
            ("Weather", &self.weather.base_url),
            ("Geocoding", &self.geocoding.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(AssistantError::config(format!(
                    "{name} API base URL must be a valid HTTP or HTTPS URL"
                )));
            }
        }

        Ok(())
    }
}
