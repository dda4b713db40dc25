//! Data models for the weather chatbot
//!
//! This module contains the core domain models organized by concern:
//! - Place: queries, lookup candidates and resolved places
//! - Weather: current conditions, hourly/daily series and the report

pub mod place;
pub mod weather;

// Re-export all public types for convenient access
pub use place::{PlaceCandidate, PlaceQuery, ResolvedPlace};
pub use weather::{CurrentConditions, DailySummary, HourlySample, WeatherReport, describe};
