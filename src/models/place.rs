//! Place models: what the user asked for and what it resolved to

use serde::{Deserialize, Serialize};

/// A place request extracted from a user turn
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct PlaceQuery {
    /// Raw user text the query was extracted from
    pub text: String,
    /// Place name found in the text, if any
    pub place: Option<String>,
    /// Disambiguating context supplied in a follow-up turn (e.g. a country)
    pub context: Option<String>,
    /// Coordinates typed directly by the user
    pub coordinates: Option<(f64, f64)>,
    /// Residual request beyond the place itself ("will it rain tomorrow")
    pub other_information: Option<String>,
}

impl PlaceQuery {
    /// Create a query for a place name
    #[must_use]
    pub fn for_place(text: impl Into<String>, place: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            place: Some(place.into()),
            ..Self::default()
        }
    }

    /// Attach disambiguating context from a follow-up turn.
    ///
    /// A query that never had a place name takes the context as its place.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        if self.place.is_none() && self.coordinates.is_none() {
            self.place = Some(context);
        } else {
            self.context = Some(context);
        }
        self
    }

    /// Name used in messages when resolution fails part-way
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        match (&self.place, &self.context) {
            (Some(place), Some(context)) => Some(format!("{place}, {context}")),
            (Some(place), None) => Some(place.clone()),
            _ => None,
        }
    }
}

/// One result of a place lookup
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlaceCandidate {
    /// Place name (city, town, etc.)
    pub name: String,
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// First-level administrative area (state, region)
    pub region: Option<String>,
    /// Country name
    pub country: Option<String>,
    /// Country code (ISO 3166-1 alpha-2)
    pub country_code: Option<String>,
    /// Population, when the provider knows it
    pub population: Option<u64>,
}

impl PlaceCandidate {
    /// Create a candidate with coordinates only
    #[must_use]
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
            region: None,
            country: None,
            country_code: None,
            population: None,
        }
    }

    /// Canonical name such as "Springfield, Illinois, United States"
    #[must_use]
    pub fn display_name(&self) -> String {
        let mut parts = vec![self.name.as_str()];
        if let Some(region) = self.region.as_deref().filter(|r| !r.is_empty() && *r != self.name) {
            parts.push(region);
        }
        if let Some(country) = self.country.as_deref().filter(|c| !c.is_empty()) {
            parts.push(country);
        }
        parts.join(", ")
    }

    /// Whether a follow-up hint like "France" or "IL" points at this candidate
    #[must_use]
    pub fn matches_context(&self, context: &str) -> bool {
        let context = context.trim().to_lowercase();
        if context.is_empty() {
            return false;
        }
        let contains = |field: &Option<String>| {
            field
                .as_deref()
                .is_some_and(|value| value.to_lowercase().contains(&context))
        };
        contains(&self.region)
            || contains(&self.country)
            || self
                .country_code
                .as_deref()
                .is_some_and(|code| code.eq_ignore_ascii_case(&context))
    }

    /// Key identifying the area the candidate belongs to
    #[must_use]
    pub fn area_key(&self) -> (Option<String>, Option<String>) {
        (
            self.region.as_ref().map(|r| r.to_lowercase()),
            self.country.as_ref().map(|c| c.to_lowercase()),
        )
    }
}

/// A place with coordinates, ready for a weather fetch
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResolvedPlace {
    /// Canonical place name
    pub name: String,
    /// Latitude in decimal degrees (WGS84)
    pub latitude: f64,
    /// Longitude in decimal degrees (WGS84)
    pub longitude: f64,
    /// Residual request, captured verbatim
    pub other_information: Option<String>,
}

impl ResolvedPlace {
    /// Resolve from a lookup candidate
    #[must_use]
    pub fn from_candidate(candidate: &PlaceCandidate, other_information: Option<String>) -> Self {
        Self {
            name: candidate.display_name(),
            latitude: candidate.latitude,
            longitude: candidate.longitude,
            other_information,
        }
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }
}
