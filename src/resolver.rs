//! Place Resolution Module
//!
//! Turns a [`PlaceQuery`] into a [`ResolvedPlace`] by consulting a
//! [`PlaceLookup`]. The resolver never guesses between places of equal
//! standing: when a name is shared it hands the candidates back so the
//! user can choose.

use thiserror::Error;
use tracing::{debug, warn};

use crate::geocoding::PlaceLookup;
use crate::models::{PlaceCandidate, PlaceQuery, ResolvedPlace};

/// Population ratio at which the biggest namesake wins outright
const DOMINANT_POPULATION_RATIO: u64 = 10;

/// Why a place query could not be resolved
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    #[error("no place name in query")]
    PlaceNotFound { partial_name: Option<String> },

    #[error("no coordinates for {partial_name:?}")]
    CoordinatesNotFound { partial_name: Option<String> },

    #[error("'{name}' matches {} places", .candidates.len())]
    Ambiguous {
        name: String,
        candidates: Vec<PlaceCandidate>,
    },
}

/// Service for resolving place queries
pub struct PlaceResolver<L> {
    lookup: L,
    max_candidates: usize,
}

impl<L: PlaceLookup> PlaceResolver<L> {
    pub fn new(lookup: L, max_candidates: usize) -> Self {
        Self {
            lookup,
            max_candidates: max_candidates.max(1),
        }
    }

    /// Resolve a place query into a place with coordinates
    pub async fn resolve(&self, query: &PlaceQuery) -> Result<ResolvedPlace, ResolutionError> {
        debug!("Resolving place query: {:?}", query);

        if let Some((latitude, longitude)) = query.coordinates {
            debug!("Using coordinates from query: ({}, {})", latitude, longitude);
            return Ok(ResolvedPlace {
                name: format!("{latitude:.4}, {longitude:.4}"),
                latitude,
                longitude,
                other_information: query.other_information.clone(),
            });
        }

        let Some(name) = query.place.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
            return Err(ResolutionError::PlaceNotFound { partial_name: None });
        };
        let not_found = || ResolutionError::CoordinatesNotFound {
            partial_name: query.display_name(),
        };

        let candidates = match self.lookup.search(name).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Place lookup failed: {}", e);
                return Err(not_found());
            }
        };
        if candidates.is_empty() {
            debug!("No candidates for '{}'", name);
            return Err(not_found());
        }

        let (label, candidates) = match query.context.as_deref() {
            Some(context) => {
                let kept: Vec<PlaceCandidate> = candidates
                    .into_iter()
                    .filter(|c| c.matches_context(context))
                    .collect();
                debug!("{} candidates match context '{}'", kept.len(), context);
                if kept.is_empty() {
                    return Err(not_found());
                }
                (query.display_name().unwrap_or_else(|| name.to_string()), kept)
            }
            None => (name.to_string(), candidates),
        };

        let chosen = self.choose(&label, name, candidates)?;
        debug!(
            "Resolved place: {} at ({}, {})",
            chosen.display_name(),
            chosen.latitude,
            chosen.longitude
        );
        Ok(ResolvedPlace::from_candidate(
            &chosen,
            query.other_information.clone(),
        ))
    }

    /// Pick the candidate the user most plausibly meant, or report ambiguity
    fn choose(
        &self,
        label: &str,
        name: &str,
        candidates: Vec<PlaceCandidate>,
    ) -> Result<PlaceCandidate, ResolutionError> {
        let exact_matches = candidates
            .iter()
            .filter(|c| c.name.to_lowercase() == name.to_lowercase())
            .count();
        let plausible = candidates
            .into_iter()
            .filter(|c| exact_matches == 0 || c.name.to_lowercase() == name.to_lowercase());

        // one candidate per region/country pair, in lookup order
        let mut distinct: Vec<PlaceCandidate> = Vec::new();
        for candidate in plausible {
            if !distinct.iter().any(|d| d.area_key() == candidate.area_key()) {
                distinct.push(candidate);
            }
        }

        if distinct.len() <= 1 {
            return distinct.pop().ok_or_else(|| ResolutionError::CoordinatesNotFound {
                partial_name: Some(label.to_string()),
            });
        }

        let mut by_population: Vec<&PlaceCandidate> = distinct.iter().collect();
        by_population.sort_by(|a, b| b.population.cmp(&a.population));
        if let Some(top) = by_population[0].population {
            let runner_up = by_population[1].population.unwrap_or(0);
            if top >= runner_up.saturating_mul(DOMINANT_POPULATION_RATIO) {
                debug!("'{}' dominates its namesakes", by_population[0].display_name());
                return Ok(by_population[0].clone());
            }
        }

        distinct.truncate(self.max_candidates);
        Err(ResolutionError::Ambiguous {
            name: label.to_string(),
            candidates: distinct,
        })
    }
}
