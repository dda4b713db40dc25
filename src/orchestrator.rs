//! Conversation orchestration
//!
//! One user turn runs through an explicit state machine:
//!
//! ```text
//! AwaitingQuery -> Resolving -> Fetching -> Formatting -> Done
//!                      |            |            |
//!                      |            +------------+--> Failed
//!                      +--> AwaitingClarification
//! ```
//!
//! Out-of-domain input leaves `AwaitingQuery` straight for `Failed` with the
//! refusal text and never reaches the resolver. Panics inside a turn are
//! caught here and answered with the generic apology.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{APOLOGY_MESSAGE, AssistantError};
use crate::formatter::{self, FormattedResponse};
use crate::geocoding::PlaceLookup;
use crate::models::{PlaceQuery, ResolvedPlace, WeatherReport};
use crate::query::QueryParser;
use crate::resolver::PlaceResolver;
use crate::session::{Role, SessionId, Turn, TurnContext};
use crate::weather::WeatherSource;

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    Done,
    AwaitingClarification,
    Failed,
}

/// Result of one orchestrated turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub status: TurnStatus,
    pub response: FormattedResponse,
    /// Context to store on the assistant turn for follow-ups
    pub context: TurnContext,
}

impl TurnOutcome {
    fn failed(response: FormattedResponse) -> Self {
        Self {
            status: TurnStatus::Failed,
            response,
            context: TurnContext::None,
        }
    }
}

/// States of a single turn
#[derive(Debug)]
enum TurnState {
    AwaitingQuery,
    Resolving(PlaceQuery),
    Fetching(PlaceQuery, ResolvedPlace),
    Formatting(PlaceQuery, ResolvedPlace, WeatherReport),
    Done(PlaceQuery, FormattedResponse),
    AwaitingClarification(PlaceQuery, AssistantError),
    Failed(AssistantError),
}

impl TurnState {
    fn name(&self) -> &'static str {
        match self {
            Self::AwaitingQuery => "AwaitingQuery",
            Self::Resolving(..) => "Resolving",
            Self::Fetching(..) => "Fetching",
            Self::Formatting(..) => "Formatting",
            Self::Done(..) => "Done",
            Self::AwaitingClarification(..) => "AwaitingClarification",
            Self::Failed(..) => "Failed",
        }
    }
}

/// Sequences resolution, fetching and formatting for each turn
pub struct Orchestrator<L, W> {
    resolver: PlaceResolver<L>,
    weather: W,
}

impl<L: PlaceLookup, W: WeatherSource> Orchestrator<L, W> {
    pub fn new(resolver: PlaceResolver<L>, weather: W) -> Self {
        Self { resolver, weather }
    }

    /// Run one user utterance against the prior transcript
    #[instrument(skip(self, session_id, transcript), fields(session = %session_id, turns = transcript.len()))]
    pub async fn handle_turn(
        &self,
        session_id: SessionId,
        transcript: &[Turn],
        utterance: &str,
    ) -> TurnOutcome {
        match AssertUnwindSafe(self.run(session_id, transcript, utterance))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(session = %session_id, "Turn panicked, answering with apology");
                TurnOutcome::failed(FormattedResponse {
                    text: APOLOGY_MESSAGE.to_string(),
                })
            }
        }
    }

    async fn run(&self, session_id: SessionId, transcript: &[Turn], utterance: &str) -> TurnOutcome {
        let mut state = TurnState::AwaitingQuery;
        loop {
            debug!(session = %session_id, "Turn state: {}", state.name());
            state = match state {
                TurnState::AwaitingQuery => match interpret(transcript, utterance) {
                    Some(query) => TurnState::Resolving(query),
                    None => {
                        info!(session = %session_id, "Out-of-domain query refused");
                        TurnState::Failed(AssistantError::OutOfDomain)
                    }
                },
                TurnState::Resolving(query) => match self.resolver.resolve(&query).await {
                    Ok(place) => TurnState::Fetching(query, place),
                    Err(err) => {
                        let err = AssistantError::from(err);
                        if err.needs_clarification() {
                            TurnState::AwaitingClarification(query, err)
                        } else {
                            TurnState::Failed(err)
                        }
                    }
                },
                TurnState::Fetching(query, place) => {
                    match self.weather.fetch(place.latitude, place.longitude).await {
                        Ok(report) => TurnState::Formatting(query, place, report),
                        Err(err) => {
                            warn!(session = %session_id, "Weather fetch failed: {}", err);
                            TurnState::Failed(err.into())
                        }
                    }
                }
                TurnState::Formatting(query, place, report) => {
                    if report.is_well_formed() {
                        TurnState::Done(query, formatter::format(Ok((&place, &report))))
                    } else {
                        error!(session = %session_id, "Report for {} is not renderable", place.name);
                        TurnState::Failed(AssistantError::formatting("report has empty or unordered series"))
                    }
                }
                TurnState::Done(query, response) => {
                    return TurnOutcome {
                        status: TurnStatus::Done,
                        response,
                        context: TurnContext::Answered(query),
                    };
                }
                TurnState::AwaitingClarification(query, err) => {
                    return TurnOutcome {
                        status: TurnStatus::AwaitingClarification,
                        response: formatter::format(Err(&err)),
                        context: TurnContext::AwaitingClarification(query),
                    };
                }
                TurnState::Failed(err) => return TurnOutcome::failed(formatter::format(Err(&err))),
            };
        }
    }
}

/// Decide what the utterance asks for, given the conversation so far.
///
/// Returns `None` for out-of-domain input.
fn interpret(transcript: &[Turn], utterance: &str) -> Option<PlaceQuery> {
    let parsed = QueryParser::parse(utterance);

    if parsed.weather_intent && parsed.has_location() {
        return Some(parsed.into_place_query(utterance));
    }

    if let Some(pending) = pending_clarification(transcript) {
        if let Some(context) = QueryParser::clarification_context(utterance) {
            debug!("Combining clarification '{}' with pending query", context);
            return Some(pending.clone().with_context(context));
        }
    }

    // "what about Lyon?" after an answer asks for the same kind of forecast
    if parsed.has_location() && last_answered(transcript).is_some() {
        debug!("Follow-up names a new place: {:?}", parsed.place);
        return Some(parsed.into_place_query(utterance));
    }

    if parsed.weather_intent {
        let other_information = parsed.other_information.clone();
        return Some(match last_answered(transcript) {
            Some(previous) => {
                debug!("Reusing place from previous answer: {:?}", previous.display_name());
                PlaceQuery {
                    text: utterance.to_string(),
                    other_information,
                    ..previous.clone()
                }
            }
            None => parsed.into_place_query(utterance),
        });
    }

    if QueryParser::is_bare_place(utterance) {
        return Some(parsed.into_place_query(utterance));
    }

    None
}

/// The query left open by the latest assistant turn, if any
fn pending_clarification(transcript: &[Turn]) -> Option<&PlaceQuery> {
    match transcript.iter().rev().find(|t| t.role == Role::Assistant) {
        Some(Turn {
            context: TurnContext::AwaitingClarification(query),
            ..
        }) => Some(query),
        _ => None,
    }
}

/// The query behind the most recent delivered forecast
fn last_answered(transcript: &[Turn]) -> Option<&PlaceQuery> {
    transcript.iter().rev().find_map(|t| match &t.context {
        TurnContext::Answered(query) => Some(query),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::REFUSAL_MESSAGE;
    use crate::geocoding::LookupError;
    use crate::models::{CurrentConditions, DailySummary, HourlySample, PlaceCandidate, describe};
    use crate::weather::{FetchError, validate_coordinates};
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::sync::Arc;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Calls(Arc<Mutex<Vec<String>>>);

    impl Calls {
        fn record(&self, call: String) {
            self.0.lock().unwrap().push(call);
        }
        fn all(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct FakeLookup {
        calls: Calls,
    }

    #[async_trait]
    impl PlaceLookup for FakeLookup {
        async fn search(&self, text: &str) -> Result<Vec<PlaceCandidate>, LookupError> {
            self.calls.record(format!("search:{text}"));
            let place = |region: &str, country: &str, lat: f64, lon: f64, pop: u64| PlaceCandidate {
                region: Some(region.to_string()),
                country: Some(country.to_string()),
                country_code: None,
                population: Some(pop),
                ..PlaceCandidate::new(text, lat, lon)
            };
            Ok(match text {
                "Paris" => vec![place("Île-de-France", "France", 48.85, 2.35, 2_138_551)],
                "Springfield" => vec![
                    place("Illinois", "United States", 39.80, -89.64, 116_250),
                    place("Massachusetts", "United States", 42.10, -72.59, 155_929),
                ],
                _ => Vec::new(),
            })
        }
    }

    #[derive(Clone, Copy)]
    enum FetchMode {
        Ok,
        Unavailable,
        Panic,
    }

    struct FakeWeather {
        calls: Calls,
        mode: FetchMode,
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").unwrap()
    }

    fn sample_report(latitude: f64, longitude: f64) -> WeatherReport {
        let current = CurrentConditions {
            temperature: 18.0,
            wind_speed: 11.2,
            wind_direction: 250.0,
            weather_code: 1,
            description: describe(1).to_string(),
            observed_at: at("2024-06-01T14:00"),
        };
        WeatherReport {
            latitude,
            longitude,
            timezone: None,
            summary: current.summary(),
            current,
            hourly: vec![HourlySample {
                time: at("2024-06-01T14:00"),
                temperature: Some(18.0),
                precipitation: Some(0.0),
                wind_speed: Some(11.2),
            }],
            daily: vec![DailySummary {
                date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                temperature_max: Some(21.3),
                temperature_min: Some(12.1),
                sunrise: Some(at("2024-06-01T05:48")),
                sunset: Some(at("2024-06-01T21:47")),
            }],
        }
    }

    #[async_trait]
    impl WeatherSource for FakeWeather {
        async fn fetch(&self, latitude: f64, longitude: f64) -> Result<WeatherReport, FetchError> {
            validate_coordinates(latitude, longitude)?;
            self.calls.record(format!("fetch:{latitude},{longitude}"));
            match self.mode {
                FetchMode::Ok => Ok(sample_report(latitude, longitude)),
                FetchMode::Unavailable => Err(FetchError::UpstreamUnavailable {
                    status: Some(503),
                    body: "upstream exploded".to_string(),
                }),
                FetchMode::Panic => panic!("weather source blew up"),
            }
        }
    }

    fn orchestrator(mode: FetchMode) -> (Orchestrator<FakeLookup, FakeWeather>, Calls) {
        let calls = Calls::default();
        let resolver = PlaceResolver::new(
            FakeLookup {
                calls: calls.clone(),
            },
            5,
        );
        let weather = FakeWeather {
            calls: calls.clone(),
            mode,
        };
        (Orchestrator::new(resolver, weather), calls)
    }

    fn id() -> SessionId {
        crate::session::Session::create(std::time::Duration::ZERO).id()
    }

    fn assistant_turn(outcome: &TurnOutcome) -> Turn {
        Turn::assistant(outcome.response.text.clone(), outcome.context.clone())
    }

    #[tokio::test]
    async fn test_weather_question_is_answered() {
        let (orchestrator, calls) = orchestrator(FetchMode::Ok);
        let outcome = orchestrator
            .handle_turn(id(), &[], "What's the weather in Paris?")
            .await;

        assert_eq!(outcome.status, TurnStatus::Done);
        assert!(outcome.response.text.contains("mainly clear"));
        assert!(outcome.response.text.contains("Sunrise"));
        assert_eq!(calls.all(), vec!["search:Paris", "fetch:48.85,2.35"]);
        assert!(matches!(outcome.context, TurnContext::Answered(_)));
    }

    #[tokio::test]
    async fn test_out_of_domain_makes_no_calls() {
        let (orchestrator, calls) = orchestrator(FetchMode::Ok);
        let outcome = orchestrator.handle_turn(id(), &[], "tell me a joke").await;

        assert_eq!(outcome.status, TurnStatus::Failed);
        assert_eq!(outcome.response.text, REFUSAL_MESSAGE);
        assert!(calls.all().is_empty());
    }

    #[tokio::test]
    async fn test_ambiguous_place_then_clarification() {
        let (orchestrator, calls) = orchestrator(FetchMode::Ok);
        let mut transcript = vec![Turn::user("weather in Springfield")];

        let first = orchestrator
            .handle_turn(id(), &[], "weather in Springfield")
            .await;
        assert_eq!(first.status, TurnStatus::AwaitingClarification);
        assert!(first.response.text.contains("- Springfield, Illinois, United States"));
        assert!(first.response.text.contains("- Springfield, Massachusetts, United States"));
        assert_eq!(calls.all(), vec!["search:Springfield"]);

        transcript.push(assistant_turn(&first));
        transcript.push(Turn::user("it's in Illinois"));
        let second = orchestrator
            .handle_turn(id(), &transcript, "it's in Illinois")
            .await;
        assert_eq!(second.status, TurnStatus::Done);
        assert!(second.response.text.contains("Springfield, Illinois, United States"));
        assert_eq!(calls.all().last().map(String::as_str), Some("fetch:39.8,-89.64"));
    }

    #[tokio::test]
    async fn test_off_topic_reply_to_clarification_is_refused() {
        let (orchestrator, calls) = orchestrator(FetchMode::Ok);
        let first = orchestrator
            .handle_turn(id(), &[], "weather in Springfield")
            .await;
        assert_eq!(first.status, TurnStatus::AwaitingClarification);

        let transcript = vec![Turn::user("weather in Springfield"), assistant_turn(&first)];
        let second = orchestrator
            .handle_turn(id(), &transcript, "tell me a joke")
            .await;
        assert_eq!(second.status, TurnStatus::Failed);
        assert_eq!(second.response.text, REFUSAL_MESSAGE);
        assert_eq!(calls.all(), vec!["search:Springfield"]);
    }

    #[tokio::test]
    async fn test_inline_region_resolves_without_asking() {
        let (orchestrator, calls) = orchestrator(FetchMode::Ok);
        let outcome = orchestrator
            .handle_turn(id(), &[], "weather in Springfield, Illinois")
            .await;

        assert_eq!(outcome.status, TurnStatus::Done);
        assert!(outcome.response.text.contains("Springfield, Illinois, United States"));
        assert_eq!(calls.all(), vec!["search:Springfield", "fetch:39.8,-89.64"]);
    }

    #[tokio::test]
    async fn test_follow_up_names_new_place() {
        let (orchestrator, calls) = orchestrator(FetchMode::Ok);
        let first = orchestrator
            .handle_turn(id(), &[], "weather in Paris")
            .await;
        let transcript = vec![Turn::user("weather in Paris"), assistant_turn(&first)];

        let second = orchestrator
            .handle_turn(id(), &transcript, "What about Springfield, Illinois?")
            .await;
        assert_eq!(second.status, TurnStatus::Done);
        assert!(second.response.text.contains("**Springfield, Illinois, United States**"));
        assert_eq!(calls.all().last().map(String::as_str), Some("fetch:39.8,-89.64"));
    }

    #[tokio::test]
    async fn test_date_in_question_is_not_coordinates() {
        let (orchestrator, calls) = orchestrator(FetchMode::Ok);
        let outcome = orchestrator
            .handle_turn(id(), &[], "weather in Paris on June 5 2024")
            .await;

        assert_eq!(outcome.status, TurnStatus::Done);
        assert_eq!(calls.all(), vec!["search:Paris", "fetch:48.85,2.35"]);
    }

    #[tokio::test]
    async fn test_follow_up_reuses_last_place() {
        let (orchestrator, calls) = orchestrator(FetchMode::Ok);
        let first = orchestrator
            .handle_turn(id(), &[], "weather in Paris")
            .await;
        let transcript = vec![Turn::user("weather in Paris"), assistant_turn(&first)];

        let second = orchestrator
            .handle_turn(id(), &transcript, "will it rain tomorrow?")
            .await;
        assert_eq!(second.status, TurnStatus::Done);
        assert!(second.response.text.contains("- Precipitation:"));
        assert_eq!(
            calls.all().iter().filter(|c| c.starts_with("search:Paris")).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_weather_without_place_asks_for_one() {
        let (orchestrator, calls) = orchestrator(FetchMode::Ok);
        let outcome = orchestrator
            .handle_turn(id(), &[], "what's the weather like?")
            .await;
        assert_eq!(outcome.status, TurnStatus::AwaitingClarification);
        assert!(outcome.response.text.contains("couldn't identify a city"));
        assert!(calls.all().is_empty());

        let transcript = vec![
            Turn::user("what's the weather like?"),
            assistant_turn(&outcome),
        ];
        let answer = orchestrator.handle_turn(id(), &transcript, "Paris").await;
        assert_eq!(answer.status, TurnStatus::Done);
    }

    #[tokio::test]
    async fn test_invalid_coordinates_fail_without_fetch() {
        let (orchestrator, calls) = orchestrator(FetchMode::Ok);
        let outcome = orchestrator
            .handle_turn(id(), &[], "weather at 200, 10")
            .await;
        assert_eq!(outcome.status, TurnStatus::Failed);
        assert!(outcome.response.text.contains("outside the valid range"));
        assert!(calls.all().is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_is_polished() {
        let (orchestrator, _) = orchestrator(FetchMode::Unavailable);
        let outcome = orchestrator
            .handle_turn(id(), &[], "weather in Paris")
            .await;
        assert_eq!(outcome.status, TurnStatus::Failed);
        assert!(!outcome.response.text.contains("503"));
        assert!(!outcome.response.text.contains("exploded"));
    }

    #[tokio::test]
    async fn test_panic_becomes_apology() {
        let (orchestrator, _) = orchestrator(FetchMode::Panic);
        let outcome = orchestrator
            .handle_turn(id(), &[], "weather in Paris")
            .await;
        assert_eq!(outcome.status, TurnStatus::Failed);
        assert_eq!(outcome.response.text, APOLOGY_MESSAGE);
    }

    #[test]
    fn test_interpret_bare_place_and_refusal() {
        assert_eq!(
            interpret(&[], "Paris").and_then(|q| q.place),
            Some("Paris".to_string())
        );
        assert!(interpret(&[], "thanks").is_none());
    }
}
