//! End-to-end conversations against mocked Open-Meteo endpoints

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use weather_chatbot::{ChatbotConfig, OpenMeteoAssistant, TurnStatus};

fn config_for(server: &MockServer) -> ChatbotConfig {
    let mut config = ChatbotConfig::default();
    config.weather.base_url = server.uri();
    config.geocoding.base_url = server.uri();
    config.session.min_turn_interval_seconds = 0;
    config
}

fn assistant_for(server: &MockServer) -> OpenMeteoAssistant {
    OpenMeteoAssistant::from_config(&config_for(server)).expect("assistant builds")
}

fn forecast_payload(latitude: f64, longitude: f64) -> serde_json::Value {
    json!({
        "latitude": latitude,
        "longitude": longitude,
        "timezone": "Europe/Paris",
        "current_weather": {
            "temperature": 18.0, "windspeed": 11.2, "winddirection": 250,
            "weathercode": 1, "time": "2024-06-01T14:00"
        },
        "hourly": {
            "time": ["2024-06-01T00:00", "2024-06-01T01:00", "2024-06-01T04:00", "2024-06-01T05:00"],
            "temperature_2m": [14.0, 13.0, 12.0, 13.0],
            "precipitation": [0.0, 0.2, 1.0, 0.0],
            "wind_speed_10m": [6.0, 8.0, 10.0, 12.0]
        },
        "daily": {
            "time": ["2024-06-01", "2024-06-02"],
            "temperature_2m_max": [21.3, 23.0],
            "temperature_2m_min": [12.1, 13.4],
            "sunrise": ["2024-06-01T05:48", "2024-06-02T05:47"],
            "sunset": ["2024-06-01T21:47", "2024-06-02T21:48"]
        }
    })
}

async fn mount_geocoding(server: &MockServer, name: &str, results: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("name", name))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": results })))
        .mount(server)
        .await;
}

fn springfield_results() -> serde_json::Value {
    json!([
        {"name": "Springfield", "latitude": 37.21533, "longitude": -93.29824,
         "country": "United States", "country_code": "US", "admin1": "Missouri", "population": 166810},
        {"name": "Springfield", "latitude": 39.80172, "longitude": -89.64371,
         "country": "United States", "country_code": "US", "admin1": "Illinois", "population": 116250},
        {"name": "Springfield", "latitude": 42.10148, "longitude": -72.58981,
         "country": "United States", "country_code": "US", "admin1": "Massachusetts", "population": 155929}
    ])
}

#[tokio::test]
async fn test_paris_weather_is_answered() {
    let server = MockServer::start().await;
    mount_geocoding(
        &server,
        "Paris",
        json!([
            {"name": "Paris", "latitude": 48.85, "longitude": 2.35, "country": "France",
             "country_code": "FR", "admin1": "Île-de-France", "population": 2138551},
            {"name": "Paris", "latitude": 33.66094, "longitude": -95.55551, "country": "United States",
             "country_code": "US", "admin1": "Texas", "population": 25171}
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("latitude", "48.85"))
        .and(query_param("longitude", "2.35"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_payload(48.86, 2.34)))
        .expect(1)
        .mount(&server)
        .await;

    let assistant = assistant_for(&server);
    let mut session = assistant.new_session();
    let outcome = assistant
        .submit(&mut session, "What's the weather in Paris?")
        .await;

    assert_eq!(outcome.status, TurnStatus::Done);
    let text = outcome.response.text;
    assert!(text.contains("Paris, Île-de-France, France"));
    assert!(text.contains("The current temperature is 18.0°C with mainly clear."));
    assert!(text.contains("| Date | Max temp (°C) | Min temp (°C) | Sunrise | Sunset |"));
    assert!(text.contains("| 2024-06-02 | 23.0 | 13.4 | 05:47 | 21:48 |"));
    assert!(text.contains("| 2024-06-01 00:00-04:00 | 13.5 | 0.2 | 7.0 |"));
    assert!(text.contains("| 2024-06-01 04:00-08:00 | 12.5 | 1.0 | 11.0 |"));
    assert_eq!(session.turns().len(), 2);
}

#[tokio::test]
async fn test_ambiguous_place_asks_then_answers() {
    let server = MockServer::start().await;
    mount_geocoding(&server, "Springfield", springfield_results()).await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("latitude", "39.80172"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_payload(39.8, -89.6)))
        .expect(1)
        .mount(&server)
        .await;

    let assistant = assistant_for(&server);
    let mut session = assistant.new_session();

    let first = assistant.submit(&mut session, "weather in Springfield").await;
    assert_eq!(first.status, TurnStatus::AwaitingClarification);
    assert!(first.response.text.contains("which country or region"));
    assert!(first.response.text.contains("- Springfield, Missouri, United States"));
    assert!(first.response.text.contains("- Springfield, Illinois, United States"));
    assert!(first.response.text.contains("- Springfield, Massachusetts, United States"));

    let second = assistant.submit(&mut session, "the one in Illinois").await;
    assert_eq!(second.status, TurnStatus::Done);
    assert!(second.response.text.contains("**Springfield, Illinois, United States**"));
    assert_eq!(session.turns().len(), 4);
}

#[tokio::test]
async fn test_inline_region_answers_first_time() {
    let server = MockServer::start().await;
    mount_geocoding(&server, "Springfield", springfield_results()).await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("latitude", "39.80172"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_payload(39.8, -89.6)))
        .expect(1)
        .mount(&server)
        .await;

    let assistant = assistant_for(&server);
    let mut session = assistant.new_session();
    let outcome = assistant
        .submit(&mut session, "weather in Springfield, Illinois")
        .await;

    assert_eq!(outcome.status, TurnStatus::Done);
    assert!(outcome.response.text.contains("**Springfield, Illinois, United States**"));
}

#[tokio::test]
async fn test_off_topic_reply_to_clarification_is_refused() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("name", "Springfield"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": springfield_results() })))
        .expect(1)
        .mount(&server)
        .await;

    let assistant = assistant_for(&server);
    let mut session = assistant.new_session();
    let first = assistant.submit(&mut session, "weather in Springfield").await;
    assert_eq!(first.status, TurnStatus::AwaitingClarification);

    let second = assistant.submit(&mut session, "tell me a joke").await;
    assert_eq!(second.status, TurnStatus::Failed);
    assert_eq!(
        second.response.text,
        "I'm sorry, I can only assist with weather-related queries."
    );
}

#[tokio::test]
async fn test_ambiguous_place_never_fetches() {
    let server = MockServer::start().await;
    mount_geocoding(&server, "Springfield", springfield_results()).await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let assistant = assistant_for(&server);
    let mut session = assistant.new_session();
    let outcome = assistant.submit(&mut session, "weather in Springfield").await;
    assert_eq!(outcome.status, TurnStatus::AwaitingClarification);
}

#[tokio::test]
async fn test_off_topic_question_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let assistant = assistant_for(&server);
    let mut session = assistant.new_session();
    let outcome = assistant.submit(&mut session, "tell me a joke").await;

    assert_eq!(outcome.status, TurnStatus::Failed);
    assert_eq!(
        outcome.response.text,
        "I'm sorry, I can only assist with weather-related queries."
    );
}

#[tokio::test]
async fn test_out_of_range_coordinates_make_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let assistant = assistant_for(&server);
    let mut session = assistant.new_session();
    let outcome = assistant.submit(&mut session, "weather at 200, 10").await;

    assert_eq!(outcome.status, TurnStatus::Failed);
    assert!(outcome.response.text.contains("outside the valid range"));
}

#[tokio::test]
async fn test_upstream_error_is_not_echoed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream proxy meltdown"))
        .mount(&server)
        .await;

    let assistant = assistant_for(&server);
    let mut session = assistant.new_session();
    let outcome = assistant.submit(&mut session, "forecast for 48.85, 2.35").await;

    assert_eq!(outcome.status, TurnStatus::Failed);
    assert!(!outcome.response.text.contains("502"));
    assert!(!outcome.response.text.contains("meltdown"));

    // the next turn starts fresh
    let next = assistant.submit(&mut session, "tell me a joke").await;
    assert_eq!(next.status, TurnStatus::Failed);
    assert_eq!(session.turns().len(), 4);
}

#[tokio::test]
async fn test_reset_starts_a_new_session() {
    let server = MockServer::start().await;
    let assistant = assistant_for(&server);
    let mut session = assistant.new_session();

    assistant.submit(&mut session, "tell me a joke").await;
    let old_id = session.id();
    let new_id = session.reset();

    assert_ne!(old_id, new_id);
    assert!(session.turns().is_empty());
}
