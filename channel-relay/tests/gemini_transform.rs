use channel_relay::load_config::Endpoints;
use channel_relay::transform::GeminiTransformer;
use channel_relay_core::contract::TextTransformer;
use channel_relay_core::error::TransformError;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

fn transformer(server: &MockServer) -> GeminiTransformer {
    let endpoints = Endpoints {
        gemini_base: server.uri(),
        ..Endpoints::default()
    };
    GeminiTransformer::new(&endpoints, "test-key")
}

#[tokio::test]
async fn returns_trimmed_text_of_first_candidate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(query_param("key", "test-key"))
        .and(body_string_contains("rewrite this please"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [
                { "content": { "parts": [ { "text": "  Hai semua, berita baik hari ini!  \n" } ] } },
                { "content": { "parts": [ { "text": "second candidate" } ] } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let caption = transformer(&server)
        .transform("rewrite this please")
        .await
        .unwrap();
    assert_eq!(caption, "Hai semua, berita baik hari ini!");
}

#[tokio::test]
async fn reply_without_candidates_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "promptFeedback": {} })))
        .mount(&server)
        .await;

    let result = transformer(&server).transform("anything at all").await;
    assert!(matches!(result, Err(TransformError::Malformed(_))));
}

#[tokio::test]
async fn candidate_without_text_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [ { "content": { "parts": [] } } ]
        })))
        .mount(&server)
        .await;

    let result = transformer(&server).transform("anything at all").await;
    assert!(matches!(result, Err(TransformError::Malformed(_))));
}

#[tokio::test]
async fn non_success_status_is_reported_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    match transformer(&server).transform("anything at all").await {
        Err(TransformError::Status { status, body }) => {
            assert_eq!(status, 429);
            assert_eq!(body, "quota exceeded");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_service_is_reported() {
    let endpoints = Endpoints {
        gemini_base: "http://127.0.0.1:9".to_string(),
        ..Endpoints::default()
    };
    let result = GeminiTransformer::new(&endpoints, "k")
        .transform("anything at all")
        .await;
    assert!(matches!(result, Err(TransformError::Unreachable(_))));
}
