//! End-to-end tests of the Gemini analysis client against a mock server.

use serde_json::json;
use tacreview_models::SampledFrame;
use tacreview_vision::{GeminiAnalysisClient, GeminiConfig, PromptTemplate, RetryConfig, VisionError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENDPOINT: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

fn gemini_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{"content": {"parts": [{"text": text}]}, "finishReason": "STOP"}]
    }))
}

fn client(server: &MockServer) -> GeminiAnalysisClient {
    GeminiAnalysisClient::gemini(
        GeminiConfig::new("test-key").with_base_url(server.uri()),
        RetryConfig::default()
            .with_base_delay_ms(1)
            .with_max_delay_ms(10),
        PromptTemplate::analysis_default().unwrap(),
    )
    .unwrap()
}

fn frame() -> SampledFrame {
    SampledFrame::jpeg(0, 0.25, 9.4, 720, 405, vec![0xFF, 0xD8, 0xFF, 0xE0])
}

const ANALYSIS: &str = r#"{
    "soldier_positions": [{"id": "1", "x": 100, "y": 200, "cover_status": "full_cover"}],
    "threats": [{"x": 500, "y": 80, "identified": true}],
    "tactical_errors": [],
    "tactical_strengths": ["Good use of cover"],
    "score": 140
}"#;

#[tokio::test]
async fn rate_limit_twice_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(gemini_reply(ANALYSIS))
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;

    let analysis = client(&server).analyze(&frame(), "").await.unwrap();
    assert_eq!(analysis.score, 100);
    assert_eq!(analysis.raw_score, Some(140));
    assert_eq!(analysis.soldier_count(), 1);
}

#[tokio::test]
async fn auth_failure_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("API key not valid"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).analyze(&frame(), "").await.unwrap_err();
    assert_eq!(err.sequence_index, 0);
    assert_eq!(err.attempts, 1);
    assert!(matches!(err.reason, VisionError::Auth { status: 401, .. }));
}

#[tokio::test]
async fn persistent_server_error_exhausts_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server).analyze(&frame(), "").await.unwrap_err();
    assert_eq!(err.attempts, 3);
    assert!(matches!(err.reason, VisionError::Exhausted { attempts: 3, .. }));
}

#[tokio::test]
async fn malformed_model_output_is_a_classified_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(gemini_reply("Here is my analysis: the team looks good"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).analyze(&frame(), "").await.unwrap_err();
    assert!(err.reason.is_parse_failure());
}
