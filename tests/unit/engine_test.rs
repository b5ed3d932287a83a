//! Engine adapter tests against mocked backends

use asset_forge::config::EnginesConfig;
use asset_forge::engine::{prompt_seed, AspectRatio, EngineAdapter, EngineKind, GenerationRequest, ImageGenerator};
use asset_forge::response::data_url;
use asset_forge::GenerationError;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

fn adapter_for(server: &MockServer) -> EngineAdapter {
    let mut engines = EnginesConfig::default();
    engines.cloud.endpoint = server.uri();
    engines.cloud.model = "test-model".to_string();
    engines.structured.endpoint = server.uri();
    engines.structured.output_size = 512;
    engines.public.endpoint = server.uri();
    engines.cloud.timeout_ms = 5000;
    engines.structured.timeout_ms = 5000;
    engines.public.timeout_ms = 5000;
    EngineAdapter::new(&engines).unwrap()
}

fn structured() -> EngineKind {
    EngineKind::StructuredCompatible {
        model: "dall-e-3".to_string(),
    }
}

fn request(engine: EngineKind, credentials: &str) -> GenerationRequest {
    GenerationRequest::new("a stoic hero", 1920, 1080, engine, credentials).unwrap()
}

#[tokio::test]
async fn test_cloud_sends_snapped_aspect_ratio() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/test-model:predict"))
        .and(header("x-goog-api-key", "cloud-key"))
        .and(body_partial_json(json!({
            "instances": [{"prompt": "a stoic hero"}],
            "parameters": {"sampleCount": 1, "aspectRatio": "16:9"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{"bytesBase64Encoded": "iVBORw0KGgo=", "mimeType": "image/png"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = adapter_for(&server)
        .generate(&request(EngineKind::CloudHighFidelity, "cloud-key"))
        .await
        .unwrap();

    assert_eq!(result.image_data, "data:image/png;base64,iVBORw0KGgo=");
    assert_eq!(result.source_prompt, "a stoic hero");
}

#[tokio::test]
async fn test_cloud_without_predictions_is_no_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "predictions": [] })))
        .mount(&server)
        .await;

    let err = adapter_for(&server)
        .generate(&request(EngineKind::CloudHighFidelity, "cloud-key"))
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::NoOutput(_)));
}

#[tokio::test]
async fn test_structured_ignores_requested_size() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "dall-e-3", "n": 1, "size": "512x512" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "created": 1,
            "data": [{"b64_json": "iVBORw0KGgo="}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = adapter_for(&server)
        .generate(&request(structured(), "sk-test"))
        .await
        .unwrap();
    assert!(result.image_data.starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_structured_follows_url() {
    let server = MockServer::start().await;
    let link = format!("{}/files/out.png", server.uri());
    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [{"url": link}] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/out.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(PNG_MAGIC),
        )
        .mount(&server)
        .await;

    let result = adapter_for(&server)
        .generate(&request(structured(), "sk-test"))
        .await
        .unwrap();
    assert_eq!(data_url::decode(&result.image_data).unwrap(), PNG_MAGIC);
}

#[tokio::test]
async fn test_structured_auth_and_quota_are_distinguished() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer bad-key"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": {"message": "Incorrect API key"} })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer broke-key"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "You exceeded your current quota, please check your plan and billing details"}
        })))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);

    let auth = adapter.generate(&request(structured(), "bad-key")).await.unwrap_err();
    assert!(matches!(auth, GenerationError::Auth(_)));
    assert!(!auth.is_retryable());

    let quota = adapter.generate(&request(structured(), "broke-key")).await.unwrap_err();
    assert!(matches!(quota, GenerationError::Quota(_)));
    assert!(quota.is_retryable());
    assert_ne!(auth.to_string(), quota.to_string());
}

#[tokio::test]
async fn test_public_is_seeded_from_prompt() {
    let server = MockServer::start().await;
    let seed = prompt_seed("a stoic hero").to_string();
    Mock::given(method("GET"))
        .and(path_regex(r"^/prompt/.+$"))
        .and(query_param("width", "1920"))
        .and(query_param("height", "1080"))
        .and(query_param("seed", seed.as_str()))
        .and(query_param("nologo", "true"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = adapter_for(&server)
        .generate(&request(EngineKind::PublicFallback, ""))
        .await
        .unwrap();
    assert_eq!(data_url::mime_type(&result.image_data), Some("image/jpeg"));
}

#[tokio::test]
async fn test_public_status_classification() {
    let cases: [(u16, &str); 5] = [
        (500, "transient_service_error"),
        (503, "transient_service_error"),
        (429, "quota_error"),
        (400, "rejected_error"),
        (404, "rejected_error"),
    ];

    for (status, kind) in cases {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let err = adapter_for(&server)
            .generate(&request(EngineKind::PublicFallback, ""))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), kind, "status {}", status);
    }
}

#[tokio::test]
async fn test_public_non_image_content_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html>busy</html>"),
        )
        .mount(&server)
        .await;

    let err = adapter_for(&server)
        .generate(&request(EngineKind::PublicFallback, ""))
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::TransientService(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_missing_credentials_skip_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    for engine in [EngineKind::CloudHighFidelity, structured()] {
        let err = adapter.generate(&request(engine, "  ")).await.unwrap_err();
        assert!(matches!(err, GenerationError::Configuration(_)));
        assert!(err.to_string().contains("not configured"));
        assert!(!err.is_retryable());
    }
}

#[test]
fn test_seed_is_pure_and_non_negative() {
    let long = "overflow ".repeat(500);
    for prompt in ["", "a", "a stoic hero", "ünïcödé 🐉", long.as_str()] {
        let first = prompt_seed(prompt);
        assert_eq!(first, prompt_seed(prompt));
        assert!(first <= i32::MAX as u32 + 1);
    }
}

#[test]
fn test_aspect_ratio_properties() {
    for width in [0u32, 1, 10, 512, 4096] {
        assert_eq!(AspectRatio::nearest(width, 0), AspectRatio::Square);
    }
    assert_eq!(AspectRatio::nearest(650, 600), AspectRatio::Square);
    assert_eq!(AspectRatio::nearest(1700, 1000).as_str(), "16:9");
}

#[test]
fn test_request_validation() {
    assert!(GenerationRequest::new("", 64, 64, EngineKind::PublicFallback, "").is_err());
    assert!(GenerationRequest::new("x", 0, 64, EngineKind::PublicFallback, "").is_err());
    assert!(GenerationRequest::new("x", 64, 5000, EngineKind::PublicFallback, "").is_err());
    assert!(GenerationRequest::new("x", 4096, 1, EngineKind::PublicFallback, "").is_ok());
}

#[tokio::test]
async fn test_each_engine_uses_its_own_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(PNG_MAGIC)
                .set_delay(std::time::Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let mut engines = EnginesConfig::default();
    engines.cloud.timeout_ms = 60_000;
    engines.structured.timeout_ms = 60_000;
    engines.public.endpoint = server.uri();
    engines.public.timeout_ms = 50;
    let adapter = EngineAdapter::new(&engines).unwrap();

    let err = adapter
        .generate(&request(EngineKind::PublicFallback, ""))
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::TransientService(_)));
    assert!(err.is_retryable());
}
