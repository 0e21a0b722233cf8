//! Whisper backend tests against a mock HTTP server.
//!
//! These exercise the real HTTP path (multipart upload, auth header, error
//! mapping) without touching the hosted API.

use std::path::Path;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use voicepipe::config::pricing::BillingPlan;
use voicepipe::core::asr::whisper::WhisperBackend;
use voicepipe::core::asr::{AsrBackend, AsrErrorKind, ProviderConfig};

fn provider_config(timeout_seconds: u64) -> ProviderConfig {
    ProviderConfig {
        provider: "whisper_openai".to_string(),
        backend: "whisper_openai_real".to_string(),
        model: "whisper-1".to_string(),
        language: "en".to_string(),
        api_version: "v1".to_string(),
        timeout_seconds,
        max_retries: 1,
        billing_plan: BillingPlan::PerMinute,
        api_key: Some("sk-test".to_string()),
    }
}

fn write_chunk_wav(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("chunk_0000.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for _ in 0..1600 {
        writer.write_sample(1000i16).unwrap();
    }
    writer.finalize().unwrap();
    path
}

fn backend_for(server: &MockServer) -> WhisperBackend {
    WhisperBackend::with_api_url(
        provider_config(10),
        format!("{}/v1/audio/transcriptions", server.uri()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_successful_transcription() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .and(header("Authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "task": "transcribe",
            "text": "  hello from the mock  ",
            "language": "english",
            "duration": 2.5,
            "segments": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempfile::TempDir::new().unwrap();
    let chunk = write_chunk_wav(temp.path());
    let backend = backend_for(&server);

    let result = backend.transcribe_chunk(&chunk, 0.0, 2.5).await.unwrap();
    assert_eq!(result.text, "hello from the mock");
    assert_eq!(result.language.as_deref(), Some("english"));
    assert_eq!(result.meta.get("audio_duration").unwrap(), "2.500");
    assert_eq!(result.meta.get("detected_language").unwrap(), "english");
}

#[tokio::test]
async fn test_auth_failure_maps_to_auth_kind() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let temp = tempfile::TempDir::new().unwrap();
    let chunk = write_chunk_wav(temp.path());
    let backend = backend_for(&server);

    let err = backend.transcribe_chunk(&chunk, 0.0, 1.0).await.unwrap_err();
    assert_eq!(err.kind, AsrErrorKind::Auth);
    assert!(err.message.contains("HTTP 401"));
    assert!(err.message.contains("Incorrect API key provided (invalid_request_error)"));
}

#[tokio::test]
async fn test_rate_limit_maps_to_quota_kind() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let temp = tempfile::TempDir::new().unwrap();
    let chunk = write_chunk_wav(temp.path());
    let backend = backend_for(&server);

    let err = backend.transcribe_chunk(&chunk, 0.0, 1.0).await.unwrap_err();
    assert_eq!(err.kind, AsrErrorKind::Quota);
    // Non-JSON error bodies pass through raw.
    assert!(err.message.contains("slow down"));
}

#[tokio::test]
async fn test_server_error_maps_to_server_kind() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let temp = tempfile::TempDir::new().unwrap();
    let chunk = write_chunk_wav(temp.path());
    let backend = backend_for(&server);

    let err = backend.transcribe_chunk(&chunk, 0.0, 1.0).await.unwrap_err();
    assert_eq!(err.kind, AsrErrorKind::Server);
}

#[tokio::test]
async fn test_timeout_maps_to_timeout_kind() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(std::time::Duration::from_secs(5))
                .set_body_json(serde_json::json!({"text": "too late"})),
        )
        .mount(&server)
        .await;

    let temp = tempfile::TempDir::new().unwrap();
    let chunk = write_chunk_wav(temp.path());
    let backend = WhisperBackend::with_api_url(
        provider_config(1),
        format!("{}/v1/audio/transcriptions", server.uri()),
    )
    .unwrap();

    let err = backend.transcribe_chunk(&chunk, 0.0, 1.0).await.unwrap_err();
    assert_eq!(err.kind, AsrErrorKind::Timeout);
}

#[tokio::test]
async fn test_malformed_success_body_is_unknown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
        .mount(&server)
        .await;

    let temp = tempfile::TempDir::new().unwrap();
    let chunk = write_chunk_wav(temp.path());
    let backend = backend_for(&server);

    let err = backend.transcribe_chunk(&chunk, 0.0, 1.0).await.unwrap_err();
    assert_eq!(err.kind, AsrErrorKind::Unknown);
    assert!(err.message.contains("unexpected response shape"));
}

#[tokio::test]
async fn test_missing_chunk_file_is_unknown() {
    let server = MockServer::start().await;
    let backend = backend_for(&server);

    let err = backend
        .transcribe_chunk(Path::new("/nonexistent/chunk.wav"), 0.0, 1.0)
        .await
        .unwrap_err();
    assert_eq!(err.kind, AsrErrorKind::Unknown);
    assert!(err.message.contains("failed to read chunk"));
}
