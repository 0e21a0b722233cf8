//! Request and response types for `speech:recognize`.
//!
//! API Reference: https://cloud.google.com/speech-to-text/docs/reference/rest/v1/speech/recognize

use serde::{Deserialize, Serialize};

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RecognizeRequest {
    pub config: RecognitionConfig,
    pub audio: RecognitionAudio,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionConfig {
    /// Always `LINEAR16`; chunks are normalized 16-bit PCM WAVs.
    pub encoding: &'static str,
    pub sample_rate_hertz: u32,
    pub language_code: String,
    pub model: String,
    pub enable_automatic_punctuation: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecognitionAudio {
    /// Base64-encoded audio bytes.
    pub content: String,
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RecognizeResponse {
    #[serde(default)]
    pub results: Vec<SpeechRecognitionResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechRecognitionResult {
    #[serde(default)]
    pub alternatives: Vec<SpeechRecognitionAlternative>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechRecognitionAlternative {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl RecognizeResponse {
    /// Join the top alternative of each result into one transcript.
    ///
    /// Silent audio yields an empty result list, which is a valid empty
    /// transcript, not an error.
    pub fn transcript(&self) -> String {
        self.results
            .iter()
            .filter_map(|result| result.alternatives.first())
            .map(|alt| alt.transcript.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Lowest confidence among the picked alternatives, when reported.
    pub fn min_confidence(&self) -> Option<f64> {
        self.results
            .iter()
            .filter_map(|result| result.alternatives.first())
            .filter_map(|alt| alt.confidence)
            .fold(None, |acc, c| Some(acc.map_or(c, |a: f64| a.min(c))))
    }
}

/// Error response body returned by Google APIs.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Extract a readable error message from a raw API error body.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) => match parsed.error.status {
            Some(status) => format!("{} ({status})", parsed.error.message),
            None => parsed.error.message,
        },
        Err(_) => body.to_string(),
    }
}
