//! Response types for the OpenAI Audio Transcription API.
//!
//! API Reference: https://platform.openai.com/docs/api-reference/audio/createTranscription

use serde::Deserialize;

/// Verbose transcription response (`verbose_json` format).
///
/// Segment and word arrays are accepted but ignored; per-chunk timing comes
/// from the chunk plan, not from the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct VerboseTranscriptionResponse {
    /// The transcribed text (full transcript).
    pub text: String,

    /// The language of the audio (ISO-639-1 code).
    #[serde(default)]
    pub language: Option<String>,

    /// Duration of the audio in seconds.
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Error response body returned by the OpenAI API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,

    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
}

/// Extract a readable error message from a raw API error body.
///
/// Falls back to the raw body when it is not the documented error shape.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) => match parsed.error.error_type {
            Some(error_type) => format!("{} ({error_type})", parsed.error.message),
            None => parsed.error.message,
        },
        Err(_) => body.to_string(),
    }
}
