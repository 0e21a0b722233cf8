//! Endpoint constants for the hosted Whisper API.

/// Transcription endpoint of the OpenAI Audio API.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Response format requested from the API.
///
/// `verbose_json` includes the detected language and audio duration, both of
/// which feed the per-chunk provider metadata.
pub const RESPONSE_FORMAT: &str = "verbose_json";
