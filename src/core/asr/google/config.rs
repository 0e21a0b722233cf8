//! Endpoint and mapping tables for Google Speech-to-Text.

/// Synchronous recognition endpoint.
///
/// Suitable for audio up to one minute, which chunking guarantees as long as
/// `chunk_seconds` stays at or below 60 for this provider.
pub const DEFAULT_API_URL: &str = "https://speech.googleapis.com/v1/speech:recognize";

/// Map a configured language to the BCP-47 code the API expects.
///
/// Unmapped two-letter codes get a `-US` region; anything longer passes
/// through so regional codes can be supplied directly in the configuration.
pub fn language_code(language: &str) -> String {
    match language {
        "auto" | "en" => "en-US".to_string(),
        "ar" => "ar-SA".to_string(),
        "es" => "es-ES".to_string(),
        "fr" => "fr-FR".to_string(),
        "de" => "de-DE".to_string(),
        "it" => "it-IT".to_string(),
        "pt" => "pt-BR".to_string(),
        "ru" => "ru-RU".to_string(),
        "zh" => "zh-CN".to_string(),
        "ja" => "ja-JP".to_string(),
        "ko" => "ko-KR".to_string(),
        "hi" => "hi-IN".to_string(),
        other if other.len() == 2 => format!("{other}-US"),
        other => other.to_string(),
    }
}

/// Map a configured model name to the API model identifier.
pub fn model_id(model: &str) -> &str {
    match model {
        "chirp-3" | "chirp-1" => "chirp",
        "chirp-2" => "chirp_2",
        "google-default" => "default",
        other => other,
    }
}
