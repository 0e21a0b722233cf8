//! Voice-activity analysis.
//!
//! Placeholder analyzer: duration is estimated from file size and any
//! non-zero byte counts as speech content, of which a fixed 80% is assumed
//! to be speech. Good enough to flag empty or dead-air recordings before
//! spending ASR budget on them; a model-based analyzer can replace this
//! behind the same interface.

use std::path::Path;

use crate::config::AudioConfig;

/// Fraction of a non-silent file assumed to contain speech.
const ASSUMED_SPEECH_FRACTION: f64 = 0.8;

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Raw analysis output; thresholding into a silence verdict happens at the
/// message level where the configured minimums apply.
#[derive(Debug, Clone, PartialEq)]
pub struct VadStats {
    pub speech_ratio: f64,
    pub speech_seconds: f64,
    pub total_seconds: f64,
    /// `(start_sec, end_sec)` speech segments.
    pub segments: Vec<(f64, f64)>,
}

impl VadStats {
    /// Whether the audio falls below the configured speech minimums.
    pub fn is_mostly_silence(&self, config: &AudioConfig) -> bool {
        self.speech_ratio < config.vad_min_speech_ratio
            || self.speech_seconds < config.vad_min_speech_seconds
    }
}

/// Analyze a WAV file for speech activity.
///
/// Infallible: a missing or unreadable file reports zero speech, which the
/// caller surfaces as silence rather than an error.
pub fn analyze(wav_path: &Path, config: &AudioConfig) -> VadStats {
    let data = std::fs::read(wav_path).unwrap_or_default();

    let bytes_per_second = u64::from(config.sample_rate) * u64::from(config.channels) * 2;
    let total_seconds = if bytes_per_second == 0 {
        0.0
    } else {
        data.len() as f64 / bytes_per_second as f64
    };

    let has_speech = data.iter().any(|&byte| byte != 0);
    let speech_seconds = if has_speech {
        total_seconds * ASSUMED_SPEECH_FRACTION
    } else {
        0.0
    };
    let speech_ratio = if total_seconds == 0.0 {
        0.0
    } else {
        speech_seconds / total_seconds
    };
    let segments = if speech_seconds > 0.0 {
        vec![(0.0, round3(speech_seconds))]
    } else {
        Vec::new()
    };

    VadStats {
        speech_ratio: round3(speech_ratio),
        speech_seconds: round3(speech_seconds),
        total_seconds: round3(total_seconds),
        segments,
    }
}
