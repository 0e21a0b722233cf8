//! Base types for ASR backends.
//!
//! This module defines the foundational abstractions shared by every speech
//! recognition backend: the error-kind taxonomy with its retry semantics, the
//! classification helpers that turn HTTP statuses and provider error text into
//! kinds, the per-chunk result type, and the [`AsrBackend`] trait seam.
//!
//! # Error Model
//!
//! Backends never panic on provider failures. A failed recognition attempt is
//! an [`AsrError`] carrying a classified [`AsrErrorKind`]; the client layer
//! decides whether that kind warrants a retry. Only configuration problems
//! (unknown provider, missing credential) surface through a different type,
//! [`super::config::AsrConfigError`], before any audio is touched.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::message::{ChunkRecord, ChunkStatus, ReasonCode};

// =============================================================================
// Error Classification
// =============================================================================

/// Maximum length of an error message stored in a chunk result.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Classified failure kind for one recognition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AsrErrorKind {
    /// The request or external call timed out.
    Timeout,
    /// Credentials rejected (401, invalid API key).
    Auth,
    /// Quota or rate limit exhausted (429).
    Quota,
    /// Request rejected by the provider (4xx other than auth/quota).
    Client,
    /// Provider-side failure (5xx).
    Server,
    /// Anything that does not match a known marker.
    Unknown,
}

impl AsrErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AsrErrorKind::Timeout => "timeout",
            AsrErrorKind::Auth => "auth",
            AsrErrorKind::Quota => "quota",
            AsrErrorKind::Client => "client",
            AsrErrorKind::Server => "server",
            AsrErrorKind::Unknown => "unknown",
        }
    }

    /// Whether a failure of this kind is expected to self-resolve.
    ///
    /// Only transient conditions qualify; auth, quota, and client errors will
    /// fail the same way on every attempt, and unknown errors are not worth
    /// the spend of a blind retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AsrErrorKind::Timeout | AsrErrorKind::Server)
    }

    /// Status-reason code reported when a whole message fails with this kind.
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            AsrErrorKind::Timeout => ReasonCode::TimeoutAsr,
            _ => ReasonCode::AsrFailed,
        }
    }
}

impl fmt::Display for AsrErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify an HTTP status code into an error kind.
pub fn classify_status(status: u16) -> AsrErrorKind {
    match status {
        401 | 403 => AsrErrorKind::Auth,
        429 => AsrErrorKind::Quota,
        400..=499 => AsrErrorKind::Client,
        500..=599 => AsrErrorKind::Server,
        _ => AsrErrorKind::Unknown,
    }
}

/// Classify provider error text into an error kind.
///
/// Markers are matched in priority order so that, for example, a message
/// containing both "timeout" and "500" classifies as a timeout.
pub fn classify_error_text(text: &str) -> AsrErrorKind {
    let lower = text.to_lowercase();

    if lower.contains("timeout") || lower.contains("timed out") {
        return AsrErrorKind::Timeout;
    }
    if ["auth", "unauthorized", "401", "api key", "invalid_api_key"]
        .iter()
        .any(|marker| lower.contains(marker))
    {
        return AsrErrorKind::Auth;
    }
    if ["quota", "rate limit", "429", "exceeded"]
        .iter()
        .any(|marker| lower.contains(marker))
    {
        return AsrErrorKind::Quota;
    }
    if ["400", "bad request", "invalid"]
        .iter()
        .any(|marker| lower.contains(marker))
    {
        return AsrErrorKind::Client;
    }
    if ["500", "502", "503", "504", "server error", "internal"]
        .iter()
        .any(|marker| lower.contains(marker))
    {
        return AsrErrorKind::Server;
    }

    AsrErrorKind::Unknown
}

/// A classified recognition failure.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct AsrError {
    pub kind: AsrErrorKind,
    pub message: String,
}

impl AsrError {
    pub fn new(kind: AsrErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Build an error whose kind is derived from its own text.
    pub fn classified(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: classify_error_text(&message),
            message,
        }
    }
}

/// Result type for recognition attempts.
pub type AsrResult<T> = Result<T, AsrError>;

// =============================================================================
// Transcription Types
// =============================================================================

/// Successful recognition output for one chunk, before client enrichment.
#[derive(Debug, Clone, Default)]
pub struct Transcription {
    /// Recognized text, possibly empty for silent audio.
    pub text: String,
    /// Language detected by the provider, when reported.
    pub language: Option<String>,
    /// Free-form provider metadata (request ids, detected language, ...).
    pub meta: HashMap<String, String>,
}

/// Final outcome of transcribing one chunk, retries included.
///
/// A `ChunkResult` never carries a panic or an escaped error: failures are
/// folded into the `error`/`error_kind` fields and aggregated at the message
/// level. Created once per chunk, immutable after return.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkResult {
    pub status: ChunkStatus,
    pub text: String,
    pub start_sec: f64,
    pub end_sec: f64,
    pub duration_sec: f64,
    pub language: Option<String>,
    pub error: Option<String>,
    pub error_kind: Option<AsrErrorKind>,
    pub provider_meta: HashMap<String, String>,
}

impl ChunkResult {
    /// Build a successful result from a backend transcription.
    pub fn ok(transcription: Transcription, start_sec: f64, end_sec: f64) -> Self {
        Self {
            status: ChunkStatus::Ok,
            text: transcription.text,
            start_sec,
            end_sec,
            duration_sec: (end_sec - start_sec).max(0.0),
            language: transcription.language,
            error: None,
            error_kind: None,
            provider_meta: transcription.meta,
        }
    }

    /// Build a failed result from a classified error.
    ///
    /// The error message is truncated so pathological provider responses do
    /// not bloat the persisted payload.
    pub fn from_error(error: &AsrError, start_sec: f64, end_sec: f64) -> Self {
        let mut message = error.message.clone();
        if message.len() > MAX_ERROR_MESSAGE_LEN {
            message.truncate(MAX_ERROR_MESSAGE_LEN);
        }
        Self {
            status: ChunkStatus::Error,
            text: String::new(),
            start_sec,
            end_sec,
            duration_sec: (end_sec - start_sec).max(0.0),
            language: None,
            error: Some(message),
            error_kind: Some(error.kind),
            provider_meta: HashMap::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ChunkStatus::Ok
    }

    /// Persistable per-chunk record for the message payload.
    pub fn to_record(&self, chunk_index: usize, wav_chunk_path: &Path) -> ChunkRecord {
        ChunkRecord {
            chunk_index,
            start_sec: self.start_sec,
            end_sec: self.end_sec,
            duration_sec: self.duration_sec,
            wav_chunk_path: wav_chunk_path.display().to_string(),
            status: self.status,
            text: if self.text.is_empty() {
                None
            } else {
                Some(self.text.clone())
            },
            error: self.error.clone(),
            error_kind: self.error_kind.map(|k| k.as_str().to_string()),
            language: self.language.clone(),
        }
    }
}

// =============================================================================
// Backend Trait
// =============================================================================

/// Interface implemented by every ASR backend.
///
/// A backend performs exactly one recognition attempt per call; retry policy
/// lives in the client layer so no backend can accidentally multiply the
/// attempt budget.
#[async_trait]
pub trait AsrBackend: Send + Sync + fmt::Debug {
    /// Stable backend identifier (e.g., "whisper_stub", "whisper_openai_real").
    fn id(&self) -> &'static str;

    /// Transcribe the audio window `[start_sec, end_sec)` stored at `wav_path`.
    async fn transcribe_chunk(
        &self,
        wav_path: &Path,
        start_sec: f64,
        end_sec: f64,
    ) -> AsrResult<Transcription>;
}

/// Boxed trait object for registered backends.
pub type BoxedBackend = Box<dyn AsrBackend>;
