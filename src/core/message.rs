//! Core message schema shared by every pipeline stage.
//!
//! A [`Message`] is one parsed chat entry. Stages take ownership of a message,
//! enrich it (transcription text, derived metadata, status), and hand it back;
//! nothing mutates a message concurrently. The serialized form is the JSONL
//! record written between stages, so the schema here is the on-disk contract.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Enumerations
// =============================================================================

/// Kind of chat entry, as classified by the upstream parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Voice,
    Image,
    Video,
    Document,
    Sticker,
    System,
    #[default]
    Unknown,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Voice => "voice",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
            MessageKind::Document => "document",
            MessageKind::Sticker => "sticker",
            MessageKind::System => "system",
            MessageKind::Unknown => "unknown",
        }
    }

    /// Parse from a string, falling back to `Unknown`.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "text" => MessageKind::Text,
            "voice" => MessageKind::Voice,
            "image" => MessageKind::Image,
            "video" => MessageKind::Video,
            "document" => MessageKind::Document,
            "sticker" => MessageKind::Sticker,
            "system" => MessageKind::System,
            _ => MessageKind::Unknown,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Processing status of a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Ok,
    Partial,
    Failed,
    Skipped,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Ok => "ok",
            MessageStatus::Partial => "partial",
            MessageStatus::Failed => "failed",
            MessageStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Machine-readable reason codes attached to non-ok messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    AudioUnsupportedFormat,
    TimeoutFfmpeg,
    FfmpegFailed,
    AsrFailed,
    TimeoutAsr,
    AsrPartial,
    UnresolvedMedia,
    AmbiguousMedia,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::AudioUnsupportedFormat => "audio_unsupported_format",
            ReasonCode::TimeoutFfmpeg => "timeout_ffmpeg",
            ReasonCode::FfmpegFailed => "ffmpeg_failed",
            ReasonCode::AsrFailed => "asr_failed",
            ReasonCode::TimeoutAsr => "timeout_asr",
            ReasonCode::AsrPartial => "asr_partial",
            ReasonCode::UnresolvedMedia => "unresolved_media",
            ReasonCode::AmbiguousMedia => "ambiguous_media",
        }
    }

    /// Human-readable default message for this code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ReasonCode::AudioUnsupportedFormat => {
                "Audio format is unsupported or the media file is missing"
            }
            ReasonCode::TimeoutFfmpeg => "Audio conversion timed out",
            ReasonCode::FfmpegFailed => "Audio conversion failed",
            ReasonCode::AsrFailed => "Audio transcription failed",
            ReasonCode::TimeoutAsr => "Audio transcription timed out",
            ReasonCode::AsrPartial => "Some audio chunks failed to transcribe",
            ReasonCode::UnresolvedMedia => "Referenced media file could not be found",
            ReasonCode::AmbiguousMedia => "Multiple media files match the reference",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Status Reason
// =============================================================================

/// Structured reason attached to partial/failed/skipped messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReason {
    pub code: ReasonCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl StatusReason {
    /// Build a reason with the code's default message.
    pub fn from_code(code: ReasonCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            context: None,
        }
    }

    /// Build a reason with the default message plus extra context.
    pub fn with_context(code: ReasonCode, context: Value) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            context: Some(context),
        }
    }
}

// =============================================================================
// Derived ASR Data
// =============================================================================

/// Voice-activity report captured before transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VadReport {
    pub speech_ratio: f64,
    pub speech_seconds: f64,
    pub total_seconds: f64,
    /// `(start_sec, end_sec)` speech segments.
    pub segments: Vec<(f64, f64)>,
    pub is_mostly_silence: bool,
}

/// Status of a single transcribed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    Ok,
    Error,
}

/// Per-chunk transcription record persisted in the message payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_index: usize,
    pub start_sec: f64,
    pub end_sec: f64,
    pub duration_sec: f64,
    pub wav_chunk_path: String,
    pub status: ChunkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Rollup of chunk failures for a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub chunks_ok: usize,
    pub chunks_error: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_message: Option<String>,
}

/// Everything the transcription stage learned about one voice message.
///
/// Fields are filled in the order the pipeline progresses, so a message that
/// failed during conversion carries fewer fields than one that reached
/// aggregation. Optional fields are omitted from JSON until set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsrPayload {
    pub pipeline_version: String,
    pub config_snapshot: Value,
    pub language_hint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vad: Option<VadReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg_log_tail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<ChunkRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_summary: Option<ErrorSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl AsrPayload {
    /// Seed a payload at the start of transcription.
    pub fn new(pipeline_version: &str, config_snapshot: Value, language_hint: &str) -> Self {
        Self {
            pipeline_version: pipeline_version.to_string(),
            config_snapshot,
            language_hint: language_hint.to_string(),
            vad: None,
            ffmpeg_log_tail: None,
            api_version: None,
            provider: None,
            model: None,
            billing_plan: None,
            chunks: None,
            total_duration_seconds: None,
            error_summary: None,
            cost: None,
        }
    }
}

/// Stage-derived metadata attached to a message.
///
/// Unknown keys survive round-trips through `extra` so downstream tooling can
/// annotate messages without schema churn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Derived {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asr: Option<AsrPayload>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

// =============================================================================
// Message
// =============================================================================

/// One parsed chat entry flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Message {
    /// Stable ordinal within the source file.
    pub idx: u64,
    /// Original timestamp string as parsed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    pub sender: String,
    #[serde(default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub content_text: String,
    #[serde(default)]
    pub raw_line: String,
    #[serde(default)]
    pub raw_block: String,
    /// Parser hint pointing at an attached media file (e.g., "PTT-1234.opus").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_hint: Option<String>,
    /// Resolved on-disk media path, relative to the chat root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default)]
    pub derived: Derived,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(default)]
    pub partial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<StatusReason>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl Message {
    /// Build a minimal message; remaining fields take their defaults.
    pub fn new(idx: u64, sender: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            idx,
            ts: None,
            sender: sender.into(),
            kind,
            content_text: String::new(),
            raw_line: String::new(),
            raw_block: String::new(),
            media_hint: None,
            media_filename: None,
            caption: None,
            derived: Derived::default(),
            status: MessageStatus::Ok,
            partial: false,
            status_reason: None,
            errors: Vec::new(),
        }
    }

    pub fn is_voice(&self) -> bool {
        self.kind == MessageKind::Voice
    }

    /// Mark partially processed with the code's default message.
    pub fn mark_partial(&mut self, code: ReasonCode) {
        self.status = MessageStatus::Partial;
        self.partial = true;
        self.status_reason = Some(StatusReason::from_code(code));
    }

    /// Mark failed with the code's default message.
    pub fn mark_failed(&mut self, code: ReasonCode) {
        self.status = MessageStatus::Failed;
        self.partial = false;
        self.status_reason = Some(StatusReason::from_code(code));
    }

    /// Mark failed with extra context (e.g., the unresolved hint).
    pub fn mark_failed_with_context(&mut self, code: ReasonCode, context: Value) {
        self.status = MessageStatus::Failed;
        self.partial = false;
        self.status_reason = Some(StatusReason::with_context(code, context));
    }

    /// Mark skipped without a reason.
    pub fn mark_skipped(&mut self) {
        self.status = MessageStatus::Skipped;
        self.partial = false;
        self.status_reason = None;
    }

    /// Append a free-form error string to the audit trail.
    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }
}

// =============================================================================
// Tests
// =============================================================================
