//! Run metrics rollup written by the finalize stage.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::message::{Message, MessageStatus, ReasonCode};

/// Metrics schema version; bumped on breaking layout changes.
pub const METRICS_SCHEMA_VERSION: &str = "1.0.0";

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("metrics at {path} are not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("unsupported metrics schema version {found} (expected {METRICS_SCHEMA_VERSION})")]
    SchemaVersion { found: String },
}

/// Voice message outcomes by terminal status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStatusCounts {
    #[serde(default)]
    pub ok: usize,
    #[serde(default)]
    pub partial: usize,
    #[serde(default)]
    pub failed: usize,
}

/// Media audit outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaResolutionCounts {
    #[serde(default)]
    pub resolved: usize,
    #[serde(default)]
    pub unresolved: usize,
    #[serde(default)]
    pub ambiguous: usize,
}

/// Aggregate metrics for one run, persisted as `metrics.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub schema_version: String,
    #[serde(default)]
    pub messages_total: usize,
    #[serde(default)]
    pub voice_total: usize,
    #[serde(default)]
    pub voice_status: VoiceStatusCounts,
    #[serde(default)]
    pub media_resolution: MediaResolutionCounts,
    #[serde(default)]
    pub audio_seconds_total: f64,
    #[serde(default)]
    pub asr_cost_total_usd: f64,
    #[serde(default)]
    pub wall_clock_seconds: f64,
    #[serde(default)]
    pub asr_provider: Option<String>,
    #[serde(default)]
    pub asr_model: Option<String>,
    #[serde(default)]
    pub asr_language: Option<String>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            schema_version: METRICS_SCHEMA_VERSION.to_string(),
            ..Self::default()
        }
    }

    /// Fold the final message set into the metric counters.
    ///
    /// Provider identity fields take the first value seen across payloads;
    /// a run uses one provider, so first-wins is stable.
    pub fn record_messages(&mut self, messages: &[Message]) {
        self.messages_total = messages.len();
        let mut audio_seconds = 0.0;
        let mut cost = 0.0;

        for message in messages {
            if !message.is_voice() {
                continue;
            }
            self.voice_total += 1;
            match message.status {
                MessageStatus::Ok => self.voice_status.ok += 1,
                MessageStatus::Partial => self.voice_status.partial += 1,
                MessageStatus::Failed => self.voice_status.failed += 1,
                MessageStatus::Skipped => {}
            }

            if let Some(payload) = &message.derived.asr {
                audio_seconds += payload.total_duration_seconds.unwrap_or(0.0);
                cost += payload.cost.unwrap_or(0.0);
                if self.asr_provider.is_none() {
                    self.asr_provider = payload.provider.clone();
                }
                if self.asr_model.is_none() {
                    self.asr_model = payload.model.clone();
                }
                if self.asr_language.is_none() {
                    self.asr_language = Some(payload.language_hint.clone());
                }
            }
        }

        self.audio_seconds_total = round3(self.audio_seconds_total + audio_seconds);
        self.asr_cost_total_usd = round4(self.asr_cost_total_usd + cost);
    }

    /// Count media audit outcomes from the media-stage snapshot.
    ///
    /// Taken from that snapshot rather than the final one because the
    /// transcribe stage overwrites status reasons on unresolved messages.
    pub fn record_media_resolution(&mut self, messages: &[Message]) {
        let mut counts = MediaResolutionCounts::default();
        for message in messages {
            if message.media_filename.is_some() {
                counts.resolved += 1;
            } else {
                match message.status_reason.as_ref().map(|r| r.code) {
                    Some(ReasonCode::UnresolvedMedia) => counts.unresolved += 1,
                    Some(ReasonCode::AmbiguousMedia) => counts.ambiguous += 1,
                    _ => {}
                }
            }
        }
        self.media_resolution = counts;
    }

    pub fn record_wall_clock(&mut self, seconds: f64) {
        self.wall_clock_seconds = round3(seconds);
    }

    /// Persist as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), MetricsError> {
        let io_err = |source| MetricsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_vec_pretty(self).map_err(|source| MetricsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, body).map_err(io_err)
    }

    pub fn load(path: &Path) -> Result<Self, MetricsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| MetricsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let metrics: RunMetrics =
            serde_json::from_str(&raw).map_err(|source| MetricsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if metrics.schema_version != METRICS_SCHEMA_VERSION {
            return Err(MetricsError::SchemaVersion {
                found: metrics.schema_version,
            });
        }
        Ok(metrics)
    }
}
