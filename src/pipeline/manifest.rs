//! Run manifest: the persisted progress record of one pipeline run.
//!
//! The manifest is rewritten atomically after every state change, so a killed
//! process leaves behind an accurate picture of what completed. On resume the
//! manifest is reloaded, schema-checked, and steps recorded as complete are
//! skipped when their artifacts still exist.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use uuid::Uuid;

use crate::config::RunConfig;

/// Manifest schema version; bumped on breaking layout changes.
pub const MANIFEST_SCHEMA_VERSION: &str = "1.0.0";

const ISO_SECONDS: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

/// Current UTC time at second precision, ISO-8601 with `Z` suffix.
pub fn now_iso() -> String {
    OffsetDateTime::now_utc()
        .format(&ISO_SECONDS)
        .unwrap_or_default()
}

// =============================================================================
// Stages
// =============================================================================

/// The pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Load, sample, and re-index source messages.
    Ingest,
    /// Audit media references against files on disk.
    Media,
    /// Transcribe voice messages concurrently.
    Transcribe,
    /// Write final outputs, metrics, and the transcript preview.
    Finalize,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Ingest, Stage::Media, Stage::Transcribe, Stage::Finalize];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Media => "media",
            Stage::Transcribe => "transcribe",
            Stage::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Step Progress
// =============================================================================

/// Status of one pipeline step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Ok,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Ok => "ok",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }

    /// Whether a step in this state counts as successfully done for resume.
    pub fn is_complete(&self) -> bool {
        matches!(self, StepStatus::Ok | StepStatus::Skipped)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress record for one pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepProgress {
    pub name: String,
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub done: usize,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub ended_at: Option<String>,
}

impl StepProgress {
    fn new(stage: Stage) -> Self {
        Self {
            name: stage.as_str().to_string(),
            status: StepStatus::Pending,
            total: 0,
            done: 0,
            error: None,
            started_at: None,
            ended_at: None,
        }
    }
}

// =============================================================================
// Run Manifest
// =============================================================================

/// Rollup block persisted alongside step progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummaryBlock {
    #[serde(default)]
    pub messages_total: usize,
    #[serde(default)]
    pub voice_total: usize,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub resume_enabled: bool,
}

/// Errors raised while persisting or loading a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("manifest at {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("manifest schema version '{found}' is not supported (expected {MANIFEST_SCHEMA_VERSION})")]
    SchemaVersion { found: String },
}

/// Persisted progress record for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: String,
    pub run_id: String,
    pub root: String,
    pub source_file: String,
    pub run_dir: String,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    /// Steps in execution order.
    pub steps: Vec<StepProgress>,
    #[serde(default)]
    pub summary: RunSummaryBlock,
}

impl RunManifest {
    /// Fresh manifest with every step pending.
    pub fn new(run: &RunConfig) -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
            run_id: run.run_id.clone(),
            root: run.root.display().to_string(),
            source_file: run.source_file.display().to_string(),
            run_dir: run.run_dir.display().to_string(),
            start_time: now_iso(),
            end_time: None,
            steps: Stage::ALL.iter().map(|s| StepProgress::new(*s)).collect(),
            summary: RunSummaryBlock {
                resume_enabled: run.resume,
                ..RunSummaryBlock::default()
            },
        }
    }

    pub fn step(&self, stage: Stage) -> &StepProgress {
        // Steps are seeded for every stage in new(); loaded manifests are
        // schema-checked, so the entry is always present.
        self.steps
            .iter()
            .find(|s| s.name == stage.as_str())
            .unwrap_or_else(|| panic!("manifest missing step {stage}"))
    }

    pub fn step_mut(&mut self, stage: Stage) -> &mut StepProgress {
        self.steps
            .iter_mut()
            .find(|s| s.name == stage.as_str())
            .unwrap_or_else(|| panic!("manifest missing step {stage}"))
    }

    /// Mark a step running with a known work total.
    pub fn begin_step(&mut self, stage: Stage, total: usize) {
        let step = self.step_mut(stage);
        step.status = StepStatus::Running;
        step.total = total;
        step.done = 0;
        step.error = None;
        step.started_at = Some(now_iso());
        step.ended_at = None;
    }

    /// Update the done counter of a running step.
    pub fn set_progress(&mut self, stage: Stage, done: usize) {
        self.step_mut(stage).done = done;
    }

    pub fn complete_step(&mut self, stage: Stage) {
        let step = self.step_mut(stage);
        step.status = StepStatus::Ok;
        step.done = step.total;
        step.ended_at = Some(now_iso());
    }

    pub fn fail_step(&mut self, stage: Stage, error: impl Into<String>) {
        let error = error.into();
        let step = self.step_mut(stage);
        step.status = StepStatus::Failed;
        step.error = Some(error.clone());
        step.ended_at = Some(now_iso());
        self.summary.error = Some(format!("{stage}: {error}"));
    }

    /// Mark a step skipped on resume, carrying the work counts forward.
    pub fn skip_step(&mut self, stage: Stage, total: usize) {
        let step = self.step_mut(stage);
        step.status = StepStatus::Skipped;
        step.total = total;
        step.done = total;
        step.error = None;
        step.ended_at = Some(now_iso());
    }

    /// Stamp the run end time.
    pub fn finish(&mut self) {
        self.end_time = Some(now_iso());
    }

    /// Persist atomically: write a unique temp file, then rename into place.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let io_err = |source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_vec_pretty(self).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp = path.with_extension(format!("json.{}.tmp", Uuid::new_v4()));
        std::fs::write(&tmp, body).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }

    /// Load and schema-check a manifest.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut manifest: RunManifest =
            serde_json::from_str(&raw).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if manifest.schema_version != MANIFEST_SCHEMA_VERSION {
            return Err(ManifestError::SchemaVersion {
                found: manifest.schema_version,
            });
        }
        // Backfill steps a foreign or truncated manifest may lack, so step()
        // lookups stay total.
        for stage in Stage::ALL {
            if !manifest.steps.iter().any(|s| s.name == stage.as_str()) {
                manifest.steps.push(StepProgress::new(stage));
            }
        }
        Ok(manifest)
    }
}
