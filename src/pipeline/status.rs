//! Run discovery and status rollups for the `status` subcommand.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::runs_dir;
use crate::pipeline::manifest::{ManifestError, RunManifest, StepProgress, StepStatus};
use crate::pipeline::metrics::RunMetrics;

/// Overall state of a run, derived from its step statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    Ok,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Running => "running",
            RunState::Ok => "ok",
            RunState::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One run's manifest joined with its metrics, for display.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub root: String,
    pub source_file: String,
    pub status: RunState,
    pub start_time: String,
    pub end_time: Option<String>,
    pub messages_total: usize,
    pub voice_total: usize,
    pub voice_ok: usize,
    pub voice_failed: usize,
    pub audio_seconds: f64,
    pub asr_cost_usd: f64,
    pub error: Option<String>,
    pub steps: Vec<StepProgress>,
}

/// Derive the overall run state from the manifest.
fn overall_state(manifest: &RunManifest) -> RunState {
    if manifest.summary.error.is_some() {
        return RunState::Failed;
    }
    let statuses: Vec<StepStatus> = manifest.steps.iter().map(|s| s.status).collect();
    if statuses.iter().any(|s| *s == StepStatus::Failed) {
        return RunState::Failed;
    }
    if statuses.iter().any(|s| *s == StepStatus::Running) {
        return RunState::Running;
    }
    if !statuses.is_empty() && statuses.iter().all(|s| s.is_complete()) {
        return RunState::Ok;
    }
    RunState::Pending
}

/// Load one run directory's manifest and metrics into a summary.
///
/// The manifest is required; metrics are optional and default to zero when
/// missing or unreadable.
pub fn load_run_summary(run_dir: &Path) -> Result<RunSummary, ManifestError> {
    let manifest = RunManifest::load(&run_dir.join("run_manifest.json"))?;
    let metrics = RunMetrics::load(&run_dir.join("metrics.json")).unwrap_or_default();

    Ok(RunSummary {
        run_id: manifest.run_id.clone(),
        run_dir: run_dir.to_path_buf(),
        root: manifest.root.clone(),
        source_file: manifest.source_file.clone(),
        status: overall_state(&manifest),
        start_time: manifest.start_time.clone(),
        end_time: manifest.end_time.clone(),
        messages_total: manifest.summary.messages_total,
        voice_total: manifest.summary.voice_total,
        voice_ok: metrics.voice_status.ok,
        voice_failed: metrics.voice_status.failed,
        audio_seconds: metrics.audio_seconds_total,
        asr_cost_usd: metrics.asr_cost_total_usd,
        error: manifest.summary.error.clone(),
        steps: manifest.steps,
    })
}

/// Enumerate runs under a root, newest first.
///
/// A run is any directory under `root/runs` (or `root` itself when there is
/// no `runs` directory) containing a `run_manifest.json`. Unreadable runs
/// are silently skipped.
pub fn list_runs(root: &Path) -> Vec<RunSummary> {
    let dir = runs_dir(root);
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };

    let mut summaries: Vec<RunSummary> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir() && path.join("run_manifest.json").exists())
        .filter_map(|path| load_run_summary(&path).ok())
        .collect();

    summaries.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    summaries
}
