//! Per-run orchestration settings and output layout.
//!
//! A [`RunConfig`] pins down where one pipeline run reads its input and where
//! every artifact lands. All output paths derive from `run_dir`, so two runs
//! with different run ids never collide and a resumed run finds its previous
//! artifacts in place.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

static SLUG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    // Unwrap is fine: the pattern is a compile-time constant.
    Regex::new(r"[^a-zA-Z0-9]+").unwrap()
});

/// Turn an arbitrary label into a filesystem-safe run id.
///
/// Non-alphanumeric runs collapse to single dashes, edges are trimmed, and
/// the result is lowercased. Falls back to `"run"` when nothing survives.
pub fn slugify(label: &str) -> String {
    let slug = SLUG_PATTERN
        .replace_all(label, "-")
        .trim_matches('-')
        .to_lowercase();
    if slug.is_empty() {
        "run".to_string()
    } else {
        slug
    }
}

/// Settings for one orchestrated pipeline run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Chat export root; media files are resolved relative to this directory.
    pub root: PathBuf,
    /// Parsed messages JSONL consumed by the ingest stage.
    pub source_file: PathBuf,
    /// Slugified identifier naming the run directory.
    pub run_id: String,
    /// Directory holding every artifact of this run.
    pub run_dir: PathBuf,
    /// Skip steps already completed by a previous run in the same run_dir.
    pub resume: bool,
    /// Upper bound on concurrent voice transcriptions.
    pub max_workers: usize,
    /// Keep only every Nth voice message (applied before `sample_limit`).
    pub sample_every: Option<usize>,
    /// Keep at most N voice messages.
    pub sample_limit: Option<usize>,
}

impl RunConfig {
    /// Build a run configuration rooted at `root`.
    ///
    /// The run id defaults to a slug of the root directory name; output
    /// artifacts land under `root/runs/<run_id>/`.
    pub fn new(root: impl Into<PathBuf>, run_id: Option<&str>) -> Self {
        let root = root.into();
        let label = match run_id {
            Some(id) => id.to_string(),
            None => root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let run_id = slugify(&label);
        let run_dir = root.join("runs").join(&run_id);
        let source_file = root.join("messages.jsonl");
        Self {
            root,
            source_file,
            run_id,
            run_dir,
            resume: false,
            max_workers: 4,
            sample_every: None,
            sample_limit: None,
        }
    }

    /// Worker count actually used; zero is treated as one.
    pub fn effective_workers(&self) -> usize {
        self.max_workers.max(1)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.run_dir.join("run_manifest.json")
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.run_dir.join("metrics.json")
    }

    /// JSONL snapshot written after the named stage completes.
    pub fn stage_output_path(&self, stage: &str) -> PathBuf {
        self.run_dir.join(format!("messages.{stage}.jsonl"))
    }

    /// Human-readable transcript preview written by the finalize stage.
    pub fn preview_path(&self) -> PathBuf {
        self.run_dir.join("preview_transcripts.txt")
    }

    /// Check that the run can start: input paths exist and sampling values
    /// are usable.
    pub fn validate(&self) -> Result<(), String> {
        if !self.root.is_dir() {
            return Err(format!("root directory not found: {}", self.root.display()));
        }
        if !self.source_file.is_file() {
            return Err(format!(
                "source file not found: {}",
                self.source_file.display()
            ));
        }
        if self.run_id.is_empty() {
            return Err("run_id must not be empty".to_string());
        }
        if self.sample_every == Some(0) {
            return Err("sample_every must be greater than 0".to_string());
        }
        if self.sample_limit == Some(0) {
            return Err("sample_limit must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Path of a media file referenced by a message, relative to the root.
    pub fn media_path(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }
}

/// Directory scanned by `list_runs`: `root/runs` when present, else `root`.
pub fn runs_dir(root: &Path) -> PathBuf {
    let nested = root.join("runs");
    if nested.is_dir() {
        nested
    } else {
        root.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // ===== Slugify Tests =====

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("My Chat 2024!"), "my-chat-2024");
        assert_eq!(slugify("family_group"), "family-group");
        assert_eq!(slugify("already-clean"), "already-clean");
    }

    #[test]
    fn test_slugify_strips_edges() {
        assert_eq!(slugify("  trimmed  "), "trimmed");
        assert_eq!(slugify("--dashes--"), "dashes");
    }

    #[test]
    fn test_slugify_empty_falls_back() {
        assert_eq!(slugify(""), "run");
        assert_eq!(slugify("!!!"), "run");
    }

    #[test]
    fn test_slugify_non_ascii_collapses() {
        assert_eq!(slugify("café au lait"), "caf-au-lait");
    }

    // ===== RunConfig Tests =====

    #[test]
    fn test_run_id_defaults_to_root_name() {
        let config = RunConfig::new("/data/Family Chat", None);
        assert_eq!(config.run_id, "family-chat");
        assert_eq!(
            config.run_dir,
            PathBuf::from("/data/Family Chat/runs/family-chat")
        );
    }

    #[test]
    fn test_run_id_override_is_slugified() {
        let config = RunConfig::new("/data/export", Some("Trip Recap #2"));
        assert_eq!(config.run_id, "trip-recap-2");
    }

    #[test]
    fn test_output_paths_live_under_run_dir() {
        let config = RunConfig::new("/data/export", Some("r1"));
        assert_eq!(
            config.manifest_path(),
            PathBuf::from("/data/export/runs/r1/run_manifest.json")
        );
        assert_eq!(
            config.metrics_path(),
            PathBuf::from("/data/export/runs/r1/metrics.json")
        );
        assert_eq!(
            config.stage_output_path("transcribe"),
            PathBuf::from("/data/export/runs/r1/messages.transcribe.jsonl")
        );
        assert_eq!(
            config.preview_path(),
            PathBuf::from("/data/export/runs/r1/preview_transcripts.txt")
        );
    }

    #[test]
    fn test_validate_requires_existing_paths() {
        let config = RunConfig::new("/nonexistent/root", None);
        assert!(config.validate().is_err());

        let temp = TempDir::new().unwrap();
        let mut config = RunConfig::new(temp.path(), None);
        // Root exists but the source file does not yet.
        assert!(config.validate().is_err());

        fs::write(temp.path().join("messages.jsonl"), "").unwrap();
        config.source_file = temp.path().join("messages.jsonl");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_sampling() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("messages.jsonl"), "").unwrap();
        let mut config = RunConfig::new(temp.path(), None);
        config.sample_every = Some(0);
        assert!(config.validate().is_err());

        config.sample_every = Some(2);
        config.sample_limit = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_workers_clamps_zero() {
        let mut config = RunConfig::new("/data/export", None);
        config.max_workers = 0;
        assert_eq!(config.effective_workers(), 1);
        config.max_workers = 8;
        assert_eq!(config.effective_workers(), 8);
    }

    #[test]
    fn test_runs_dir_prefers_nested() {
        let temp = TempDir::new().unwrap();
        assert_eq!(runs_dir(temp.path()), temp.path().to_path_buf());
        fs::create_dir(temp.path().join("runs")).unwrap();
        assert_eq!(runs_dir(temp.path()), temp.path().join("runs"));
    }
}
