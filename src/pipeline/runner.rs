//! Resumable pipeline runner.
//!
//! Drives the four stages (`ingest`, `media`, `transcribe`, `finalize`) over
//! a run directory, persisting the manifest after every state change. The
//! runner is the only writer of the manifest; transcription workers hand
//! finished messages back over the join set and progress is recorded here.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::{AppConfig, RunConfig};
use crate::core::asr::AsrConfigError;
use crate::core::message::{Message, ReasonCode};
use crate::core::transcribe::{PIPELINE_VERSION, Transcriber};
use crate::pipeline::manifest::{ManifestError, RunManifest, Stage};
use crate::pipeline::metrics::{MetricsError, RunMetrics};
use crate::pipeline::outputs::{OutputError, load_messages, write_messages_jsonl, write_preview};

/// Errors that abort a pipeline run.
///
/// Per-message transcription failures are not errors; they end up as message
/// statuses. Only configuration problems and artifact I/O reach this level.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid run configuration: {0}")]
    InvalidRun(String),
    #[error(transparent)]
    AsrConfig(#[from] AsrConfigError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error("failed to prepare run directory {path}: {source}")]
    RunDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("transcription worker panicked: {0}")]
    Worker(String),
}

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub metrics_path: PathBuf,
    pub messages_total: usize,
    pub voice_total: usize,
    pub preview_count: usize,
}

/// Execute a full pipeline run.
///
/// With `resume` enabled, stages whose manifest record is complete and whose
/// output artifacts still exist are skipped, and previously transcribed
/// messages compatible with the current pipeline version, provider, and
/// model are reused without touching any backend.
pub async fn run_pipeline(config: &AppConfig, run: &RunConfig) -> Result<RunReport, PipelineError> {
    run.validate().map_err(PipelineError::InvalidRun)?;
    std::fs::create_dir_all(&run.run_dir).map_err(|source| PipelineError::RunDir {
        path: run.run_dir.clone(),
        source,
    })?;

    let manifest_path = run.manifest_path();
    let mut manifest = if run.resume && manifest_path.exists() {
        RunManifest::load(&manifest_path)?
    } else {
        RunManifest::new(run)
    };
    manifest.summary.resume_enabled = run.resume;
    manifest.save(&manifest_path)?;

    let started = Instant::now();
    info!(run_id = %run.run_id, resume = run.resume, "starting pipeline run");

    let ingested = run_ingest(run, &mut manifest).await?;
    let audited = run_media(run, &mut manifest, ingested).await?;
    let transcribed = run_transcribe(config, run, &mut manifest, audited.clone()).await?;
    let preview_count = run_finalize(run, &mut manifest, &transcribed).await?;

    let mut metrics = RunMetrics::new();
    metrics.record_messages(&transcribed);
    metrics.record_media_resolution(&audited);
    metrics.record_wall_clock(started.elapsed().as_secs_f64());
    metrics.save(&run.metrics_path())?;

    manifest.summary.messages_total = transcribed.len();
    manifest.summary.voice_total = metrics.voice_total;
    manifest.finish();
    manifest.save(&manifest_path)?;

    info!(
        run_id = %run.run_id,
        messages = transcribed.len(),
        voice = metrics.voice_total,
        seconds = metrics.wall_clock_seconds,
        "pipeline run complete"
    );

    Ok(RunReport {
        run_id: run.run_id.clone(),
        run_dir: run.run_dir.clone(),
        manifest_path,
        metrics_path: run.metrics_path(),
        messages_total: transcribed.len(),
        voice_total: metrics.voice_total,
        preview_count,
    })
}

/// Whether a stage can be skipped: resume requested, manifest says complete,
/// and every required artifact still exists. Manifest state alone is never
/// trusted.
fn can_skip(run: &RunConfig, manifest: &RunManifest, stage: Stage, required: &[PathBuf]) -> bool {
    run.resume
        && manifest.step(stage).status.is_complete()
        && required.iter().all(|path| path.exists())
}

/// Mark a stage failed, persist the manifest, and surface the error.
fn fail_stage(
    run: &RunConfig,
    manifest: &mut RunManifest,
    stage: Stage,
    error: PipelineError,
) -> PipelineError {
    manifest.fail_step(stage, error.to_string());
    if let Err(save_error) = manifest.save(&run.manifest_path()) {
        warn!(stage = %stage, error = %save_error, "failed to persist manifest after stage failure");
    }
    error
}

/// Keep every Nth message, then cap the count, then re-index.
fn apply_sampling(mut messages: Vec<Message>, run: &RunConfig) -> Vec<Message> {
    if let Some(every) = run.sample_every {
        messages = messages.into_iter().step_by(every.max(1)).collect();
    }
    if let Some(limit) = run.sample_limit {
        messages.truncate(limit);
    }
    for (idx, message) in messages.iter_mut().enumerate() {
        message.idx = idx as u64;
    }
    messages
}

// =============================================================================
// Stage: ingest
// =============================================================================

async fn run_ingest(
    run: &RunConfig,
    manifest: &mut RunManifest,
) -> Result<Vec<Message>, PipelineError> {
    let stage = Stage::Ingest;
    let path = run.stage_output_path(stage.as_str());

    if can_skip(run, manifest, stage, std::slice::from_ref(&path)) {
        let messages = load_messages(&path)?;
        info!(count = messages.len(), "ingest stage skipped, reusing snapshot");
        manifest.skip_step(stage, messages.len());
        manifest.save(&run.manifest_path())?;
        return Ok(messages);
    }

    manifest.begin_step(stage, 0);
    manifest.save(&run.manifest_path())?;

    let result: Result<Vec<Message>, PipelineError> = (|| {
        let messages = apply_sampling(load_messages(&run.source_file)?, run);
        write_messages_jsonl(&messages, &path)?;
        Ok(messages)
    })();

    match result {
        Ok(messages) => {
            manifest.step_mut(stage).total = messages.len();
            manifest.complete_step(stage);
            manifest.save(&run.manifest_path())?;
            info!(count = messages.len(), "ingest stage complete");
            Ok(messages)
        }
        Err(error) => Err(fail_stage(run, manifest, stage, error)),
    }
}

// =============================================================================
// Stage: media
// =============================================================================

/// Audit resolved media references: a voice message whose file is missing
/// (or that never had one) is marked `unresolved_media` here, and the
/// resolution verdict is recorded under `derived.media`.
async fn run_media(
    run: &RunConfig,
    manifest: &mut RunManifest,
    messages: Vec<Message>,
) -> Result<Vec<Message>, PipelineError> {
    let stage = Stage::Media;
    let path = run.stage_output_path(stage.as_str());

    if can_skip(run, manifest, stage, std::slice::from_ref(&path)) {
        let messages = load_messages(&path)?;
        info!(count = messages.len(), "media stage skipped, reusing snapshot");
        manifest.skip_step(stage, messages.len());
        manifest.save(&run.manifest_path())?;
        return Ok(messages);
    }

    manifest.begin_step(stage, messages.len());
    manifest.save(&run.manifest_path())?;

    let result: Result<Vec<Message>, PipelineError> = (|| {
        let mut audited = messages;
        for message in audited.iter_mut().filter(|m| m.is_voice()) {
            let resolved = match message.media_filename.as_deref() {
                Some(filename) if run.media_path(filename).is_file() => true,
                Some(filename) => {
                    let filename = filename.to_string();
                    message.media_filename = None;
                    message.mark_failed_with_context(
                        ReasonCode::UnresolvedMedia,
                        json!({ "media_filename": filename }),
                    );
                    false
                }
                None => {
                    message.mark_failed(ReasonCode::UnresolvedMedia);
                    false
                }
            };
            message
                .derived
                .extra
                .insert("media".to_string(), json!({ "resolved": resolved }));
        }
        write_messages_jsonl(&audited, &path)?;
        Ok(audited)
    })();

    match result {
        Ok(audited) => {
            manifest.complete_step(stage);
            manifest.save(&run.manifest_path())?;
            Ok(audited)
        }
        Err(error) => Err(fail_stage(run, manifest, stage, error)),
    }
}

// =============================================================================
// Stage: transcribe
// =============================================================================

fn count_voice(messages: &[Message]) -> usize {
    messages.iter().filter(|m| m.is_voice()).count()
}

/// Whether a previously persisted message can stand in for re-transcription.
fn reusable(previous: &Message, provider: &str, model: &str) -> bool {
    let Some(payload) = previous.derived.asr.as_ref() else {
        return false;
    };
    payload.pipeline_version == PIPELINE_VERSION
        && payload.provider.as_deref() == Some(provider)
        && payload.model.as_deref() == Some(model)
}

/// Copy the voice-processing outcome of a prior run onto a fresh message.
fn copy_voice_state(target: &mut Message, previous: &Message) {
    target.content_text = previous.content_text.clone();
    target.status = previous.status;
    target.partial = previous.partial;
    target.status_reason = previous.status_reason.clone();
    target.errors = previous.errors.clone();
    target.derived = previous.derived.clone();
}

async fn run_transcribe(
    config: &AppConfig,
    run: &RunConfig,
    manifest: &mut RunManifest,
    messages: Vec<Message>,
) -> Result<Vec<Message>, PipelineError> {
    let stage = Stage::Transcribe;
    let path = run.stage_output_path(stage.as_str());

    if can_skip(run, manifest, stage, std::slice::from_ref(&path)) {
        let messages = load_messages(&path)?;
        info!(count = messages.len(), "transcribe stage skipped, reusing snapshot");
        manifest.skip_step(stage, count_voice(&messages));
        manifest.save(&run.manifest_path())?;
        return Ok(messages);
    }

    // A partially written snapshot from an interrupted run feeds reuse even
    // though the step never reached ok.
    let previous: Vec<Message> = if run.resume && path.exists() {
        load_messages(&path).unwrap_or_default()
    } else {
        Vec::new()
    };

    let voice_total = count_voice(&messages);
    manifest.begin_step(stage, voice_total);
    manifest.save(&run.manifest_path())?;

    match transcribe_messages(config, run, manifest, messages, previous).await {
        Ok(transcribed) => {
            write_messages_jsonl(&transcribed, &path)
                .map_err(|e| fail_stage(run, manifest, stage, e.into()))?;
            manifest.complete_step(stage);
            manifest.save(&run.manifest_path())?;
            Ok(transcribed)
        }
        Err(error) => Err(fail_stage(run, manifest, stage, error)),
    }
}

async fn transcribe_messages(
    config: &AppConfig,
    run: &RunConfig,
    manifest: &mut RunManifest,
    mut messages: Vec<Message>,
    previous: Vec<Message>,
) -> Result<Vec<Message>, PipelineError> {
    let stage = Stage::Transcribe;
    let credential = config.credential_for(&config.audio.asr_provider);
    let transcriber = Arc::new(
        Transcriber::new(config.audio.clone(), credential.as_deref())?.with_media_root(&run.root),
    );

    let previous_by_idx: std::collections::HashMap<u64, Message> =
        previous.into_iter().map(|m| (m.idx, m)).collect();

    let mut done = 0usize;
    let mut pending: Vec<usize> = Vec::new();
    for (position, message) in messages.iter_mut().enumerate() {
        if !message.is_voice() {
            continue;
        }
        match previous_by_idx.get(&message.idx) {
            Some(prior) if reusable(prior, transcriber.provider_name(), transcriber.model()) => {
                copy_voice_state(message, prior);
                done += 1;
            }
            _ => pending.push(position),
        }
    }
    if done > 0 {
        info!(reused = done, "reusing transcriptions from previous run");
        manifest.set_progress(stage, done);
        manifest.save(&run.manifest_path())?;
    }

    // Bounded fan-out. Workers own their message and hand it back with its
    // original position; only this task touches the manifest.
    let workers = run.effective_workers();
    let mut join_set: JoinSet<(usize, Message)> = JoinSet::new();
    let mut queue = pending.into_iter();
    let mut record = |messages: &mut Vec<Message>,
                      manifest: &mut RunManifest,
                      done: &mut usize,
                      (position, message): (usize, Message)|
     -> Result<(), PipelineError> {
        messages[position] = message;
        *done += 1;
        manifest.set_progress(stage, *done);
        manifest.save(&run.manifest_path())?;
        Ok(())
    };

    loop {
        while join_set.len() < workers {
            let Some(position) = queue.next() else {
                break;
            };
            let message = messages[position].clone();
            let transcriber = Arc::clone(&transcriber);
            join_set.spawn(async move { (position, transcriber.transcribe(message).await) });
        }
        let Some(joined) = join_set.join_next().await else {
            break;
        };
        let outcome = joined.map_err(|e| PipelineError::Worker(e.to_string()))?;
        record(&mut messages, manifest, &mut done, outcome)?;
    }

    messages.sort_by_key(|m| m.idx);
    Ok(messages)
}

// =============================================================================
// Stage: finalize
// =============================================================================

async fn run_finalize(
    run: &RunConfig,
    manifest: &mut RunManifest,
    messages: &[Message],
) -> Result<usize, PipelineError> {
    let stage = Stage::Finalize;
    let path = run.stage_output_path(stage.as_str());
    let preview = run.preview_path();

    if can_skip(run, manifest, stage, &[path.clone(), preview.clone()]) {
        info!("finalize stage skipped, outputs already present");
        manifest.skip_step(stage, messages.len());
        manifest.save(&run.manifest_path())?;
        return Ok(count_voice(messages));
    }

    manifest.begin_step(stage, messages.len());
    manifest.save(&run.manifest_path())?;

    let result: Result<usize, PipelineError> = (|| {
        write_messages_jsonl(messages, &path)?;
        Ok(write_preview(messages, &preview)?)
    })();

    match result {
        Ok(preview_count) => {
            manifest.complete_step(stage);
            manifest.save(&run.manifest_path())?;
            Ok(preview_count)
        }
        Err(error) => Err(fail_stage(run, manifest, stage, error)),
    }
}
