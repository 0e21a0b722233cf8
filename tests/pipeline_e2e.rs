//! End-to-end pipeline tests.
//!
//! These run the full four-stage pipeline against a synthetic chat export,
//! with a shell script standing in for ffmpeg and the deterministic stub
//! backends doing recognition (no credentials are set, so provider
//! resolution always lands on the stubs).

use std::env;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serial_test::serial;
use tempfile::TempDir;

use voicepipe::config::{AppConfig, RunConfig};
use voicepipe::core::message::{Message, MessageKind, MessageStatus, ReasonCode};
use voicepipe::pipeline::{
    RunManifest, RunState, Stage, StepStatus, list_runs, load_messages, run_pipeline,
};

fn cleanup_env_vars() {
    unsafe {
        env::remove_var("OPENAI_API_KEY");
        env::remove_var("GOOGLE_API_KEY");
        env::remove_var("VOICEPIPE_ASR_PROVIDER");
    }
}

/// ffmpeg stand-in that copies the `-i` input to the output path.
fn fake_ffmpeg(dir: &Path) -> PathBuf {
    let path = dir.join("ffmpeg");
    std::fs::write(
        &path,
        "#!/bin/sh\nin=\"\"\nprev=\"\"\nfor arg; do\n  if [ \"$prev\" = \"-i\" ]; then in=\"$arg\"; fi\n  prev=\"$arg\"\n  out=\"$arg\"\ndone\ncp \"$in\" \"$out\"\n",
    )
    .unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// ffmpeg stand-in that always fails; used to prove resumed runs skip it.
fn broken_ffmpeg(dir: &Path) -> PathBuf {
    let path = dir.join("ffmpeg-broken");
    std::fs::write(&path, "#!/bin/sh\nexit 1\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// One second of 16 kHz mono audio with a tone, so VAD sees speech.
fn write_media_wav(path: &Path) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for n in 0..16_000u32 {
        let sample = if n % 50 < 25 { 2000i16 } else { -2000i16 };
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

fn voice_message(idx: u64, filename: &str) -> Message {
    let mut msg = Message::new(idx, "alice", MessageKind::Voice);
    msg.media_filename = Some(filename.to_string());
    msg
}

/// Build a chat export root: messages.jsonl plus media files.
fn seed_export(root: &Path, messages: &[Message], media: &[&str]) {
    for filename in media {
        write_media_wav(&root.join(filename));
    }
    let body: String = messages
        .iter()
        .map(|m| serde_json::to_string(m).unwrap() + "\n")
        .collect();
    std::fs::write(root.join("messages.jsonl"), body).unwrap();
}

fn app_config(ffmpeg: &Path, cache_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.audio.ffmpeg_bin = ffmpeg.display().to_string();
    config.audio.cache_dir = cache_dir.to_path_buf();
    config
}

#[tokio::test]
#[serial]
async fn test_full_run_with_stub_backend() {
    cleanup_env_vars();
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let mut text = Message::new(0, "bob", MessageKind::Text);
    text.content_text = "hello".to_string();
    seed_export(
        root,
        &[text, voice_message(1, "PTT-1.opus"), voice_message(2, "PTT-2.opus")],
        &["PTT-1.opus", "PTT-2.opus"],
    );

    let config = app_config(&fake_ffmpeg(root), &root.join("cache"));
    let run = RunConfig::new(root, Some("e2e"));

    let report = run_pipeline(&config, &run).await.unwrap();
    assert_eq!(report.messages_total, 3);
    assert_eq!(report.voice_total, 2);
    assert_eq!(report.preview_count, 2);

    // All stages completed and the manifest is finished.
    let manifest = RunManifest::load(&run.manifest_path()).unwrap();
    for stage in Stage::ALL {
        assert_eq!(manifest.step(stage).status, StepStatus::Ok, "{stage}");
    }
    assert!(manifest.end_time.is_some());
    assert!(manifest.summary.error.is_none());

    // Stub transcripts landed in the final snapshot.
    let finalized = load_messages(&run.stage_output_path("finalize")).unwrap();
    assert_eq!(finalized.len(), 3);
    for msg in finalized.iter().filter(|m| m.is_voice()) {
        assert_eq!(msg.status, MessageStatus::Ok);
        assert_eq!(msg.content_text, "whisper-1-chunk-0.00-1.00");
        let payload = msg.derived.asr.as_ref().unwrap();
        assert_eq!(payload.provider.as_deref(), Some("whisper_openai"));
        assert_eq!(payload.chunks.as_ref().unwrap().len(), 1);
        assert_eq!(payload.cost, Some(0.006));
    }

    // Preview has one line per voice message.
    let preview = std::fs::read_to_string(run.preview_path()).unwrap();
    assert_eq!(preview.lines().count(), 2);

    // Metrics rolled up.
    let metrics: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(run.metrics_path()).unwrap()).unwrap();
    assert_eq!(metrics["voice_total"], 2);
    assert_eq!(metrics["voice_status"]["ok"], 2);
    assert_eq!(metrics["media_resolution"]["resolved"], 2);
    assert_eq!(metrics["asr_cost_total_usd"], 0.012);
    assert_eq!(metrics["asr_provider"], "whisper_openai");

    // Run shows up in status discovery.
    let runs = list_runs(root);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, "e2e");
    assert_eq!(runs[0].status, RunState::Ok);
    cleanup_env_vars();
}

#[tokio::test]
#[serial]
async fn test_unresolved_media_is_audited_and_counted() {
    cleanup_env_vars();
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    seed_export(
        root,
        &[voice_message(0, "PTT-0.opus"), voice_message(1, "missing.opus")],
        &["PTT-0.opus"],
    );

    let config = app_config(&fake_ffmpeg(root), &root.join("cache"));
    let run = RunConfig::new(root, Some("audit"));
    run_pipeline(&config, &run).await.unwrap();

    // The media snapshot keeps the unresolved verdict.
    let audited = load_messages(&run.stage_output_path("media")).unwrap();
    assert_eq!(
        audited[1].status_reason.as_ref().map(|r| r.code),
        Some(ReasonCode::UnresolvedMedia)
    );
    assert!(audited[1].media_filename.is_none());
    assert_eq!(audited[1].derived.extra["media"]["resolved"], false);
    assert_eq!(audited[0].derived.extra["media"]["resolved"], true);

    // Transcription still terminal-fails the message with a placeholder.
    let finalized = load_messages(&run.stage_output_path("finalize")).unwrap();
    assert_eq!(finalized[0].status, MessageStatus::Ok);
    assert_eq!(finalized[1].status, MessageStatus::Failed);
    assert_eq!(finalized[1].content_text, "[UNSUPPORTED AUDIO FORMAT]");

    let metrics: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(run.metrics_path()).unwrap()).unwrap();
    assert_eq!(metrics["media_resolution"]["resolved"], 1);
    assert_eq!(metrics["media_resolution"]["unresolved"], 1);
    assert_eq!(metrics["voice_status"]["ok"], 1);
    assert_eq!(metrics["voice_status"]["failed"], 1);
    cleanup_env_vars();
}

#[tokio::test]
#[serial]
async fn test_resume_skips_completed_stages() {
    cleanup_env_vars();
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    seed_export(root, &[voice_message(0, "PTT-0.opus")], &["PTT-0.opus"]);

    let config = app_config(&fake_ffmpeg(root), &root.join("cache"));
    let mut run = RunConfig::new(root, Some("resume"));
    run_pipeline(&config, &run).await.unwrap();
    let first = std::fs::read(run.stage_output_path("finalize")).unwrap();

    // Second run resumes with a broken ffmpeg and a wiped cache; it must not
    // re-convert or re-transcribe anything.
    std::fs::remove_dir_all(root.join("cache")).unwrap();
    let config = app_config(&broken_ffmpeg(root), &root.join("cache"));
    run.resume = true;
    let report = run_pipeline(&config, &run).await.unwrap();
    assert_eq!(report.voice_total, 1);

    let manifest = RunManifest::load(&run.manifest_path()).unwrap();
    for stage in Stage::ALL {
        assert_eq!(manifest.step(stage).status, StepStatus::Skipped, "{stage}");
    }
    assert_eq!(std::fs::read(run.stage_output_path("finalize")).unwrap(), first);
    cleanup_env_vars();
}

#[tokio::test]
#[serial]
async fn test_resume_reuses_partial_transcribe_snapshot() {
    cleanup_env_vars();
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    seed_export(
        root,
        &[voice_message(0, "PTT-0.opus"), voice_message(1, "PTT-1.opus")],
        &["PTT-0.opus", "PTT-1.opus"],
    );

    let config = app_config(&fake_ffmpeg(root), &root.join("cache"));
    let mut run = RunConfig::new(root, Some("partial"));
    run_pipeline(&config, &run).await.unwrap();

    // Simulate an interrupted run: the transcribe snapshot survives but the
    // manifest says the stage (and everything after) never completed.
    let mut manifest = RunManifest::load(&run.manifest_path()).unwrap();
    manifest.begin_step(Stage::Transcribe, 2);
    manifest.begin_step(Stage::Finalize, 0);
    manifest.save(&run.manifest_path()).unwrap();
    let snapshot = std::fs::read(run.stage_output_path("transcribe")).unwrap();

    // Wipe the cache and break ffmpeg; reuse must come from the snapshot.
    std::fs::remove_dir_all(root.join("cache")).unwrap();
    let config = app_config(&broken_ffmpeg(root), &root.join("cache"));
    run.resume = true;
    run_pipeline(&config, &run).await.unwrap();

    let manifest = RunManifest::load(&run.manifest_path()).unwrap();
    assert_eq!(manifest.step(Stage::Transcribe).status, StepStatus::Ok);
    assert_eq!(manifest.step(Stage::Transcribe).done, 2);
    assert_eq!(
        std::fs::read(run.stage_output_path("transcribe")).unwrap(),
        snapshot
    );
    let finalized = load_messages(&run.stage_output_path("finalize")).unwrap();
    assert!(finalized.iter().all(|m| m.status == MessageStatus::Ok));
    cleanup_env_vars();
}

#[tokio::test]
#[serial]
async fn test_concurrent_and_sequential_artifacts_match() {
    cleanup_env_vars();
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let messages: Vec<Message> = (0..6)
        .map(|i| voice_message(i, &format!("PTT-{i}.opus")))
        .collect();
    let media: Vec<String> = (0..6).map(|i| format!("PTT-{i}.opus")).collect();
    let media_refs: Vec<&str> = media.iter().map(String::as_str).collect();
    seed_export(root, &messages, &media_refs);

    let config = app_config(&fake_ffmpeg(root), &root.join("cache"));

    let mut sequential = RunConfig::new(root, Some("seq"));
    sequential.max_workers = 1;
    run_pipeline(&config, &sequential).await.unwrap();

    let mut concurrent = RunConfig::new(root, Some("par"));
    concurrent.max_workers = 4;
    run_pipeline(&config, &concurrent).await.unwrap();

    for stage in ["transcribe", "finalize"] {
        assert_eq!(
            std::fs::read(sequential.stage_output_path(stage)).unwrap(),
            std::fs::read(concurrent.stage_output_path(stage)).unwrap(),
            "{stage} artifacts differ"
        );
    }
    cleanup_env_vars();
}

#[tokio::test]
#[serial]
async fn test_sampling_limits_ingest() {
    cleanup_env_vars();
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let messages: Vec<Message> = (0..8)
        .map(|i| voice_message(i, "PTT-0.opus"))
        .collect();
    seed_export(root, &messages, &["PTT-0.opus"]);

    let config = app_config(&fake_ffmpeg(root), &root.join("cache"));
    let mut run = RunConfig::new(root, Some("sampled"));
    run.sample_every = Some(2);
    run.sample_limit = Some(3);
    let report = run_pipeline(&config, &run).await.unwrap();

    assert_eq!(report.messages_total, 3);
    let ingested = load_messages(&run.stage_output_path("ingest")).unwrap();
    let indices: Vec<u64> = ingested.iter().map(|m| m.idx).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    cleanup_env_vars();
}

#[tokio::test]
#[serial]
async fn test_ingest_failure_recorded_in_manifest() {
    cleanup_env_vars();
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    std::fs::write(root.join("messages.jsonl"), "{not json}\n").unwrap();

    let config = app_config(&fake_ffmpeg(root), &root.join("cache"));
    let run = RunConfig::new(root, Some("bad-input"));
    let error = run_pipeline(&config, &run).await.unwrap_err();
    assert!(error.to_string().contains("invalid message"));

    let manifest = RunManifest::load(&run.manifest_path()).unwrap();
    assert_eq!(manifest.step(Stage::Ingest).status, StepStatus::Failed);
    let summary_error = manifest.summary.error.unwrap();
    assert!(summary_error.starts_with("ingest:"), "{summary_error}");

    let runs = list_runs(root);
    assert_eq!(runs[0].status, RunState::Failed);
    cleanup_env_vars();
}
