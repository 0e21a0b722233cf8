//! Voice-message transcription orchestrator.
//!
//! [`Transcriber`] runs the whole per-message flow: cache probe, ffmpeg
//! normalization, voice-activity annotation, chunking, per-chunk recognition,
//! and aggregation of chunk outcomes into message status and transcript text.
//!
//! # Failure Model
//!
//! `transcribe` never returns an error. Every failure mode has a terminal
//! message state (status, reason code, placeholder text, audit payload), so a
//! run always produces a complete output set and a failed message explains
//! itself. The call is idempotent: identical media under identical
//! configuration lands on the cache and skips all external work.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{AudioConfig, estimate_asr_cost};
use crate::core::asr::{AsrClient, AsrConfigError, BackendRegistry};
use crate::core::audio::{ChunkingError, chunk_wav, convert_to_wav, probe_duration};
use crate::core::cache::{CachedOutcome, ResultCache};
use crate::core::message::{
    AsrPayload, ChunkRecord, ChunkStatus, ErrorSummary, Message, MessageStatus, ReasonCode,
    StatusReason, VadReport,
};
use crate::core::vad;

/// Version stamped into every transcription payload; bump-on-release via the
/// crate version, so cached and resumed results from older builds are
/// recognized as incompatible.
pub const PIPELINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Placeholder transcript for media that never reached conversion.
const PLACEHOLDER_UNSUPPORTED: &str = "[UNSUPPORTED AUDIO FORMAT]";
/// Placeholder transcript when ffmpeg could not produce a WAV.
const PLACEHOLDER_CONVERSION_FAILED: &str = "[AUDIO CONVERSION FAILED]";
/// Placeholder transcript when chunking rejected the audio.
const PLACEHOLDER_CHUNKING_FAILED: &str = "[AUDIO TRANSCRIPTION FAILED (chunking)]";
/// Placeholder transcript when every chunk failed recognition.
const PLACEHOLDER_ASR_FAILED: &str = "[AUDIO TRANSCRIPTION FAILED]";

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Per-message transcription engine, shared across worker tasks.
pub struct Transcriber {
    config: AudioConfig,
    client: AsrClient,
    cache: ResultCache,
    media_root: PathBuf,
}

impl Transcriber {
    /// Build a transcriber using the global backend registry.
    ///
    /// `credential` is the provider key carried by the application config;
    /// the provider's environment variable still wins when set.
    pub fn new(config: AudioConfig, credential: Option<&str>) -> Result<Self, AsrConfigError> {
        let client = AsrClient::new(&config, credential)?;
        Ok(Self::assemble(config, client))
    }

    /// Build a transcriber against a specific registry; used by tests to
    /// inject fake backends.
    pub fn with_registry(
        config: AudioConfig,
        registry: &BackendRegistry,
        credential: Option<&str>,
    ) -> Result<Self, AsrConfigError> {
        let client = AsrClient::with_registry(&config, registry, credential)?;
        Ok(Self::assemble(config, client))
    }

    fn assemble(config: AudioConfig, client: AsrClient) -> Self {
        let cache = ResultCache::new(&config.cache_dir);
        Self {
            config,
            client,
            cache,
            media_root: PathBuf::from("."),
        }
    }

    /// Resolve media file names relative to `root` (the chat export root).
    pub fn with_media_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.media_root = root.into();
        self
    }

    pub fn provider_name(&self) -> &str {
        self.client.provider_name()
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub fn backend_id(&self) -> &str {
        self.client.backend_id()
    }

    fn media_path(&self, filename: &str) -> PathBuf {
        let path = Path::new(filename);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.media_root.join(path)
        }
    }

    /// Transcribe one message in place; non-voice messages pass through.
    pub async fn transcribe(&self, mut message: Message) -> Message {
        if !message.is_voice() {
            return message;
        }

        // Seed or refresh the audit payload so even early exits record what
        // configuration was in play.
        let mut payload = message.derived.asr.take().unwrap_or_else(|| {
            AsrPayload::new(
                PIPELINE_VERSION,
                self.config.snapshot(),
                self.client.language_hint(),
            )
        });
        payload.pipeline_version = PIPELINE_VERSION.to_string();
        payload.config_snapshot = self.config.snapshot();
        payload.language_hint = self.client.language_hint().to_string();
        message.derived.asr = Some(payload);

        let Some(filename) = message.media_filename.clone() else {
            message.mark_failed(ReasonCode::AudioUnsupportedFormat);
            if message.content_text.is_empty() {
                message.content_text = PLACEHOLDER_UNSUPPORTED.to_string();
            }
            return message;
        };
        let media_path = self.media_path(&filename);

        if let Some(key) = self.cache.key_for(&media_path, &self.config) {
            if let Some(outcome) = self.cache.load(&key) {
                debug!(idx = message.idx, "reusing cached transcription");
                outcome.apply(&mut message);
                return message;
            }
        }

        let wav_path = match convert_to_wav(&media_path, &self.config).await {
            Ok(conversion) => {
                self.payload_mut(&mut message).ffmpeg_log_tail = Some(conversion.log_tail);
                conversion.wav_path
            }
            Err(error) => {
                warn!(idx = message.idx, error = %error, "audio conversion failed");
                self.payload_mut(&mut message).ffmpeg_log_tail =
                    error.log_tail().map(String::from);
                let code = error.reason_code();
                message.mark_failed(code);
                if message.content_text.is_empty() {
                    message.content_text = match code {
                        ReasonCode::AudioUnsupportedFormat => PLACEHOLDER_UNSUPPORTED,
                        _ => PLACEHOLDER_CONVERSION_FAILED,
                    }
                    .to_string();
                }
                return message;
            }
        };

        let total_seconds = probe_duration(&wav_path, &self.config);

        if self.config.enable_vad {
            let stats = vad::analyze(&wav_path, &self.config);
            let is_mostly_silence = stats.is_mostly_silence(&self.config);
            self.payload_mut(&mut message).vad = Some(VadReport {
                speech_ratio: stats.speech_ratio,
                speech_seconds: stats.speech_seconds,
                total_seconds: stats.total_seconds,
                segments: stats.segments,
                is_mostly_silence,
            });
        }

        let chunks = match chunk_wav(&wav_path, total_seconds, &self.config) {
            Ok(chunks) => chunks,
            Err(error) => {
                warn!(idx = message.idx, error = %error, "chunking failed");
                self.finish_chunking_failure(&mut message, total_seconds, &error);
                return message;
            }
        };

        // Chunks run sequentially within a message; concurrency lives at the
        // message level in the pipeline runner.
        let mut records: Vec<ChunkRecord> = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let result = self
                .client
                .transcribe_chunk(&chunk.wav_chunk_path, chunk.start_sec, chunk.end_sec)
                .await;
            records.push(result.to_record(chunk.chunk_index, &chunk.wav_chunk_path));
        }

        self.aggregate(&mut message, total_seconds, records);

        self.write_cache(&message, &media_path);
        message
    }

    fn payload_mut<'a>(&self, message: &'a mut Message) -> &'a mut AsrPayload {
        // The payload is seeded at the top of transcribe; get_or_insert only
        // guards against callers clearing derived data mid-flight.
        message.derived.asr.get_or_insert_with(|| {
            AsrPayload::new(
                PIPELINE_VERSION,
                self.config.snapshot(),
                self.client.language_hint(),
            )
        })
    }

    fn finish_chunking_failure(
        &self,
        message: &mut Message,
        total_seconds: f64,
        error: &ChunkingError,
    ) {
        message.mark_failed(ReasonCode::AsrFailed);
        if message.content_text.is_empty() {
            message.content_text = PLACEHOLDER_CHUNKING_FAILED.to_string();
        }

        let provider = self.client.provider_name().to_string();
        let model = self.client.model().to_string();
        let api_version = self.client.api_version().to_string();
        let billing_plan = self.client.billing_plan().as_str().to_string();

        let payload = self.payload_mut(message);
        payload.api_version = Some(api_version);
        payload.provider = Some(provider);
        payload.model = Some(model);
        payload.billing_plan = Some(billing_plan);
        payload.chunks = Some(Vec::new());
        payload.total_duration_seconds = Some(round3(total_seconds));
        payload.error_summary = Some(ErrorSummary {
            chunks_ok: 0,
            chunks_error: 0,
            last_error_kind: Some("chunking".to_string()),
            last_error_message: Some(error.to_string()),
        });
        payload.cost = Some(0.0);
    }

    fn aggregate(&self, message: &mut Message, total_seconds: f64, records: Vec<ChunkRecord>) {
        let transcript = records
            .iter()
            .filter(|r| r.status == ChunkStatus::Ok)
            .filter_map(|r| r.text.as_deref())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let any_ok = records.iter().any(|r| r.status == ChunkStatus::Ok);
        let any_err = records.iter().any(|r| r.status != ChunkStatus::Ok);

        if !transcript.is_empty() {
            if message.content_text.is_empty() {
                message.content_text = transcript;
            } else {
                message.content_text = format!("{}\n{transcript}", message.content_text);
            }
        }

        let last_error_kind = records
            .iter()
            .rev()
            .find_map(|r| r.error_kind.clone());
        let last_error_message = records.iter().rev().find_map(|r| r.error.clone());

        if any_err && !any_ok {
            message.status = MessageStatus::Failed;
            message.partial = false;
            let code = match last_error_kind.as_deref() {
                Some("timeout") => ReasonCode::TimeoutAsr,
                _ => ReasonCode::AsrFailed,
            };
            message.status_reason = Some(StatusReason::from_code(code));
            if message.content_text.is_empty() {
                message.content_text = PLACEHOLDER_ASR_FAILED.to_string();
            }
        } else if any_err {
            message.mark_partial(ReasonCode::AsrPartial);
        } else {
            message.status = MessageStatus::Ok;
            message.partial = false;
            message.status_reason = None;
        }

        let chunks_ok = records.iter().filter(|r| r.status == ChunkStatus::Ok).count();
        let chunks_error = records.len() - chunks_ok;

        let provider = self.client.provider_name().to_string();
        let model = self.client.model().to_string();
        let api_version = self.client.api_version().to_string();
        let billing_plan = self.client.billing_plan();
        let cost = estimate_asr_cost(total_seconds, &provider, Some(&model), billing_plan);

        info!(
            idx = message.idx,
            chunks = records.len(),
            chunks_ok,
            chunks_error,
            status = %message.status,
            "transcription finished"
        );

        let payload = self.payload_mut(message);
        payload.api_version = Some(api_version);
        payload.provider = Some(provider);
        payload.model = Some(model);
        payload.billing_plan = Some(billing_plan.as_str().to_string());
        payload.chunks = Some(records);
        payload.total_duration_seconds = Some(round3(total_seconds));
        payload.error_summary = Some(ErrorSummary {
            chunks_ok,
            chunks_error,
            last_error_kind,
            last_error_message,
        });
        payload.cost = Some(cost);
    }

    /// Persist the terminal outcome; cache failures are logged, never fatal.
    fn write_cache(&self, message: &Message, media_path: &Path) {
        let Some(key) = self.cache.key_for(media_path, &self.config) else {
            return;
        };
        let Some(outcome) = CachedOutcome::capture(message) else {
            return;
        };
        if let Err(e) = self.cache.store(&key, &outcome) {
            warn!(idx = message.idx, error = %e, "failed to write transcription cache");
        }
    }
}
