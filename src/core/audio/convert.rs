//! Media-to-WAV conversion via ffmpeg.
//!
//! Conversion shells out to ffmpeg and normalizes whatever the chat export
//! contains (opus, m4a, amr, ...) into PCM WAV at the configured sample rate
//! and channel count. The output lands in the cache directory keyed by the
//! input file's content hash, so identical media converts once.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::AudioConfig;
use crate::core::message::ReasonCode;
use crate::utils::hashing::sha256_file;

/// Bytes of ffmpeg stderr kept for diagnostics.
const LOG_TAIL_BYTES: usize = 2048;

/// Successful conversion outcome.
#[derive(Debug, Clone)]
pub struct Conversion {
    /// Normalized WAV in the cache directory.
    pub wav_path: PathBuf,
    /// Tail of ffmpeg's stderr from the successful attempt.
    pub log_tail: String,
}

/// Conversion failures, each mapping to a distinct status reason.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("input media not found: {0}")]
    MissingInput(PathBuf),
    #[error("ffmpeg timed out after {timeout_seconds}s")]
    Timeout {
        timeout_seconds: u64,
        log_tail: String,
    },
    #[error("ffmpeg failed after {attempts} attempts")]
    Failed { attempts: u32, log_tail: String },
}

impl ConversionError {
    /// Diagnostic tail recorded in the message payload, when one exists.
    pub fn log_tail(&self) -> Option<&str> {
        match self {
            ConversionError::MissingInput(_) => None,
            ConversionError::Timeout { log_tail, .. } => Some(log_tail),
            ConversionError::Failed { log_tail, .. } => Some(log_tail),
        }
    }

    /// Status reason attached to the failed message.
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            ConversionError::MissingInput(_) => ReasonCode::AudioUnsupportedFormat,
            ConversionError::Timeout { .. } => ReasonCode::TimeoutFfmpeg,
            ConversionError::Failed { .. } => ReasonCode::FfmpegFailed,
        }
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(LOG_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).into_owned()
}

/// Convert `input` to a normalized WAV, retrying flaky invocations.
///
/// `ffmpeg_max_retries` is the total attempt budget. A zero exit status
/// without an output file counts as a failed attempt; a timeout is terminal
/// on first occurrence since a longer run would time out again. On final
/// failure any partial output is removed so a later run cannot mistake it
/// for a completed conversion.
pub async fn convert_to_wav(
    input: &Path,
    config: &AudioConfig,
) -> Result<Conversion, ConversionError> {
    if !input.exists() {
        return Err(ConversionError::MissingInput(input.to_path_buf()));
    }

    tokio::fs::create_dir_all(&config.cache_dir)
        .await
        .map_err(|e| ConversionError::Failed {
            attempts: 0,
            log_tail: format!("failed to create cache dir: {e}"),
        })?;

    let digest = sha256_file(input, None).map_err(|e| ConversionError::Failed {
        attempts: 0,
        log_tail: format!("failed to hash input: {e}"),
    })?;
    let out_path = config.cache_dir.join(format!("{digest}.wav"));

    let attempts = config.ffmpeg_max_retries.max(1);
    let timeout = Duration::from_secs(config.ffmpeg_timeout_seconds);
    let mut last_err = String::new();

    for attempt in 1..=attempts {
        let mut command = Command::new(&config.ffmpeg_bin);
        command
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-ar")
            .arg(config.sample_rate.to_string())
            .arg("-ac")
            .arg(config.channels.to_string())
            .arg("-f")
            .arg("wav")
            .arg(&out_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            input = %input.display(),
            output = %out_path.display(),
            attempt,
            attempts,
            "running ffmpeg"
        );

        match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => {
                last_err = stderr_tail(&output.stderr);
                if output.status.success() {
                    if out_path.exists() {
                        return Ok(Conversion {
                            wav_path: out_path,
                            log_tail: last_err,
                        });
                    }
                    // Clean exit without output; treat as a failed attempt.
                    warn!(
                        input = %input.display(),
                        attempt,
                        "ffmpeg exited cleanly but produced no output"
                    );
                } else {
                    warn!(
                        input = %input.display(),
                        attempt,
                        code = ?output.status.code(),
                        "ffmpeg exited with failure"
                    );
                }
            }
            Ok(Err(e)) => {
                last_err = format!("failed to run {}: {e}", config.ffmpeg_bin);
                warn!(input = %input.display(), attempt, error = %e, "ffmpeg spawn failed");
            }
            Err(_) => {
                remove_partial(&out_path).await;
                return Err(ConversionError::Timeout {
                    timeout_seconds: config.ffmpeg_timeout_seconds,
                    log_tail: format!(
                        "ffmpeg timed out after {}s converting {}",
                        config.ffmpeg_timeout_seconds,
                        input.display()
                    ),
                });
            }
        }
    }

    remove_partial(&out_path).await;
    Err(ConversionError::Failed {
        attempts,
        log_tail: last_err,
    })
}

async fn remove_partial(out_path: &Path) {
    if out_path.exists() {
        if let Err(e) = tokio::fs::remove_file(out_path).await {
            warn!(path = %out_path.display(), error = %e, "failed to remove partial output");
        }
    }
}
