//! WAV chunking into overlapping fixed windows.
//!
//! Chunk geometry is planned as pure arithmetic over the audio duration and
//! then materialized as one WAV file per window. Overlap is clamped to half
//! the window so every window makes forward progress; the planner guards
//! against degenerate geometry that could otherwise loop forever.

use std::path::PathBuf;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use thiserror::Error;
use tracing::debug;

use crate::config::AudioConfig;
use crate::utils::hashing::sha256_file;

/// One planned and materialized audio window.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkDescriptor {
    pub chunk_index: usize,
    pub start_sec: f64,
    pub end_sec: f64,
    pub duration_sec: f64,
    pub wav_chunk_path: PathBuf,
}

/// Chunking failures; all terminal for the affected message.
#[derive(Debug, Error)]
pub enum ChunkingError {
    #[error("invalid audio duration: {0} seconds")]
    InvalidDuration(f64),
    #[error("WAV file not found: {0}")]
    MissingFile(PathBuf),
    #[error("invalid WAV: {0}")]
    InvalidHeader(String),
    #[error("failed to read WAV file: {0}")]
    Wav(#[from] hound::Error),
    #[error("I/O error reading WAV file: {0}")]
    Io(#[from] std::io::Error),
    #[error(
        "no chunks produced for audio of {0} seconds; \
         this may indicate corrupted or truncated audio"
    )]
    NoChunks(f64),
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Duration of a WAV file in seconds.
///
/// Falls back to a size-based estimate using the configured format when the
/// header cannot be parsed, and to zero when the file is unreadable; callers
/// treat a zero duration as invalid audio.
pub fn probe_duration(wav_path: &std::path::Path, config: &AudioConfig) -> f64 {
    match WavReader::open(wav_path) {
        Ok(reader) => {
            let spec = reader.spec();
            if spec.sample_rate == 0 {
                return 0.0;
            }
            f64::from(reader.duration()) / f64::from(spec.sample_rate)
        }
        Err(_) => {
            let bytes_per_second =
                u64::from(config.sample_rate) * u64::from(config.channels) * 2;
            if bytes_per_second == 0 {
                return 0.0;
            }
            match std::fs::metadata(wav_path) {
                Ok(meta) => meta.len() as f64 / bytes_per_second as f64,
                Err(_) => 0.0,
            }
        }
    }
}

/// Plan `(start, end)` windows covering `[0, total_seconds)`.
///
/// Consecutive windows overlap by `overlap` seconds except the last, which is
/// clipped to the audio end. Window starts are strictly increasing; the guards
/// mirror the materialization loop so the plan is the single source of truth
/// for chunk timing.
pub fn plan_windows(total_seconds: f64, chunk_seconds: f64, overlap: f64) -> Vec<(f64, f64)> {
    let overlap = overlap.min(chunk_seconds / 2.0);
    let mut windows = Vec::new();
    let mut start = 0.0_f64;
    let mut prev_start = -1.0_f64;

    while start < total_seconds {
        let end = (start + chunk_seconds).min(total_seconds);
        if end <= start {
            break;
        }
        windows.push((start, end));
        if end >= total_seconds {
            break;
        }
        let next_start = end - overlap;
        if next_start <= start {
            break;
        }
        start = next_start;
        if (start - prev_start).abs() < 1e-6 {
            break;
        }
        prev_start = start;
    }

    windows
}

/// Split a normalized WAV into overlapping chunk files.
///
/// Chunks land under `chunk_dir` when configured, otherwise under a
/// content-addressed directory in the cache (`cache_dir/chunks/<sha256>`).
/// Only integer PCM up to 16 bits is accepted; the normalization step always
/// produces that, so anything else means the file did not come from this
/// pipeline.
pub fn chunk_wav(
    wav_path: &std::path::Path,
    total_seconds: f64,
    config: &AudioConfig,
) -> Result<Vec<ChunkDescriptor>, ChunkingError> {
    if total_seconds <= 0.0 {
        return Err(ChunkingError::InvalidDuration(total_seconds));
    }
    if !wav_path.exists() {
        return Err(ChunkingError::MissingFile(wav_path.to_path_buf()));
    }

    let mut reader = WavReader::open(wav_path)?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(ChunkingError::InvalidHeader("sample rate is 0".to_string()));
    }
    if spec.bits_per_sample == 0 {
        return Err(ChunkingError::InvalidHeader("sample width is 0".to_string()));
    }
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample > 16 {
        return Err(ChunkingError::InvalidHeader(format!(
            "unsupported sample format: {:?} at {} bits",
            spec.sample_format, spec.bits_per_sample
        )));
    }

    let base_chunk_dir = match &config.chunk_dir {
        Some(dir) => dir.clone(),
        None => config
            .cache_dir
            .join("chunks")
            .join(sha256_file(wav_path, None)?),
    };
    std::fs::create_dir_all(&base_chunk_dir)?;

    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<Result<Vec<i16>, hound::Error>>()?;
    let channels = usize::from(spec.channels.max(1));
    let total_frames = samples.len() / channels;
    let rate = f64::from(spec.sample_rate);

    let windows = plan_windows(
        total_seconds,
        config.chunk_seconds,
        config.chunk_overlap_seconds,
    );

    let mut chunks = Vec::with_capacity(windows.len());
    for (chunk_index, (start, end)) in windows.into_iter().enumerate() {
        let frame_start = ((start * rate) as usize).min(total_frames);
        let frame_end = ((end * rate) as usize).min(total_frames);

        let chunk_path = base_chunk_dir.join(format!("chunk_{chunk_index:04}.wav"));
        write_chunk(
            &chunk_path,
            spec,
            &samples[frame_start * channels..frame_end * channels],
        )?;

        let clipped_end = end.min(total_seconds);
        chunks.push(ChunkDescriptor {
            chunk_index,
            start_sec: round3(start),
            end_sec: round3(clipped_end),
            duration_sec: round3(clipped_end - start),
            wav_chunk_path: chunk_path,
        });
    }

    if chunks.is_empty() {
        return Err(ChunkingError::NoChunks(total_seconds));
    }

    debug!(
        wav = %wav_path.display(),
        chunks = chunks.len(),
        total_seconds,
        "chunked audio"
    );
    Ok(chunks)
}

fn write_chunk(
    chunk_path: &std::path::Path,
    spec: WavSpec,
    samples: &[i16],
) -> Result<(), ChunkingError> {
    let mut writer = WavWriter::create(chunk_path, spec)?;
    for sample in samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;
    Ok(())
}
