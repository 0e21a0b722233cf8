//! Content-addressed transcription cache.
//!
//! The cache key is the SHA-256 of the source media bytes mixed with every
//! configuration value that affects transcription output, so a changed model
//! or chunk geometry misses cleanly instead of serving stale text. Entries
//! are JSON files written with a unique temp name and renamed into place;
//! concurrent writers of the same key both land a complete entry, last one
//! wins. A corrupt entry is a miss, never an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::config::AudioConfig;
use crate::core::message::{AsrPayload, Message, MessageStatus, ReasonCode, StatusReason};
use crate::utils::hashing::sha256_file;

/// Errors surfaced by cache writes.
///
/// Reads never error: a missing, unreadable, or corrupt entry is a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Terminal transcription outcome persisted per cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedOutcome {
    pub content_text: String,
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<ReasonCode>,
    pub partial: bool,
    pub derived_asr: AsrPayload,
}

impl CachedOutcome {
    /// Snapshot a message's transcription outcome, when it has one.
    pub fn capture(message: &Message) -> Option<Self> {
        let derived_asr = message.derived.asr.clone()?;
        Some(Self {
            content_text: message.content_text.clone(),
            status: message.status,
            status_reason: message.status_reason.as_ref().map(|r| r.code),
            partial: message.partial,
            derived_asr,
        })
    }

    /// Replay this outcome onto a message.
    pub fn apply(self, message: &mut Message) {
        message.content_text = self.content_text;
        message.status = self.status;
        message.partial = self.partial;
        message.status_reason = self.status_reason.map(StatusReason::from_code);
        message.derived.asr = Some(self.derived_asr);
    }
}

/// File-backed cache living in the engine cache directory.
pub struct ResultCache {
    cache_dir: PathBuf,
}

impl ResultCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Cache key for a media file under the given configuration.
    ///
    /// `None` when the media file cannot be read; such messages are simply
    /// not cacheable.
    pub fn key_for(&self, media_path: &Path, config: &AudioConfig) -> Option<String> {
        if !media_path.exists() {
            return None;
        }
        sha256_file(media_path, Some(&config.fingerprint_extra())).ok()
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.json"))
    }

    /// Load a cached outcome; any failure is a miss.
    pub fn load(&self, key: &str) -> Option<CachedOutcome> {
        let path = self.entry_path(key);
        let raw = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(outcome) => {
                debug!(key, "transcription cache hit");
                Some(outcome)
            }
            Err(e) => {
                debug!(key, error = %e, "discarding corrupt cache entry");
                None
            }
        }
    }

    /// Persist an outcome atomically under `key`.
    ///
    /// Writes to a uniquely named temp file in the same directory and renames
    /// it over the entry, so readers never observe a partial file.
    pub fn store(&self, key: &str, outcome: &CachedOutcome) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.cache_dir)?;
        let path = self.entry_path(key);
        let tmp = self
            .cache_dir
            .join(format!("{key}.json.{}.tmp", Uuid::new_v4()));
        std::fs::write(&tmp, serde_json::to_vec_pretty(outcome)?)?;
        std::fs::rename(&tmp, &path)?;
        debug!(key, "stored transcription cache entry");
        Ok(())
    }
}
