//! Initialization helpers for preparing the runtime environment before
//! running transcription pipelines.
//!
//! This module powers the `voicepipe init` CLI command. It verifies that the
//! configured ffmpeg binary is present and runnable and creates the cache
//! directory, so regular runs fail fast on configuration problems instead of
//! midway through a batch.
//!
//! Typical usage from the CLI:
//!
//! ```text
//! $ VOICEPIPE_CACHE_DIR=/data/cache voicepipe init
//! ```

use std::process::Stdio;

use anyhow::{Context, Result, anyhow};
use tokio::process::Command;

use crate::config::AppConfig;

/// Verify external tooling and prepare the cache directory.
pub async fn run(config: &AppConfig) -> Result<()> {
    let audio = &config.audio;

    let output = Command::new(&audio.ffmpeg_bin)
        .arg("-version")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .with_context(|| format!("ffmpeg binary '{}' could not be executed", audio.ffmpeg_bin))?;
    if !output.status.success() {
        return Err(anyhow!(
            "ffmpeg binary '{}' exited with {}",
            audio.ffmpeg_bin,
            output.status
        ));
    }
    let banner = String::from_utf8_lossy(&output.stdout);
    let version = banner.lines().next().unwrap_or("unknown version");
    tracing::info!("found {}", version);

    std::fs::create_dir_all(&audio.cache_dir).with_context(|| {
        format!(
            "failed to create cache directory {}",
            audio.cache_dir.display()
        )
    })?;
    tracing::info!("cache directory ready: {}", audio.cache_dir.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn fake_ffmpeg(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("ffmpeg");
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn config_with(ffmpeg: &std::path::Path, cache: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.audio.ffmpeg_bin = ffmpeg.display().to_string();
        config.audio.cache_dir = cache.to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_init_creates_cache_dir() {
        let temp = TempDir::new().unwrap();
        let ffmpeg = fake_ffmpeg(
            temp.path(),
            "#!/bin/sh\necho 'ffmpeg version 6.0-test'\nexit 0\n",
        );
        let cache = temp.path().join("cache").join("nested");
        let config = config_with(&ffmpeg, &cache);

        run(&config).await.unwrap();
        assert!(cache.is_dir());
    }

    #[tokio::test]
    async fn test_init_rejects_missing_ffmpeg() {
        let temp = TempDir::new().unwrap();
        let config = config_with(&temp.path().join("no-such-ffmpeg"), temp.path());

        let err = run(&config).await.unwrap_err();
        assert!(err.to_string().contains("could not be executed"));
    }

    #[tokio::test]
    async fn test_init_rejects_failing_ffmpeg() {
        let temp = TempDir::new().unwrap();
        let ffmpeg = fake_ffmpeg(temp.path(), "#!/bin/sh\nexit 3\n");
        let config = config_with(&ffmpeg, temp.path());

        let err = run(&config).await.unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }
}
