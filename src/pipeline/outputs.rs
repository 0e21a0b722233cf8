//! Message JSONL reading/writing and the transcript preview.
//!
//! Stage snapshots are one message per line, written deterministically so
//! concurrent and sequential runs of the same input produce byte-identical
//! files.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::message::{Message, MessageStatus};

/// Maximum transcript characters kept on one preview line.
const PREVIEW_MAX_CHARS: usize = 120;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid message at {path}:{line}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Load messages from a JSONL file; blank lines are skipped.
pub fn load_messages(path: &Path) -> Result<Vec<Message>, OutputError> {
    let raw = std::fs::read_to_string(path).map_err(|source| OutputError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut messages = Vec::new();
    for (number, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let message = serde_json::from_str(line).map_err(|source| OutputError::Parse {
            path: path.to_path_buf(),
            line: number + 1,
            source,
        })?;
        messages.push(message);
    }
    Ok(messages)
}

/// Write messages as JSONL, one compact record per line.
pub fn write_messages_jsonl(messages: &[Message], path: &Path) -> Result<(), OutputError> {
    let write_err = |source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let mut buffer = Vec::new();
    for message in messages {
        serde_json::to_writer(&mut buffer, message).map_err(|e| OutputError::Write {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })?;
        buffer.write_all(b"\n").map_err(write_err)?;
    }
    std::fs::write(path, buffer).map_err(write_err)
}

/// One preview line per voice message.
///
/// Pipe-delimited single line: timestamp, index, sender, status (with the
/// reason code when present), provider, and the transcript truncated to
/// [`PREVIEW_MAX_CHARS`].
pub fn format_preview_line(message: &Message) -> String {
    let ts = message.ts.as_deref().unwrap_or("-");
    let status = match message.status_reason.as_ref() {
        Some(reason) => format!("{}/{}", message.status, reason.code),
        None => message.status.to_string(),
    };
    let provider = message
        .derived
        .asr
        .as_ref()
        .and_then(|p| p.provider.as_deref())
        .unwrap_or("-");

    let base = if !message.content_text.is_empty() {
        message.content_text.as_str()
    } else if message.status == MessageStatus::Failed {
        "[AUDIO TRANSCRIPTION FAILED]"
    } else {
        "[UNTRANSCRIBED VOICE NOTE]"
    };
    let mut text = base
        .replace(['\r', '\n'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if text.chars().count() > PREVIEW_MAX_CHARS {
        text = text.chars().take(PREVIEW_MAX_CHARS).collect::<String>() + "\u{2026}";
    }
    let text = text.replace('"', "\\\"");

    let sender = message.sender.replace('|', " ");
    format!(
        "{ts} | idx={} | sender={sender} | status={status} | provider={provider} | text=\"{text}\"",
        message.idx
    )
}

/// Write the transcript preview, one line per voice message sorted by index.
///
/// Returns the number of voice messages written.
pub fn write_preview(messages: &[Message], path: &Path) -> Result<usize, OutputError> {
    let mut voices: Vec<&Message> = messages.iter().filter(|m| m.is_voice()).collect();
    voices.sort_by_key(|m| m.idx);

    let write_err = |source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let mut body = String::new();
    for message in &voices {
        body.push_str(&format_preview_line(message));
        body.push('\n');
    }
    std::fs::write(path, body).map_err(write_err)?;
    Ok(voices.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{AsrPayload, MessageKind, ReasonCode};
    use serde_json::json;
    use tempfile::TempDir;

    fn voice(idx: u64, text: &str) -> Message {
        let mut msg = Message::new(idx, "alice", MessageKind::Voice);
        msg.ts = Some("2024-01-15T10:30:00Z".to_string());
        msg.content_text = text.to_string();
        msg
    }

    #[test]
    fn test_jsonl_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("messages.jsonl");

        let messages = vec![
            Message::new(0, "alice", MessageKind::Text),
            voice(1, "hello"),
        ];
        write_messages_jsonl(&messages, &path).unwrap();
        assert_eq!(load_messages(&path).unwrap(), messages);
    }

    #[test]
    fn test_load_skips_blank_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("messages.jsonl");
        std::fs::write(
            &path,
            "{\"idx\": 0, \"sender\": \"a\", \"kind\": \"text\"}\n\n   \n{\"idx\": 1, \"sender\": \"b\", \"kind\": \"voice\"}\n",
        )
        .unwrap();
        let messages = load_messages(&path).unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn test_load_reports_line_number() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("messages.jsonl");
        std::fs::write(
            &path,
            "{\"idx\": 0, \"sender\": \"a\", \"kind\": \"text\"}\n{broken\n",
        )
        .unwrap();
        match load_messages(&path).unwrap_err() {
            OutputError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_write_is_deterministic() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.jsonl");
        let b = temp.path().join("b.jsonl");
        let messages = vec![voice(0, "one"), voice(1, "two")];

        write_messages_jsonl(&messages, &a).unwrap();
        write_messages_jsonl(&messages, &b).unwrap();
        assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
    }

    #[test]
    fn test_preview_line_shape() {
        let mut msg = voice(3, "hola mundo");
        let mut payload = AsrPayload::new("1.0.0", json!({}), "es");
        payload.provider = Some("whisper_openai".to_string());
        msg.derived.asr = Some(payload);

        let line = format_preview_line(&msg);
        assert_eq!(
            line,
            "2024-01-15T10:30:00Z | idx=3 | sender=alice | status=ok | provider=whisper_openai | text=\"hola mundo\""
        );
    }

    #[test]
    fn test_preview_line_failed_placeholder_and_reason() {
        let mut msg = voice(1, "");
        msg.mark_failed(ReasonCode::AsrFailed);
        let line = format_preview_line(&msg);
        assert!(line.contains("status=failed/asr_failed"));
        assert!(line.contains("text=\"[AUDIO TRANSCRIPTION FAILED]\""));
        assert!(line.contains("provider=-"));
    }

    #[test]
    fn test_preview_line_normalizes_and_truncates() {
        let mut msg = voice(0, "line one\nline   two \"quoted\"");
        let line = format_preview_line(&msg);
        assert!(line.contains("text=\"line one line two \\\"quoted\\\"\""));

        msg.content_text = "x".repeat(300);
        let line = format_preview_line(&msg);
        assert!(line.contains(&format!("{}\u{2026}", "x".repeat(120))));
    }

    #[test]
    fn test_write_preview_sorts_and_counts() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("preview_transcripts.txt");

        let messages = vec![
            voice(2, "second"),
            Message::new(1, "bob", MessageKind::Text),
            voice(0, "first"),
        ];
        let count = write_preview(&messages, &path).unwrap();
        assert_eq!(count, 2);

        let body = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("idx=0"));
        assert!(lines[1].contains("idx=2"));
    }
}
