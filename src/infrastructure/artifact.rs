//! JSON Lines artifact of extracted memories.
//!
//! One memory per line, rewritten from scratch on every run so the file
//! always mirrors the latest extraction.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Deserialize;

use crate::domain::{AppError, Memory, Result};

/// One artifact line as read back. Only `content` and `created_at` are
/// required, so hand-written lines load too.
#[derive(Debug, Deserialize)]
struct ArtifactLine {
    content: String,
    created_at: i64,
    #[serde(default)]
    updated_at: Option<i64>,
    #[serde(default)]
    source_id: Option<String>,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    weight: Option<f64>,
}

impl From<ArtifactLine> for Memory {
    fn from(line: ArtifactLine) -> Self {
        Self {
            content: line.content,
            created_at: line.created_at,
            updated_at: line.updated_at.unwrap_or(line.created_at),
            source_id: line.source_id,
            conversation_id: line.conversation_id,
            model: line.model,
            weight: line.weight,
            remote_id: None,
        }
    }
}

/// Writes memories to `path`, replacing any previous content.
///
/// # Errors
/// Returns error if the file or its parent directory cannot be written.
pub fn write_memories_jsonl(path: &Path, memories: &[Memory]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::io(format!("Failed to create directory {}", parent.display()), e)
        })?;
    }

    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create {}", path.display()), e))?;
    let mut writer = BufWriter::new(file);

    for memory in memories {
        let line = serde_json::to_string(memory).map_err(|e| AppError::Io {
            message: format!("Failed to serialize memory: {e}"),
            source: None,
        })?;
        writeln!(writer, "{line}").map_err(|e| AppError::io("Failed to write artifact", e))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::io("Failed to write artifact", e))?;

    tracing::info!(
        path = %path.display(),
        count = memories.len(),
        "Wrote memory artifact"
    );

    Ok(())
}

/// Reads an artifact back. A missing `updated_at` defaults to `created_at`.
///
/// # Errors
/// Returns error if the file cannot be read or a line is not a memory.
pub fn read_memories_jsonl(path: &Path) -> Result<Vec<Memory>> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read {}", path.display()), e))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<ArtifactLine>(line)
                .map(Memory::from)
                .map_err(|e| AppError::artifact(path, i + 1, e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn memory(content: &str, created_at: i64) -> Memory {
        Memory {
            content: content.to_string(),
            created_at,
            updated_at: created_at,
            source_id: Some(format!("node-{created_at}")),
            conversation_id: Some("conv".into()),
            model: Some("gpt-4o".into()),
            weight: Some(1.0),
            remote_id: None,
        }
    }

    #[test]
    fn test_one_line_per_memory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("memories.jsonl");

        write_memories_jsonl(&path, &[memory("a", 1), memory("b", 2)]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.contains("\"created_at\"")));

        let back = read_memories_jsonl(&path).unwrap();
        assert_eq!(back[1].content, "b");
        assert_eq!(back[1].source_id.as_deref(), Some("node-2"));
    }

    #[test]
    fn test_rewritten_fresh_each_run() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memories.jsonl");

        write_memories_jsonl(&path, &[memory("a", 1), memory("b", 2)]).unwrap();
        write_memories_jsonl(&path, &[memory("c", 3)]).unwrap();

        let back = read_memories_jsonl(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].content, "c");
    }

    #[test]
    fn test_minimal_line_defaults_updated_at() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memories.jsonl");
        fs::write(&path, "{\"content\":\"likes tea\",\"created_at\":5}\n").unwrap();

        let back = read_memories_jsonl(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].content, "likes tea");
        assert_eq!(back[0].created_at, 5);
        assert_eq!(back[0].updated_at, 5);
        assert!(back[0].source_id.is_none());
    }

    #[test]
    fn test_bad_line_names_artifact_and_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memories.jsonl");
        fs::write(
            &path,
            "{\"content\":\"ok\",\"created_at\":1}\n\n{\"content\":\"no time\"}\n",
        )
        .unwrap();

        let err = read_memories_jsonl(&path).unwrap_err();
        assert!(matches!(err, AppError::Artifact { line: 3, .. }));
        let message = err.to_string();
        assert!(message.starts_with("Invalid memory artifact"));
        assert!(!message.contains("export"));
    }

    #[test]
    fn test_empty_extraction_writes_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memories.jsonl");

        write_memories_jsonl(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}
