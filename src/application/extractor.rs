//! Memory extraction service.
//!
//! Reads a conversation export, collects memory candidates from every
//! conversation and reduces them to one record per content.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::domain::{normalize_content, AppError, ExtractionStats, Memory, Result};
use crate::infrastructure::read_memories_jsonl;

use super::parser::{conversations, parse_conversation};
use super::progress::{ProgressFn, ProgressTicker};

/// Conversations between two extraction progress lines.
const CONVERSATION_PROGRESS_STEP: usize = 500;

/// Extracts deduplicated memories from an export file.
///
/// `on_progress` is called every few hundred conversations and once at the end.
///
/// # Errors
/// Returns a `Parse` error if the file cannot be read, is not JSON, or its
/// top level is not a collection of conversations.
pub fn extract_memories(
    path: &Path,
    on_progress: &ProgressFn<'_>,
) -> Result<(Vec<Memory>, ExtractionStats)> {
    tracing::info!("Extracting memories from: {}", path.display());

    let data = std::fs::read(path)
        .map_err(|e| AppError::parse(path, format!("cannot read file: {e}")))?;
    let root: Value = serde_json::from_slice(&data).map_err(|e| AppError::json_parse(path, e))?;

    extract_from_value(&root, on_progress).ok_or_else(|| {
        AppError::parse(
            path,
            "expected an array or object of conversations at the top level",
        )
    })
}

/// Extracts deduplicated memories from an already decoded export.
///
/// Returns `None` if the root is not a collection of conversations.
pub fn extract_from_value(
    root: &Value,
    on_progress: &ProgressFn<'_>,
) -> Option<(Vec<Memory>, ExtractionStats)> {
    let conversations = conversations(root)?;
    let mut stats = ExtractionStats {
        conversation_count: conversations.len(),
        ..ExtractionStats::default()
    };

    let mut ticker = ProgressTicker::every(CONVERSATION_PROGRESS_STEP, stats.conversation_count);
    let mut candidates = Vec::new();
    for (key, conversation) in conversations {
        candidates.extend(parse_conversation(key, conversation, &mut stats));

        if let Some(processed) = ticker.advance() {
            tracing::info!(
                processed,
                total = ticker.total(),
                candidates = candidates.len(),
                "Extracting memories"
            );
            on_progress(processed, ticker.total());
        }
    }
    stats.candidates = candidates.len();

    let memories = dedupe_memories(candidates);
    stats.duplicates_collapsed = stats.candidates - memories.len();
    stats.memories = memories.len();

    tracing::info!(
        conversations = stats.conversation_count,
        nodes = stats.nodes_visited,
        memories = stats.memories,
        duplicates = stats.duplicates_collapsed,
        skipped = stats.total_skipped(),
        "Extraction completed"
    );

    Some((memories, stats))
}

/// Loads memories from a previously written artifact.
///
/// Content is normalized again and duplicates collapsed, since the file
/// may have been edited by hand.
///
/// # Errors
/// Returns error if the artifact cannot be read or a line does not decode.
pub fn memories_from_artifact(path: &Path) -> Result<Vec<Memory>> {
    let memories = read_memories_jsonl(path)?
        .into_iter()
        .map(|mut memory| {
            memory.content = normalize_content(&memory.content);
            memory
        })
        .filter(|memory| !memory.content.is_empty())
        .collect();

    Ok(dedupe_memories(memories))
}

/// Keeps one memory per content and orders the result by creation time.
///
/// The newest `created_at` wins; on equal timestamps the candidate seen
/// first wins. The final sort is stable, so equal timestamps keep
/// first-seen order.
pub fn dedupe_memories(candidates: Vec<Memory>) -> Vec<Memory> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(candidates.len());
    let mut kept: Vec<Memory> = Vec::with_capacity(candidates.len());

    for memory in candidates {
        match index.get(&memory.content) {
            Some(&slot) => {
                if memory.created_at > kept[slot].created_at {
                    kept[slot] = memory;
                }
            }
            None => {
                index.insert(memory.content.clone(), kept.len());
                kept.push(memory);
            }
        }
    }

    kept.sort_by_key(|m| m.created_at);
    kept
}
