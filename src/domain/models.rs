//! Domain models for extracted and remote memories.
//!
//! A `Memory` is the same shape whether it came from the export or from the
//! remote store; the origin shows in which of `source_id` / `remote_id` is set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single memory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Normalized text body. Used as the deduplication key.
    pub content: String,
    /// Creation time, whole seconds since the Unix epoch.
    pub created_at: i64,
    /// Last update time, whole seconds since the Unix epoch.
    pub updated_at: i64,
    /// Id of the message node this memory was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Id of the conversation containing the source node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Model that wrote the memory, from `metadata.model_slug`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Message weight as recorded in the export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Id assigned by the remote store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
}

impl Memory {
    /// Build a memory as reported by the remote store.
    #[must_use]
    pub fn remote(
        remote_id: impl Into<String>,
        content: &str,
        created_at: i64,
        updated_at: i64,
    ) -> Self {
        Self {
            content: normalize_content(content),
            created_at,
            updated_at,
            source_id: None,
            conversation_id: None,
            model: None,
            weight: None,
            remote_id: Some(remote_id.into()),
        }
    }
}

/// Trims and collapses every whitespace run to a single space.
#[must_use]
pub fn normalize_content(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncates on a character boundary, appending `...` when cut.
#[must_use]
pub fn preview(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let cut: String = content.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{cut}...")
}

/// Why a node in the export did not produce a memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Node entry is not an object or has fields of the wrong type.
    MalformedNode,
    /// Conversation has no usable `mapping`.
    MalformedConversation,
    /// Memory message without `create_time`.
    MissingTimestamp,
    /// Memory message whose parts normalize to nothing.
    EmptyContent,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedNode => write!(f, "malformed node"),
            Self::MalformedConversation => write!(f, "malformed conversation"),
            Self::MissingTimestamp => write!(f, "missing timestamp"),
            Self::EmptyContent => write!(f, "empty content"),
        }
    }
}

/// Summary statistics for one extraction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionStats {
    /// Number of conversations processed.
    pub conversation_count: usize,
    /// Total message nodes visited.
    pub nodes_visited: usize,
    /// Memory candidates found before deduplication.
    pub candidates: usize,
    /// Candidates dropped because a newer (or earlier-seen) copy exists.
    pub duplicates_collapsed: usize,
    /// Memories produced after deduplication.
    pub memories: usize,
    /// Skipped entries, by reason.
    pub skipped: BTreeMap<SkipReason, usize>,
}

impl ExtractionStats {
    /// Record a skipped entry.
    pub fn skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }

    /// Total number of skipped entries across all reasons.
    #[must_use]
    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(
            normalize_content("  Prefers\n\n dark   mode\t"),
            "Prefers dark mode"
        );
        assert_eq!(normalize_content(" \n\t "), "");
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("ééééééééé", 6), "ééé...");
    }

    #[test]
    fn test_remote_memory_is_normalized() {
        let mem = Memory::remote("m-1", "likes  tea\n", 10, 12);
        assert_eq!(mem.content, "likes tea");
        assert_eq!(mem.remote_id.as_deref(), Some("m-1"));
        assert!(mem.source_id.is_none());
    }

    #[test]
    fn test_artifact_line_omits_absent_fields() {
        let mem = Memory {
            content: "likes tea".into(),
            created_at: 100,
            updated_at: 100,
            source_id: Some("node-1".into()),
            conversation_id: None,
            model: None,
            weight: None,
            remote_id: None,
        };
        let line = serde_json::to_string(&mem).unwrap();
        assert_eq!(
            line,
            r#"{"content":"likes tea","created_at":100,"updated_at":100,"source_id":"node-1"}"#
        );
    }

    #[test]
    fn test_stats_skip_counts() {
        let mut stats = ExtractionStats::default();
        stats.skip(SkipReason::MissingTimestamp);
        stats.skip(SkipReason::MissingTimestamp);
        stats.skip(SkipReason::MalformedNode);
        assert_eq!(stats.skipped[&SkipReason::MissingTimestamp], 2);
        assert_eq!(stats.total_skipped(), 3);
    }
}
