//! JSON parsing for conversation exports.
//!
//! Handles conversion from the raw export structure to memory candidates.
//! Each conversation's `mapping` is turned into an explicit message graph
//! and walked iteratively, so branches and deep threads are all visited.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use serde_json::Value;

use crate::domain::{normalize_content, ExtractionStats, Memory, SkipReason};

/// Recipient marking a message for persistent memory.
pub const MEMORY_RECIPIENT: &str = "bio";

/// Raw conversation as stored in the export.
#[derive(Debug, Deserialize)]
struct RawConversation {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    mapping: Option<serde_json::Map<String, Value>>,
}

/// Raw node in a conversation's `mapping`.
#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    children: Option<Vec<String>>,
    #[serde(default)]
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    recipient: Option<String>,
    #[serde(default)]
    create_time: Option<f64>,
    #[serde(default)]
    update_time: Option<f64>,
    #[serde(default)]
    content: Option<RawContent>,
    #[serde(default)]
    weight: Option<f64>,
    #[serde(default)]
    metadata: Option<RawMetadata>,
}

#[derive(Debug, Deserialize, Default)]
struct RawContent {
    #[serde(default)]
    parts: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize, Default)]
struct RawMetadata {
    #[serde(default)]
    model_slug: Option<String>,
}

/// A message node with explicit links.
#[derive(Debug)]
struct GraphNode {
    parent: Option<String>,
    children: Vec<String>,
    message: Option<RawMessage>,
}

/// Node id to node map for one conversation.
#[derive(Debug, Default)]
struct MessageGraph {
    nodes: BTreeMap<String, GraphNode>,
}

impl MessageGraph {
    /// Builds the graph, skipping node entries that do not decode.
    fn from_mapping(mapping: serde_json::Map<String, Value>, stats: &mut ExtractionStats) -> Self {
        let mut nodes = BTreeMap::new();

        for (id, value) in mapping {
            match serde_json::from_value::<RawNode>(value) {
                Ok(raw) => {
                    nodes.insert(
                        id,
                        GraphNode {
                            parent: raw.parent,
                            children: raw.children.unwrap_or_default(),
                            message: raw.message,
                        },
                    );
                }
                Err(e) => {
                    tracing::debug!(node = %id, "Skipping malformed node: {}", e);
                    stats.skip(SkipReason::MalformedNode);
                }
            }
        }

        Self { nodes }
    }

    /// Children of each node: listed children first, then nodes that only
    /// name this node as their parent.
    fn adjacency(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for (id, node) in &self.nodes {
            let listed = adjacency.entry(id.as_str()).or_default();
            for child in &node.children {
                if self.nodes.contains_key(child) && !listed.contains(&child.as_str()) {
                    listed.push(child.as_str());
                }
            }
        }

        for (id, node) in &self.nodes {
            if let Some(parent) = node.parent.as_deref() {
                if let Some(siblings) = adjacency.get_mut(parent) {
                    if !siblings.contains(&id.as_str()) {
                        siblings.push(id.as_str());
                    }
                }
            }
        }

        adjacency
    }

    /// Visit order covering every node exactly once.
    ///
    /// Depth-first from each root in id order, children in listed order.
    /// Nodes unreachable from a root (cycles) follow, again in id order.
    fn traversal_order(&self) -> Vec<&str> {
        let adjacency = self.adjacency();
        let mut visited: HashSet<&str> = HashSet::with_capacity(self.nodes.len());
        let mut order = Vec::with_capacity(self.nodes.len());

        let roots = self.nodes.iter().filter_map(|(id, node)| {
            let is_root = !node
                .parent
                .as_deref()
                .is_some_and(|p| self.nodes.contains_key(p));
            is_root.then_some(id.as_str())
        });
        let starts: Vec<&str> = roots.chain(self.nodes.keys().map(String::as_str)).collect();

        let mut stack: Vec<&str> = Vec::new();
        for start in starts {
            if visited.contains(start) {
                continue;
            }
            stack.push(start);
            while let Some(id) = stack.pop() {
                if !visited.insert(id) {
                    continue;
                }
                order.push(id);
                if let Some(children) = adjacency.get(id) {
                    stack.extend(children.iter().rev().filter(|c| !visited.contains(*c)));
                }
            }
        }

        order
    }
}

/// Returns the conversations in the export root, paired with their key
/// when the root is an object.
///
/// Returns `None` if the root is neither an array nor an object.
pub fn conversations(root: &Value) -> Option<Vec<(Option<&str>, &Value)>> {
    match root {
        Value::Array(items) => Some(items.iter().map(|v| (None, v)).collect()),
        Value::Object(map) => Some(map.iter().map(|(k, v)| (Some(k.as_str()), v)).collect()),
        _ => None,
    }
}

/// Parses one conversation into memory candidates, in traversal order.
pub fn parse_conversation(
    key: Option<&str>,
    value: &Value,
    stats: &mut ExtractionStats,
) -> Vec<Memory> {
    let raw: RawConversation = match RawConversation::deserialize(value) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!("Skipping malformed conversation: {}", e);
            stats.skip(SkipReason::MalformedConversation);
            return Vec::new();
        }
    };

    let conversation_id = raw
        .conversation_id
        .or(raw.id)
        .or_else(|| key.map(String::from));

    let Some(mapping) = raw.mapping else {
        tracing::debug!(
            conversation = conversation_id.as_deref().unwrap_or("?"),
            "Skipping conversation without mapping"
        );
        stats.skip(SkipReason::MalformedConversation);
        return Vec::new();
    };

    let mut graph = MessageGraph::from_mapping(mapping, stats);
    let order: Vec<String> = graph
        .traversal_order()
        .into_iter()
        .map(String::from)
        .collect();
    stats.nodes_visited += order.len();

    let mut candidates = Vec::new();
    for node_id in order {
        let Some(message) = graph
            .nodes
            .get_mut(&node_id)
            .and_then(|node| node.message.take())
        else {
            continue;
        };

        match memory_from_message(&node_id, conversation_id.as_deref(), message) {
            Ok(Some(memory)) => candidates.push(memory),
            Ok(None) => {}
            Err(reason) => {
                tracing::debug!(node = %node_id, "Skipping memory candidate: {}", reason);
                stats.skip(reason);
            }
        }
    }

    tracing::debug!(
        conversation = conversation_id.as_deref().unwrap_or("?"),
        title = raw.title.as_deref().unwrap_or(""),
        candidates = candidates.len(),
        "Parsed conversation"
    );

    candidates
}

/// Turns a message into a memory candidate.
///
/// `Ok(None)` for messages not addressed to the memory channel.
fn memory_from_message(
    node_id: &str,
    conversation_id: Option<&str>,
    message: RawMessage,
) -> std::result::Result<Option<Memory>, SkipReason> {
    if message.recipient.as_deref() != Some(MEMORY_RECIPIENT) {
        return Ok(None);
    }

    let parts = message.content.and_then(|c| c.parts).unwrap_or_default();
    let joined = parts
        .iter()
        .filter_map(Value::as_str)
        .collect::<Vec<_>>()
        .join("\n");
    let content = normalize_content(&joined);
    if content.is_empty() {
        return Err(SkipReason::EmptyContent);
    }

    let created_at = message
        .create_time
        .and_then(epoch_seconds)
        .ok_or(SkipReason::MissingTimestamp)?;
    let updated_at = message
        .update_time
        .and_then(epoch_seconds)
        .unwrap_or(created_at);

    Ok(Some(Memory {
        content,
        created_at,
        updated_at,
        source_id: Some(node_id.to_string()),
        conversation_id: conversation_id.map(String::from),
        model: message.metadata.and_then(|m| m.model_slug),
        weight: message.weight,
        remote_id: None,
    }))
}

/// Floors a fractional epoch timestamp to whole seconds.
#[allow(clippy::cast_possible_truncation)]
fn epoch_seconds(value: f64) -> Option<i64> {
    value.is_finite().then(|| value.floor() as i64)
}
