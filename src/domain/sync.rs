//! Sync-related domain models and configuration.
//!
//! Contains the configuration tree, the reconciliation plan and the
//! summary produced after applying it.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{AppError, Result};
use super::models::preview;

/// Connection settings for the remote store, as loaded.
#[derive(Clone, Default, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the Open WebUI instance.
    #[serde(default)]
    pub base_url: Option<String>,

    /// User the memories belong to.
    #[serde(default)]
    pub user_id: Option<String>,

    /// Bearer token (JWT).
    #[serde(default)]
    pub token: Option<String>,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field("user_id", &self.user_id)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Configuration for applying a plan.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Number of concurrent workers issuing network calls.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Exit non-zero when any single operation failed.
    #[serde(default)]
    pub fail_on_error: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            timeout_secs: default_timeout_secs(),
            fail_on_error: false,
        }
    }
}

const fn default_workers() -> usize {
    16
}

const fn default_timeout_secs() -> u64 {
    30
}

/// Input and output locations.
#[derive(Debug, Clone, Deserialize)]
pub struct PathConfig {
    /// Conversation export to read.
    #[serde(default = "default_input")]
    pub input: PathBuf,

    /// JSONL artifact to write.
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            output: default_output(),
        }
    }
}

fn default_input() -> PathBuf {
    PathBuf::from("conversations.json")
}

fn default_output() -> PathBuf {
    PathBuf::from("extracted_memories.jsonl")
}

/// Complete application configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    /// Remote store connection.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Reconciliation behavior.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Input/output paths.
    #[serde(default)]
    pub paths: PathConfig,
}

impl AppConfig {
    /// Validate the remote section and return usable settings.
    ///
    /// # Errors
    /// Returns a `Config` error naming every missing or invalid value.
    pub fn remote_settings(&self) -> Result<RemoteSettings> {
        let base_url = non_empty(self.remote.base_url.as_deref());
        let user_id = non_empty(self.remote.user_id.as_deref());
        let token = non_empty(self.remote.token.as_deref());

        let missing: Vec<&str> = [
            ("OPEN_WEBUI_URL (remote.base_url)", base_url.is_none()),
            ("USER_ID (remote.user_id)", user_id.is_none()),
            ("JWT_TOKEN (remote.token)", token.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        let (Some(base_url), Some(user_id), Some(token)) = (base_url, user_id, token) else {
            return Err(AppError::config(format!(
                "missing required value(s): {}",
                missing.join(", ")
            )));
        };

        let parsed = url::Url::parse(base_url)
            .map_err(|e| AppError::config(format!("invalid base URL '{base_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::config(format!(
                "base URL must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        Ok(RemoteSettings {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.to_string(),
            token: token.to_string(),
            timeout: Duration::from_secs(self.sync.timeout_secs.max(1)),
        })
    }

    /// Worker count, never below one.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.sync.workers.max(1)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Validated connection settings for the remote store.
#[derive(Clone)]
pub struct RemoteSettings {
    /// Base URL without trailing slash.
    pub base_url: String,
    pub user_id: String,
    pub token: String,
    /// Timeout applied to every request.
    pub timeout: Duration,
}

impl std::fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("base_url", &self.base_url)
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Payload for creating a memory remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMemory {
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A remote record scheduled for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub remote_id: String,
    pub created_at: i64,
}

/// Why a content key needs work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionReason {
    /// Present locally, absent remotely.
    Missing,
    /// Present remotely, absent locally.
    Orphan,
    /// Remote copy older than the local record.
    Stale,
    /// Store holds more than one copy of the content.
    Duplicated,
}

impl std::fmt::Display for ActionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::Orphan => write!(f, "orphan"),
            Self::Stale => write!(f, "stale"),
            Self::Duplicated => write!(f, "duplicated"),
        }
    }
}

/// All operations scheduled for one content key.
///
/// Deletes are applied before the create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAction {
    pub content: String,
    pub reason: ActionReason,
    pub deletes: Vec<RemoteRef>,
    pub create: Option<NewMemory>,
}

impl KeyAction {
    /// Number of remote calls this action issues.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.deletes.len() + usize::from(self.create.is_some())
    }
}

/// Result of diffing local against remote state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Work per content key, creates first in ascending recency, then orphans.
    pub actions: Vec<KeyAction>,
    /// Matched keys needing no operation.
    pub in_sync: usize,
}

impl SyncPlan {
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.actions.iter().filter(|a| a.create.is_some()).count()
    }

    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.actions.iter().map(|a| a.deletes.len()).sum()
    }

    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.actions.iter().map(KeyAction::operation_count).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Kind of remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Delete,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// A single failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFailure {
    pub kind: OperationKind,
    /// Content preview for display.
    pub content: String,
    pub remote_id: Option<String>,
    pub cause: String,
}

/// Outcome of one remote call, sent from a worker to the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Created { remote_id: String },
    Deleted { remote_id: String },
    Failed(OperationFailure),
}

impl OperationOutcome {
    /// Build a failure outcome with a truncated content preview.
    #[must_use]
    pub fn failed(
        kind: OperationKind,
        content: &str,
        remote_id: Option<&str>,
        cause: impl Into<String>,
    ) -> Self {
        Self::Failed(OperationFailure {
            kind,
            content: preview(content, 60),
            remote_id: remote_id.map(String::from),
            cause: cause.into(),
        })
    }
}

/// Totals for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub created: usize,
    pub deleted: usize,
    /// Matched keys that were already in sync.
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<OperationFailure>,
    /// Operations whose worker stopped before reporting; included in `failed`.
    pub unreported: usize,
}

impl SyncSummary {
    /// Fold one outcome into the totals.
    pub fn record(&mut self, outcome: OperationOutcome) {
        match outcome {
            OperationOutcome::Created { .. } => self.created += 1,
            OperationOutcome::Deleted { .. } => self.deleted += 1,
            OperationOutcome::Failed(failure) => {
                self.failed += 1;
                self.failures.push(failure);
            }
        }
    }

    /// Count operations that never reported an outcome as failed.
    pub fn record_unreported(&mut self, count: usize) {
        self.unreported += count;
        self.failed += count;
    }

    /// Number of remote calls that succeeded.
    #[must_use]
    pub const fn succeeded(&self) -> usize {
        self.created + self.deleted
    }

    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
