//! Client for the remote memory store (Open WebUI memories API).
//!
//! Every call is a single round-trip with the configured timeout. Nothing
//! is retried here; failures surface to the caller as `RemoteError`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::{AppError, Memory, NewMemory, RemoteError, RemoteSettings};

/// Result type for remote calls.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// CRUD surface of the remote memory store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Lists every memory currently stored for the user.
    async fn list(&self) -> RemoteResult<Vec<Memory>>;

    /// Creates a memory and returns the id the store assigned.
    async fn create(&self, memory: &NewMemory) -> RemoteResult<String>;

    /// Deletes a memory. Deleting an id that does not exist succeeds.
    async fn delete(&self, remote_id: &str) -> RemoteResult<()>;
}

/// Memory as returned by the store.
#[derive(Debug, Deserialize)]
struct RawRemoteMemory {
    id: String,
    content: String,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    updated_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CreatedMemory {
    id: String,
}

/// HTTP client for an Open WebUI instance.
pub struct OpenWebUiClient {
    client: Client,
    settings: RemoteSettings,
}

impl OpenWebUiClient {
    /// Creates a client for the given settings.
    ///
    /// # Errors
    /// Returns a `Config` error if the HTTP client cannot be built.
    pub fn new(settings: RemoteSettings) -> crate::domain::Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| AppError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, settings })
    }

    fn memories_url(&self, path: &str) -> String {
        format!("{}/api/v1/memories/{}", self.settings.base_url, path)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.settings.token)
    }
}

#[async_trait]
impl RemoteStore for OpenWebUiClient {
    async fn list(&self) -> RemoteResult<Vec<Memory>> {
        let response = self
            .client
            .get(self.memories_url(""))
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .query(&[("user", self.settings.user_id.as_str())])
            .send()
            .await
            .map_err(|e| classify_transport(&e, "list memories"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let items: Vec<Value> = response
            .json()
            .await
            .map_err(|e| RemoteError::protocol(format!("Failed to parse memory list: {e}")))?;

        let memories = decode_remote_memories(items);
        tracing::info!(count = memories.len(), "Fetched remote memories");
        Ok(memories)
    }

    async fn create(&self, memory: &NewMemory) -> RemoteResult<String> {
        let body = json!({
            "user": self.settings.user_id,
            "content": memory.content,
            "created_at": memory.created_at,
            "updated_at": memory.updated_at,
        });

        let response = self
            .client
            .post(self.memories_url("add"))
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(&e, "create memory"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let created: Option<CreatedMemory> = response
            .json()
            .await
            .map_err(|e| RemoteError::protocol(format!("Failed to parse created memory: {e}")))?;

        created
            .map(|c| c.id)
            .ok_or_else(|| RemoteError::protocol("store returned no memory for create"))
    }

    async fn delete(&self, remote_id: &str) -> RemoteResult<()> {
        let response = self
            .client
            .delete(self.memories_url(remote_id))
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .send()
            .await
            .map_err(|e| classify_transport(&e, "delete memory"))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(remote_id, "Memory already gone");
        }
        let body = if is_delete_success(status) {
            String::new()
        } else {
            response.text().await.unwrap_or_default()
        };
        delete_result(status, &body)
    }
}

/// Decodes list entries one by one, skipping entries that cannot be targeted.
fn decode_remote_memories(items: Vec<Value>) -> Vec<Memory> {
    let now = chrono::Utc::now().timestamp();

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawRemoteMemory>(item) {
            Ok(raw) => {
                let created_at = raw.created_at.or(raw.updated_at).unwrap_or(now);
                let updated_at = raw.updated_at.unwrap_or(created_at);
                Some(Memory::remote(raw.id, &raw.content, created_at, updated_at))
            }
            Err(e) => {
                tracing::warn!("Skipping malformed remote memory: {}", e);
                None
            }
        })
        .collect()
}

/// Maps a non-success HTTP status to a remote error.
fn classify_status(status: StatusCode, body: &str) -> RemoteError {
    let message = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", body.trim())
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::auth(message),
        s if s.is_server_error() => RemoteError::unavailable(message),
        _ => RemoteError::protocol(message),
    }
}

/// A delete of an id the store no longer has counts as done.
fn is_delete_success(status: StatusCode) -> bool {
    status.is_success() || status == StatusCode::NOT_FOUND
}

/// Outcome of a delete call for the given status.
fn delete_result(status: StatusCode, body: &str) -> RemoteResult<()> {
    if is_delete_success(status) {
        Ok(())
    } else {
        Err(classify_status(status, body))
    }
}

/// Maps a transport-level failure to a remote error.
fn classify_transport(err: &reqwest::Error, action: &str) -> RemoteError {
    if err.is_timeout() {
        RemoteError::timeout(format!("Failed to {action}: {err}"))
    } else if err.is_decode() {
        RemoteError::protocol(format!("Failed to {action}: {err}"))
    } else {
        RemoteError::unavailable(format!("Failed to {action}: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings() -> RemoteSettings {
        RemoteSettings {
            base_url: "http://localhost:8080".into(),
            user_id: "user-1".into(),
            token: "jwt".into(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_memories_url() {
        let client = OpenWebUiClient::new(settings()).unwrap();
        assert_eq!(
            client.memories_url(""),
            "http://localhost:8080/api/v1/memories/"
        );
        assert_eq!(
            client.memories_url("add"),
            "http://localhost:8080/api/v1/memories/add"
        );
        assert_eq!(client.bearer(), "Bearer jwt");
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, ""),
            RemoteError::Auth { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, "nope"),
            RemoteError::Auth { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, ""),
            RemoteError::Unavailable { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, "{\"detail\":\"bad\"}"),
            RemoteError::Protocol { .. }
        ));
    }

    #[test]
    fn test_delete_of_missing_id_succeeds() {
        assert_eq!(delete_result(StatusCode::OK, ""), Ok(()));
        assert_eq!(delete_result(StatusCode::NO_CONTENT, ""), Ok(()));
        assert_eq!(delete_result(StatusCode::NOT_FOUND, "not found"), Ok(()));
    }

    #[test]
    fn test_delete_failures_are_classified() {
        assert!(matches!(
            delete_result(StatusCode::UNAUTHORIZED, ""),
            Err(RemoteError::Auth { .. })
        ));
        assert!(matches!(
            delete_result(StatusCode::INTERNAL_SERVER_ERROR, "db locked"),
            Err(RemoteError::Unavailable { .. })
        ));
        assert!(matches!(
            delete_result(StatusCode::BAD_REQUEST, ""),
            Err(RemoteError::Protocol { .. })
        ));
    }

    #[test]
    fn test_classify_status_includes_body() {
        let err = classify_status(StatusCode::UNAUTHORIZED, " token expired ");
        assert!(err.to_string().contains("token expired"));
    }

    #[test]
    fn test_decode_skips_malformed_entries() {
        let items = vec![
            json!({ "id": "m1", "content": "likes  tea", "created_at": 50, "updated_at": 60 }),
            json!({ "content": "no id" }),
            json!({ "id": "m2", "content": "no times" }),
        ];

        let memories = decode_remote_memories(items);
        assert_eq!(memories.len(), 2);
        assert_eq!(memories[0].content, "likes tea");
        assert_eq!(memories[0].created_at, 50);
        assert_eq!(memories[0].updated_at, 60);
        assert_eq!(memories[1].remote_id.as_deref(), Some("m2"));
        assert!(memories[1].created_at > 0);
    }
}
