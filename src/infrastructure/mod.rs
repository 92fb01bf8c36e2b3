//! Infrastructure layer - external adapters (HTTP, filesystem).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod artifact;
pub mod config;
pub mod remote_client;

pub use artifact::{read_memories_jsonl, write_memories_jsonl};
pub use config::{load_config, user_config_path, write_default_config};
pub use remote_client::{OpenWebUiClient, RemoteStore};
