//! Domain layer - core types and errors.
//!
//! This layer contains pure domain models and error types
//! without any I/O.

pub mod error;
pub mod models;
pub mod sync;

pub use error::{AppError, RemoteError, Result};
pub use models::{normalize_content, ExtractionStats, Memory, SkipReason};
pub use sync::{
    ActionReason, AppConfig, KeyAction, NewMemory, OperationKind, OperationOutcome, RemoteRef,
    RemoteSettings, SyncPlan, SyncSummary,
};
