//! Application layer - use cases and orchestration.
//!
//! This layer contains the extraction and reconciliation logic and the
//! console formatting of their results.

pub mod extractor;
pub mod formatter;
pub mod parser;
pub mod progress;
pub mod reconciler;

pub use extractor::extract_memories;
pub use formatter::{format_plan_table, format_stats, format_summary};
pub use reconciler::Reconciler;
