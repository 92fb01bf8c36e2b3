//! Console output for extraction statistics, plans and sync summaries.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::{ExtractionStats, SyncPlan, SyncSummary};

/// Formats extraction statistics for display.
pub fn format_stats(stats: &ExtractionStats) -> String {
    let mut out = format!(
        "{}\n  Conversations: {}\n  Nodes visited: {}\n  Candidates: {}\n  Duplicates collapsed: {}\n  Memories: {}",
        "📊 Extraction".bold(),
        stats.conversation_count.to_string().cyan(),
        stats.nodes_visited.to_string().cyan(),
        stats.candidates.to_string().cyan(),
        stats.duplicates_collapsed.to_string().yellow(),
        stats.memories.to_string().green(),
    );

    if !stats.skipped.is_empty() {
        out.push_str(&format!(
            "\n  Skipped: {}",
            stats.total_skipped().to_string().yellow()
        ));
        for (reason, count) in &stats.skipped {
            out.push_str(&format!("\n    {reason}: {count}"));
        }
    }

    out
}

/// Formats a plan as a table of pending operations.
pub fn format_plan_table(plan: &SyncPlan) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Reason", "Deletes", "Create", "Content"]);

    for action in &plan.actions {
        table.add_row(vec![
            action.reason.to_string(),
            action.deletes.len().to_string(),
            if action.create.is_some() { "yes" } else { "-" }.to_string(),
            truncate(&action.content, 60),
        ]);
    }

    format!(
        "{}\n\n{} to create, {} to delete, {} already in sync",
        table,
        plan.create_count().to_string().green(),
        plan.delete_count().to_string().red(),
        plan.in_sync.to_string().cyan()
    )
}

/// Formats the result of applying a plan, with failures enumerated.
pub fn format_summary(summary: &SyncSummary) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Created", "Deleted", "Skipped", "Failed"]);
    table.add_row(vec![
        summary.created.to_string(),
        summary.deleted.to_string(),
        summary.skipped.to_string(),
        summary.failed.to_string(),
    ]);

    let mut out = format!("{}\n{table}", "🔄 Sync summary".bold());

    if summary.has_failures() {
        let mut failures = Table::new();
        failures.load_preset(UTF8_FULL);
        failures.set_header(vec!["Operation", "Remote ID", "Content", "Cause"]);
        for failure in &summary.failures {
            failures.add_row(vec![
                failure.kind.to_string(),
                failure.remote_id.clone().unwrap_or_else(|| "-".to_string()),
                truncate(&failure.content, 40),
                failure.cause.clone(),
            ]);
        }
        out.push_str(&format!("\n\n{}\n{failures}", "⚠ Failures".red().bold()));
    }

    if summary.unreported > 0 {
        out.push_str(&format!(
            "\n{} {} operation(s) ended without an outcome (worker stopped)",
            "⚠".red().bold(),
            summary.unreported
        ));
    }

    out
}

/// Truncates to the first line and at most `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.lines().next().unwrap_or(s);
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ActionReason, KeyAction, NewMemory, OperationKind, OperationOutcome, SkipReason,
    };

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world!", 8), "hello...");
        assert_eq!(truncate("first\nsecond", 20), "first");
    }

    #[test]
    fn test_stats_lists_skip_reasons() {
        colored::control::set_override(false);
        let mut stats = ExtractionStats::default();
        stats.skip(SkipReason::MissingTimestamp);

        let out = format_stats(&stats);
        assert!(out.contains("missing timestamp: 1"));
    }

    #[test]
    fn test_plan_table_counts() {
        colored::control::set_override(false);
        let plan = SyncPlan {
            actions: vec![KeyAction {
                content: "likes tea".into(),
                reason: ActionReason::Missing,
                deletes: Vec::new(),
                create: Some(NewMemory {
                    content: "likes tea".into(),
                    created_at: 1,
                    updated_at: 1,
                }),
            }],
            in_sync: 2,
        };

        let out = format_plan_table(&plan);
        assert!(out.contains("likes tea"));
        assert!(out.contains("1 to create, 0 to delete, 2 already in sync"));
    }

    #[test]
    fn test_summary_enumerates_failures() {
        colored::control::set_override(false);
        let mut summary = SyncSummary::default();
        summary.record(OperationOutcome::failed(
            OperationKind::Delete,
            "likes tea",
            Some("r-1"),
            "Remote call timed out",
        ));

        let out = format_summary(&summary);
        assert!(out.contains("Failures"));
        assert!(out.contains("r-1"));
        assert!(out.contains("Remote call timed out"));

        let clean = format_summary(&SyncSummary::default());
        assert!(!clean.contains("Failures"));
        assert!(!clean.contains("without an outcome"));
    }

    #[test]
    fn test_summary_notes_unreported_operations() {
        colored::control::set_override(false);
        let mut summary = SyncSummary::default();
        summary.record_unreported(3);

        let out = format_summary(&summary);
        assert!(out.contains("3 operation(s) ended without an outcome"));
    }
}
