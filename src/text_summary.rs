//! Text summary builder for CLI output.
//!
//! Formats the final state of a run as human-readable lines for text mode.

use crate::model::RunSummary;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary from a finished run.
pub(crate) fn build_text_summary(summary: &RunSummary) -> TextSummary {
    let mut lines = vec![
        format!("Server: {}", summary.base_url),
        format!("Population: {}", summary.num_people),
        format!("Status: {}", summary.status),
        format!("Polls: {}", summary.polls),
    ];
    if !summary.building_text.is_empty() {
        lines.push(String::new());
        lines.extend(summary.building_text.lines().map(str::to_string));
    }
    TextSummary { lines }
}
