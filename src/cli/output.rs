//! Output formatting utilities for the CLI.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use crate::domain::models::{AttemptStatus, FleetReport};

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
    fn to_json(&self) -> serde_json::Value;
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to at most `max_chars` characters, appending "..." if
/// truncated.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

const fn status_color(status: &AttemptStatus) -> Color {
    match status {
        AttemptStatus::Succeeded => Color::Green,
        AttemptStatus::Exhausted => Color::Yellow,
        AttemptStatus::Failed { .. } => Color::Red,
        AttemptStatus::TimedOut => Color::Magenta,
        AttemptStatus::Cancelled => Color::DarkGrey,
    }
}

/// Per-attempt table of a fleet report.
pub fn fleet_table(report: &FleetReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Attempt").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Exit").add_attribute(Attribute::Bold),
            Cell::new("Elapsed").add_attribute(Attribute::Bold),
            Cell::new("Log").add_attribute(Attribute::Bold),
        ]);

    for result in &report.results {
        let exit = result
            .exit_code
            .map_or_else(|| "-".to_string(), |code| code.to_string());
        let mut id = Cell::new(result.id);
        if report.winning_id == Some(result.id) {
            id = id.add_attribute(Attribute::Bold);
        }
        table.add_row(vec![
            id,
            Cell::new(result.status.as_str()).fg(status_color(&result.status)),
            Cell::new(exit),
            Cell::new(format!("{:.1}s", result.elapsed.as_secs_f64())),
            Cell::new(truncate(&result.log_path.display().to_string(), 60)),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AttemptResult;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer line of text", 10), "a longe...");
        assert_eq!(truncate("ééééééé", 5), "éé...");
    }

    #[test]
    fn test_fleet_table_lists_every_attempt() {
        let results = vec![
            AttemptResult::new(1, AttemptStatus::Cancelled, PathBuf::from("logs/attempt_01.log")),
            AttemptResult::new(2, AttemptStatus::Succeeded, PathBuf::from("logs/attempt_02.log")),
        ];
        let report = FleetReport::from_results(results, Duration::from_secs(3), Some(2));
        let rendered = fleet_table(&report).to_string();
        assert!(rendered.contains("cancelled"));
        assert!(rendered.contains("succeeded"));
        assert!(rendered.contains("logs/attempt_02.log"));
    }
}
