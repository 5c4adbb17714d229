//! Table output for batch items and error log entries using comfy-table.

use std::env;

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

use super::preview;
use crate::domain::models::{ErrorLogEntry, Item, ItemState};

const ANSWER_PREVIEW_CHARS: usize = 60;
const QUERY_PREVIEW_CHARS: usize = 40;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    /// Formatter with colors when the terminal supports them.
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    /// Formatter with explicit color and width settings.
    pub const fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// One row per item, in index order.
    pub fn format_items(&self, items: &[Item]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["#", "Query", "State", "Retries", "Answer"]));

        for item in items {
            let state_cell = if self.use_colors {
                Cell::new(item.state.as_str()).fg(state_color(item.state))
            } else {
                Cell::new(format!("{} {}", state_icon(item.state), item.state.as_str()))
            };

            let detail = match (&item.answer, &item.last_error) {
                (Some(answer), _) => preview(answer, ANSWER_PREVIEW_CHARS),
                (None, Some(error)) => preview(error, ANSWER_PREVIEW_CHARS),
                (None, None) => "-".to_string(),
            };

            table.add_row(vec![
                Cell::new(item.number()),
                Cell::new(preview(&item.query, QUERY_PREVIEW_CHARS)),
                state_cell,
                Cell::new(item.retry_count),
                Cell::new(detail),
            ]);
        }

        table.to_string()
    }

    /// Error log entries in the order given.
    pub fn format_error_log(&self, entries: &[ErrorLogEntry]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Time", "Item", "Session", "Message"]));

        for entry in entries {
            let session = entry
                .session_ref
                .map_or_else(|| "-".to_string(), |id| id.to_string().chars().take(8).collect());
            let message = if self.use_colors {
                Cell::new(&entry.message).fg(Color::Red)
            } else {
                Cell::new(&entry.message)
            };

            table.add_row(vec![
                Cell::new(entry.timestamp.format("%Y-%m-%d %H:%M:%S")),
                Cell::new(entry.item_index + 1),
                Cell::new(session),
                message,
            ]);
        }

        table.to_string()
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width);
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|title| Cell::new(title).add_attribute(Attribute::Bold))
        .collect()
}

/// Check if color output is supported
pub fn supports_color() -> bool {
    // Respect NO_COLOR environment variable
    if env::var("NO_COLOR").is_ok() {
        return false;
    }

    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

const fn state_color(state: ItemState) -> Color {
    match state {
        ItemState::Succeeded => Color::Green,
        ItemState::Failed => Color::Red,
        ItemState::SessionStarting | ItemState::QuerySubmitted => Color::Cyan,
        ItemState::AwaitingStability => Color::Yellow,
        ItemState::Queued => Color::White,
    }
}

const fn state_icon(state: ItemState) -> &'static str {
    match state {
        ItemState::Succeeded => "✓",
        ItemState::Failed => "✗",
        ItemState::SessionStarting | ItemState::QuerySubmitted => "⟳",
        ItemState::AwaitingStability => "⧗",
        ItemState::Queued => "○",
    }
}
