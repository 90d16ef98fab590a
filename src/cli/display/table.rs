//! Table rendering for CLI output

use super::{ColorTheme, PresetStatus, StatusIcon};
use crate::domain::podpreset::ConflictReport;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table};

/// One podpreset line in a preview or validation table
#[derive(Debug, Clone)]
pub struct PresetRow {
    pub name: String,
    pub namespace: String,
    pub selector: String,
    pub status: PresetStatus,
    pub detail: String,
}

/// Table renderer for formatted output
pub struct TableRenderer {
    theme: ColorTheme,
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRenderer {
    pub fn new() -> Self {
        Self {
            theme: ColorTheme::default(),
        }
    }

    /// Render podpresets with their outcome under a boxed title
    pub fn render_presets(&self, title: &str, rows: &[PresetRow]) -> String {
        if rows.is_empty() {
            return "No podpresets found".to_string();
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("PODPRESET").set_alignment(CellAlignment::Left),
                Cell::new("NAMESPACE").set_alignment(CellAlignment::Left),
                Cell::new("SELECTOR").set_alignment(CellAlignment::Left),
                Cell::new("STATUS").set_alignment(CellAlignment::Center),
                Cell::new("DETAIL").set_alignment(CellAlignment::Left),
            ]);

        for row in rows {
            let selector = if row.selector.is_empty() {
                "<all>".to_string()
            } else {
                row.selector.clone()
            };

            table.add_row(vec![
                Cell::new(&row.name),
                Cell::new(&row.namespace),
                Cell::new(selector),
                Cell::new(format!(
                    "{} {}",
                    StatusIcon::for_status(row.status),
                    StatusIcon::status_text(row.status)
                ))
                .fg(self.theme.status_color(row.status)),
                Cell::new(&row.detail),
            ]);
        }

        let mut output = String::new();
        output.push_str(&format!(
            "╭─ {} {} ─╮\n",
            title,
            format!("[{} podpresets]", rows.len()).bright_black()
        ));
        output.push_str(&table.to_string());
        output.push('\n');
        output.push_str(&format!(
            "Legend: {} Applied/Valid  {} Conflict  {} Invalid  {} Not selected\n",
            StatusIcon::SUCCESS.green(),
            StatusIcon::WARNING.yellow(),
            StatusIcon::ERROR.red(),
            StatusIcon::SKIPPED.bright_black()
        ));

        output
    }

    /// Render every conflict found by a dry-run merge
    pub fn render_conflicts(&self, report: &ConflictReport) -> String {
        if report.is_empty() {
            return format!("{} No conflicts", StatusIcon::SUCCESS.green());
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("PODPRESET"),
                Cell::new("FIELD"),
                Cell::new("KEY"),
                Cell::new("POD VALUE"),
                Cell::new("PRESET VALUE"),
            ]);

        for conflict in report.conflicts() {
            table.add_row(vec![
                Cell::new(&conflict.preset),
                Cell::new(conflict.field.as_str()),
                Cell::new(&conflict.key),
                Cell::new(&conflict.existing).fg(self.theme.muted),
                Cell::new(&conflict.incoming).fg(self.theme.warning),
            ]);
        }

        format!(
            "{} {} conflict(s), pod left unchanged\n{}",
            StatusIcon::WARNING.yellow(),
            report.len(),
            table
        )
    }
}
