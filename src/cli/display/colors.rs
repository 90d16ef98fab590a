//! Color theme for CLI output

use super::icons::PresetStatus;
use comfy_table::Color as TableColor;

/// Color theme for terminal output
#[derive(Debug, Clone)]
pub struct ColorTheme {
    pub success: TableColor,
    pub warning: TableColor,
    pub error: TableColor,
    pub info: TableColor,
    pub muted: TableColor,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            success: TableColor::Green,
            warning: TableColor::Yellow,
            error: TableColor::Red,
            info: TableColor::Cyan,
            muted: TableColor::DarkGrey,
        }
    }
}

impl ColorTheme {
    pub fn status_color(&self, status: PresetStatus) -> TableColor {
        match status {
            PresetStatus::Applied | PresetStatus::Valid => self.success,
            PresetStatus::Conflict => self.warning,
            PresetStatus::Invalid => self.error,
            PresetStatus::Skipped => self.muted,
        }
    }
}
