//! Status icons for CLI output

/// Outcome of checking one podpreset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetStatus {
    /// Selector matched and the merge is clean
    Applied,
    /// Selector matched but merging conflicts with the pod
    Conflict,
    /// Selector did not match the pod
    Skipped,
    /// Passed validation
    Valid,
    /// Failed validation or its selector does not compile
    Invalid,
}

/// Status icons for different states
pub struct StatusIcon;

impl StatusIcon {
    pub const SUCCESS: &'static str = "✓";

    pub const WARNING: &'static str = "⚠";

    pub const ERROR: &'static str = "✗";

    pub const SKIPPED: &'static str = "-";

    pub fn for_status(status: PresetStatus) -> &'static str {
        match status {
            PresetStatus::Applied | PresetStatus::Valid => Self::SUCCESS,
            PresetStatus::Conflict => Self::WARNING,
            PresetStatus::Invalid => Self::ERROR,
            PresetStatus::Skipped => Self::SKIPPED,
        }
    }

    pub fn status_text(status: PresetStatus) -> &'static str {
        match status {
            PresetStatus::Applied => "Applied",
            PresetStatus::Conflict => "Conflict",
            PresetStatus::Skipped => "Not selected",
            PresetStatus::Valid => "Valid",
            PresetStatus::Invalid => "Invalid",
        }
    }
}
