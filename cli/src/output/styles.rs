//! Colour palette for terminal output.

use owo_colors::Style;

/// One style per kind of thing the CLI prints. `Default` is uncoloured.
#[derive(Default, Clone, Copy)]
pub struct Styles {
    pub passed: Style,
    pub failed: Style,
    /// Warnings and retries.
    pub caution: Style,
    /// A stage that has started.
    pub running: Style,
    pub note: Style,
    /// Keys in key/value listings.
    pub label: Style,
    pub scenario: Style,
    pub section: Style,
    /// Leaked-resource heading; stands apart from ordinary failures.
    pub leak: Style,
}

impl Styles {
    #[must_use]
    pub fn colored() -> Self {
        Self {
            passed: Style::new().green(),
            failed: Style::new().red(),
            caution: Style::new().yellow(),
            running: Style::new().cyan(),
            note: Style::new().blue(),
            label: Style::new().dimmed(),
            scenario: Style::new().bold(),
            section: Style::new().bold().cyan(),
            leak: Style::new().bold().white().on_red(),
        }
    }
}
