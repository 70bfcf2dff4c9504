//! Terminal output: styling, quiet handling, and the renderers built on it.
//!
//! Progress and results go to stdout and are silenced by `--quiet`. Errors
//! and the leaked-resource alarm go to stderr and are never silenced.

pub mod human;
pub mod json;
pub mod reporter;
pub mod styles;

use console::Term;
use owo_colors::OwoColorize as _;
pub use styles::Styles;

/// Styling and verbosity shared by everything that prints.
pub struct OutputContext {
    pub styles: Styles,
    /// Suppress everything except errors and alarms.
    pub quiet: bool,
}

impl OutputContext {
    /// Colours are used only on a terminal, and never with `--no-color` or
    /// `NO_COLOR` set.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let use_colors =
            !no_color && Term::stdout().is_term() && std::env::var_os("NO_COLOR").is_none();

        let styles = if use_colors {
            Styles::colored()
        } else {
            Styles::default()
        };
        Self { styles, quiet }
    }

    /// Blank separator line on stdout.
    pub fn blank(&self) {
        if !self.quiet {
            println!();
        }
    }

    /// `→ msg`, a step that has started.
    pub fn step(&self, msg: &str) {
        self.line("→".style(self.styles.running), msg);
    }

    /// `✓ msg`
    pub fn success(&self, msg: &str) {
        self.line("✓".style(self.styles.passed), msg);
    }

    /// `⚠ msg`
    pub fn warn(&self, msg: &str) {
        self.line("⚠".style(self.styles.caution), msg);
    }

    /// `ℹ msg`
    pub fn info(&self, msg: &str) {
        self.line("ℹ".style(self.styles.note), msg);
    }

    /// `✗ msg` on stderr, even when quiet.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.failed));
    }

    /// Alarm heading on stderr, preceded by a blank line, even when quiet.
    pub fn alarm(&self, heading: &str) {
        eprintln!();
        eprintln!("  {}", heading.style(self.styles.leak));
    }

    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", msg.style(self.styles.section));
        }
    }

    /// Key-value pair with the key dimmed.
    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {}  {value}", key.style(self.styles.label));
        }
    }

    fn line(&self, marker: impl std::fmt::Display, msg: &str) {
        if !self.quiet {
            println!("  {marker} {msg}");
        }
    }
}
