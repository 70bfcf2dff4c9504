//! `ProgressReporter` implementations for the terminal and for `--json`.
//!
//! Lines from concurrent scenarios interleave; each one carries its
//! scenario name.

use crate::application::ports::ProgressReporter;
use crate::output::OutputContext;

/// Prints progress through an [`OutputContext`], so `--quiet` applies.
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
}

impl<'a> TerminalReporter<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        self.ctx.step(message);
    }

    fn success(&self, message: &str) {
        self.ctx.success(message);
    }

    fn warn(&self, message: &str) {
        self.ctx.warn(message);
    }
}

/// Reporter that prints nothing, for `--json` runs where stdout carries
/// only the report document.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn step(&self, _message: &str) {}
    fn success(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
}
