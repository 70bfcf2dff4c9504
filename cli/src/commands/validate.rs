//! `infracheck validate <SUITE>`: parse and check a suite without running it.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::domain::report::EXIT_PASSED;
use crate::infra::suite::load_suite;
use crate::output::human::HumanRenderer;
use crate::output::json::format_suite;

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Suite file (YAML)
    pub suite: PathBuf,
}

/// Entry point for `infracheck validate`.
///
/// # Errors
///
/// Returns an error if the suite cannot be read, parsed or validated.
pub fn run(app: &AppContext, args: &ValidateArgs) -> Result<u8> {
    let scenarios = load_suite(&args.suite)?;
    if app.is_json() {
        println!("{}", format_suite(&scenarios)?);
    } else {
        HumanRenderer::new(&app.output).render_suite(&args.suite, &scenarios);
    }
    Ok(EXIT_PASSED)
}
