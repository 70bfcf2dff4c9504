//! `infracheck run <SUITE>`: provision, verify and destroy every scenario.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::app::AppContext;
use crate::application::ports::ProgressReporter;
use crate::application::services::ScenarioRunner;
use crate::domain::report::EXIT_LEAKED;
use crate::domain::{EngineConfig, Scenario, SuiteReport, select_scenarios};
use crate::infra::suite::load_suite;
use crate::infra::workspace::TempWorkspaceProvider;
use crate::output::human::HumanRenderer;
use crate::output::json::format_report;
use crate::output::reporter::{SilentReporter, TerminalReporter};

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Suite file (YAML)
    pub suite: PathBuf,

    /// Run only this scenario (repeatable)
    #[arg(long = "scenario", value_name = "NAME")]
    pub scenarios: Vec<String>,

    /// Maximum number of scenarios in flight (overrides config)
    #[arg(long, value_name = "N")]
    pub parallel: Option<usize>,
}

/// Entry point for `infracheck run`. Returns the process exit code.
///
/// # Errors
///
/// Returns an error if the config or suite cannot be loaded. Scenario
/// failures are reported through the exit code instead.
pub async fn run(app: &AppContext, args: &RunArgs) -> Result<u8> {
    let mut config = app.load_config()?;
    if let Some(parallel) = args.parallel {
        config = config.with_parallelism(parallel)?;
    }
    let scenarios = select_scenarios(load_suite(&args.suite)?, &args.scenarios)
        .with_context(|| format!("selecting scenarios from {}", args.suite.display()))?;

    app.output.info(&format!(
        "Running {} scenario(s) from {} (parallelism {}, region {})",
        scenarios.len(),
        args.suite.display(),
        config.parallelism,
        config.region
    ));

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn(forward_interrupt(cancel.clone()));

    let report = if app.is_json() {
        execute(app, &config, &scenarios, &SilentReporter, cancel).await
    } else {
        execute(app, &config, &scenarios, &TerminalReporter::new(&app.output), cancel).await
    };
    interrupt.abort();

    if app.is_json() {
        println!("{}", format_report(&report)?);
    } else {
        HumanRenderer::new(&app.output).render_report(&report);
    }
    Ok(report.exit_code())
}

async fn execute(
    app: &AppContext,
    config: &EngineConfig,
    scenarios: &[Scenario],
    reporter: &impl ProgressReporter,
    cancel: CancellationToken,
) -> SuiteReport {
    let tool = app.terraform(config);
    let probe = app.probe(config);
    let workspaces = TempWorkspaceProvider::in_system_temp();
    ScenarioRunner::new(&tool, &probe, &workspaces, reporter, config, cancel)
        .run_all(scenarios)
        .await
}

/// Cancel the suite on the first Ctrl-C. In-flight scenarios still destroy.
/// First Ctrl-C stops the suite gracefully. A second one abandons cleanup.
async fn forward_interrupt(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        info!(error = %e, "Ctrl-C handler unavailable");
        return;
    }
    warn!("Interrupted; stopping scenarios and destroying what was applied (Ctrl-C again to abandon)");
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        error!("Interrupted again; abandoning cleanup, provisioned resources may be leaked");
        std::process::exit(i32::from(EXIT_LEAKED));
    }
}
