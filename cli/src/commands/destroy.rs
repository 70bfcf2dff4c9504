//! `infracheck destroy <WORKSPACE_DIR>`: retry teardown of a retained workspace.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::ProgressReporter;
use crate::application::services::cleanup_service::destroy_retained;
use crate::application::services::{Destroyed, ProvisionFailure};
use crate::domain::report::{EXIT_LEAKED, EXIT_PASSED};
use crate::infra::state::RecordFile;
use crate::infra::workspace::TempWorkspaceProvider;
use crate::output::json::format_error;
use crate::output::reporter::{SilentReporter, TerminalReporter};

/// Arguments for the destroy command.
#[derive(Args)]
pub struct DestroyArgs {
    /// Retained workspace directory, as listed under LEAKED RESOURCES
    pub workspace: PathBuf,
}

/// Entry point for `infracheck destroy`.
///
/// A destroy that fails again exits with the leak code and keeps the
/// workspace on disk.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or the directory is not
/// a retained workspace.
pub async fn run(app: &AppContext, args: &DestroyArgs) -> Result<u8> {
    let root = std::path::absolute(&args.workspace)
        .with_context(|| format!("cannot resolve {}", args.workspace.display()))?;

    let result = if app.is_json() {
        destroy(app, &root, &SilentReporter).await
    } else {
        destroy(app, &root, &TerminalReporter::new(&app.output)).await
    };

    let destroyed = match result {
        Ok(destroyed) => destroyed,
        Err(e) if e.chain().any(|c| c.is::<ProvisionFailure>()) => {
            if app.is_json() {
                println!("{}", format_error(&format!("{e:#}"), "destroy_failed")?);
            } else {
                app.output.error(&format!("{e:#}"));
                app.output
                    .error(&format!("Workspace kept at {}", root.display()));
            }
            return Ok(EXIT_LEAKED);
        }
        Err(e) => return Err(e),
    };

    if app.is_json() {
        let doc = serde_json::json!({
            "workspace": root.display().to_string(),
            "destroyed": matches!(destroyed, Destroyed::Destroyed { .. }),
            "attempts": destroyed.attempt_count(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&doc).context("JSON serialization failed")?
        );
    } else if destroyed == Destroyed::NothingToDestroy {
        app.output
            .info("Workspace was never initialised; nothing to destroy.");
    }
    Ok(EXIT_PASSED)
}

async fn destroy(
    app: &AppContext,
    root: &std::path::Path,
    reporter: &impl ProgressReporter,
) -> Result<Destroyed> {
    let config = app.load_config()?;
    let tool = app.terraform(&config);
    let workspaces = TempWorkspaceProvider::in_system_temp();
    destroy_retained(&tool, &RecordFile, &workspaces, reporter, &config, root).await
}
