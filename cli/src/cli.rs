//! CLI argument parsing with clap derive

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags};
use crate::commands;
use crate::domain::report::EXIT_PASSED;

/// Provision infrastructure definitions, verify them, and tear them down
#[derive(Parser)]
#[command(
    name = "infracheck",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    /// Log engine events to stderr (same as RUST_LOG=info)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: $INFRACHECK_CONFIG, then ~/.infracheck/config.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a suite: apply, wait, assert and destroy each scenario
    Run(commands::run::RunArgs),

    /// Check a suite file and list its scenarios
    Validate(commands::validate::ValidateArgs),

    /// Destroy the resources of a retained workspace
    Destroy(commands::destroy::DestroyArgs),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command and return the process exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot run at all.
    pub async fn run(self) -> Result<u8> {
        let Cli {
            json,
            quiet,
            no_color,
            verbose: _,
            config,
            command,
        } = self;
        let app = AppContext::new(AppFlags {
            no_color,
            quiet,
            json,
            config,
        });
        match command {
            Command::Run(args) => commands::run::run(&app, &args).await,
            Command::Validate(args) => commands::validate::run(&app, &args),
            Command::Destroy(args) => commands::destroy::run(&app, &args).await,
            Command::Version => {
                commands::version::run(json);
                Ok(EXIT_PASSED)
            }
        }
    }
}
