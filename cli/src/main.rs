//! infracheck - provision, verify and tear down infrastructure definitions

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use infracheck_cli::cli::Cli;
use infracheck_cli::domain::report::EXIT_ERROR;
use infracheck_cli::output::json::{error_code, format_error};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let json = cli.json;
    match cli.run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            match format_error(&format!("{e:#}"), error_code(&e)) {
                Ok(doc) if json => println!("{doc}"),
                _ => eprintln!("Error: {e:#}"),
            }
            ExitCode::from(EXIT_ERROR)
        }
    }
}
