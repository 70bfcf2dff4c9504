//! Application context: unified state passed to every command handler.
//!
//! Constructed once in `Cli::run()` from the global flags. Adapters that
//! depend on the resolved configuration are built from here so commands do
//! not repeat the wiring.

use std::path::PathBuf;

use anyhow::Result;

use crate::domain::EngineConfig;
use crate::infra::aws::AwsElbProbe;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::YamlConfigStore;
use crate::infra::terraform::TerraformCli;
use crate::output::OutputContext;

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
    /// Explicit config file from `--config`.
    pub config: Option<PathBuf>,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    config_store: YamlConfigStore,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    #[must_use]
    pub fn new(flags: AppFlags) -> Self {
        let mode = if flags.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        Self {
            // JSON mode keeps stdout for the document alone.
            output: OutputContext::new(flags.no_color, flags.quiet || flags.json),
            mode,
            config_store: YamlConfigStore::new(flags.config),
        }
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Load and resolve the engine configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or holds invalid
    /// values.
    pub fn load_config(&self) -> Result<EngineConfig> {
        let file = self.config_store.load()?;
        Ok(file.resolve(|key| std::env::var(key).ok())?)
    }

    /// The provisioning tool adapter for `config`.
    #[must_use]
    pub fn terraform(&self, config: &EngineConfig) -> TerraformCli<TokioCommandRunner> {
        let runner = TokioCommandRunner::new(config.command_timeout)
            .with_grace(config.interrupt_grace)
            .with_env("TF_IN_AUTOMATION", "1");
        TerraformCli::new(runner, config.tool.clone())
    }

    /// The readiness probe adapter for `config`.
    #[must_use]
    pub fn probe(&self, config: &EngineConfig) -> AwsElbProbe<TokioCommandRunner> {
        let runner = TokioCommandRunner::new(config.command_timeout)
            .with_env("AWS_PAGER", "")
            .with_env("AWS_REGION", config.region.clone());
        AwsElbProbe::new(runner, config.probe_tool.clone())
    }
}
