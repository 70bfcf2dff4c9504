//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` is the production implementation that uses tokio
//! for async process execution with a guaranteed timeout and a graceful
//! shutdown on all platforms.

use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio_util::sync::CancellationToken;

use crate::application::ports::CommandRunner;

const DEFAULT_GRACE: Duration = Duration::from_secs(10);

/// Production `CommandRunner` using tokio for async process execution.
///
/// When the timeout fires or the caller's stop token is cancelled, the child's
/// process group receives SIGINT and gets `grace` to exit before it is killed.
/// Provisioning tools treat SIGINT as "finish the current call and write
/// state", which is what a later destroy relies on. The child runs in its own
/// process group, so a terminal Ctrl-C reaches only this process and is
/// forwarded exactly once. `kill_on_drop` covers a future that is abandoned
/// outright.
pub struct TokioCommandRunner {
    timeout: Duration,
    grace: Duration,
    envs: Vec<(String, String)>,
}

enum Ended {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Stopped,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            grace: DEFAULT_GRACE,
            envs: Vec::new(),
        }
    }

    /// Set an environment variable on every spawned process.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// How long an interrupted child may take to exit before it is killed.
    #[must_use]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    async fn execute(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
        stop: &CancellationToken,
    ) -> Result<Output> {
        tracing::debug!(program, ?args, "Running command");
        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let stdout = tokio::spawn(read_all(child.stdout.take()));
        let stderr = tokio::spawn(read_all(child.stderr.take()));

        let ended = tokio::select! {
            status = child.wait() => Ended::Exited(status),
            () = tokio::time::sleep(timeout) => Ended::TimedOut,
            () = stop.cancelled() => Ended::Stopped,
        };

        match ended {
            Ended::Exited(status) => Ok(Output {
                status: status.with_context(|| format!("waiting for {program}"))?,
                stdout: stdout.await.unwrap_or_default(),
                stderr: stderr.await.unwrap_or_default(),
            }),
            Ended::TimedOut => {
                self.shut_down(&mut child, program).await;
                stdout.abort();
                stderr.abort();
                anyhow::bail!("{program} timed out after {}s", timeout.as_secs())
            }
            Ended::Stopped => {
                self.shut_down(&mut child, program).await;
                stdout.abort();
                stderr.abort();
                anyhow::bail!("{program} interrupted")
            }
        }
    }

    /// Ask the child to stop, wait out the grace period, then kill it.
    async fn shut_down(&self, child: &mut Child, program: &str) {
        #[cfg(unix)]
        if let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) {
            use nix::sys::signal::{Signal, killpg};
            use nix::unistd::Pid;

            match killpg(Pid::from_raw(pid), Signal::SIGINT) {
                Ok(()) | Err(nix::Error::ESRCH) => {}
                Err(e) => tracing::warn!(program, error = %e, "failed to interrupt"),
            }
            match tokio::time::timeout(self.grace, child.wait()).await {
                Ok(Ok(status)) => {
                    tracing::debug!(program, %status, "exited after interrupt");
                    return;
                }
                Ok(Err(e)) => tracing::warn!(program, error = %e, "failed waiting for interrupted child"),
                Err(_) => tracing::warn!(
                    program,
                    grace_secs = self.grace.as_secs(),
                    "did not exit after interrupt, killing"
                ),
            }
        }
        if let Err(e) = child.kill().await {
            tracing::warn!(program, error = %e, "failed to kill");
        }
    }
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.run_with_timeout(program, args, self.timeout).await
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output> {
        self.execute(program, args, timeout, &CancellationToken::new())
            .await
    }

    async fn run_until(
        &self,
        program: &str,
        args: &[&str],
        stop: &CancellationToken,
    ) -> Result<Output> {
        self.execute(program, args, self.timeout, stop).await
    }
}

async fn read_all(handle: Option<impl AsyncRead + Unpin>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = h.read_to_end(&mut buf).await;
    }
    buf
}
