//! Remote commands for a rolling reboot, run over the system `ssh` client.

use std::fmt;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use common::url_utils::HostTarget;

pub const DEFAULT_SSH_USER: &str = "root";
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_SERVICE: &str = "minio";
pub const SSH_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Exit code `ssh` reports when the remote side hangs up, as a reboot does.
const SSH_CONNECTION_LOST: i32 = 255;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RebootAction {
    /// Connectivity check only.
    Probe,
    RestartService,
    Reboot,
}

impl RebootAction {
    pub fn from_flags(dry_run: bool, service_only: bool) -> Self {
        match (dry_run, service_only) {
            (true, _) => RebootAction::Probe,
            (false, true) => RebootAction::RestartService,
            (false, false) => RebootAction::Reboot,
        }
    }

    pub fn commands(&self, service: &str) -> Vec<String> {
        match self {
            RebootAction::Probe => vec!["date".to_string()],
            RebootAction::RestartService => vec![format!("sudo systemctl restart {service}")],
            RebootAction::Reboot => vec![
                format!("sudo systemctl stop {service}"),
                "sudo reboot".to_string(),
            ],
        }
    }
}

impl fmt::Display for RebootAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RebootAction::Probe => "probe",
            RebootAction::RestartService => "restart-service",
            RebootAction::Reboot => "reboot",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Combined output for error reports.
    pub fn captured(&self) -> String {
        format!("{}{}", self.stdout, self.stderr).trim().to_string()
    }
}

#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn exec(&self, host: &str, command: &str) -> Result<ExecOutput>;
}

#[derive(Clone, Debug)]
pub struct SshConfig {
    pub user: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: DEFAULT_SSH_USER.to_string(),
            port: DEFAULT_SSH_PORT,
            connect_timeout: SSH_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

pub struct SshExecutor {
    cfg: SshConfig,
}

impl SshExecutor {
    pub fn new(cfg: SshConfig) -> Self {
        Self { cfg }
    }

    /// Arguments passed to `ssh`. Host keys are not verified.
    pub fn args(&self, host: &str, command: &str) -> Vec<String> {
        vec![
            "-o".into(),
            "BatchMode=yes".into(),
            "-o".into(),
            format!("ConnectTimeout={}", self.cfg.connect_timeout.as_secs()),
            "-o".into(),
            "StrictHostKeyChecking=no".into(),
            "-o".into(),
            "UserKnownHostsFile=/dev/null".into(),
            "-p".into(),
            self.cfg.port.to_string(),
            "-l".into(),
            self.cfg.user.clone(),
            host.to_string(),
            command.to_string(),
        ]
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn exec(&self, host: &str, command: &str) -> Result<ExecOutput> {
        let child = Command::new("ssh")
            .args(self.args(host, command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .context("spawn ssh")?;

        let output = tokio::time::timeout(self.cfg.command_timeout, child.wait_with_output())
            .await
            .with_context(|| format!("`{command}` on {host} timed out"))?
            .with_context(|| format!("run `{command}` on {host}"))?;

        Ok(ExecOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostFailure {
    pub host: String,
    pub command: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RebootReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<HostFailure>,
}

impl RebootReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for RebootReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Reboot report:")?;
        writeln!(f, "  Succeeded          = {}", self.succeeded.len())?;
        writeln!(f, "  Failed             = {}", self.failed.len())?;
        for fail in &self.failed {
            writeln!(f, "    {} `{}`: {}", fail.host, fail.command, fail.reason)?;
        }
        Ok(())
    }
}

async fn run_command(
    exec: &dyn RemoteExecutor,
    host: &str,
    command: &str,
    final_reboot: bool,
) -> Result<()> {
    let out = exec.exec(host, command).await?;
    if out.success() || (final_reboot && out.code == Some(SSH_CONNECTION_LOST)) {
        return Ok(());
    }
    match out.code {
        Some(code) => bail!("exit code {code}: {}", out.captured()),
        None => bail!("terminated by signal: {}", out.captured()),
    }
}

/// Runs `action` on every host, one host at a time. A failing host is
/// reported and skipped; nothing is retried.
pub async fn run_on_hosts(
    exec: &dyn RemoteExecutor,
    hosts: &[String],
    action: RebootAction,
    service: &str,
) -> RebootReport {
    let commands = action.commands(service);
    let mut report = RebootReport::default();

    'hosts: for entry in hosts {
        // hostfile ports address the admin API, not ssh
        let host = match HostTarget::parse(entry) {
            Ok(target) => target.host,
            Err(e) => {
                warn!(host = %entry, error = %e, "skipping unusable host entry");
                report.failed.push(HostFailure {
                    host: entry.clone(),
                    command: String::new(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let start = Instant::now();
        for (i, command) in commands.iter().enumerate() {
            let final_reboot = action == RebootAction::Reboot && i + 1 == commands.len();
            if let Err(e) = run_command(exec, &host, command, final_reboot).await {
                warn!(%host, %command, error = %e, "remote command failed, skipping host");
                report.failed.push(HostFailure {
                    host: host.clone(),
                    command: command.clone(),
                    reason: format!("{e:#}"),
                });
                continue 'hosts;
            }
        }
        info!(%host, %action, elapsed_ms = start.elapsed().as_millis() as u64, "host done");
        report.succeeded.push(host);
    }

    report
}
