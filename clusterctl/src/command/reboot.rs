use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;

use common::file_utils::read_hostfile;

use crate::core::remote::{
    DEFAULT_SERVICE, DEFAULT_SSH_PORT, DEFAULT_SSH_USER, RebootAction, SSH_CONNECT_TIMEOUT,
    SshConfig, SshExecutor, run_on_hosts,
};

#[derive(Parser, Debug, Clone)]
pub struct RebootArgs {
    /// Newline-delimited hosts, typically a `round-<k>` file
    #[arg(long)]
    pub hostfile: PathBuf,

    /// Only check connectivity
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub dry_run: bool,

    /// Restart the service instead of rebooting the host
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub service_only: bool,

    #[arg(long, default_value = DEFAULT_SERVICE)]
    pub service: String,

    #[arg(long, default_value = DEFAULT_SSH_USER)]
    pub ssh_user: String,

    #[arg(long, default_value_t = DEFAULT_SSH_PORT)]
    pub ssh_port: u16,

    #[arg(long, value_parser = humantime::parse_duration, default_value = "5m")]
    pub command_timeout: Duration,
}

pub async fn reboot(args: RebootArgs) -> Result<()> {
    let hosts = read_hostfile(&args.hostfile)
        .await
        .with_context(|| format!("load hosts from {}", args.hostfile.display()))?;
    let action = RebootAction::from_flags(args.dry_run, args.service_only);
    info!(hosts = hosts.len(), %action, service = %args.service, "running remote action");

    let ssh = SshExecutor::new(SshConfig {
        user: args.ssh_user,
        port: args.ssh_port,
        connect_timeout: SSH_CONNECT_TIMEOUT,
        command_timeout: args.command_timeout,
    });
    let report = run_on_hosts(&ssh, &hosts, action, &args.service).await;
    info!("{}", report);

    if !report.all_succeeded() {
        bail!("{} of {} hosts failed", report.failed.len(), hosts.len());
    }
    Ok(())
}
