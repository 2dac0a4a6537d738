use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;

use common::file_utils::read_hostfile;

use crate::core::health::{HealthConfig, HttpHealthProbe, wait_until_healthy};
use crate::core::shutdown::ctrl_c_shutdown;

#[derive(Parser, Debug, Clone)]
pub struct HealthArgs {
    #[arg(long)]
    pub hostfile: PathBuf,

    /// Port for entries that do not carry one
    #[arg(long, env = "CLUSTERCTL_PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "CLUSTERCTL_SECURE", default_value_t = false)]
    pub secure: bool,

    #[arg(long, value_parser = humantime::parse_duration, default_value = "30s")]
    pub interval: Duration,
}

pub async fn health(args: HealthArgs) -> Result<()> {
    let hosts = read_hostfile(&args.hostfile)
        .await
        .with_context(|| format!("load hosts from {}", args.hostfile.display()))?;
    info!(hosts = hosts.len(), interval = ?args.interval, "waiting for hosts to report healthy");

    let probe = HttpHealthProbe::new(args.port, args.secure)?;
    let report = wait_until_healthy(
        &probe,
        &hosts,
        HealthConfig { interval: args.interval },
        ctrl_c_shutdown(),
    )
    .await;
    info!("{}", report);

    if !report.all_healthy() {
        bail!("{} hosts still unhealthy", report.unhealthy.len());
    }
    Ok(())
}
