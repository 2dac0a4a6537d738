use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::info;

use crate::command::common::ClusterArgs;
use crate::core::admin::AdminClient;
use crate::core::heal::{HealConfig, HealOrchestrator};
use crate::core::shutdown::ctrl_c_shutdown;

#[derive(Parser, Debug, Clone)]
pub struct HealArgs {
    #[command(flatten)]
    pub cluster: ClusterArgs,

    /// Poll interval of every heal monitor and of the aggregator
    #[arg(long, value_parser = humantime::parse_duration, default_value = "2s")]
    pub interval: Duration,
}

pub async fn heal(args: HealArgs) -> Result<()> {
    let topo = args.cluster.topology().await?;
    let api = Arc::new(AdminClient::new(&args.cluster.config())?);
    info!(sets = topo.sets.len(), admin = %api.base_url(), "healing every erasure set");

    let orchestrator = HealOrchestrator::new(api, HealConfig { interval: args.interval });
    let report = orchestrator.run(topo.sets.keys().copied(), ctrl_c_shutdown()).await;
    info!("{}", report);

    if !report.converged {
        bail!("heal stopped with {} invalid drives outstanding", report.total_invalid());
    }
    Ok(())
}
