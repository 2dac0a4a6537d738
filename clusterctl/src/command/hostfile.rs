use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;

use common::file_utils::{failure_path, reset_dir, round_path, write_lines};

use crate::command::common::ClusterArgs;
use crate::core::schedule::{DEFAULT_MAX_ROUNDS, RolloutPlan, Scheduler, SchedulerConfig};

#[derive(Parser, Debug, Clone)]
pub struct HostfileArgs {
    #[command(flatten)]
    pub cluster: ClusterArgs,

    /// Output folder, wiped and recreated on every run
    #[arg(long, default_value = "./cluster-hostfiles")]
    pub folder: PathBuf,

    #[arg(long, default_value_t = DEFAULT_MAX_ROUNDS)]
    pub max_rounds: usize,
}

/// Writes `failure` (always) and one `round-<k>` file per non-empty round.
pub async fn write_plan(folder: &Path, plan: &RolloutPlan) -> Result<Vec<PathBuf>> {
    reset_dir(folder).await?;

    let failure = failure_path(folder);
    write_lines(&failure, &plan.failures).await?;
    let mut written = vec![failure];

    for (k, round) in plan.rounds.iter().filter(|r| !r.is_empty()).enumerate() {
        let path = round_path(folder, k);
        write_lines(&path, &round.endpoints()).await?;
        written.push(path);
    }
    Ok(written)
}

pub async fn hostfile(args: HostfileArgs) -> Result<()> {
    let topo = args.cluster.topology().await?;
    let plan = Scheduler::new(SchedulerConfig { max_rounds: args.max_rounds }).plan_topology(&topo);

    let written = write_plan(&args.folder, &plan)
        .await
        .with_context(|| format!("write hostfiles to {}", args.folder.display()))?;
    info!(folder = %args.folder.display(), files = written.len(), "hostfiles written");
    info!("{}", plan);

    if plan.horizon_exhausted {
        bail!(
            "{} servers left unscheduled after {} rounds",
            plan.unscheduled.len(),
            args.max_rounds
        );
    }
    Ok(())
}
