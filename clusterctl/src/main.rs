use clap::{Parser, Subcommand};

use common::telemetry::init_telemetry;

use clusterctl::command::disks::{DisksArgs, disks};
use clusterctl::command::heal::{HealArgs, heal};
use clusterctl::command::health::{HealthArgs, health};
use clusterctl::command::hostfile::{HostfileArgs, hostfile};
use clusterctl::command::info::{InfoArgs, info};
use clusterctl::command::reboot::{RebootArgs, reboot};
use clusterctl::command::sets::{SetsArgs, sets};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
enum Cmd {
    /// Dump the cluster topology as JSON
    Info(InfoArgs),
    /// List erasure sets and their reboot headroom
    Sets(SetsArgs),
    /// List disks per server
    Disks(DisksArgs),
    /// Plan a rolling reboot and write one hostfile per round
    Hostfile(HostfileArgs),
    /// Restart or reboot the hosts of one hostfile
    Reboot(RebootArgs),
    /// Wait until every host of a hostfile is healthy
    Health(HealthArgs),
    /// Heal every erasure set until the cluster is clean
    Heal(HealArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry("clusterctl");

    let args = Args::parse();

    match args.cmd {
        Cmd::Info(info_args) => {
            info(info_args).await?;
        }
        Cmd::Sets(sets_args) => {
            sets(sets_args).await?;
        }
        Cmd::Disks(disks_args) => {
            disks(disks_args).await?;
        }
        Cmd::Hostfile(hostfile_args) => {
            hostfile(hostfile_args).await?;
        }
        Cmd::Reboot(reboot_args) => {
            reboot(reboot_args).await?;
        }
        Cmd::Health(health_args) => {
            health(health_args).await?;
        }
        Cmd::Heal(heal_args) => {
            heal(heal_args).await?;
        }
    }

    Ok(())
}
