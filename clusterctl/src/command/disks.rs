use std::fmt::Write;

use anyhow::Result;
use clap::Parser;

use crate::command::common::ClusterArgs;
use crate::core::topology::Topology;

#[derive(Parser, Debug, Clone)]
pub struct DisksArgs {
    #[command(flatten)]
    pub cluster: ClusterArgs,

    #[arg(long, default_value_t = false)]
    pub bad_disks_only: bool,
}

/// Per-server `PATH SET STATE` table.
pub fn render_disks(topo: &Topology, bad_only: bool) -> Result<String> {
    let mut out = String::new();
    for server in topo.servers() {
        let disks: Vec<_> = topo
            .disks_of(server)
            .into_iter()
            .filter(|d| !bad_only || !d.is_ok())
            .collect();
        if disks.is_empty() {
            continue;
        }
        writeln!(out, "Pool({}) {}", server.pool, server.endpoint)?;
        writeln!(out, "  {:<32} {:<6} STATE", "PATH", "SET")?;
        for d in disks {
            writeln!(out, "  {:<32} {:<6} {}", d.path, d.set, d.state)?;
        }
    }
    Ok(out)
}

pub async fn disks(args: DisksArgs) -> Result<()> {
    let topo = args.cluster.topology().await?;
    print!("{}", render_disks(&topo, args.bad_disks_only)?);
    Ok(())
}
