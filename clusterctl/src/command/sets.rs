use std::fmt::Write;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;

use crate::command::common::ClusterArgs;
use crate::core::topology::{Disk, ErasureSet, Topology};

#[derive(Parser, Debug, Clone)]
pub struct SetsArgs {
    #[command(flatten)]
    pub cluster: ClusterArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Only list degraded disks, and only sets that have one
    #[arg(long, default_value_t = false)]
    pub bad_sets_only: bool,
}

#[derive(Serialize)]
struct SetListing<'a> {
    pool: usize,
    set: usize,
    can_reboot: bool,
    parity: usize,
    bad_disks: usize,
    servers: Vec<&'a str>,
    disks: Vec<&'a Disk>,
}

fn listings(topo: &Topology, bad_only: bool) -> Vec<SetListing<'_>> {
    topo.sets
        .values()
        .filter_map(|set: &ErasureSet| {
            let disks: Vec<&Disk> = set.disks.values().filter(|d| !bad_only || !d.is_ok()).collect();
            if disks.is_empty() {
                return None;
            }
            Some(SetListing {
                pool: set.id.pool,
                set: set.id.set,
                can_reboot: set.can_reboot,
                parity: set.standard_parity,
                bad_disks: set.bad_disks,
                servers: set.servers().into_iter().collect(),
                disks,
            })
        })
        .collect()
}

pub fn render_sets(topo: &Topology, bad_only: bool, json: bool) -> Result<String> {
    let listings = listings(topo, bad_only);
    if json {
        return Ok(serde_json::to_string_pretty(&listings)?);
    }

    let mut out = String::new();
    for l in &listings {
        writeln!(
            out,
            "Pool({}) SET({}) CanReboot({}) Parity({}) BadDisks({})",
            l.pool, l.set, l.can_reboot, l.parity, l.bad_disks
        )?;
        writeln!(out, "  servers: {}", l.servers.join(", "))?;
        for d in &l.disks {
            writeln!(out, "  {:<40} {:<10} {}", d.endpoint, d.state, d.uuid)?;
        }
    }
    Ok(out)
}

pub async fn sets(args: SetsArgs) -> Result<()> {
    let topo = args.cluster.topology().await?;
    print!("{}", render_sets(&topo, args.bad_sets_only, args.json)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::schemas::{BackendInfo, DiskRecord, StorageInfo};

    fn topo() -> Topology {
        let disk = |set: usize, host: &str, state: &str| DiskRecord {
            endpoint: format!("http://{host}:9000/data{set}"),
            state: state.into(),
            uuid: format!("{host}-{set}"),
            set_index: set,
            ..Default::default()
        };
        Topology::build(&StorageInfo {
            disks: vec![
                disk(0, "a", "ok"),
                disk(0, "b", "ok"),
                disk(1, "a", "ok"),
                disk(1, "b", "faulty"),
            ],
            backend: BackendInfo { standard_sc_parity: 2, rr_sc_parity: 1 },
        })
        .unwrap()
    }

    #[test]
    fn listing_shows_health_header_per_set() {
        let out = render_sets(&topo(), false, false).unwrap();
        assert!(out.contains("Pool(0) SET(0) CanReboot(true) Parity(2) BadDisks(0)"));
        assert!(out.contains("Pool(0) SET(1) CanReboot(false) Parity(2) BadDisks(1)"));
        assert!(out.contains("servers: a, b"));
    }

    #[test]
    fn bad_sets_only_hides_clean_sets_and_disks() {
        let out = render_sets(&topo(), true, false).unwrap();
        assert!(!out.contains("SET(0)"));
        assert!(out.contains("faulty"));
        assert!(!out.contains("http://a:9000/data1"));

        let v: serde_json::Value = serde_json::from_str(&render_sets(&topo(), true, true).unwrap()).unwrap();
        assert_eq!(v.as_array().unwrap().len(), 1);
        assert_eq!(v[0]["set"], 1);
    }
}
