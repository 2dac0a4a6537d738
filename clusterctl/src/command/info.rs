use std::collections::BTreeMap;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;

use crate::command::common::ClusterArgs;
use crate::core::topology::{Disk, Topology};

#[derive(Parser, Debug, Clone)]
pub struct InfoArgs {
    #[command(flatten)]
    pub cluster: ClusterArgs,
}

#[derive(Serialize)]
struct PoolView<'a> {
    servers: BTreeMap<&'a str, ServerView<'a>>,
}

#[derive(Serialize)]
struct ServerView<'a> {
    can_reboot: bool,
    sets: BTreeMap<String, SetView<'a>>,
}

#[derive(Serialize)]
struct SetView<'a> {
    standard_parity: usize,
    rr_parity: usize,
    bad_disks: usize,
    can_reboot: bool,
    /// Only the disks this server holds.
    disks: Vec<&'a Disk>,
}

/// Pools → servers → sets → disks as pretty JSON.
pub fn render_info(topo: &Topology) -> Result<String> {
    let mut pools: BTreeMap<usize, PoolView> = BTreeMap::new();

    for (pool_id, pool) in &topo.pools {
        let mut servers = BTreeMap::new();
        for (endpoint, server) in &pool.servers {
            let mut sets = BTreeMap::new();
            for id in &server.sets {
                let Some(set) = topo.sets.get(id) else { continue };
                sets.insert(
                    id.to_string(),
                    SetView {
                        standard_parity: set.standard_parity,
                        rr_parity: set.rr_parity,
                        bad_disks: set.bad_disks,
                        can_reboot: set.can_reboot,
                        disks: set.disks.values().filter(|d| &d.server == endpoint).collect(),
                    },
                );
            }
            servers.insert(
                endpoint.as_str(),
                ServerView { can_reboot: topo.server_can_reboot(server), sets },
            );
        }
        pools.insert(*pool_id, PoolView { servers });
    }

    Ok(serde_json::to_string_pretty(&pools)?)
}

pub async fn info(args: InfoArgs) -> Result<()> {
    let topo = args.cluster.topology().await?;
    println!("{}", render_info(&topo)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::schemas::{BackendInfo, DiskRecord, StorageInfo};

    #[test]
    fn info_nests_disks_under_their_server() {
        let disk = |host: &str, state: &str| DiskRecord {
            endpoint: format!("http://{host}:9000/data1"),
            state: state.into(),
            uuid: format!("{host}-1"),
            pool_index: 0,
            set_index: 2,
            ..Default::default()
        };
        let topo = Topology::build(&StorageInfo {
            disks: vec![disk("a", "ok"), disk("b", "offline")],
            backend: BackendInfo { standard_sc_parity: 4, rr_sc_parity: 2 },
        })
        .unwrap();

        let v: serde_json::Value = serde_json::from_str(&render_info(&topo).unwrap()).unwrap();
        let set = &v["0"]["servers"]["b"]["sets"]["0/2"];
        assert_eq!(set["bad_disks"], 1);
        assert_eq!(set["can_reboot"], true);
        assert_eq!(set["disks"].as_array().unwrap().len(), 1);
        assert_eq!(set["disks"][0]["state"], "offline");
        assert_eq!(v["0"]["servers"]["a"]["can_reboot"], true);
    }
}
