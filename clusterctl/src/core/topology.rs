use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use common::constants::DISK_STATE_OK;
use common::error::ClusterError;
use common::schemas::{BackendInfo, DiskRecord, StorageInfo};
use common::url_utils::split_endpoint;

#[derive(thiserror::Error, Debug)]
pub enum TopologyError {
    #[error("disk {uuid} has an unusable endpoint")]
    Endpoint {
        uuid: String,
        #[source]
        source: ClusterError,
    },
    #[error("storage info lists no disks")]
    Empty,
}

/// Identity of one logical erasure set, as indexed by the admin API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SetId {
    pub pool: usize,
    pub set: usize,
}

impl SetId {
    pub fn new(pool: usize, set: usize) -> Self {
        Self { pool, set }
    }
}

impl fmt::Display for SetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pool, self.set)
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Disk {
    pub uuid: String,
    pub index: usize,
    pub pool: usize,
    pub set: usize,
    /// Hostname of the owning server.
    pub server: String,
    pub endpoint: String,
    pub path: String,
    pub state: String,
}

impl Disk {
    pub fn is_ok(&self) -> bool {
        self.state == DISK_STATE_OK
    }
}

/// A set may be rebooted into a one-node-down state only while it keeps
/// strictly more than one unit of parity in reserve.
pub fn can_reboot(bad_disks: usize, parity: usize) -> bool {
    // bad_disks < parity - 1, without underflow on parity 0
    bad_disks + 1 < parity
}

/// The single logical copy of an erasure set. Servers refer to it by `SetId`,
/// so every server sees the same `bad_disks` and `can_reboot`.
#[derive(Clone, Debug, Serialize)]
pub struct ErasureSet {
    pub id: SetId,
    pub standard_parity: usize,
    pub rr_parity: usize,
    pub bad_disks: usize,
    pub can_reboot: bool,
    /// Disks keyed by endpoint URL.
    pub disks: BTreeMap<String, Disk>,
}

impl ErasureSet {
    fn new(id: SetId, backend: &BackendInfo) -> Self {
        Self {
            id,
            standard_parity: backend.standard_sc_parity,
            rr_parity: backend.rr_sc_parity,
            bad_disks: 0,
            can_reboot: false,
            disks: BTreeMap::new(),
        }
    }

    fn apply_health(&mut self, bad_disks: usize) {
        self.bad_disks = bad_disks;
        self.can_reboot = can_reboot(bad_disks, self.standard_parity);
    }

    /// Hostnames holding at least one disk of this set.
    pub fn servers(&self) -> BTreeSet<&str> {
        self.disks.values().map(|d| d.server.as_str()).collect()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Server {
    pub endpoint: String,
    pub pool: usize,
    pub sets: BTreeSet<SetId>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Pool {
    pub id: usize,
    pub servers: BTreeMap<String, Server>,
}

/// Pool → Server → Set → Disk, rebuilt from scratch on every invocation.
#[derive(Clone, Debug, Default)]
pub struct Topology {
    pub pools: BTreeMap<usize, Pool>,
    pub sets: BTreeMap<SetId, ErasureSet>,
}

impl Topology {
    pub fn build(info: &StorageInfo) -> Result<Self, TopologyError> {
        if info.disks.is_empty() {
            return Err(TopologyError::Empty);
        }

        let mut topo = Topology::default();
        let mut bad: HashMap<SetId, usize> = HashMap::new();
        let mut owner: HashMap<String, SetId> = HashMap::new();

        // Pass 1: place every disk and count the bad ones per logical set.
        for rec in &info.disks {
            let disk = disk_from_record(rec)?;
            let id = SetId::new(rec.pool_index, rec.set_index);

            topo.pools
                .entry(id.pool)
                .or_insert_with(|| Pool { id: id.pool, servers: BTreeMap::new() })
                .servers
                .entry(disk.server.clone())
                .or_insert_with(|| Server {
                    endpoint: disk.server.clone(),
                    pool: id.pool,
                    sets: BTreeSet::new(),
                });

            // A repeated endpoint replaces the earlier record, wherever it was.
            if let Some(prev_id) = owner.insert(disk.endpoint.clone(), id)
                && let Some(prev) = topo
                    .sets
                    .get_mut(&prev_id)
                    .and_then(|s| s.disks.remove(&disk.endpoint))
                && !prev.is_ok()
                && let Some(n) = bad.get_mut(&prev_id)
            {
                *n -= 1;
            }

            if !disk.is_ok() {
                *bad.entry(id).or_default() += 1;
            }
            topo.sets
                .entry(id)
                .or_insert_with(|| ErasureSet::new(id, &info.backend))
                .disks
                .insert(disk.endpoint.clone(), disk);
        }

        // A record moved to another set or pool may leave its old set empty.
        topo.sets.retain(|_, set| !set.disks.is_empty());

        // Pass 2: derive health once per logical set and link it to its servers.
        for (id, set) in topo.sets.iter_mut() {
            set.apply_health(bad.get(id).copied().unwrap_or(0));
            if let Some(pool) = topo.pools.get_mut(&id.pool) {
                for host in set.servers() {
                    if let Some(server) = pool.servers.get_mut(host) {
                        server.sets.insert(*id);
                    }
                }
            }
        }

        // Servers whose every disk was re-reported elsewhere are gone.
        for pool in topo.pools.values_mut() {
            pool.servers.retain(|_, server| !server.sets.is_empty());
        }
        topo.pools.retain(|_, pool| !pool.servers.is_empty());

        Ok(topo)
    }

    pub fn server_can_reboot(&self, server: &Server) -> bool {
        server
            .sets
            .iter()
            .all(|id| self.sets.get(id).is_some_and(|s| s.can_reboot))
    }

    pub fn servers(&self) -> impl Iterator<Item = &Server> {
        self.pools.values().flat_map(|p| p.servers.values())
    }

    pub fn total_servers(&self) -> usize {
        self.pools.values().map(|p| p.servers.len()).sum()
    }

    /// Disks of `server` across all of its sets, ordered by set then path.
    pub fn disks_of(&self, server: &Server) -> Vec<&Disk> {
        let mut disks: Vec<&Disk> = server
            .sets
            .iter()
            .filter_map(|id| self.sets.get(id))
            .flat_map(|s| s.disks.values())
            .filter(|d| d.server == server.endpoint)
            .collect();
        disks.sort_by(|a, b| (a.set, &a.path).cmp(&(b.set, &b.path)));
        disks
    }
}

fn disk_from_record(rec: &DiskRecord) -> Result<Disk, TopologyError> {
    let (server, url_path) = split_endpoint(&rec.endpoint).map_err(|source| TopologyError::Endpoint {
        uuid: rec.uuid.clone(),
        source,
    })?;
    let path = if rec.drive_path.is_empty() {
        url_path
    } else {
        rec.drive_path.clone()
    };

    Ok(Disk {
        uuid: rec.uuid.clone(),
        index: rec.disk_index,
        pool: rec.pool_index,
        set: rec.set_index,
        server,
        endpoint: rec.endpoint.clone(),
        path,
        state: rec.state.clone(),
    })
}
