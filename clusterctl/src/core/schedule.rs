//! Rolling-reboot planning.
//!
//! Servers are packed into rounds so that rebooting one round never takes a
//! second server of the same erasure set offline. Servers hosting a set that
//! has no reboot headroom left go to the failure list and are never scheduled.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{info, warn};

use crate::core::topology::{SetId, Topology};

pub const DEFAULT_MAX_ROUNDS: usize = 200;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    pub max_rounds: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_rounds: DEFAULT_MAX_ROUNDS }
    }
}

/// Scheduler view of one server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub pool: usize,
    pub endpoint: String,
    pub sets: BTreeSet<SetId>,
    pub can_reboot: bool,
    pub processed: bool,
}

impl Candidate {
    pub fn new(pool: usize, endpoint: impl Into<String>, sets: BTreeSet<SetId>, can_reboot: bool) -> Self {
        Self {
            pool,
            endpoint: endpoint.into(),
            sets,
            can_reboot,
            processed: false,
        }
    }

    fn conflicts_with(&self, other: &Candidate) -> bool {
        !self.sets.is_disjoint(&other.sets)
    }
}

pub fn candidates_from_topology(topo: &Topology) -> Vec<Candidate> {
    topo.servers()
        .map(|s| Candidate::new(s.pool, s.endpoint.clone(), s.sets.clone(), topo.server_can_reboot(s)))
        .collect()
}

/// One batch of servers that may go down together, grouped by pool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Round {
    pub pools: BTreeMap<usize, Vec<String>>,
}

impl Round {
    pub fn is_empty(&self) -> bool {
        self.pools.values().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.pools.values().map(Vec::len).sum()
    }

    /// Endpoints in artifact order: pools ascending, endpoints ascending.
    pub fn endpoints(&self) -> Vec<String> {
        self.pools.values().flatten().cloned().collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RolloutPlan {
    pub rounds: Vec<Round>,
    pub failures: Vec<String>,
    pub unscheduled: Vec<String>,
    pub total: usize,
    pub scheduled: usize,
    pub horizon_exhausted: bool,
}

impl RolloutPlan {
    pub fn is_complete(&self) -> bool {
        !self.horizon_exhausted && self.scheduled + self.failures.len() == self.total
    }
}

impl fmt::Display for RolloutPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rollout plan:")?;
        writeln!(f, "  Total servers      = {}", self.total)?;
        writeln!(f, "  Scheduled          = {}", self.scheduled)?;
        writeln!(f, "  Rounds             = {}", self.rounds.len())?;
        writeln!(f, "  Not rebootable     = {}", self.failures.len())?;
        if self.horizon_exhausted {
            writeln!(f, "  Unscheduled        = {:?}", self.unscheduled)?;
        }
        Ok(())
    }
}

pub struct Scheduler {
    cfg: SchedulerConfig,
}

impl Scheduler {
    pub fn new(cfg: SchedulerConfig) -> Self {
        Self { cfg }
    }

    pub fn plan_topology(&self, topo: &Topology) -> RolloutPlan {
        self.plan(candidates_from_topology(topo))
    }

    pub fn plan(&self, candidates: Vec<Candidate>) -> RolloutPlan {
        let total = candidates.len();

        let mut pools: BTreeMap<usize, Vec<Candidate>> = BTreeMap::new();
        for c in candidates {
            pools.entry(c.pool).or_default().push(c);
        }
        for servers in pools.values_mut() {
            servers.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        }

        // Servers with a degraded set are out before the first round.
        let mut failures = Vec::new();
        for servers in pools.values() {
            for s in servers.iter().filter(|s| !s.can_reboot) {
                failures.push(s.endpoint.clone());
            }
        }
        let eligible = total - failures.len();

        let mut rounds: Vec<Round> = Vec::new();
        let mut scheduled = 0usize;

        while scheduled < eligible && rounds.len() < self.cfg.max_rounds {
            let mut round = Round::default();

            for (pool_id, servers) in pools.iter_mut() {
                let sole = servers.len() == 1;
                let mut placed: Vec<usize> = Vec::new();

                for i in 0..servers.len() {
                    let s = &servers[i];
                    if s.processed || !s.can_reboot {
                        continue;
                    }
                    if !sole && placed.iter().any(|&j| servers[j].conflicts_with(s)) {
                        continue;
                    }
                    placed.push(i);
                }

                if placed.is_empty() {
                    continue;
                }
                let members = round.pools.entry(*pool_id).or_default();
                for i in placed {
                    servers[i].processed = true;
                    members.push(servers[i].endpoint.clone());
                    scheduled += 1;
                }
            }

            if round.is_empty() {
                break;
            }
            rounds.push(round);
        }

        let horizon_exhausted = scheduled < eligible;
        let unscheduled: Vec<String> = pools
            .values()
            .flatten()
            .filter(|s| s.can_reboot && !s.processed)
            .map(|s| s.endpoint.clone())
            .collect();

        if horizon_exhausted {
            warn!(
                total,
                scheduled,
                max_rounds = self.cfg.max_rounds,
                "round horizon exhausted with servers left unscheduled"
            );
        } else {
            info!(total, online = scheduled, rounds = rounds.len(), "rollout planned");
        }

        RolloutPlan {
            rounds,
            failures,
            unscheduled,
            total,
            scheduled,
            horizon_exhausted,
        }
    }
}
