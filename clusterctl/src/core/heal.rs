//! Heal convergence: one monitor task per erasure set, a shared progress map,
//! and an aggregator that decides when the whole cluster is clean.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use common::constants::HEAL_SUMMARY_FINISHED;
use common::schemas::HealTaskStatus;

use crate::core::admin::HealApi;
use crate::core::shutdown::wait_for_shutdown;
use crate::core::topology::SetId;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Count a unit starts with before its first status batch arrives.
const REGISTERED_INVALID: usize = 1;

#[derive(Clone, Copy, Debug)]
pub struct HealConfig {
    pub interval: Duration,
}

impl Default for HealConfig {
    fn default() -> Self {
        Self { interval: DEFAULT_POLL_INTERVAL }
    }
}

/// One status batch reduced to what convergence needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HealBatch {
    pub items: usize,
    pub invalid: usize,
    pub finished: bool,
}

impl HealBatch {
    pub fn from_status(status: &HealTaskStatus) -> Self {
        Self {
            items: status.items.len(),
            invalid: status.items.iter().map(|i| i.invalid_after()).sum(),
            finished: status.summary == HEAL_SUMMARY_FINISHED,
        }
    }

    pub fn converged(&self) -> bool {
        self.finished && self.invalid == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnitStatus {
    Running,
    Converged,
    /// The heal call failed; the count stays at its last known value.
    Failed(String),
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitProgress {
    pub invalid: usize,
    pub polls: u64,
    pub status: UnitStatus,
}

/// Latest progress per heal unit behind a single coarse lock.
///
/// Lock discipline: the guard is taken only for an in-memory read or write of
/// the map and is never held across an `.await`.
#[derive(Clone, Default)]
pub struct HealProgress {
    inner: Arc<Mutex<BTreeMap<SetId, UnitProgress>>>,
}

impl HealProgress {
    fn lock(&self) -> MutexGuard<'_, BTreeMap<SetId, UnitProgress>> {
        // a panicking monitor cannot leave a half-written entry behind
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(&self, id: SetId) {
        self.lock().insert(
            id,
            UnitProgress {
                invalid: REGISTERED_INVALID,
                polls: 0,
                status: UnitStatus::Running,
            },
        );
    }

    pub fn record(&self, id: SetId, invalid: usize) {
        if let Some(p) = self.lock().get_mut(&id) {
            p.invalid = invalid;
            p.polls += 1;
        }
    }

    pub fn finish(&self, id: SetId, status: UnitStatus) {
        if let Some(p) = self.lock().get_mut(&id) {
            p.status = status;
        }
    }

    pub fn snapshot(&self) -> BTreeMap<SetId, UnitProgress> {
        self.lock().clone()
    }
}

/// Result a monitor hands back to the aggregator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitOutcome {
    pub id: SetId,
    pub status: UnitStatus,
}

/// Drives one set to convergence. Errors end the monitor; they are recorded
/// in `progress` and returned, never propagated.
pub async fn monitor_unit<A>(
    api: Arc<A>,
    id: SetId,
    interval: Duration,
    progress: HealProgress,
    mut shutdown: watch::Receiver<bool>,
) -> UnitOutcome
where
    A: HealApi + ?Sized,
{
    let finish = |status: UnitStatus| {
        progress.finish(id, status.clone());
        UnitOutcome { id, status }
    };

    // The admin client has no request timeout; calls race the shutdown signal.
    let started = tokio::select! {
        res = api.heal_start(id) => res,
        _ = wait_for_shutdown(&mut shutdown) => return finish(UnitStatus::Stopped),
    };
    let token = match started {
        Ok(token) => token,
        Err(e) => {
            warn!(set = %id, error = %e, "heal start failed");
            return finish(UnitStatus::Failed(format!("{e:#}")));
        }
    };
    info!(set = %id, "heal started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {},
            _ = wait_for_shutdown(&mut shutdown) => {
                return finish(UnitStatus::Stopped);
            }
        }

        let polled = tokio::select! {
            res = api.heal_status(id, &token) => res,
            _ = wait_for_shutdown(&mut shutdown) => return finish(UnitStatus::Stopped),
        };
        let status = match polled {
            Ok(status) => status,
            Err(e) => {
                warn!(set = %id, error = %e, "heal status failed, monitor stopped");
                return finish(UnitStatus::Failed(format!("{e:#}")));
            }
        };

        let batch = HealBatch::from_status(&status);
        debug!(set = %id, items = batch.items, invalid = batch.invalid, finished = batch.finished, "heal batch");
        progress.record(id, batch.invalid);

        if batch.converged() {
            info!(set = %id, "heal converged");
            return finish(UnitStatus::Converged);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealReport {
    pub converged: bool,
    pub units: BTreeMap<SetId, UnitProgress>,
}

impl HealReport {
    pub fn total_invalid(&self) -> usize {
        self.units.values().map(|p| p.invalid).sum()
    }
}

impl fmt::Display for HealReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Heal report:")?;
        writeln!(f, "  Converged          = {}", self.converged)?;
        writeln!(f, "  Outstanding        = {}", self.total_invalid())?;
        for (id, p) in &self.units {
            writeln!(f, "  Set {:<8} invalid={:<6} status={:?}", id.to_string(), p.invalid, p.status)?;
        }
        Ok(())
    }
}

pub struct HealOrchestrator<A: ?Sized> {
    api: Arc<A>,
    cfg: HealConfig,
    progress: HealProgress,
}

impl<A> HealOrchestrator<A>
where
    A: HealApi + ?Sized + 'static,
{
    pub fn new(api: Arc<A>, cfg: HealConfig) -> Self {
        Self {
            api,
            cfg,
            progress: HealProgress::default(),
        }
    }

    pub fn progress(&self) -> HealProgress {
        self.progress.clone()
    }

    /// Heals every unit until all of them converged or `shutdown` fires.
    pub async fn run(
        &self,
        units: impl IntoIterator<Item = SetId>,
        mut shutdown: watch::Receiver<bool>,
    ) -> HealReport {
        let units: BTreeSet<SetId> = units.into_iter().collect();

        let mut tasks = JoinSet::new();
        let mut task_units = HashMap::new();
        for id in units {
            self.progress.register(id);
            let handle = tasks.spawn(monitor_unit(
                Arc::clone(&self.api),
                id,
                self.cfg.interval,
                self.progress.clone(),
                shutdown.clone(),
            ));
            task_units.insert(handle.id(), id);
        }

        let converged = loop {
            tokio::select! {
                _ = tokio::time::sleep(self.cfg.interval) => {},
                _ = wait_for_shutdown(&mut shutdown) => {
                    info!("heal interrupted");
                    break false;
                }
            }

            while let Some(joined) = tasks.try_join_next() {
                self.collect(joined, &task_units);
            }

            let snapshot = self.progress.snapshot();
            let outstanding: usize = snapshot.values().map(|p| p.invalid).sum();
            for (id, p) in &snapshot {
                info!(set = %id, invalid = p.invalid, status = ?p.status, "heal progress");
            }
            info!(outstanding, units = snapshot.len(), "heal sweep");

            if outstanding == 0 && snapshot.values().all(|p| p.status == UnitStatus::Converged) {
                info!("all sets healed");
                break true;
            }
        };

        while let Some(joined) = tasks.join_next().await {
            self.collect(joined, &task_units);
        }

        HealReport {
            converged,
            units: self.progress.snapshot(),
        }
    }

    fn collect(
        &self,
        joined: Result<UnitOutcome, tokio::task::JoinError>,
        task_units: &HashMap<tokio::task::Id, SetId>,
    ) {
        match joined {
            Ok(outcome) => {
                if let UnitStatus::Failed(reason) = &outcome.status {
                    warn!(set = %outcome.id, %reason, "heal unit frozen at last count");
                }
            }
            Err(e) => {
                let Some(id) = task_units.get(&e.id()).copied() else {
                    error!(error = %e, "unknown heal task failed");
                    return;
                };
                error!(set = %id, error = %e, "heal monitor crashed");
                self.progress.finish(id, UnitStatus::Failed(e.to_string()));
            }
        }
    }
}
