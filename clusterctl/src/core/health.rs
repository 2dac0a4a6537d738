use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::{StreamExt, stream};
use reqwest::{Client, StatusCode};
use tokio::sync::watch;
use tracing::{debug, info};

use common::constants::HEALTH_CLUSTER_PATH;
use common::url_utils::HostTarget;

use crate::core::admin::http_client;
use crate::core::shutdown::wait_for_shutdown;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_CONCURRENT_PROBES: usize = 32;

#[derive(Clone, Copy, Debug)]
pub struct HealthConfig {
    pub interval: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { interval: DEFAULT_SWEEP_INTERVAL }
    }
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// True when `host` reports itself healthy.
    async fn is_healthy(&self, host: &str) -> bool;
}

/// Probes the cluster health endpoint with maintenance semantics.
pub struct HttpHealthProbe {
    http: Client,
    port: Option<u16>,
    secure: bool,
}

impl HttpHealthProbe {
    pub fn new(port: Option<u16>, secure: bool) -> Result<Self> {
        Ok(Self {
            http: http_client(secure, Some(PROBE_TIMEOUT))?,
            port,
            secure,
        })
    }

    pub fn url_for(&self, host: &str) -> Result<String> {
        let target = HostTarget::parse(host)?;
        Ok(format!(
            "{}{HEALTH_CLUSTER_PATH}?maintenance=true",
            target.base_url(self.port, self.secure)
        ))
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn is_healthy(&self, host: &str) -> bool {
        let url = match self.url_for(host) {
            Ok(url) => url,
            Err(e) => {
                debug!(%host, error = %e, "unusable host entry");
                return false;
            }
        };
        match self.http.get(&url).send().await {
            Ok(resp) => resp.status() == StatusCode::OK,
            Err(e) => {
                debug!(%host, error = %e, "health probe failed");
                false
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HealthReport {
    pub healthy: Vec<String>,
    pub unhealthy: Vec<String>,
    pub sweeps: u64,
}

impl HealthReport {
    pub fn all_healthy(&self) -> bool {
        self.unhealthy.is_empty()
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Health report:")?;
        writeln!(f, "  Sweeps             = {}", self.sweeps)?;
        writeln!(f, "  Healthy            = {}", self.healthy.len())?;
        writeln!(f, "  Unhealthy          = {}", self.unhealthy.len())?;
        for host in &self.unhealthy {
            writeln!(f, "    {host}")?;
        }
        Ok(())
    }
}

/// Sweeps `hosts` until every one of them answered healthy once, or until
/// `shutdown` fires. Healthy hosts are not probed again.
pub async fn wait_until_healthy(
    probe: &dyn HealthProbe,
    hosts: &[String],
    cfg: HealthConfig,
    mut shutdown: watch::Receiver<bool>,
) -> HealthReport {
    let mut pending: BTreeSet<String> = hosts.iter().cloned().collect();
    let mut healthy: BTreeSet<String> = BTreeSet::new();
    let mut sweeps = 0u64;

    loop {
        let results: Vec<(String, bool)> = stream::iter(pending.iter().cloned())
            .map(|host| async move {
                let ok = probe.is_healthy(&host).await;
                (host, ok)
            })
            .buffer_unordered(MAX_CONCURRENT_PROBES)
            .collect()
            .await;
        sweeps += 1;

        for (host, ok) in results {
            if ok {
                pending.remove(&host);
                healthy.insert(host);
            }
        }
        info!(sweep = sweeps, unhealthy = pending.len(), healthy = healthy.len(), "health sweep");

        if pending.is_empty() {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(cfg.interval) => {},
            _ = wait_for_shutdown(&mut shutdown) => {
                info!("health sweep interrupted");
                break;
            }
        }
    }

    HealthReport {
        healthy: healthy.into_iter().collect(),
        unhealthy: pending.into_iter().collect(),
        sweeps,
    }
}
