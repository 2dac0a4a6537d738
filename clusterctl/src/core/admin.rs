use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Response};
use time::OffsetDateTime;
use tracing::{debug, info};
use url::Url;

use common::constants::{DEFAULT_REGION, HEAL_PATH, SIGNING_SERVICE, STORAGE_INFO_PATH};
use common::error::ClusterError;
use common::schemas::{HealOpts, HealStartSuccess, HealTaskStatus, StorageInfo};
use common::url_utils::admin_base_url;

use crate::core::sigv4::{Credentials, Signer};
use crate::core::topology::{SetId, Topology};

const DIAL_TIMEOUT: Duration = Duration::from_secs(5);
const KEEPALIVE: Duration = Duration::from_secs(15);
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_IDLE_PER_HOST: usize = 1024;

/// Resolved connection settings for one cluster.
#[derive(Clone, Debug)]
pub struct ClusterConfig {
    pub endpoint: String,
    pub port: Option<u16>,
    pub credentials: Credentials,
    pub secure: bool,
    /// Read the topology from this storage-info dump instead of the live API.
    pub infra_file: Option<PathBuf>,
}

/// HTTP client with bounded dial and idle timeouts. `--secure` clusters are
/// commonly fronted by self-signed certificates, which are accepted.
pub fn http_client(secure: bool, request_timeout: Option<Duration>) -> reqwest::Result<Client> {
    let mut builder = Client::builder()
        .connect_timeout(DIAL_TIMEOUT)
        .tcp_keepalive(KEEPALIVE)
        .pool_idle_timeout(IDLE_TIMEOUT)
        .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
        .no_gzip();
    if let Some(t) = request_timeout {
        builder = builder.timeout(t);
    }
    if secure {
        builder = builder.danger_accept_invalid_certs(true);
    }
    builder.build()
}

/// Supplies the flat disk listing the topology is built from.
#[async_trait]
pub trait TopologySource: Send + Sync {
    async fn storage_info(&self) -> Result<StorageInfo>;
}

/// Heal calls scoped to one erasure set.
#[async_trait]
pub trait HealApi: Send + Sync {
    /// Starts a heal and returns the client token for follow-up calls.
    async fn heal_start(&self, set: SetId) -> Result<String>;
    /// Fetches the next status batch of a started heal.
    async fn heal_status(&self, set: SetId, token: &str) -> Result<HealTaskStatus>;
}

pub async fn load_topology(source: &dyn TopologySource) -> Result<Topology> {
    let info = source.storage_info().await.context("fetch storage info")?;
    let topo = Topology::build(&info).context("build topology")?;
    info!(
        pools = topo.pools.len(),
        servers = topo.total_servers(),
        sets = topo.sets.len(),
        "topology loaded"
    );
    Ok(topo)
}

/// Storage info read from a JSON dump of the admin API response.
pub struct StorageInfoFile {
    pub path: PathBuf,
}

#[async_trait]
impl TopologySource for StorageInfoFile {
    async fn storage_info(&self) -> Result<StorageInfo> {
        info!(path = %self.path.display(), "loading storage info file");
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|source| ClusterError::ReadFile { path: self.path.clone(), source })?;
        let info = serde_json::from_slice(&raw)
            .with_context(|| format!("parse storage info in {}", self.path.display()))?;
        Ok(info)
    }
}

pub struct AdminClient {
    http: Client,
    base: Url,
    signer: Signer,
}

impl AdminClient {
    pub fn new(cfg: &ClusterConfig) -> Result<Self> {
        let base = admin_base_url(&cfg.endpoint, cfg.port, cfg.secure)?;
        // Heal polling relies on the server's own timeouts.
        let http = http_client(cfg.secure, None)?;
        Ok(Self {
            http,
            base,
            signer: Signer::new(cfg.credentials.clone(), DEFAULT_REGION, SIGNING_SERVICE),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .with_context(|| format!("bad admin path {path}"))
    }

    async fn send(&self, method: Method, url: Url, body: Vec<u8>) -> Result<Response> {
        let signed = self
            .signer
            .sign(method.as_str(), &url, &body, OffsetDateTime::now_utc());

        debug!(%method, %url, "admin request");
        let mut req = self
            .http
            .request(method, url)
            .header("x-amz-date", signed.amz_date)
            .header("x-amz-content-sha256", signed.content_sha256)
            .header(AUTHORIZATION, signed.authorization);
        if !body.is_empty() {
            req = req.header(CONTENT_TYPE, "application/json").body(body);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClusterError::AdminStatus { status: status.as_u16(), body }.into());
        }
        Ok(resp)
    }

    async fn heal(&self, set: SetId, token: Option<&str>) -> Result<Response> {
        let mut url = self.url(HEAL_PATH)?;
        {
            let mut q = url.query_pairs_mut();
            if let Some(token) = token {
                q.append_pair("clientToken", token);
            }
            q.append_pair("forceStart", "false");
            q.append_pair("forceStop", "false");
        }
        let body = serde_json::to_vec(&HealOpts::full_scan(set.pool, set.set))?;
        self.send(Method::POST, url, body).await
    }
}

#[async_trait]
impl TopologySource for AdminClient {
    async fn storage_info(&self) -> Result<StorageInfo> {
        let url = self.url(STORAGE_INFO_PATH)?;
        let resp = self.send(Method::GET, url, Vec::new()).await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl HealApi for AdminClient {
    async fn heal_start(&self, set: SetId) -> Result<String> {
        let start: HealStartSuccess = self.heal(set, None).await?.json().await?;
        Ok(start.client_token)
    }

    async fn heal_status(&self, set: SetId, token: &str) -> Result<HealTaskStatus> {
        Ok(self.heal(set, Some(token)).await?.json().await?)
    }
}

/// The live API unless an offline storage-info file was configured.
pub fn topology_source(cfg: &ClusterConfig) -> Result<Box<dyn TopologySource>> {
    match &cfg.infra_file {
        Some(path) => Ok(Box::new(StorageInfoFile { path: path.clone() })),
        None => Ok(Box::new(AdminClient::new(cfg)?)),
    }
}
