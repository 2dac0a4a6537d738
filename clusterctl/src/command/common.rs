use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::core::admin::{ClusterConfig, load_topology, topology_source};
use crate::core::sigv4::Credentials;
use crate::core::topology::Topology;

/// Connection flags shared by every command that talks to the cluster.
#[derive(Args, Debug, Clone)]
pub struct ClusterArgs {
    /// Cluster endpoint: a hostname or a full URL
    #[arg(long, env = "CLUSTERCTL_ENDPOINT", default_value = "127.0.0.1")]
    pub endpoint: String,

    #[arg(long, env = "CLUSTERCTL_PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "CLUSTERCTL_ACCESS_KEY", default_value = "minioadmin")]
    pub key: String,

    #[arg(long, env = "CLUSTERCTL_SECRET_KEY", default_value = "minioadmin", hide_env_values = true)]
    pub secret: String,

    /// Use https and accept self-signed certificates
    #[arg(long, env = "CLUSTERCTL_SECURE", default_value_t = false)]
    pub secure: bool,

    /// Storage-info JSON dump to use instead of the live admin API
    #[arg(long, env = "INFRA_FILE_REPLACEMENT")]
    pub infra_file: Option<PathBuf>,
}

impl ClusterArgs {
    pub fn config(&self) -> ClusterConfig {
        ClusterConfig {
            endpoint: self.endpoint.clone(),
            port: self.port,
            credentials: Credentials {
                access_key: self.key.clone(),
                secret_key: self.secret.clone(),
            },
            secure: self.secure,
            infra_file: self.infra_file.clone(),
        }
    }

    pub async fn topology(&self) -> Result<Topology> {
        let source = topology_source(&self.config())?;
        load_topology(source.as_ref()).await
    }
}
