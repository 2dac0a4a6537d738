use std::fmt;

use url::Url;

use crate::error::ClusterError;

/// Hostname and path component of a drive endpoint such as `http://node1:9000/mnt/disk1`.
pub fn split_endpoint(endpoint: &str) -> Result<(String, String), ClusterError> {
    let url = Url::parse(endpoint).map_err(|e| ClusterError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;
    let host = url
        .host_str()
        .ok_or_else(|| ClusterError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: "missing host".to_string(),
        })?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    Ok((host, url.path().to_string()))
}

/// Base URL of the admin API: either a full URL or a bare host plus port.
pub fn admin_base_url(endpoint: &str, port: Option<u16>, secure: bool) -> Result<Url, ClusterError> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(ClusterError::EmptyHost);
    }

    let raw = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        let target = HostTarget::parse(endpoint)?;
        target.base_url(port, secure)
    };

    let mut url = Url::parse(&raw).map_err(|e| ClusterError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;
    if url.port().is_none()
        && let Some(p) = port
    {
        url.set_port(Some(p)).map_err(|_| ClusterError::InvalidPort(raw.clone()))?;
    }
    url.set_path("");
    Ok(url)
}

/// One hostfile entry: `host`, `host:port`, or `[v6addr]:port`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostTarget {
    pub host: String,
    pub port: Option<u16>,
}

impl HostTarget {
    pub fn parse(entry: &str) -> Result<Self, ClusterError> {
        let entry = entry.trim();
        if entry.is_empty() {
            return Err(ClusterError::EmptyHost);
        }

        if let Some(rest) = entry.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| ClusterError::InvalidPort(entry.to_string()))?;
            let port = match tail.strip_prefix(':') {
                Some(p) => Some(parse_port(entry, p)?),
                None if tail.is_empty() => None,
                None => return Err(ClusterError::InvalidPort(entry.to_string())),
            };
            return Ok(Self { host: host.to_string(), port });
        }

        // More than one colon without brackets is a bare IPv6 address.
        match entry.split_once(':') {
            Some((host, p)) if !p.contains(':') => Ok(Self {
                host: host.to_string(),
                port: Some(parse_port(entry, p)?),
            }),
            _ => Ok(Self { host: entry.to_string(), port: None }),
        }
    }

    pub fn port_or(&self, fallback: Option<u16>) -> Option<u16> {
        self.port.or(fallback)
    }

    fn host_for_url(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }

    pub fn base_url(&self, default_port: Option<u16>, secure: bool) -> String {
        let scheme = if secure { "https" } else { "http" };
        match self.port_or(default_port) {
            Some(port) => format!("{scheme}://{}:{port}", self.host_for_url()),
            None => format!("{scheme}://{}", self.host_for_url()),
        }
    }
}

impl fmt::Display for HostTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host_for_url(), port),
            None => write!(f, "{}", self.host),
        }
    }
}

fn parse_port(entry: &str, raw: &str) -> Result<u16, ClusterError> {
    raw.parse::<u16>()
        .map_err(|_| ClusterError::InvalidPort(entry.to_string()))
}
