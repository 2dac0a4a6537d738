use std::io;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ClusterError {
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("empty host entry")]
    EmptyHost,
    #[error("invalid port in host entry {0}")]
    InvalidPort(String),
    #[error("admin api returned {status}: {body}")]
    AdminStatus { status: u16, body: String },
    #[error("failed to read {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
