#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_server::Server;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha2::{Digest, Sha256};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::form_urlencoded;

use ::common::constants::{HEAL_PATH, HEALTH_CLUSTER_PATH, STORAGE_INFO_PATH};
use ::common::schemas::{
    BackendInfo, DiskRecord, HealDriveInfo, HealDrives, HealOpts, HealResultItem, HealStartSuccess,
    HealTaskStatus, StorageInfo,
};
use clusterctl::command::common::ClusterArgs;
use clusterctl::core::sigv4::signing_key;

pub const ACCESS_KEY: &str = "minioadmin";
pub const SECRET_KEY: &str = "minioadmin";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("clusterctl=debug")
        .with_test_writer()
        .try_init();
}

pub fn disk(pool: usize, set: usize, host: &str, n: usize, state: &str) -> DiskRecord {
    DiskRecord {
        endpoint: format!("http://{host}:9000/mnt/disk{n}"),
        drive_path: format!("/mnt/disk{n}"),
        state: state.to_string(),
        uuid: format!("{host}-{pool}-{set}-{n}"),
        pool_index: pool,
        set_index: set,
        disk_index: n,
    }
}

pub fn storage_info(disks: Vec<DiskRecord>, parity: usize) -> StorageInfo {
    StorageInfo {
        disks,
        backend: BackendInfo { standard_sc_parity: parity, rr_sc_parity: 1 },
    }
}

pub async fn write_infra_file(dir: &Path, info: &StorageInfo) -> Result<PathBuf> {
    let path = dir.join("storageinfo.json");
    tokio::fs::write(&path, serde_json::to_vec_pretty(info)?).await?;
    Ok(path)
}

pub fn cluster_args(endpoint: &str) -> ClusterArgs {
    ClusterArgs {
        endpoint: endpoint.to_string(),
        port: None,
        key: ACCESS_KEY.to_string(),
        secret: SECRET_KEY.to_string(),
        secure: false,
        infra_file: None,
    }
}

/// State behind the mock admin and health endpoints.
#[derive(Clone, Default)]
pub struct MockState {
    pub storage: Arc<StorageInfo>,
    /// Invalid counts returned by successive status calls per (pool, set);
    /// once drained the heal reports finished and clean.
    pub heal_scripts: Arc<Mutex<HashMap<(usize, usize), VecDeque<usize>>>>,
    /// Sets whose status calls fail with a server error.
    pub broken_sets: Arc<Mutex<Vec<(usize, usize)>>>,
    pub healthy: Arc<AtomicBool>,
    pub heal_starts: Arc<AtomicUsize>,
    pub health_probes: Arc<AtomicUsize>,
}

impl MockState {
    pub fn new(storage: StorageInfo) -> Self {
        Self {
            storage: Arc::new(storage),
            healthy: Arc::new(AtomicBool::new(true)),
            ..Default::default()
        }
    }

    pub fn script(&self, pool: usize, set: usize, counts: &[usize]) {
        self.heal_scripts
            .lock()
            .unwrap()
            .insert((pool, set), counts.iter().copied().collect());
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn aws_encode(raw: &str) -> String {
    const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');
    utf8_percent_encode(raw, UNRESERVED).to_string()
}

/// Recomputes the SigV4 signature of a received request from its method,
/// path, query, signed headers and body, using the cluster secret.
pub fn verify_signature(method: &Method, uri: &Uri, headers: &HeaderMap, body: &[u8]) -> bool {
    let Some(rest) = header(headers, "authorization").and_then(|a| a.strip_prefix("AWS4-HMAC-SHA256 ")) else {
        return false;
    };
    let (mut credential, mut signed, mut signature) = (None, None, None);
    for part in rest.split(", ") {
        match part.split_once('=') {
            Some(("Credential", v)) => credential = Some(v),
            Some(("SignedHeaders", v)) => signed = Some(v),
            Some(("Signature", v)) => signature = Some(v),
            _ => {}
        }
    }
    let (Some(credential), Some(signed), Some(signature)) = (credential, signed, signature) else {
        return false;
    };
    let scope: Vec<&str> = credential.split('/').collect();
    if scope.len() != 5 || scope[0] != ACCESS_KEY || scope[4] != "aws4_request" {
        return false;
    }
    let (date, region, service) = (scope[1], scope[2], scope[3]);

    let payload_hash = hex::encode(Sha256::digest(body));
    if header(headers, "x-amz-content-sha256") != Some(payload_hash.as_str()) {
        return false;
    }
    let Some(amz_date) = header(headers, "x-amz-date") else {
        return false;
    };

    let mut canonical_headers = String::new();
    for name in signed.split(';') {
        let Some(value) = header(headers, name) else {
            return false;
        };
        canonical_headers.push_str(&format!("{name}:{}\n", value.trim()));
    }

    let mut query: Vec<(String, String)> = form_urlencoded::parse(uri.query().unwrap_or("").as_bytes())
        .map(|(k, v)| (aws_encode(&k), aws_encode(&v)))
        .collect();
    query.sort();
    let canonical_query = query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let canonical_request = format!(
        "{}\n{}\n{canonical_query}\n{canonical_headers}\n{signed}\n{payload_hash}",
        method.as_str(),
        uri.path(),
    );
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{date}/{region}/{service}/aws4_request\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let key = signing_key(SECRET_KEY, date, region, service);
    let mut mac = Hmac::<Sha256>::new_from_slice(&key).expect("HMAC can take key of any size");
    mac.update(string_to_sign.as_bytes());
    hex::encode(mac.finalize().into_bytes()) == signature
}

async fn storage_info_handler(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !verify_signature(&method, &uri, &headers, &body) {
        return (StatusCode::FORBIDDEN, "SignatureDoesNotMatch").into_response();
    }
    Json(state.storage.as_ref().clone()).into_response()
}

fn heal_status(invalid: usize, finished: bool) -> HealTaskStatus {
    let mut drives: Vec<HealDriveInfo> = (0..invalid)
        .map(|i| HealDriveInfo {
            uuid: format!("d{i}"),
            endpoint: format!("http://mock/mnt/disk{i}"),
            state: if i % 2 == 0 { "missing".into() } else { "corrupt".into() },
        })
        .collect();
    drives.push(HealDriveInfo {
        uuid: "good".into(),
        endpoint: "http://mock/mnt/good".into(),
        state: "ok".into(),
    });
    HealTaskStatus {
        summary: if finished { "finished".into() } else { "running".into() },
        failure_detail: String::new(),
        items: vec![HealResultItem {
            result_index: 1,
            kind: "object".into(),
            bucket: "bucket".into(),
            object: "obj".into(),
            before: HealDrives::default(),
            after: HealDrives { drives },
        }],
    }
}

async fn heal_handler(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    if !verify_signature(&method, &uri, &headers, &body) {
        return (StatusCode::FORBIDDEN, "SignatureDoesNotMatch").into_response();
    }
    let Ok(opts) = serde_json::from_slice::<HealOpts>(&body) else {
        return (StatusCode::BAD_REQUEST, "malformed heal options").into_response();
    };
    if !opts.recursive || opts.dry_run || opts.scan_mode != HealOpts::SCAN_MODE_DEEP {
        return (StatusCode::BAD_REQUEST, "unexpected heal options").into_response();
    }
    let (Some(pool), Some(set)) = (opts.pool, opts.set) else {
        return (StatusCode::BAD_REQUEST, "missing pool/set").into_response();
    };

    match query.get("clientToken") {
        None => {
            state.heal_starts.fetch_add(1, Ordering::SeqCst);
            Json(HealStartSuccess {
                client_token: format!("tok-{pool}-{set}"),
                client_address: "127.0.0.1".into(),
            })
            .into_response()
        }
        Some(token) if *token != format!("tok-{pool}-{set}") => {
            (StatusCode::BAD_REQUEST, "unknown client token").into_response()
        }
        Some(_) => {
            if state.broken_sets.lock().unwrap().contains(&(pool, set)) {
                return (StatusCode::INTERNAL_SERVER_ERROR, "heal sequence lost").into_response();
            }
            let next = state
                .heal_scripts
                .lock()
                .unwrap()
                .get_mut(&(pool, set))
                .and_then(VecDeque::pop_front);
            match next {
                Some(invalid) => Json(heal_status(invalid, false)).into_response(),
                None => Json(heal_status(0, true)).into_response(),
            }
        }
    }
}

async fn health_handler(
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
) -> StatusCode {
    state.health_probes.fetch_add(1, Ordering::SeqCst);
    if query.get("maintenance").map(String::as_str) != Some("true") {
        return StatusCode::BAD_REQUEST;
    }
    if state.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

pub struct MockCluster {
    pub state: MockState,
    pub addr: SocketAddr,
    pub url: String,
    handle: JoinHandle<Result<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl MockCluster {
    pub async fn start(state: MockState) -> Result<Self> {
        let app = Router::new()
            .route(STORAGE_INFO_PATH, get(storage_info_handler))
            .route(HEAL_PATH, post(heal_handler))
            .route(HEALTH_CLUSTER_PATH, get(health_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let url = format!("http://{addr}");

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let server = Server::from_tcp(listener.into_std()?).serve(app.into_make_service());

            tokio::select! {
                res = server => res.map_err(anyhow::Error::from),
                _ = shutdown_rx.changed() => Ok(()),
            }
        });

        Ok(Self { state, addr, url, handle, shutdown_tx })
    }

    /// `host:port` entry as it would appear in a hostfile.
    pub fn host_entry(&self) -> String {
        self.addr.to_string()
    }

    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        self.handle.abort();
        let _ = self.handle.await;
        Ok(())
    }
}
