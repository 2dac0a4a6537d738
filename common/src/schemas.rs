use serde::{Deserialize, Serialize};

use crate::constants::{DRIVE_STATE_CORRUPT, DRIVE_STATE_MISSING, DRIVE_STATE_OFFLINE};

/// Response of `GET /minio/admin/v3/storageinfo`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StorageInfo {
    #[serde(default, alias = "Disks")]
    pub disks: Vec<DiskRecord>,
    #[serde(default, alias = "Backend")]
    pub backend: BackendInfo,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DiskRecord {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default, rename = "path", alias = "drivePath")]
    pub drive_path: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default, rename = "pool_index", alias = "poolIndex")]
    pub pool_index: usize,
    #[serde(default, rename = "set_index", alias = "setIndex")]
    pub set_index: usize,
    #[serde(default, rename = "disk_index", alias = "diskIndex")]
    pub disk_index: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BackendInfo {
    #[serde(default, rename = "standardSCParity", alias = "StandardSCParity")]
    pub standard_sc_parity: usize,
    #[serde(default, rename = "rrSCParity", alias = "RRSCParity")]
    pub rr_sc_parity: usize,
}

/// Body of a heal request.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealOpts {
    pub recursive: bool,
    #[serde(rename = "dryRun")]
    pub dry_run: bool,
    pub remove: bool,
    pub recreate: bool,
    #[serde(rename = "scanMode")]
    pub scan_mode: u8,
    #[serde(rename = "updateParity")]
    pub update_parity: bool,
    #[serde(rename = "nolock")]
    pub no_lock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<usize>,
}

impl HealOpts {
    pub const SCAN_MODE_DEEP: u8 = 1;

    /// Recursive deep scan of one erasure set, repairing in place.
    pub fn full_scan(pool: usize, set: usize) -> Self {
        Self {
            recursive: true,
            scan_mode: Self::SCAN_MODE_DEEP,
            pool: Some(pool),
            set: Some(set),
            ..Default::default()
        }
    }
}

/// Returned by the initial heal call (no client token supplied).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HealStartSuccess {
    #[serde(rename = "clientToken")]
    pub client_token: String,
    #[serde(default, rename = "clientAddress")]
    pub client_address: String,
}

/// Returned by every follow-up heal call carrying the client token.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HealTaskStatus {
    #[serde(default)]
    pub summary: String,
    #[serde(default, rename = "detail")]
    pub failure_detail: String,
    #[serde(default)]
    pub items: Vec<HealResultItem>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HealResultItem {
    #[serde(default, rename = "resultId")]
    pub result_index: i64,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub before: HealDrives,
    #[serde(default)]
    pub after: HealDrives,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HealDrives {
    #[serde(default)]
    pub drives: Vec<HealDriveInfo>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HealDriveInfo {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub state: String,
}

impl HealDrives {
    fn count_state(&self, state: &str) -> usize {
        self.drives.iter().filter(|d| d.state == state).count()
    }

    pub fn missing(&self) -> usize {
        self.count_state(DRIVE_STATE_MISSING)
    }

    pub fn corrupted(&self) -> usize {
        self.count_state(DRIVE_STATE_CORRUPT)
    }

    pub fn offline(&self) -> usize {
        self.count_state(DRIVE_STATE_OFFLINE)
    }

    /// Drives still needing repair: missing + corrupted + offline.
    pub fn invalid(&self) -> usize {
        self.missing() + self.corrupted() + self.offline()
    }
}

impl HealResultItem {
    /// Invalid drive count left after the repair attempt.
    pub fn invalid_after(&self) -> usize {
        self.after.invalid()
    }
}
