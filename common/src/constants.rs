pub const DISK_STATE_OK: &str = "ok";

pub const STORAGE_INFO_PATH: &str = "/minio/admin/v3/storageinfo";
pub const HEAL_PATH: &str = "/minio/admin/v3/heal/";
pub const HEALTH_CLUSTER_PATH: &str = "/minio/health/cluster";

pub const FAILURE_FILE_NAME: &str = "failure";
pub const ROUND_FILE_PREFIX: &str = "round-";

pub const DEFAULT_REGION: &str = "us-east-1";
pub const SIGNING_SERVICE: &str = "s3";

pub const HEAL_SUMMARY_FINISHED: &str = "finished";

pub const DRIVE_STATE_MISSING: &str = "missing";
pub const DRIVE_STATE_CORRUPT: &str = "corrupt";
pub const DRIVE_STATE_OFFLINE: &str = "offline";
