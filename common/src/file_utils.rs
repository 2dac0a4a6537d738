use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::constants::{FAILURE_FILE_NAME, ROUND_FILE_PREFIX};
use crate::error::ClusterError;

pub fn failure_path(folder: &Path) -> PathBuf {
    folder.join(FAILURE_FILE_NAME)
}

pub fn round_path(folder: &Path, round: usize) -> PathBuf {
    folder.join(format!("{ROUND_FILE_PREFIX}{round}"))
}

/// Newline-delimited host list; blank lines are skipped.
pub async fn read_hostfile(path: &Path) -> Result<Vec<String>, ClusterError> {
    let raw = fs::read_to_string(path)
        .await
        .map_err(|source| ClusterError::ReadFile { path: path.to_path_buf(), source })?;
    Ok(parse_host_lines(&raw))
}

pub fn parse_host_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Removes `folder` with everything in it and creates it again empty.
pub async fn reset_dir(folder: &Path) -> Result<(), ClusterError> {
    match fs::remove_dir_all(folder).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ClusterError::WriteFile { path: folder.to_path_buf(), source });
        }
    }
    fs::create_dir_all(folder)
        .await
        .map_err(|source| ClusterError::WriteFile { path: folder.to_path_buf(), source })
}

/// Writes one entry per line and fsyncs the file.
pub async fn write_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<(), ClusterError> {
    let wrap = |source| ClusterError::WriteFile { path: path.to_path_buf(), source };

    let mut f = fs::File::create(path).await.map_err(wrap)?;
    let mut buf = String::new();
    for line in lines {
        buf.push_str(line.as_ref());
        buf.push('\n');
    }
    f.write_all(buf.as_bytes()).await.map_err(wrap)?;
    f.sync_all().await.map_err(wrap)?;
    Ok(())
}
