//! Snapshot file metadata
//!
//! Snapshot bodies are opaque to this crate; everything interesting about a
//! snapshot comes from its name (the highest ZXID it contains), its size and
//! a content hash taken over the whole file.

use crate::error::{BackupError, Result};
use crate::txnlog::file_name_string;
use crate::utils;
use crate::zxid::{parse_zxid_from_file_name, Zxid};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Summary of one snapshot file, as persisted in backup metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// File name (`snapshot.<hex-zxid>`)
    pub name: String,
    /// ZXID advertised by the file name
    pub zxid: Zxid,
    /// File size in bytes
    pub size: u64,
    /// Content hash, `sha256:<lowercase-hex>`
    pub checksum: String,
}

/// Extract [`SnapshotInfo`] from a snapshot file
pub fn get_snapshot_info(path: impl AsRef<Path>) -> Result<SnapshotInfo> {
    let path = path.as_ref();
    let size = utils::file_size(path)?;
    let zxid = parse_zxid_from_file_name(path)?;
    let checksum = utils::file_checksum(path)?;

    Ok(SnapshotInfo {
        name: file_name_string(path),
        zxid,
        size,
        checksum,
    })
}

/// All snapshot files in a directory, ascending by ZXID
pub fn list_snapshot_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    utils::list_prefixed_files(dir, "snapshot.")
}

/// The snapshot with the highest ZXID in a directory
pub fn get_latest_snapshot(dir: impl AsRef<Path>) -> Result<(PathBuf, Zxid)> {
    let dir = dir.as_ref();
    let snapshots = list_snapshot_files(dir)?;

    let latest = snapshots.into_iter().next_back().ok_or_else(|| {
        BackupError::io("no snapshot files found").with_context("dir", dir.display())
    })?;

    let zxid = parse_zxid_from_file_name(&latest)?;
    Ok((latest, zxid))
}
