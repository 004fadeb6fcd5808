//! ZXID type and file naming conventions
//!
//! A ZXID is the 64-bit monotonic transaction identifier ZooKeeper assigns to
//! every write. It is the sole ordering key in this crate: records within a
//! log are ordered by it, and both file families embed it in their names
//! (`log.<hex>`, `snapshot.<hex>`). Comparison is always numeric; the hex
//! spelling in a file name is presentation only.

use crate::error::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A ZooKeeper transaction identifier (64-bit)
///
/// Displays as `0x<hex>`; use [`Zxid::hex`] for the bare hex digits used in
/// file names and metadata fields.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Zxid(pub u64);

impl Zxid {
    /// The zero ZXID, used when no transaction is known
    pub const ZERO: Zxid = Zxid(0);

    /// Hexadecimal digits without the `0x` prefix
    pub fn hex(&self) -> String {
        format!("{:x}", self.0)
    }

    /// Parse bare lowercase/uppercase hex digits (no `0x` prefix)
    pub fn from_hex(s: &str) -> Result<Zxid> {
        u64::from_str_radix(s, 16).map(Zxid).map_err(|e| {
            BackupError::user("failed to parse zxid")
                .with_context("zxid_str", s)
                .with_source(e)
        })
    }

    /// The larger of two ZXIDs
    pub fn max(a: Zxid, b: Zxid) -> Zxid {
        if a > b {
            a
        } else {
            b
        }
    }

    /// The smaller of two ZXIDs
    pub fn min(a: Zxid, b: Zxid) -> Zxid {
        if a < b {
            a
        } else {
            b
        }
    }
}

impl fmt::Display for Zxid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl From<u64> for Zxid {
    fn from(raw: u64) -> Self {
        Zxid(raw)
    }
}

impl From<Zxid> for u64 {
    fn from(zxid: Zxid) -> Self {
        zxid.0
    }
}

/// The two file families ZooKeeper persists, plus everything else
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// Append-only transaction log (`log.<hex-zxid>`)
    TxnLog,
    /// Periodic in-memory snapshot (`snapshot.<hex-zxid>`)
    Snapshot,
    /// Neither of the above
    Unknown,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileType::TxnLog => "txnlog",
            FileType::Snapshot => "snapshot",
            FileType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Classify a path by its file-name prefix
///
/// Only the final path component is examined; directories elsewhere in the
/// path never influence the result.
pub fn determine_file_type(path: impl AsRef<Path>) -> FileType {
    let base = match path.as_ref().file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return FileType::Unknown,
    };

    if base.starts_with("log.") {
        FileType::TxnLog
    } else if base.starts_with("snapshot.") {
        FileType::Snapshot
    } else {
        FileType::Unknown
    }
}

/// Format the canonical file name for a ZXID
///
/// Returns an empty string for [`FileType::Unknown`].
pub fn format_zxid_file_name(file_type: FileType, zxid: Zxid) -> String {
    match file_type {
        FileType::TxnLog => format!("log.{}", zxid.hex()),
        FileType::Snapshot => format!("snapshot.{}", zxid.hex()),
        FileType::Unknown => String::new(),
    }
}

/// Parse the ZXID from a `<prefix>.<hex>` file name
///
/// The hex digits after the last dot are parsed base-16, case-insensitively
/// and without a `0x` prefix. A name with no dot or a non-hex suffix fails
/// with a [`BackupError::User`] error.
pub fn parse_zxid_from_file_name(path: impl AsRef<Path>) -> Result<Zxid> {
    let path = path.as_ref();
    let base = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            BackupError::user("invalid file name").with_context("filename", path.display())
        })?;

    let (_, suffix) = base.rsplit_once('.').ok_or_else(|| {
        BackupError::user("invalid file name").with_context("filename", base)
    })?;

    Zxid::from_hex(suffix).map_err(|e| e.with_context("filename", base))
}
