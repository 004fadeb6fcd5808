//! Transaction log and snapshot validation
//!
//! The validator answers one question per file: what is the longest valid
//! prefix? A transaction log is scanned record by record from the header
//! onward; the scan stops at the first record that fails to read, and the
//! result records how far the file was good. Snapshots are opaque, so their
//! check is presence plus a non-empty body.
//!
//! Validation failures are results, not errors: a corrupted file produces a
//! [`ValidationResult`] with `is_valid == false`. Errors are reserved for
//! files that cannot be examined at all (unreadable, or a header too broken
//! to establish the record stream).

use crate::error::{BackupError, Result};
use crate::snapshot::list_snapshot_files;
use crate::txnlog::{list_txnlog_files, TxnLogReader};
use crate::utils;
use crate::zxid::Zxid;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Outcome of scanning one file
///
/// For snapshots only `is_valid` and `corruption_kind` are meaningful; the
/// remaining fields keep their defaults.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    /// Whether the whole file read back cleanly
    pub is_valid: bool,
    /// Number of valid records
    pub valid_count: usize,
    /// Byte offset at which the last successful (or first failed) record
    /// read began
    pub last_valid_offset: u64,
    /// ZXID of the last valid record; zero if there are none
    pub last_valid_zxid: Zxid,
    /// Description of the corruption that ended the scan
    pub corruption_kind: Option<String>,
    /// ZXIDs of all valid records, in file order
    pub zxids: Vec<Zxid>,
}

/// Scan a transaction log, producing its longest valid prefix
///
/// Header errors surface as [`BackupError::Io`] wrapping the corruption
/// cause; without a parseable header there is no record stream to validate.
pub fn validate_txnlog(path: impl AsRef<Path>) -> Result<ValidationResult> {
    let path = path.as_ref();
    let mut reader = TxnLogReader::open(path).map_err(|e| {
        BackupError::io("failed to open log")
            .with_context("path", path.display())
            .with_source(e)
    })?;

    let mut result = ValidationResult {
        is_valid: true,
        ..Default::default()
    };

    loop {
        let pos = reader.position()?;

        match reader.read_transaction() {
            Ok(None) => break,
            Ok(Some(txn)) => {
                result.valid_count += 1;
                result.last_valid_offset = pos;
                result.last_valid_zxid = txn.zxid;
                result.zxids.push(txn.zxid);
            }
            Err(err) => {
                result.is_valid = false;
                result.last_valid_offset = pos;
                result.corruption_kind = Some(err.to_string());
                if result.valid_count > 0 {
                    result.last_valid_zxid = result.zxids[result.valid_count - 1];
                }
                break;
            }
        }
    }

    debug!(
        "validated {}: valid={} records={}",
        path.display(),
        result.is_valid,
        result.valid_count
    );

    Ok(result)
}

/// Check that a snapshot file exists and is non-empty
///
/// The snapshot body format is opaque; no deeper inspection is performed.
pub fn validate_snapshot(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let size = utils::file_size(path)?;

    if size == 0 {
        return Err(
            BackupError::corruption("empty snapshot file").with_context("path", path.display())
        );
    }

    Ok(())
}

/// Validate every snapshot and transaction log under the two backup
/// directories
///
/// The map iterates in path order, so reports are deterministic.
pub fn validate_backup_files(
    snapshot_dir: impl AsRef<Path>,
    txnlog_dir: impl AsRef<Path>,
) -> Result<BTreeMap<PathBuf, ValidationResult>> {
    let mut results = BTreeMap::new();

    for txnlog in list_txnlog_files(txnlog_dir)? {
        let result = validate_txnlog(&txnlog)?;
        results.insert(txnlog, result);
    }

    for snapshot in list_snapshot_files(snapshot_dir)? {
        let result = match validate_snapshot(&snapshot) {
            Ok(()) => ValidationResult {
                is_valid: true,
                ..Default::default()
            },
            Err(err) => ValidationResult {
                is_valid: false,
                corruption_kind: Some(err.to_string()),
                ..Default::default()
            },
        };
        results.insert(snapshot, result);
    }

    Ok(results)
}

/// One-line summary over a set of validation results
pub fn validation_summary(results: &BTreeMap<PathBuf, ValidationResult>) -> String {
    let total = results.len();
    let valid = results.values().filter(|r| r.is_valid).count();
    format!(
        "Total: {}, Valid: {}, Corrupted: {}",
        total,
        valid,
        total - valid
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txnlog::{Transaction, TxnLogHeader, TxnLogWriter, HEADER_SIZE};
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_log(path: &Path, zxids: &[u64]) {
        let mut writer = TxnLogWriter::create(path, &TxnLogHeader::new(12345)).unwrap();
        for &zxid in zxids {
            let txn = Transaction::build(1, 0, Zxid(zxid), 1_700_000_000, 1, b"body");
            writer.write_transaction(&txn).unwrap();
        }
        writer.sync().unwrap();
        writer.close();
    }

    fn append_garbage(path: &Path, n: usize) {
        let mut file = fs::OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(&vec![0xabu8; n]).unwrap();
    }

    #[test]
    fn test_valid_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log.100000000");
        write_log(&path, &[0x100000000, 0x100000001, 0x100000002]);

        let result = validate_txnlog(&path).unwrap();
        assert!(result.is_valid);
        assert_eq!(result.valid_count, 3);
        assert_eq!(
            result.zxids,
            vec![Zxid(0x100000000), Zxid(0x100000001), Zxid(0x100000002)]
        );
        assert_eq!(result.last_valid_zxid, Zxid(0x100000002));
        assert!(result.corruption_kind.is_none());
        assert!(result.last_valid_offset >= HEADER_SIZE);
    }

    #[test]
    fn test_header_only_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log.1");
        write_log(&path, &[]);

        let result = validate_txnlog(&path).unwrap();
        assert!(result.is_valid);
        assert_eq!(result.valid_count, 0);
        assert!(result.zxids.is_empty());
        assert_eq!(result.last_valid_zxid, Zxid::ZERO);
        assert_eq!(result.last_valid_offset, 0);
    }

    #[test]
    fn test_trailing_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log.100000000");
        write_log(&path, &[0x100000000, 0x100000001, 0x100000002]);
        append_garbage(&path, 14);

        let result = validate_txnlog(&path).unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.valid_count, 3);
        assert_eq!(result.last_valid_zxid, Zxid(0x100000002));
        assert!(result.corruption_kind.as_deref().unwrap_or("") != "");
    }

    #[test]
    fn test_garbage_after_header_only() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log.1");
        write_log(&path, &[]);
        append_garbage(&path, 40);

        let result = validate_txnlog(&path).unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.valid_count, 0);
        assert_eq!(result.last_valid_zxid, Zxid::ZERO);
        assert_eq!(result.last_valid_offset, HEADER_SIZE);
    }

    #[test]
    fn test_unreadable_header_is_io_error() {
        let tmp = TempDir::new().unwrap();

        for content in [&b""[..], &[0u8; 16][..]] {
            let path = tmp.path().join("log.1");
            fs::write(&path, content).unwrap();

            let err = validate_txnlog(&path).unwrap_err();
            assert_eq!(err.category(), crate::ErrorCategory::Io);
            // the corruption cause is preserved underneath
            assert!(err.to_string().contains("[Corruption]"));
        }
    }

    #[test]
    fn test_validate_snapshot() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("snapshot.1");
        let empty = tmp.path().join("snapshot.2");
        fs::write(&good, b"state").unwrap();
        fs::write(&empty, b"").unwrap();

        assert!(validate_snapshot(&good).is_ok());

        let err = validate_snapshot(&empty).unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(err.message(), "empty snapshot file");

        assert!(validate_snapshot(tmp.path().join("snapshot.3")).is_err());
    }

    #[test]
    fn test_validate_backup_files() {
        let tmp = TempDir::new().unwrap();
        let snap_dir = tmp.path().join("snapshots");
        let log_dir = tmp.path().join("txnlogs");
        fs::create_dir_all(&snap_dir).unwrap();
        fs::create_dir_all(&log_dir).unwrap();

        fs::write(snap_dir.join("snapshot.100000000"), b"state").unwrap();
        write_log(&log_dir.join("log.100000000"), &[0x100000000]);
        let bad = log_dir.join("log.200000000");
        write_log(&bad, &[0x200000000]);
        append_garbage(&bad, 5);

        let results = validate_backup_files(&snap_dir, &log_dir).unwrap();
        assert_eq!(results.len(), 3);

        let corrupted: Vec<_> = results
            .iter()
            .filter(|(_, r)| !r.is_valid)
            .map(|(p, _)| p.clone())
            .collect();
        assert_eq!(corrupted, vec![bad]);

        assert_eq!(
            validation_summary(&results),
            "Total: 3, Valid: 2, Corrupted: 1"
        );
    }
}
