//! # zkbackup - ZooKeeper backup, verification, repair and restore
//!
//! A library (and CLI) for operating on the two file families ZooKeeper
//! persists: periodic in-memory snapshots (`snapshot.<hex-zxid>`, opaque)
//! and append-only transaction logs (`log.<hex-zxid>`, framed binary
//! records with per-record Adler-32 checksums).
//!
//! ## Overview
//!
//! - **Backup**: mirror the live snapshot and log sets into a dated backup
//!   directory, together with a JSON metadata document and a human-readable
//!   manifest. Copies can be validated, and corrupted logs repaired, as part
//!   of the run.
//! - **Verify**: independently check every file of an existing backup for
//!   structural integrity.
//! - **Repair**: truncate a corrupted transaction log to its longest valid
//!   prefix, producing a byte-for-byte compatible copy.
//! - **Restore**: copy a backup back into live directories, optionally
//!   dropping transactions beyond a chosen ZXID.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zkbackup::{BackupConfig, BackupEngine};
//! use std::path::PathBuf;
//!
//! # fn main() -> zkbackup::Result<()> {
//! let config = BackupConfig {
//!     zk_data_dir: PathBuf::from("/zookeeper/data/version-2"),
//!     zk_log_dir: PathBuf::from("/zookeeper/datalog/version-2"),
//!     output_dir: PathBuf::from("/backup/zookeeper"),
//!     verify: true,
//!     ..Default::default()
//! };
//!
//! let info = BackupEngine::new(config).run()?;
//! println!("backed up {} files", info.files.snapshots.len() + info.files.txnlogs.len());
//! # Ok(())
//! # }
//! ```
//!
//! Validating and repairing a single log:
//!
//! ```rust,no_run
//! use zkbackup::{repair_txnlog, validate_txnlog};
//!
//! # fn main() -> zkbackup::Result<()> {
//! let result = validate_txnlog("/data/version-2/log.100000000")?;
//! if !result.is_valid {
//!     repair_txnlog(
//!         "/data/version-2/log.100000000",
//!         "/tmp/log.100000000.repaired",
//!     )?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Design
//!
//! All I/O is synchronous and single-threaded; a run is one sequential
//! pass. Readers and writers own their file handles and release them on
//! every exit path. Errors carry a category, a message and an ordered
//! key/value context chain (see [`error`]).
//!
//! ## Module Organization
//!
//! - [`zxid`]: ZXID type and file naming
//! - [`txnlog`]: transaction log codec (reader/writer)
//! - [`validator`]: longest-valid-prefix scanning
//! - [`repair`]: truncate-to-last-valid repair and ZXID-filtered copy
//! - [`snapshot`]: snapshot metadata
//! - [`metadata`]: the persisted backup document and manifest
//! - [`backup`], [`restore`], [`verify`]: the three orchestrators
//! - [`zk`]: optional live-cluster probe
//! - [`error`]: error taxonomy

pub mod backup;
pub mod config;
pub mod error;
pub mod metadata;
pub mod repair;
pub mod restore;
pub mod snapshot;
pub mod txnlog;
pub mod utils;
pub mod validator;
pub mod verify;
pub mod zk;
pub mod zxid;

// Re-export main types for convenience
pub use backup::BackupEngine;
pub use config::{BackupConfig, OutputFormat, RestoreConfig, VerifyConfig, DEFAULT_ZK_HOST};
pub use error::{BackupError, ErrorCategory, Result};
pub use metadata::BackupInfo;
pub use repair::{
    copy_txnlog_from_zxid, copy_txnlog_until_zxid, repair_txnlog, repair_txnlog_in_place,
};
pub use restore::RestoreEngine;
pub use snapshot::{get_latest_snapshot, get_snapshot_info, list_snapshot_files, SnapshotInfo};
pub use txnlog::{
    get_txnlog_info, list_txnlog_files, LogStatus, Transaction, TxnLogHeader, TxnLogInfo,
    TxnLogReader, TxnLogWriter,
};
pub use validator::{
    validate_backup_files, validate_snapshot, validate_txnlog, validation_summary,
    ValidationResult,
};
pub use verify::{VerifyEngine, VerifyReport};
pub use zk::{ZkFourLetterClient, ZooKeeperProbe, DEFAULT_PROBE_TIMEOUT};
pub use zxid::{
    determine_file_type, format_zxid_file_name, parse_zxid_from_file_name, FileType, Zxid,
};
