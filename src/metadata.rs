//! Backup metadata document
//!
//! Every backup directory carries a `metadata/backup_info.json` describing
//! what was copied, how validation went and how large the result is, plus a
//! human-readable `MANIFEST.txt`. The JSON document is the contract restore
//! relies on; the manifest is for operators paging through old backups.

use crate::error::{BackupError, Result};
use crate::snapshot::SnapshotInfo;
use crate::txnlog::TxnLogInfo;
use crate::utils::format_bytes;
use crate::zxid::Zxid;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Schema version written into every document
pub const BACKUP_INFO_VERSION: &str = "1.0";

/// ZXID in both spellings, for humans and tools alike
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZxidInfo {
    /// Bare lowercase hex, no `0x`
    pub hex: String,
    /// The same value in decimal
    pub decimal: u64,
}

impl From<Zxid> for ZxidInfo {
    fn from(zxid: Zxid) -> Self {
        ZxidInfo {
            hex: zxid.hex(),
            decimal: zxid.0,
        }
    }
}

/// Where the backup came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZooKeeperInfo {
    /// Server version string, `unknown` when the probe failed
    pub version: String,
    /// host:port the probe targeted
    pub host: String,
    /// Source snapshot directory
    pub data_dir: String,
    /// Source transaction log directory
    pub log_dir: String,
}

/// The files captured by a backup run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesInfo {
    pub txnlogs: Vec<TxnLogInfo>,
    pub snapshots: Vec<SnapshotInfo>,
}

/// Validation tallies for a backup run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationInfo {
    pub enabled: bool,
    pub total_files: usize,
    pub valid_files: usize,
    pub corrupted_files: usize,
    pub repaired_files: usize,
    pub unrecoverable_files: usize,
}

/// Size and timing of a backup run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsInfo {
    pub total_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed_size: Option<u64>,
    pub duration_seconds: f64,
}

/// The persisted backup document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub version: String,
    pub backup_id: String,
    pub backup_timestamp: DateTime<Utc>,
    pub backup_zxid: ZxidInfo,
    pub zookeeper: ZooKeeperInfo,
    pub files: FilesInfo,
    pub validation: ValidationInfo,
    pub statistics: StatisticsInfo,
}

impl BackupInfo {
    /// Fresh document with empty file lists and validation enabled
    pub fn new(backup_id: impl Into<String>, zxid: Zxid) -> Self {
        BackupInfo {
            version: BACKUP_INFO_VERSION.to_string(),
            backup_id: backup_id.into(),
            backup_timestamp: Utc::now(),
            backup_zxid: zxid.into(),
            zookeeper: ZooKeeperInfo::default(),
            files: FilesInfo::default(),
            validation: ValidationInfo {
                enabled: true,
                ..Default::default()
            },
            statistics: StatisticsInfo::default(),
        }
    }

    /// Load a document from a JSON file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<BackupInfo> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| {
            BackupError::io("failed to read backup info")
                .with_context("path", path.display())
                .with_source(e)
        })?;

        serde_json::from_slice(&data).map_err(|e| {
            BackupError::io("failed to parse backup info")
                .with_context("path", path.display())
                .with_source(e)
        })
    }

    /// Write the document as pretty-printed JSON (2-space indent)
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = serde_json::to_vec_pretty(self).map_err(|e| {
            BackupError::io("failed to serialize backup info")
                .with_context("path", path.display())
                .with_source(e)
        })?;

        crate::utils::write_file(path, &data)
    }

    /// Record a captured snapshot
    pub fn add_snapshot(&mut self, info: SnapshotInfo) {
        self.files.snapshots.push(info);
    }

    /// Record a captured transaction log
    pub fn add_txnlog(&mut self, info: TxnLogInfo) {
        self.files.txnlogs.push(info);
    }

    /// Update validation tallies; total is valid plus corrupted
    pub fn update_validation(&mut self, valid: usize, corrupted: usize, repaired: usize) {
        self.validation.total_files = valid + corrupted;
        self.validation.valid_files = valid;
        self.validation.corrupted_files = corrupted;
        self.validation.repaired_files = repaired;
    }

    /// Record final size and duration
    pub fn update_statistics(
        &mut self,
        total_size: u64,
        compressed_size: Option<u64>,
        duration: Duration,
    ) {
        self.statistics.total_size = total_size;
        self.statistics.compressed_size = compressed_size;
        self.statistics.duration_seconds = duration.as_secs_f64();
    }

    /// Render the `MANIFEST.txt` document
    pub fn generate_manifest(&self) -> String {
        let mut out = String::new();

        out.push_str("# ZooKeeper Backup Manifest\n\n");
        let _ = writeln!(out, "Backup ID: {}", self.backup_id);
        let _ = writeln!(
            out,
            "Timestamp: {}",
            self.backup_timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        let _ = writeln!(out, "ZXID: 0x{}\n", self.backup_zxid.hex);

        out.push_str("## Snapshot Files\n\n");
        for s in &self.files.snapshots {
            let _ = writeln!(
                out,
                "- {} (ZXID: 0x{}, Size: {})",
                s.name,
                s.zxid.hex(),
                format_bytes(s.size)
            );
        }

        out.push_str("\n## TxnLog Files\n\n");
        for t in &self.files.txnlogs {
            let _ = writeln!(
                out,
                "- {} (ZXID: 0x{} - 0x{}, Txns: {}, Size: {}, Status: {})",
                t.name,
                t.start_zxid.hex(),
                t.end_zxid.hex(),
                t.transaction_count,
                format_bytes(t.size),
                t.status
            );
        }

        out
    }

    /// Render the boxed human-readable report the CLI prints after a run
    pub fn generate_text_report(&self) -> String {
        let mut out = String::new();

        out.push_str("╔════════════════════════════════════════════════════════════╗\n");
        out.push_str("║           Backup Report                                    ║\n");
        out.push_str("╚════════════════════════════════════════════════════════════╝\n\n");

        let _ = writeln!(out, "Backup ID: {}", self.backup_id);
        let _ = writeln!(
            out,
            "Timestamp: {}",
            self.backup_timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        let _ = writeln!(
            out,
            "Backup ZXID: 0x{} ({})\n",
            self.backup_zxid.hex, self.backup_zxid.decimal
        );

        out.push_str("ZooKeeper Information:\n");
        let _ = writeln!(out, "  Version: {}", self.zookeeper.version);
        let _ = writeln!(out, "  Host: {}", self.zookeeper.host);
        let _ = writeln!(out, "  Data Dir: {}", self.zookeeper.data_dir);
        let _ = writeln!(out, "  Log Dir: {}\n", self.zookeeper.log_dir);

        out.push_str("Files:\n");
        let _ = writeln!(out, "  Snapshots: {}", self.files.snapshots.len());
        let _ = writeln!(out, "  TxnLogs: {}\n", self.files.txnlogs.len());

        if self.validation.enabled {
            out.push_str("Validation:\n");
            let _ = writeln!(out, "  Total Files: {}", self.validation.total_files);
            let _ = writeln!(out, "  Valid Files: {}", self.validation.valid_files);
            let _ = writeln!(out, "  Corrupted Files: {}", self.validation.corrupted_files);
            let _ = writeln!(out, "  Repaired Files: {}\n", self.validation.repaired_files);
        }

        out.push_str("Statistics:\n");
        let _ = writeln!(out, "  Total Size: {}", format_bytes(self.statistics.total_size));
        if let Some(compressed) = self.statistics.compressed_size {
            let _ = writeln!(out, "  Compressed Size: {}", format_bytes(compressed));
        }
        let _ = writeln!(
            out,
            "  Duration: {:.2} seconds",
            self.statistics.duration_seconds
        );

        out
    }
}
