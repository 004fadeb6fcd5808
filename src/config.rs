//! Configuration for the three orchestrators
//!
//! Each engine owns one of these structs. `validate()` fills defaults and
//! rejects missing required fields with [`BackupError::Configuration`]
//! errors before any I/O happens.

use crate::error::{BackupError, Result};
use crate::zxid::Zxid;
use chrono::Local;
use std::path::PathBuf;

/// Default ZooKeeper endpoint for the live probe
pub const DEFAULT_ZK_HOST: &str = "localhost:2181";

/// Settings for one backup run
#[derive(Debug, Clone, Default)]
pub struct BackupConfig {
    /// ZooKeeper dataDir (snapshots)
    pub zk_data_dir: PathBuf,
    /// ZooKeeper dataLogDir (transaction logs)
    pub zk_log_dir: PathBuf,
    /// Directory the backup directory is created under
    pub output_dir: PathBuf,
    /// host:port for the live ZXID probe
    pub zk_host: String,
    /// Backup identifier; defaults to `backup-YYYYMMDD-HHMMSS`
    pub backup_id: String,
    /// Validate (and repair) the copies after backup
    pub verify: bool,
}

impl BackupConfig {
    /// Fill defaults and check required fields
    pub fn validate(&mut self) -> Result<()> {
        if self.zk_host.is_empty() {
            self.zk_host = DEFAULT_ZK_HOST.to_string();
        }
        if self.backup_id.is_empty() {
            self.backup_id = generate_backup_id();
        }
        if self.zk_log_dir.as_os_str().is_empty() {
            return Err(BackupError::configuration("zk-log-dir is required"));
        }
        if self.zk_data_dir.as_os_str().is_empty() {
            return Err(BackupError::configuration("zk-data-dir is required"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(BackupError::configuration("output-dir is required"));
        }
        Ok(())
    }
}

/// Settings for one restore run
#[derive(Debug, Clone, Default)]
pub struct RestoreConfig {
    /// Backup directory to restore from
    pub backup_dir: PathBuf,
    /// Target dataDir for snapshots
    pub zk_data_dir: PathBuf,
    /// Target dataLogDir for transaction logs
    pub zk_log_dir: PathBuf,
    /// Skip the confirmation prompt
    pub force: bool,
    /// Show what would happen without touching the targets
    pub dry_run: bool,
    /// Skip backup validation before restoring
    pub skip_verify: bool,
    /// Drop transactions beyond this ZXID while restoring logs
    pub truncate_to_zxid: Option<Zxid>,
}

impl RestoreConfig {
    /// Check required fields
    pub fn validate(&self) -> Result<()> {
        if self.backup_dir.as_os_str().is_empty() {
            return Err(BackupError::configuration("backup-dir is required"));
        }
        if self.zk_log_dir.as_os_str().is_empty() {
            return Err(BackupError::configuration("zk-log-dir is required"));
        }
        if self.zk_data_dir.as_os_str().is_empty() {
            return Err(BackupError::configuration("zk-data-dir is required"));
        }
        Ok(())
    }
}

/// Output style for the verify report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Settings for one verify run
#[derive(Debug, Clone, Default)]
pub struct VerifyConfig {
    /// Backup directory to check
    pub backup_dir: PathBuf,
    /// Repair corrupted transaction logs in place
    pub fix: bool,
    /// Report style
    pub output_format: OutputFormat,
}

impl VerifyConfig {
    /// Check required fields
    pub fn validate(&self) -> Result<()> {
        if self.backup_dir.as_os_str().is_empty() {
            return Err(BackupError::configuration("backup-dir is required"));
        }
        Ok(())
    }
}

/// Timestamped default backup identifier
fn generate_backup_id() -> String {
    format!("backup-{}", Local::now().format("%Y%m%d-%H%M%S"))
}
