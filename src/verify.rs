//! Verify orchestrator
//!
//! Independent integrity check of an existing backup directory: every
//! snapshot and transaction log under it is validated, and with `fix`
//! enabled corrupted logs are repaired in place the same way the backup
//! verify pass does. The engine reports; rendering and exit policy belong
//! to the caller.

use crate::config::VerifyConfig;
use crate::error::{BackupError, Result};
use crate::repair::repair_txnlog_in_place;
use crate::validator::{validate_backup_files, ValidationResult};
use crate::zxid::{determine_file_type, FileType};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Per-file results and tallies from one verify run
#[derive(Debug, Default, Serialize)]
pub struct VerifyReport {
    /// Backup directory that was checked
    pub backup_dir: PathBuf,
    /// Number of files examined
    pub total_files: usize,
    /// Files that validated cleanly on first read
    pub valid_files: usize,
    /// Files found corrupted
    pub corrupted_files: usize,
    /// Corrupted logs successfully repaired in place
    pub repaired_files: usize,
    /// Result per file, in path order
    pub files: BTreeMap<PathBuf, ValidationResult>,
}

impl VerifyReport {
    /// Corrupted files that could not be (or were not asked to be) repaired
    pub fn unrepaired_files(&self) -> usize {
        self.corrupted_files - self.repaired_files
    }

    /// Whether the backup is usable as it stands
    pub fn is_clean(&self) -> bool {
        self.unrepaired_files() == 0
    }

    /// One-line tally
    pub fn summary(&self) -> String {
        format!(
            "Total: {}, Valid: {}, Corrupted: {}, Repaired: {}",
            self.total_files, self.valid_files, self.corrupted_files, self.repaired_files
        )
    }
}

/// Drives one verify run
pub struct VerifyEngine {
    config: VerifyConfig,
}

impl VerifyEngine {
    pub fn new(config: VerifyConfig) -> Self {
        VerifyEngine { config }
    }

    /// Execute the verification, returning the full report
    pub fn run(&self) -> Result<VerifyReport> {
        self.config.validate()?;

        if !crate::utils::dir_exists(&self.config.backup_dir) {
            return Err(BackupError::configuration("backup directory does not exist")
                .with_context("dir", self.config.backup_dir.display()));
        }

        info!("verifying backup {}", self.config.backup_dir.display());

        let snapshot_dir = self.config.backup_dir.join("snapshots");
        let txnlog_dir = self.config.backup_dir.join("txnlogs");

        let mut files = validate_backup_files(&snapshot_dir, &txnlog_dir)?;

        let mut report = VerifyReport {
            backup_dir: self.config.backup_dir.clone(),
            total_files: files.len(),
            ..Default::default()
        };

        let corrupted: Vec<PathBuf> = files
            .iter()
            .filter(|(_, result)| !result.is_valid)
            .map(|(path, _)| path.clone())
            .collect();

        report.valid_files = files.len() - corrupted.len();
        report.corrupted_files = corrupted.len();

        if self.config.fix {
            for path in &corrupted {
                if determine_file_type(path) != FileType::TxnLog {
                    continue;
                }

                info!("attempting to repair {}", path.display());
                match repair_txnlog_in_place(path) {
                    Ok(result) => {
                        report.repaired_files += 1;
                        info!("file repaired successfully: {}", path.display());
                        files.insert(path.clone(), result);
                    }
                    Err(e) => warn!("repair failed for {}: {}", path.display(), e),
                }
            }
        }

        report.files = files;

        info!("verification completed: {}", report.summary());

        Ok(report)
    }
}
