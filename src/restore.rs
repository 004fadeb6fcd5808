//! Restore orchestrator
//!
//! Restores a backup directory into live ZooKeeper data and log
//! directories. Before anything is copied the backup is re-validated (the
//! metadata's word is not taken for it), the operator has to confirm, and
//! whatever currently sits in the target directories is moved aside into a
//! timestamped sibling so a botched restore is never a data loss.

use crate::config::RestoreConfig;
use crate::error::{BackupError, Result};
use crate::metadata::BackupInfo;
use crate::repair::copy_txnlog_until_zxid;
use crate::snapshot::list_snapshot_files;
use crate::txnlog::{file_name_string, list_txnlog_files};
use crate::utils;
use crate::validator::validate_backup_files;
use crate::zxid::parse_zxid_from_file_name;
use chrono::Local;
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Drives one restore run
pub struct RestoreEngine {
    config: RestoreConfig,
}

impl RestoreEngine {
    pub fn new(config: RestoreConfig) -> Self {
        RestoreEngine { config }
    }

    /// Execute the restore
    pub fn run(&self) -> Result<()> {
        self.config.validate()?;

        info!(
            "starting restore from {} (data={}, logs={})",
            self.config.backup_dir.display(),
            self.config.zk_data_dir.display(),
            self.config.zk_log_dir.display()
        );

        let backup_info = self.load_backup_info()?;

        if !self.config.skip_verify {
            info!("verifying backup before restore");
            self.verify_backup()?;
        }

        if !self.config.force && !self.config.dry_run && !self.confirm_restore(&backup_info)? {
            return Err(BackupError::user("restore cancelled by user"));
        }

        if self.config.dry_run {
            self.show_dry_run(&backup_info);
            return Ok(());
        }

        self.backup_existing_data()?;

        info!("restoring snapshot files");
        self.restore_snapshots()?;

        info!("restoring txnlog files");
        self.restore_txnlogs()?;

        info!("restore completed successfully");

        self.print_next_steps(&backup_info);

        Ok(())
    }

    fn load_backup_info(&self) -> Result<BackupInfo> {
        BackupInfo::load_from_file(
            self.config
                .backup_dir
                .join("metadata")
                .join("backup_info.json"),
        )
    }

    /// Fail on the first corrupted file; a restore never proceeds from a
    /// backup that does not validate
    fn verify_backup(&self) -> Result<()> {
        let snapshot_dir = self.config.backup_dir.join("snapshots");
        let txnlog_dir = self.config.backup_dir.join("txnlogs");

        let results = validate_backup_files(&snapshot_dir, &txnlog_dir)?;

        for (path, result) in &results {
            if !result.is_valid {
                return Err(BackupError::validation("file validation failed")
                    .with_context("file", path.display())
                    .with_context(
                        "corruption",
                        result.corruption_kind.as_deref().unwrap_or("unknown"),
                    ));
            }
        }

        Ok(())
    }

    /// Prompt for a literal `yes` on stdin
    fn confirm_restore(&self, backup_info: &BackupInfo) -> Result<bool> {
        println!("You are about to restore ZooKeeper data:");
        println!("  Backup ID: {}", backup_info.backup_id);
        println!("  Backup ZXID: 0x{}", backup_info.backup_zxid.hex);
        println!("  Target Log Dir: {}", self.config.zk_log_dir.display());
        println!("  Target Data Dir: {}", self.config.zk_data_dir.display());
        println!(
            "  Backup Time: {}",
            backup_info.backup_timestamp.format("%Y-%m-%d %H:%M:%S")
        );
        println!("This will overwrite existing data! Type 'yes' to continue:");

        let mut response = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut response)
            .map_err(|e| BackupError::io("failed to read confirmation").with_source(e))?;

        Ok(response.trim() == "yes")
    }

    fn show_dry_run(&self, backup_info: &BackupInfo) {
        println!("Would restore:");
        println!("- {} txnlog files", backup_info.files.txnlogs.len());
        println!("- {} snapshot files", backup_info.files.snapshots.len());
        if let Some(zxid) = self.config.truncate_to_zxid {
            println!("- truncating transactions beyond {}", zxid);
        }
    }

    /// Move whatever currently sits in the target directories into a
    /// timestamped sibling before touching them
    fn backup_existing_data(&self) -> Result<()> {
        let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();

        for dir in [&self.config.zk_data_dir, &self.config.zk_log_dir] {
            stash_existing_files(dir, &stamp)?;
        }

        Ok(())
    }

    fn restore_snapshots(&self) -> Result<()> {
        let snapshot_dir = self.config.backup_dir.join("snapshots");

        for snapshot in list_snapshot_files(&snapshot_dir)? {
            let dst = self.config.zk_data_dir.join(file_name_string(&snapshot));
            utils::copy_file(&snapshot, &dst)?;
            debug!("restored snapshot {}", file_name_string(&snapshot));
        }

        Ok(())
    }

    fn restore_txnlogs(&self) -> Result<()> {
        let txnlog_dir = self.config.backup_dir.join("txnlogs");

        for txnlog in list_txnlog_files(&txnlog_dir)? {
            let dst = self.config.zk_log_dir.join(file_name_string(&txnlog));

            match self.config.truncate_to_zxid {
                Some(ceiling) => {
                    let start_zxid = parse_zxid_from_file_name(&txnlog)?;
                    if start_zxid > ceiling {
                        info!(
                            "skipping {}: starts beyond {}",
                            file_name_string(&txnlog),
                            ceiling
                        );
                        continue;
                    }
                    let copied = copy_txnlog_until_zxid(&txnlog, &dst, ceiling)?;
                    debug!(
                        "restored txnlog {} ({} records kept)",
                        file_name_string(&txnlog),
                        copied
                    );
                }
                None => {
                    utils::copy_file(&txnlog, &dst)?;
                    debug!("restored txnlog {}", file_name_string(&txnlog));
                }
            }
        }

        Ok(())
    }

    fn print_next_steps(&self, backup_info: &BackupInfo) {
        println!("Next steps:");
        println!("1. Start ZooKeeper:");
        println!("   zkServer.sh start");
        println!("2. Verify ZXID:");
        println!("   echo mntr | nc localhost 2181 | grep zk_zxid");
        println!("   Expected: 0x{}", backup_info.backup_zxid.hex);
        println!("3. Verify data integrity:");
        println!("   zkCli.sh -server localhost:2181");
        println!("   ls /");
    }
}

/// Move the snapshot and log files already in `dir` to a
/// `<dir>.pre-restore-<stamp>` sibling; creates `dir` if it is missing
fn stash_existing_files(dir: &Path, stamp: &str) -> Result<()> {
    if !utils::dir_exists(dir) {
        return utils::ensure_dir(dir);
    }

    let mut existing: Vec<PathBuf> = Vec::new();
    for prefix in ["snapshot.", "log."] {
        existing.extend(utils::list_prefixed_files(dir, prefix)?);
    }

    if existing.is_empty() {
        return Ok(());
    }

    let stash = PathBuf::from(format!("{}.pre-restore-{}", dir.display(), stamp));
    utils::ensure_dir(&stash)?;

    for file in &existing {
        let dst = stash.join(file_name_string(file));
        fs::rename(file, &dst).map_err(|e| {
            BackupError::io("failed to move existing file")
                .with_context("src", file.display())
                .with_context("dst", dst.display())
                .with_source(e)
        })?;
    }

    info!(
        "moved {} existing files to {}",
        existing.len(),
        stash.display()
    );

    Ok(())
}
