//! Backup orchestrator
//!
//! One sequential pass: precheck, probe the live cluster for its current
//! ZXID (best effort), mirror every snapshot and transaction log into a
//! dated backup directory, optionally validate and repair the copies, then
//! write the metadata document and manifest.
//!
//! A failure after directory creation leaves the partial backup directory
//! in place for post-mortem; nothing is rolled back automatically.

use crate::config::BackupConfig;
use crate::error::{BackupError, Result};
use crate::metadata::BackupInfo;
use crate::repair::repair_txnlog_in_place;
use crate::snapshot::{get_snapshot_info, list_snapshot_files};
use crate::txnlog::{file_name_string, get_txnlog_info, list_txnlog_files};
use crate::utils;
use crate::validator::validate_backup_files;
use crate::zk::ZooKeeperProbe;
use crate::zxid::{determine_file_type, FileType, Zxid};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// The subdirectories of every backup directory; `logs` is reserved
const BACKUP_SUBDIRS: [&str; 4] = ["metadata", "logs", "txnlogs", "snapshots"];

/// Drives one backup run
///
/// The optional probe supplies the live cluster's version and current ZXID;
/// without one (or when it fails) the backup proceeds with a zero ZXID.
pub struct BackupEngine<'a> {
    config: BackupConfig,
    probe: Option<&'a dyn ZooKeeperProbe>,
}

impl<'a> BackupEngine<'a> {
    /// Engine with no live-cluster probe
    pub fn new(config: BackupConfig) -> Self {
        BackupEngine {
            config,
            probe: None,
        }
    }

    /// Attach a live-cluster probe
    pub fn with_probe(mut self, probe: &'a dyn ZooKeeperProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Execute the backup, returning the metadata document that was written
    pub fn run(&mut self) -> Result<BackupInfo> {
        let start = Instant::now();

        self.config.validate()?;

        info!(
            "starting backup {} (data={}, logs={}, output={})",
            self.config.backup_id,
            self.config.zk_data_dir.display(),
            self.config.zk_log_dir.display(),
            self.config.output_dir.display()
        );

        self.pre_check()?;

        let (current_zxid, zk_version) = self.probe_cluster();

        let backup_dir = self.config.output_dir.join(&self.config.backup_id);
        self.create_backup_dirs(&backup_dir)?;

        let mut backup_info = BackupInfo::new(self.config.backup_id.clone(), current_zxid);
        backup_info.zookeeper.version = zk_version;
        backup_info.zookeeper.host = self.config.zk_host.clone();
        backup_info.zookeeper.data_dir = self.config.zk_data_dir.display().to_string();
        backup_info.zookeeper.log_dir = self.config.zk_log_dir.display().to_string();
        backup_info.validation.enabled = self.config.verify;

        info!("backing up snapshot files");
        self.backup_snapshots(&backup_dir, &mut backup_info)?;

        info!("backing up txnlog files");
        self.backup_txnlogs(&backup_dir, &mut backup_info)?;

        if self.config.verify {
            info!("verifying backup");
            self.verify_backup(&backup_dir, &mut backup_info)?;
        }

        let total_size = match utils::dir_size(&backup_dir) {
            Ok(size) => size,
            Err(e) => {
                warn!("failed to calculate backup size: {}", e);
                0
            }
        };
        backup_info.update_statistics(total_size, None, start.elapsed());

        self.save_metadata(&backup_dir, &backup_info)?;

        info!(
            "backup {} completed: {} in {:.2}s",
            self.config.backup_id,
            utils::format_bytes(total_size),
            start.elapsed().as_secs_f64()
        );

        Ok(backup_info)
    }

    /// Path of the backup directory this run creates
    pub fn backup_dir(&self) -> PathBuf {
        self.config.output_dir.join(&self.config.backup_id)
    }

    fn pre_check(&self) -> Result<()> {
        utils::ensure_dir(&self.config.output_dir)
            .map_err(|e| e.with_context("precheck", "output directory is not writable"))?;

        if !utils::dir_exists(&self.config.zk_log_dir) {
            return Err(BackupError::configuration("log directory does not exist")
                .with_context("dir", self.config.zk_log_dir.display()));
        }

        if !utils::dir_exists(&self.config.zk_data_dir) {
            return Err(BackupError::configuration("data directory does not exist")
                .with_context("dir", self.config.zk_data_dir.display()));
        }

        Ok(())
    }

    fn create_backup_dirs(&self, backup_dir: &Path) -> Result<()> {
        for sub in BACKUP_SUBDIRS {
            utils::ensure_dir(backup_dir.join(sub))?;
        }
        Ok(())
    }

    /// Best-effort probe; every failure is a warning and a zero ZXID
    fn probe_cluster(&self) -> (Zxid, String) {
        let probe = match self.probe {
            Some(probe) => probe,
            None => return (Zxid::ZERO, "unknown".to_string()),
        };

        let version = probe
            .version()
            .unwrap_or_else(|_| "unknown".to_string());

        match probe.current_zxid() {
            Ok(zxid) => (zxid, version),
            Err(e) => {
                warn!(
                    "failed to get current zxid from zookeeper, will use local files: {}",
                    e
                );
                (Zxid::ZERO, version)
            }
        }
    }

    fn backup_snapshots(&self, backup_dir: &Path, backup_info: &mut BackupInfo) -> Result<()> {
        let snapshots = list_snapshot_files(&self.config.zk_data_dir)?;
        let snapshot_dir = backup_dir.join("snapshots");

        for snapshot in &snapshots {
            debug!("copying snapshot {}", snapshot.display());
            utils::copy_file(snapshot, snapshot_dir.join(file_name_string(snapshot)))?;

            match get_snapshot_info(snapshot) {
                Ok(info) => backup_info.add_snapshot(info),
                Err(e) => warn!("failed to get snapshot info: {}", e),
            }
        }

        info!("snapshot backup completed: {} files", snapshots.len());
        Ok(())
    }

    fn backup_txnlogs(&self, backup_dir: &Path, backup_info: &mut BackupInfo) -> Result<()> {
        let txnlogs = list_txnlog_files(&self.config.zk_log_dir)?;
        let txnlog_dir = backup_dir.join("txnlogs");

        for txnlog in &txnlogs {
            debug!("copying txnlog {}", txnlog.display());
            utils::copy_file(txnlog, txnlog_dir.join(file_name_string(txnlog)))?;

            match get_txnlog_info(txnlog) {
                Ok(info) => backup_info.add_txnlog(info),
                Err(e) => warn!("failed to get txnlog info: {}", e),
            }
        }

        info!("txnlog backup completed: {} files", txnlogs.len());
        Ok(())
    }

    /// Validate the copies; corrupted logs are repaired in place and tallied,
    /// never fatal
    fn verify_backup(&self, backup_dir: &Path, backup_info: &mut BackupInfo) -> Result<()> {
        let snapshot_dir = backup_dir.join("snapshots");
        let txnlog_dir = backup_dir.join("txnlogs");

        let results = validate_backup_files(&snapshot_dir, &txnlog_dir)?;

        let mut valid_files = 0;
        let mut corrupted_files = 0;
        let mut repaired_files = 0;

        for (path, result) in &results {
            if result.is_valid {
                valid_files += 1;
                continue;
            }

            corrupted_files += 1;
            warn!(
                "file validation failed: {} ({})",
                path.display(),
                result.corruption_kind.as_deref().unwrap_or("unknown")
            );

            if determine_file_type(path) == FileType::TxnLog {
                info!("attempting to repair {}", path.display());
                match repair_txnlog_in_place(path) {
                    Ok(_) => {
                        repaired_files += 1;
                        info!("file repaired successfully: {}", path.display());
                    }
                    Err(e) => warn!("repair failed for {}: {}", path.display(), e),
                }
            }
        }

        backup_info.update_validation(valid_files, corrupted_files, repaired_files);

        info!(
            "verification completed: total={} valid={} corrupted={} repaired={}",
            results.len(),
            valid_files,
            corrupted_files,
            repaired_files
        );

        Ok(())
    }

    fn save_metadata(&self, backup_dir: &Path, backup_info: &BackupInfo) -> Result<()> {
        let metadata_dir = backup_dir.join("metadata");

        backup_info.save_to_file(metadata_dir.join("backup_info.json"))?;

        let manifest = backup_info.generate_manifest();
        if let Err(e) = utils::write_file(metadata_dir.join("MANIFEST.txt"), manifest.as_bytes()) {
            warn!("failed to write manifest: {}", e);
        }

        info!("metadata saved to {}", metadata_dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txnlog::{LogStatus, Transaction, TxnLogHeader, TxnLogWriter};
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    struct StubProbe {
        zxid: Option<Zxid>,
    }

    impl ZooKeeperProbe for StubProbe {
        fn version(&self) -> Result<String> {
            Ok("3.8.4".to_string())
        }

        fn current_zxid(&self) -> Result<Zxid> {
            self.zxid
                .ok_or_else(|| BackupError::zookeeper("probe unavailable"))
        }
    }

    fn write_log(path: &Path, zxids: &[u64]) {
        let mut writer = TxnLogWriter::create(path, &TxnLogHeader::new(12345)).unwrap();
        for &zxid in zxids {
            let txn = Transaction::build(1, 0, Zxid(zxid), 1_700_000_000, 1, b"body");
            writer.write_transaction(&txn).unwrap();
        }
        writer.sync().unwrap();
        writer.close();
    }

    fn source_dirs(tmp: &TempDir) -> (PathBuf, PathBuf) {
        let data_dir = tmp.path().join("data");
        let log_dir = tmp.path().join("datalog");
        fs::create_dir_all(&data_dir).unwrap();
        fs::create_dir_all(&log_dir).unwrap();

        fs::write(data_dir.join("snapshot.100000000"), b"opaque state").unwrap();
        write_log(&log_dir.join("log.100000000"), &[0x100000000, 0x100000001]);

        (data_dir, log_dir)
    }

    fn config(tmp: &TempDir, data_dir: &Path, log_dir: &Path) -> BackupConfig {
        BackupConfig {
            zk_data_dir: data_dir.to_path_buf(),
            zk_log_dir: log_dir.to_path_buf(),
            output_dir: tmp.path().join("backups"),
            backup_id: "backup-test".to_string(),
            verify: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_backup_run() {
        let tmp = TempDir::new().unwrap();
        let (data_dir, log_dir) = source_dirs(&tmp);

        let probe = StubProbe {
            zxid: Some(Zxid(0x100000001)),
        };
        let mut engine = BackupEngine::new(config(&tmp, &data_dir, &log_dir)).with_probe(&probe);
        let info = engine.run().unwrap();

        let backup_dir = tmp.path().join("backups/backup-test");
        for sub in BACKUP_SUBDIRS {
            assert!(backup_dir.join(sub).is_dir());
        }
        assert!(backup_dir.join("snapshots/snapshot.100000000").is_file());
        assert!(backup_dir.join("txnlogs/log.100000000").is_file());
        assert!(backup_dir.join("metadata/backup_info.json").is_file());
        assert!(backup_dir.join("metadata/MANIFEST.txt").is_file());

        assert_eq!(info.backup_zxid.decimal, 0x100000001);
        assert_eq!(info.zookeeper.version, "3.8.4");
        assert_eq!(info.files.snapshots.len(), 1);
        assert_eq!(info.files.txnlogs.len(), 1);
        assert_eq!(info.files.txnlogs[0].status, LogStatus::Valid);
        assert_eq!(info.validation.total_files, 2);
        assert_eq!(info.validation.valid_files, 2);
        assert_eq!(info.validation.corrupted_files, 0);
        assert!(info.statistics.total_size > 0);
    }

    #[test]
    fn test_backup_probe_failure_is_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let (data_dir, log_dir) = source_dirs(&tmp);

        let probe = StubProbe { zxid: None };
        let mut engine = BackupEngine::new(config(&tmp, &data_dir, &log_dir)).with_probe(&probe);
        let info = engine.run().unwrap();

        assert_eq!(info.backup_zxid.decimal, 0);
        assert_eq!(info.backup_zxid.hex, "0");
    }

    #[test]
    fn test_backup_repairs_corrupted_copy() {
        let tmp = TempDir::new().unwrap();
        let (data_dir, log_dir) = source_dirs(&tmp);

        // a second log with a corrupted suffix
        let bad = log_dir.join("log.200000000");
        write_log(&bad, &[0x200000000]);
        let mut file = fs::OpenOptions::new().append(true).open(&bad).unwrap();
        file.write_all(&[0xab; 11]).unwrap();
        drop(file);

        let mut engine = BackupEngine::new(config(&tmp, &data_dir, &log_dir));
        let info = engine.run().unwrap();

        assert_eq!(info.validation.corrupted_files, 1);
        assert_eq!(info.validation.repaired_files, 1);
        assert_eq!(info.validation.total_files, 3);

        // the copy in the backup was repaired; the source is untouched
        let copied = tmp.path().join("backups/backup-test/txnlogs/log.200000000");
        assert!(crate::validator::validate_txnlog(&copied).unwrap().is_valid);
        assert!(!crate::validator::validate_txnlog(&bad).unwrap().is_valid);
    }

    #[test]
    fn test_backup_missing_source_dir() {
        let tmp = TempDir::new().unwrap();
        let (data_dir, _) = source_dirs(&tmp);

        let mut engine = BackupEngine::new(config(
            &tmp,
            &data_dir,
            &tmp.path().join("nope"),
        ));
        let err = engine.run().unwrap_err();
        assert_eq!(err.message(), "log directory does not exist");
    }
}
