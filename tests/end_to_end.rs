//! End-to-end scenarios across the whole crate
//!
//! Builds real snapshot and transaction log fixtures on disk, runs the
//! engines against them, and asserts on the files and metadata they leave
//! behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zkbackup::{
    copy_txnlog_until_zxid, get_latest_snapshot, list_snapshot_files, repair_txnlog,
    validate_txnlog, BackupConfig, BackupEngine, BackupInfo, LogStatus, RestoreConfig,
    RestoreEngine, Transaction, TxnLogHeader, TxnLogReader, TxnLogWriter, VerifyConfig,
    VerifyEngine, Zxid,
};

fn write_log(path: &Path, db_id: u64, zxids: &[u64]) {
    let mut writer = TxnLogWriter::create(path, &TxnLogHeader::new(db_id)).unwrap();
    for (i, &zxid) in zxids.iter().enumerate() {
        let txn = Transaction::build(
            500,
            i as i32,
            Zxid(zxid),
            1_700_000_000_000 + i as i64,
            1,
            format!("payload-{}", i).as_bytes(),
        );
        writer.write_transaction(&txn).unwrap();
    }
    writer.sync().unwrap();
    writer.close();
}

fn append_garbage(path: &Path, n: usize) {
    let mut file = fs::OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(&vec![0xa5u8; n]).unwrap();
}

/// A populated pair of source directories: two snapshots, two logs
fn zk_source(tmp: &TempDir) -> (PathBuf, PathBuf) {
    let data_dir = tmp.path().join("data/version-2");
    let log_dir = tmp.path().join("datalog/version-2");
    fs::create_dir_all(&data_dir).unwrap();
    fs::create_dir_all(&log_dir).unwrap();

    fs::write(data_dir.join("snapshot.100000000"), b"12345").unwrap();
    fs::write(data_dir.join("snapshot.200000000"), b"1234567890").unwrap();

    write_log(
        &log_dir.join("log.100000000"),
        12345,
        &[0x100000000, 0x100000001, 0x100000002],
    );
    write_log(
        &log_dir.join("log.200000000"),
        12345,
        &[0x200000000, 0x200000001],
    );

    (data_dir, log_dir)
}

#[test]
fn scenario_validate_fresh_log() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("log.100000000");
    write_log(&path, 12345, &[0x100000000, 0x100000001, 0x100000002]);

    let result = validate_txnlog(&path).unwrap();
    assert!(result.is_valid);
    assert_eq!(result.valid_count, 3);
    assert_eq!(result.last_valid_zxid, Zxid(0x100000002));
}

#[test]
fn scenario_validate_garbage_suffix() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("log.100000000");
    write_log(&path, 12345, &[0x100000000, 0x100000001, 0x100000002]);
    append_garbage(&path, 14);

    let result = validate_txnlog(&path).unwrap();
    assert!(!result.is_valid);
    assert_eq!(result.valid_count, 3);
    assert_ne!(result.corruption_kind.as_deref().unwrap_or(""), "");
}

#[test]
fn scenario_repair_garbage_suffix() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("log.100000000");
    write_log(&path, 12345, &[0x100000000, 0x100000001, 0x100000002]);
    append_garbage(&path, 14);

    let out = tmp.path().join("log.100000000.repaired");
    let result = repair_txnlog(&path, &out).unwrap();
    assert!(result.is_valid);
    assert_eq!(result.valid_count, 3);

    let check = validate_txnlog(&out).unwrap();
    assert!(check.is_valid);
    assert_eq!(check.valid_count, 3);
}

#[test]
fn scenario_filtered_copy_preserves_header() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("log.100000000");
    write_log(&path, 12345, &[0x100000000, 0x100000001, 0x100000002]);

    let out = tmp.path().join("out");
    let copied = copy_txnlog_until_zxid(&path, &out, Zxid(0x100000001)).unwrap();
    assert_eq!(copied, 2);

    let result = validate_txnlog(&out).unwrap();
    assert_eq!(result.valid_count, 2);
    assert_eq!(result.last_valid_zxid, Zxid(0x100000001));

    let reader = TxnLogReader::open(&out).unwrap();
    assert_eq!(reader.header().db_id, 12345);
}

#[test]
fn scenario_snapshot_listing() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("snapshot.100000000"), vec![0u8; 5]).unwrap();
    fs::write(dir.join("snapshot.200000000"), vec![0u8; 10]).unwrap();

    let listed = list_snapshot_files(dir).unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed[0].ends_with("snapshot.100000000"));
    assert!(listed[1].ends_with("snapshot.200000000"));

    let (latest, zxid) = get_latest_snapshot(dir).unwrap();
    assert!(latest.ends_with("snapshot.200000000"));
    assert_eq!(zxid, Zxid(0x200000000));
}

#[test]
fn scenario_backup_then_verify() {
    let tmp = TempDir::new().unwrap();
    let (data_dir, log_dir) = zk_source(&tmp);

    let mut engine = BackupEngine::new(BackupConfig {
        zk_data_dir: data_dir,
        zk_log_dir: log_dir,
        output_dir: tmp.path().join("backups"),
        backup_id: "backup-e2e".to_string(),
        verify: true,
        ..Default::default()
    });
    engine.run().unwrap();

    let backup_dir = tmp.path().join("backups/backup-e2e");

    // independent verification comes back clean
    let report = VerifyEngine::new(VerifyConfig {
        backup_dir: backup_dir.clone(),
        ..Default::default()
    })
    .run()
    .unwrap();
    assert!(report.is_clean());
    assert!(report.files.values().all(|r| r.is_valid));

    // and the persisted document agrees with the file lists
    let info = BackupInfo::load_from_file(backup_dir.join("metadata/backup_info.json")).unwrap();
    assert_eq!(
        info.validation.total_files,
        info.files.snapshots.len() + info.files.txnlogs.len()
    );
    assert_eq!(info.files.snapshots.len(), 2);
    assert_eq!(info.files.txnlogs.len(), 2);
    assert!(info
        .files
        .txnlogs
        .iter()
        .all(|t| t.status == LogStatus::Valid));

    // the manifest names every file
    let manifest = fs::read_to_string(backup_dir.join("metadata/MANIFEST.txt")).unwrap();
    assert!(manifest.contains("Backup ID: backup-e2e"));
    for s in &info.files.snapshots {
        assert!(manifest.contains(&s.name));
    }
    for t in &info.files.txnlogs {
        assert!(manifest.contains(&t.name));
        assert!(manifest.contains("Status: valid"));
    }
}

#[test]
fn scenario_backup_with_corrupted_source_log() {
    let tmp = TempDir::new().unwrap();
    let (data_dir, log_dir) = zk_source(&tmp);

    // corrupt one source log; the backup copy gets repaired, the source not
    let bad = log_dir.join("log.200000000");
    append_garbage(&bad, 9);

    let mut engine = BackupEngine::new(BackupConfig {
        zk_data_dir: data_dir,
        zk_log_dir: log_dir.clone(),
        output_dir: tmp.path().join("backups"),
        backup_id: "backup-corrupt".to_string(),
        verify: true,
        ..Default::default()
    });
    let info = engine.run().unwrap();

    assert_eq!(info.validation.corrupted_files, 1);
    assert_eq!(info.validation.repaired_files, 1);

    let copied = tmp
        .path()
        .join("backups/backup-corrupt/txnlogs/log.200000000");
    let result = validate_txnlog(&copied).unwrap();
    assert!(result.is_valid);
    assert_eq!(result.valid_count, 2);

    assert!(!validate_txnlog(&bad).unwrap().is_valid);

    // the metadata recorded the source log as corrupted at copy time
    assert!(info
        .files
        .txnlogs
        .iter()
        .any(|t| t.name == "log.200000000" && t.status == LogStatus::Corrupted));
}

#[test]
fn scenario_restore_round_trip() {
    let tmp = TempDir::new().unwrap();
    let (data_dir, log_dir) = zk_source(&tmp);

    let mut engine = BackupEngine::new(BackupConfig {
        zk_data_dir: data_dir.clone(),
        zk_log_dir: log_dir.clone(),
        output_dir: tmp.path().join("backups"),
        backup_id: "backup-rt".to_string(),
        verify: true,
        ..Default::default()
    });
    engine.run().unwrap();

    let restore_data = tmp.path().join("restore/data");
    let restore_log = tmp.path().join("restore/datalog");

    RestoreEngine::new(RestoreConfig {
        backup_dir: tmp.path().join("backups/backup-rt"),
        zk_data_dir: restore_data.clone(),
        zk_log_dir: restore_log.clone(),
        force: true,
        ..Default::default()
    })
    .run()
    .unwrap();

    // every file made it back, byte for byte
    for name in ["snapshot.100000000", "snapshot.200000000"] {
        assert_eq!(
            fs::read(restore_data.join(name)).unwrap(),
            fs::read(data_dir.join(name)).unwrap()
        );
    }
    for name in ["log.100000000", "log.200000000"] {
        assert_eq!(
            fs::read(restore_log.join(name)).unwrap(),
            fs::read(log_dir.join(name)).unwrap()
        );
    }
}

#[test]
fn scenario_restore_with_truncation() {
    let tmp = TempDir::new().unwrap();
    let (data_dir, log_dir) = zk_source(&tmp);

    let mut engine = BackupEngine::new(BackupConfig {
        zk_data_dir: data_dir,
        zk_log_dir: log_dir,
        output_dir: tmp.path().join("backups"),
        backup_id: "backup-tr".to_string(),
        verify: false,
        ..Default::default()
    });
    engine.run().unwrap();

    let restore_data = tmp.path().join("restore/data");
    let restore_log = tmp.path().join("restore/datalog");

    RestoreEngine::new(RestoreConfig {
        backup_dir: tmp.path().join("backups/backup-tr"),
        zk_data_dir: restore_data,
        zk_log_dir: restore_log.clone(),
        force: true,
        truncate_to_zxid: Some(Zxid(0x100000001)),
        ..Default::default()
    })
    .run()
    .unwrap();

    // the first log was truncated at the ceiling
    let result = validate_txnlog(restore_log.join("log.100000000")).unwrap();
    assert!(result.is_valid);
    assert_eq!(result.valid_count, 2);
    assert_eq!(result.last_valid_zxid, Zxid(0x100000001));

    // the second log starts beyond the ceiling and was skipped entirely
    assert!(!restore_log.join("log.200000000").exists());
}

#[test]
fn scenario_restore_stashes_existing_data() {
    let tmp = TempDir::new().unwrap();
    let (data_dir, log_dir) = zk_source(&tmp);

    let mut engine = BackupEngine::new(BackupConfig {
        zk_data_dir: data_dir,
        zk_log_dir: log_dir,
        output_dir: tmp.path().join("backups"),
        backup_id: "backup-st".to_string(),
        verify: false,
        ..Default::default()
    });
    engine.run().unwrap();

    // targets already hold older state
    let restore_data = tmp.path().join("live/data");
    let restore_log = tmp.path().join("live/datalog");
    fs::create_dir_all(&restore_data).unwrap();
    fs::create_dir_all(&restore_log).unwrap();
    fs::write(restore_data.join("snapshot.50"), b"stale").unwrap();
    write_log(&restore_log.join("log.50"), 1, &[0x50]);

    RestoreEngine::new(RestoreConfig {
        backup_dir: tmp.path().join("backups/backup-st"),
        zk_data_dir: restore_data.clone(),
        zk_log_dir: restore_log.clone(),
        force: true,
        ..Default::default()
    })
    .run()
    .unwrap();

    // old files were moved aside, not destroyed
    assert!(!restore_data.join("snapshot.50").exists());
    let stashes: Vec<_> = fs::read_dir(tmp.path().join("live"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".pre-restore-"))
        .collect();
    assert_eq!(stashes.len(), 2);

    // and the restored files are in place
    assert!(restore_data.join("snapshot.100000000").is_file());
    assert!(restore_log.join("log.100000000").is_file());
}

#[test]
fn scenario_restore_refuses_corrupted_backup() {
    let tmp = TempDir::new().unwrap();
    let (data_dir, log_dir) = zk_source(&tmp);

    let mut engine = BackupEngine::new(BackupConfig {
        zk_data_dir: data_dir,
        zk_log_dir: log_dir,
        output_dir: tmp.path().join("backups"),
        backup_id: "backup-bad".to_string(),
        verify: false,
        ..Default::default()
    });
    engine.run().unwrap();

    // corrupt a copy inside the backup after the fact
    let backup_dir = tmp.path().join("backups/backup-bad");
    append_garbage(&backup_dir.join("txnlogs/log.100000000"), 6);

    let err = RestoreEngine::new(RestoreConfig {
        backup_dir: backup_dir.clone(),
        zk_data_dir: tmp.path().join("restore/data"),
        zk_log_dir: tmp.path().join("restore/datalog"),
        force: true,
        ..Default::default()
    })
    .run()
    .unwrap_err();
    assert_eq!(err.message(), "file validation failed");

    // skip_verify lets it through regardless
    RestoreEngine::new(RestoreConfig {
        backup_dir,
        zk_data_dir: tmp.path().join("restore/data"),
        zk_log_dir: tmp.path().join("restore/datalog"),
        force: true,
        skip_verify: true,
        ..Default::default()
    })
    .run()
    .unwrap();
}

#[test]
fn scenario_verify_fix_round_trip() {
    let tmp = TempDir::new().unwrap();
    let (data_dir, log_dir) = zk_source(&tmp);

    let mut engine = BackupEngine::new(BackupConfig {
        zk_data_dir: data_dir,
        zk_log_dir: log_dir,
        output_dir: tmp.path().join("backups"),
        backup_id: "backup-fix".to_string(),
        verify: false,
        ..Default::default()
    });
    engine.run().unwrap();

    let backup_dir = tmp.path().join("backups/backup-fix");
    append_garbage(&backup_dir.join("txnlogs/log.100000000"), 21);

    let report = VerifyEngine::new(VerifyConfig {
        backup_dir: backup_dir.clone(),
        fix: true,
        ..Default::default()
    })
    .run()
    .unwrap();

    assert_eq!(report.corrupted_files, 1);
    assert_eq!(report.repaired_files, 1);
    assert!(report.is_clean());

    // a second pass finds nothing to do
    let report = VerifyEngine::new(VerifyConfig {
        backup_dir,
        ..Default::default()
    })
    .run()
    .unwrap();
    assert_eq!(report.corrupted_files, 0);
    assert_eq!(report.valid_files, report.total_files);
}
