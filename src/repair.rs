//! Transaction log repair and filtered copy
//!
//! Repair never touches the input: it produces a new file containing the
//! input's longest valid prefix and re-validates it before declaring
//! success. The underlying filtered copy writes each surviving record
//! through with its stored checksum, length and body untouched, so the
//! output is byte-identical to the input over the records it keeps.
//!
//! Corruption while reading the source is deliberately swallowed by the
//! copy loop. That is the entire repair mechanism: the copy simply ends at
//! the last record that read back cleanly.

use crate::error::{BackupError, Result};
use crate::txnlog::{TxnLogReader, TxnLogWriter};
use crate::utils;
use crate::validator::{validate_txnlog, ValidationResult};
use crate::zxid::Zxid;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Repair a corrupted transaction log by truncating to the last valid record
///
/// The repaired copy is written to `output` and validated before returning.
/// An input that is already valid is copied to `output` verbatim, so the
/// output exists in every success case. An input with no valid records
/// cannot be repaired and fails with a corruption error.
pub fn repair_txnlog(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<ValidationResult> {
    let input = input.as_ref();
    let output = output.as_ref();

    let result = validate_txnlog(input)?;

    if result.is_valid {
        debug!("{} is intact, copying verbatim", input.display());
        utils::copy_file(input, output)?;
        return Ok(result);
    }

    if result.valid_count == 0 {
        return Err(BackupError::corruption("no valid transactions found")
            .with_context("path", input.display()));
    }

    info!(
        "repairing {}: truncating to {} ({} records)",
        input.display(),
        result.last_valid_zxid,
        result.valid_count
    );

    copy_txnlog_until_zxid(input, output, result.last_valid_zxid)?;

    let repaired = validate_txnlog(output).map_err(|e| {
        BackupError::io("repaired file validation failed")
            .with_context("output_path", output.display())
            .with_source(e)
    })?;

    if !repaired.is_valid {
        return Err(
            BackupError::corruption("repair file validation failed, file still corrupted")
                .with_context("output_path", output.display()),
        );
    }

    Ok(repaired)
}

/// Repair a corrupted transaction log where it stands
///
/// The truncated copy is written to a `.repaired` sibling, then swapped in
/// via remove + copy + remove. Returns the validation result of the
/// repaired file.
pub fn repair_txnlog_in_place(path: impl AsRef<Path>) -> Result<ValidationResult> {
    let path = path.as_ref();

    let mut repaired_os = path.as_os_str().to_os_string();
    repaired_os.push(".repaired");
    let repaired_path = std::path::PathBuf::from(repaired_os);

    let result = repair_txnlog(path, &repaired_path)?;

    utils::remove_file(path)?;
    utils::copy_file(&repaired_path, path)?;
    utils::remove_file(&repaired_path)?;

    Ok(result)
}

/// Copy records with ZXID at or below `max_zxid` into a new log file
pub fn copy_txnlog_until_zxid(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    max_zxid: Zxid,
) -> Result<usize> {
    copy_txnlog_with_filter(input.as_ref(), output.as_ref(), |zxid| zxid <= max_zxid)
}

/// Copy records with ZXID at or above `min_zxid` into a new log file
pub fn copy_txnlog_from_zxid(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    min_zxid: Zxid,
) -> Result<usize> {
    copy_txnlog_with_filter(input.as_ref(), output.as_ref(), |zxid| zxid >= min_zxid)
}

/// Copy the records matching `filter`, preserving the input's header and
/// every surviving record's bytes
///
/// Reading stops silently at the first corrupted record. If no record
/// matches, the partial output is removed and the call fails with a user
/// error; nothing is syncd until at least one record has been written.
fn copy_txnlog_with_filter(
    input: &Path,
    output: &Path,
    filter: impl Fn(Zxid) -> bool,
) -> Result<usize> {
    let mut reader = TxnLogReader::open(input)?;
    let header = *reader.header();

    let mut writer = TxnLogWriter::create(output, &header)?;
    let mut copied = 0usize;

    loop {
        let txn = match reader.read_transaction() {
            Ok(Some(txn)) => txn,
            // clean EOF, or a corrupted suffix this copy leaves behind
            Ok(None) | Err(_) => break,
        };

        if !filter(txn.zxid) {
            continue;
        }

        writer.write_transaction(&txn)?;
        copied += 1;
    }

    if copied == 0 {
        writer.close();
        let _ = fs::remove_file(output);
        return Err(BackupError::user("no transactions to copy")
            .with_context("input_path", input.display()));
    }

    writer.sync().map_err(|e| {
        BackupError::io("failed to sync")
            .with_context("output_path", output.display())
            .with_source(e)
    })?;

    debug!(
        "copied {} records from {} to {}",
        copied,
        input.display(),
        output.display()
    );

    Ok(copied)
}
