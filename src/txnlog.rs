//! Transaction log codec
//!
//! Reader and writer for ZooKeeper's append-only transaction log format.
//!
//! # File Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Header (16 bytes)                           │
//! │   magic   u32 = 0x5A4B4C47 ("ZKLG")         │
//! │   version u32 = 2                           │
//! │   db_id   u64                               │
//! ├─────────────────────────────────────────────┤
//! │ Record 1                                    │
//! ├─────────────────────────────────────────────┤
//! │ ...                                         │
//! └─────────────────────────────────────────────┘
//!
//! Record:
//! ┌──────────────┬─────────────┬────────────────┐
//! │ checksum i64 │ length i32  │ body[length]   │
//! └──────────────┴─────────────┴────────────────┘
//!
//! Body prefix (32 bytes):
//! ┌───────────────┬──────────┬──────────┬───────────────┬──────────┐
//! │ client_id i64 │ cxid i32 │ zxid u64 │ timestamp i64 │ type i32 │
//! └───────────────┴──────────┴──────────┴───────────────┴──────────┘
//! ```
//!
//! Everything is big-endian with fixed-width integers. The checksum is
//! Adler-32 of the body, zero-extended into the low 32 bits of an `i64`.
//! Body bytes past the 32-byte prefix are opaque and preserved verbatim by
//! every copy operation in this crate.
//!
//! The reader validates the header on open and verifies each record's
//! checksum and meta on read; it never advances past a failed record. The
//! writer emits exactly the bytes it is handed and never recomputes a
//! checksum, which is what lets filtered copies stay byte-identical to
//! their source.

use crate::error::{BackupError, Result};
use crate::utils;
use crate::zxid::{parse_zxid_from_file_name, Zxid};
use adler32::RollingAdler32;
use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Magic number for TxnLog files ("ZKLG")
pub const TXNLOG_MAGIC: u32 = 0x5a4b_4c47;

/// The only supported log format version
pub const LOG_VERSION: u32 = 2;

/// Maximum size of a single record body (10 MiB)
pub const MAX_RECORD_SIZE: i32 = 10 * 1024 * 1024;

/// Size of the file header in bytes
pub const HEADER_SIZE: u64 = 16;

/// Fixed 16-byte header written once at file creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxnLogHeader {
    /// Always [`TXNLOG_MAGIC`]
    pub magic: u32,
    /// Always [`LOG_VERSION`]
    pub version: u32,
    /// Cluster database identifier, preserved across copies
    pub db_id: u64,
}

impl TxnLogHeader {
    /// Header for a new log belonging to database `db_id`
    pub fn new(db_id: u64) -> Self {
        TxnLogHeader {
            magic: TXNLOG_MAGIC,
            version: LOG_VERSION,
            db_id,
        }
    }
}

/// One framed transaction record
///
/// `checksum`, `length` and `data` are the wire fields; the remaining fields
/// are parsed out of the first 32 bytes of `data` on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Adler-32 of `data`, zero-extended; written as stored, never recomputed
    pub checksum: i64,
    /// Body length in bytes
    pub length: i32,
    /// Complete record body, meta prefix included
    pub data: Vec<u8>,

    /// Session that issued the transaction
    pub client_id: i64,
    /// Client-side transaction counter
    pub cxid: i32,
    /// Cluster transaction identifier
    pub zxid: Zxid,
    /// Commit timestamp (milliseconds)
    pub timestamp: i64,
    /// Transaction type code
    pub txn_type: i32,
}

impl Transaction {
    /// Size of the meta prefix at the start of every record body
    pub const META_SIZE: usize = 32;

    /// Assemble a record from its fields, encoding the body and computing a
    /// consistent checksum
    pub fn build(
        client_id: i64,
        cxid: i32,
        zxid: Zxid,
        timestamp: i64,
        txn_type: i32,
        payload: &[u8],
    ) -> Transaction {
        let mut data = Vec::with_capacity(Self::META_SIZE + payload.len());
        data.extend_from_slice(&client_id.to_be_bytes());
        data.extend_from_slice(&cxid.to_be_bytes());
        data.extend_from_slice(&zxid.0.to_be_bytes());
        data.extend_from_slice(&timestamp.to_be_bytes());
        data.extend_from_slice(&txn_type.to_be_bytes());
        data.extend_from_slice(payload);

        let checksum = i64::from(RollingAdler32::from_buffer(&data).hash());

        Transaction {
            checksum,
            length: data.len() as i32,
            data,
            client_id,
            cxid,
            zxid,
            timestamp,
            txn_type,
        }
    }

    /// Parse the 32-byte meta prefix of a record body
    fn parse_meta(data: &[u8]) -> Result<(i64, i32, Zxid, i64, i32)> {
        if data.len() < Self::META_SIZE {
            return Err(
                BackupError::corruption("invalid data length").with_context("length", data.len())
            );
        }

        Ok((
            BigEndian::read_i64(&data[0..8]),
            BigEndian::read_i32(&data[8..12]),
            Zxid(BigEndian::read_u64(&data[12..20])),
            BigEndian::read_i64(&data[20..28]),
            BigEndian::read_i32(&data[28..32]),
        ))
    }
}

/// Validation status of a transaction log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    /// Header and every record read back cleanly
    Valid,
    /// The file has a corrupted suffix
    Corrupted,
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogStatus::Valid => f.write_str("valid"),
            LogStatus::Corrupted => f.write_str("corrupted"),
        }
    }
}

/// Summary of one transaction log file, as persisted in backup metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnLogInfo {
    /// File name (`log.<hex-zxid>`)
    pub name: String,
    /// ZXID advertised by the file name
    pub start_zxid: Zxid,
    /// ZXID of the last valid record, or `start_zxid` if there are none
    pub end_zxid: Zxid,
    /// File size in bytes
    pub size: u64,
    /// Whether the file validated cleanly
    pub status: LogStatus,
    /// Number of valid records
    pub transaction_count: usize,
}

/// Extract [`TxnLogInfo`] from a log file, fully validating it
pub fn get_txnlog_info(path: impl AsRef<Path>) -> Result<TxnLogInfo> {
    let path = path.as_ref();
    let size = utils::file_size(path)?;
    let start_zxid = parse_zxid_from_file_name(path)?;

    let result = crate::validator::validate_txnlog(path)?;

    let status = if result.is_valid {
        LogStatus::Valid
    } else {
        LogStatus::Corrupted
    };

    let end_zxid = result.zxids.last().copied().unwrap_or(start_zxid);

    Ok(TxnLogInfo {
        name: file_name_string(path),
        start_zxid,
        end_zxid,
        size,
        status,
        transaction_count: result.valid_count,
    })
}

/// All transaction log files in a directory, ascending by ZXID
pub fn list_txnlog_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    utils::list_prefixed_files(dir, "log.")
}

pub(crate) fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Writer for transaction log files
///
/// Created via [`TxnLogWriter::create`], which truncates the target and
/// writes the 16-byte header. Records are emitted verbatim; consistency of
/// the stored checksum is the caller's responsibility.
#[derive(Debug)]
pub struct TxnLogWriter {
    path: PathBuf,
    file: Option<File>,
}

impl TxnLogWriter {
    /// Create (or truncate) a log file and write its header
    ///
    /// The file is removed again if the header write fails.
    pub fn create(path: impl AsRef<Path>, header: &TxnLogHeader) -> Result<TxnLogWriter> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| {
            BackupError::io("failed to create txnlog")
                .with_context("path", path.display())
                .with_source(e)
        })?;

        let mut writer = TxnLogWriter {
            path,
            file: Some(file),
        };

        if let Err(e) = writer.write_header(header) {
            writer.close();
            let _ = fs::remove_file(&writer.path);
            return Err(e);
        }

        Ok(writer)
    }

    fn write_header(&mut self, header: &TxnLogHeader) -> Result<()> {
        let TxnLogWriter { path, file } = self;
        let file = file
            .as_mut()
            .ok_or_else(|| closed_error(path))?;

        file.write_u32::<BigEndian>(header.magic).map_err(|e| {
            BackupError::io("failed to write magic")
                .with_context("path", path.display())
                .with_source(e)
        })?;

        file.write_u32::<BigEndian>(header.version).map_err(|e| {
            BackupError::io("failed to write version")
                .with_context("path", path.display())
                .with_source(e)
        })?;

        file.write_u64::<BigEndian>(header.db_id).map_err(|e| {
            BackupError::io("failed to write dbid")
                .with_context("path", path.display())
                .with_source(e)
        })
    }

    /// Append one record: checksum, length, body, in that order
    ///
    /// The stored checksum is written as-is; a mismatched checksum is only
    /// detected by a later read.
    pub fn write_transaction(&mut self, txn: &Transaction) -> Result<()> {
        let TxnLogWriter { path, file } = self;
        let file = file
            .as_mut()
            .ok_or_else(|| closed_error(path))?;

        file.write_i64::<BigEndian>(txn.checksum).map_err(|e| {
            BackupError::io("failed to write checksum")
                .with_context("path", path.display())
                .with_source(e)
        })?;

        file.write_i32::<BigEndian>(txn.length).map_err(|e| {
            BackupError::io("failed to write length")
                .with_context("path", path.display())
                .with_source(e)
        })?;

        file.write_all(&txn.data).map_err(|e| {
            BackupError::io("failed to write data")
                .with_context("path", path.display())
                .with_source(e)
        })
    }

    /// Flush written records to durable storage
    ///
    /// A no-op once the writer is closed.
    pub fn sync(&mut self) -> Result<()> {
        let TxnLogWriter { path, file } = self;
        match file.as_mut() {
            Some(file) => file.sync_all().map_err(|e| {
                BackupError::io("failed to sync")
                    .with_context("path", path.display())
                    .with_source(e)
            }),
            None => Ok(()),
        }
    }

    /// Release the file handle; safe to call more than once
    pub fn close(&mut self) {
        self.file.take();
    }

    /// Path this writer was created with
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn closed_error(path: &Path) -> BackupError {
    BackupError::io("txnlog writer is closed").with_context("path", path.display())
}

/// Reader for transaction log files
///
/// Opening validates the header; [`TxnLogReader::read_transaction`] then
/// yields records until clean EOF (`Ok(None)`) or corruption (an error, with
/// the file position left at the failed record).
#[derive(Debug)]
pub struct TxnLogReader {
    path: PathBuf,
    file: File,
    header: TxnLogHeader,
}

impl TxnLogReader {
    /// Open a log file and read its header
    pub fn open(path: impl AsRef<Path>) -> Result<TxnLogReader> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).map_err(|e| {
            BackupError::io("failed to open txnlog")
                .with_context("path", path.display())
                .with_source(e)
        })?;

        let header = Self::read_header(&mut file, &path)?;

        Ok(TxnLogReader { path, file, header })
    }

    fn read_header(file: &mut File, path: &Path) -> Result<TxnLogHeader> {
        let mut magic_buf = [0u8; 4];
        let present = read_exact_or_eof(file, &mut magic_buf).map_err(|e| {
            BackupError::io("failed to read magic")
                .with_context("path", path.display())
                .with_source(e)
        })?;
        if !present {
            return Err(BackupError::corruption("empty file").with_context("path", path.display()));
        }

        let magic = BigEndian::read_u32(&magic_buf);
        if magic != TXNLOG_MAGIC {
            return Err(BackupError::corruption("invalid magic number")
                .with_context("path", path.display())
                .with_context("magic", format!("0x{:x}", magic))
                .with_context("expected", format!("0x{:x}", TXNLOG_MAGIC)));
        }

        let version = file.read_u32::<BigEndian>().map_err(|e| {
            BackupError::io("failed to read version")
                .with_context("path", path.display())
                .with_source(e)
        })?;
        if version != LOG_VERSION {
            return Err(BackupError::corruption("unsupported version")
                .with_context("path", path.display())
                .with_context("version", version)
                .with_context("expected", LOG_VERSION));
        }

        let db_id = file.read_u64::<BigEndian>().map_err(|e| {
            BackupError::io("failed to read dbid")
                .with_context("path", path.display())
                .with_source(e)
        })?;

        Ok(TxnLogHeader {
            magic,
            version,
            db_id,
        })
    }

    /// The validated file header
    pub fn header(&self) -> &TxnLogHeader {
        &self.header
    }

    /// Path this reader was opened with
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current byte offset in the file
    pub fn position(&mut self) -> Result<u64> {
        self.file.stream_position().map_err(|e| {
            BackupError::io("failed to get position")
                .with_context("path", self.path.display())
                .with_source(e)
        })
    }

    /// Random access within the file
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.file.seek(pos).map_err(|e| {
            BackupError::io("failed to seek")
                .with_context("path", self.path.display())
                .with_source(e)
        })
    }

    /// Read the next record
    ///
    /// Returns `Ok(None)` on clean EOF at a record boundary. Any partial
    /// read, out-of-range length, checksum mismatch or unparseable meta is a
    /// [`BackupError::Corruption`] error, and the reader does not advance
    /// past the failure.
    pub fn read_transaction(&mut self) -> Result<Option<Transaction>> {
        let mut checksum_buf = [0u8; 8];
        let present = read_exact_or_eof(&mut self.file, &mut checksum_buf).map_err(|e| {
            BackupError::corruption("failed to read checksum")
                .with_context("path", self.path.display())
                .with_source(e)
        })?;
        if !present {
            return Ok(None);
        }
        let checksum = BigEndian::read_i64(&checksum_buf);

        let length = self.file.read_i32::<BigEndian>().map_err(|e| {
            BackupError::corruption("failed to read length")
                .with_context("path", self.path.display())
                .with_source(e)
        })?;

        if length <= 0 || length > MAX_RECORD_SIZE {
            return Err(BackupError::corruption("invalid record length")
                .with_context("path", self.path.display())
                .with_context("length", length)
                .with_context("max", MAX_RECORD_SIZE));
        }

        let mut data = vec![0u8; length as usize];
        self.file.read_exact(&mut data).map_err(|e| {
            BackupError::corruption("failed to read body")
                .with_context("path", self.path.display())
                .with_context("length", length)
                .with_source(e)
        })?;

        let calculated = i64::from(RollingAdler32::from_buffer(&data).hash());
        if calculated != checksum {
            return Err(BackupError::corruption("checksum mismatch")
                .with_context("path", self.path.display())
                .with_context("expected", checksum)
                .with_context("calculated", calculated));
        }

        let (client_id, cxid, zxid, timestamp, txn_type) =
            Transaction::parse_meta(&data).map_err(|e| {
                BackupError::corruption("failed to parse transaction")
                    .with_context("path", self.path.display())
                    .with_source(e)
            })?;

        Ok(Some(Transaction {
            checksum,
            length,
            data,
            client_id,
            cxid,
            zxid,
            timestamp,
            txn_type,
        }))
    }
}

/// Read exactly `buf.len()` bytes, or report that the stream was already at
/// EOF (`Ok(false)`). A partial read is an `UnexpectedEof` error.
fn read_exact_or_eof(file: &mut File, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "unexpected end of file",
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
