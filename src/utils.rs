//! File-system utilities
//!
//! Scoped wrappers over `std::fs` that attach path context to every failure,
//! plus the content-hash and byte-formatting helpers the rest of the crate
//! shares. All I/O here is synchronous; every handle is closed before the
//! function returns.

use crate::error::{BackupError, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::trace;
use walkdir::WalkDir;

/// Check if a path exists and is a directory
pub fn dir_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_dir()
}

/// Check if a path exists
pub fn file_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

/// Create a directory and all missing parents
pub fn ensure_dir(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|e| {
        BackupError::io("failed to create directory")
            .with_context("dir", dir.display())
            .with_source(e)
    })
}

/// Remove a single file
pub fn remove_file(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::remove_file(path).map_err(|e| {
        BackupError::io("failed to remove file")
            .with_context("path", path.display())
            .with_source(e)
    })
}

/// Remove a directory and all its contents
pub fn remove_dir(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    fs::remove_dir_all(dir).map_err(|e| {
        BackupError::io("failed to remove directory")
            .with_context("dir", dir.display())
            .with_source(e)
    })
}

/// Size of a file in bytes
pub fn file_size(path: impl AsRef<Path>) -> Result<u64> {
    let path = path.as_ref();
    let meta = fs::metadata(path).map_err(|e| {
        BackupError::io("failed to stat file")
            .with_context("path", path.display())
            .with_source(e)
    })?;
    Ok(meta.len())
}

/// Total size of all regular files under a directory
pub fn dir_size(dir: impl AsRef<Path>) -> Result<u64> {
    let dir = dir.as_ref();
    let mut size = 0u64;

    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| {
            BackupError::io("failed to calculate directory size")
                .with_context("dir", dir.display())
                .with_source(e)
        })?;
        if entry.file_type().is_file() {
            let meta = entry.metadata().map_err(|e| {
                BackupError::io("failed to calculate directory size")
                    .with_context("dir", dir.display())
                    .with_source(e)
            })?;
            size += meta.len();
        }
    }

    Ok(size)
}

/// Copy a file, creating the destination's parent directory and flushing the
/// copy to durable storage
///
/// Source permissions are carried over to the destination. Failures surface
/// as I/O errors carrying `src`/`dst` context.
pub fn copy_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    let mut src_file = File::open(src).map_err(|e| {
        BackupError::io("failed to open source file")
            .with_context("src", src.display())
            .with_source(e)
    })?;

    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }

    let mut dst_file = File::create(dst).map_err(|e| {
        BackupError::io("failed to create destination file")
            .with_context("dst", dst.display())
            .with_source(e)
    })?;

    std::io::copy(&mut src_file, &mut dst_file).map_err(|e| {
        BackupError::io("failed to copy file")
            .with_context("src", src.display())
            .with_context("dst", dst.display())
            .with_source(e)
    })?;

    dst_file.sync_all().map_err(|e| {
        BackupError::io("failed to sync file")
            .with_context("dst", dst.display())
            .with_source(e)
    })?;

    if let Ok(meta) = src_file.metadata() {
        let _ = fs::set_permissions(dst, meta.permissions());
    }

    trace!("copied {} -> {}", src.display(), dst.display());
    Ok(())
}

/// SHA-256 of a file's content as `sha256:<lowercase-hex>`
pub fn file_checksum(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| {
        BackupError::io("failed to open file for checksum")
            .with_context("path", path.display())
            .with_source(e)
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer).map_err(|e| {
            BackupError::io("failed to calculate checksum")
                .with_context("path", path.display())
                .with_source(e)
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

/// Write bytes to a file, creating the parent directory if needed
pub fn write_file(path: impl AsRef<Path>, content: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut file = File::create(path).map_err(|e| {
        BackupError::io("failed to create file")
            .with_context("path", path.display())
            .with_source(e)
    })?;
    file.write_all(content).map_err(|e| {
        BackupError::io("failed to write file")
            .with_context("path", path.display())
            .with_source(e)
    })
}

/// Regular files in `dir` whose names start with `prefix`, sorted ascending
/// by the ZXID parsed from the name (unparseable names sort as zero, ties
/// broken by name)
pub fn list_prefixed_files(dir: impl AsRef<Path>, prefix: &str) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| {
        BackupError::io("failed to read directory")
            .with_context("dir", dir.display())
            .with_source(e)
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            BackupError::io("failed to read directory")
                .with_context("dir", dir.display())
                .with_source(e)
        })?;
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        if entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with(prefix))
            .unwrap_or(false)
        {
            files.push(path);
        }
    }

    files.sort_by_key(|path| {
        let zxid = crate::zxid::parse_zxid_from_file_name(path).unwrap_or_default();
        (zxid, path.clone())
    });

    Ok(files)
}

/// Format bytes for human-readable output
///
/// Values under 1 KiB print as a whole number of bytes; everything else gets
/// one decimal place and a power-of-1024 unit.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64 / 1024.0;
    let mut unit_idx = 0;
    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.1} {}", size, UNITS[unit_idx])
}
