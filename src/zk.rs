//! Live ZooKeeper probe
//!
//! Backup wants to stamp the cluster's current ZXID and server version into
//! the metadata document, but must never depend on the cluster being up.
//! The engine therefore talks to [`ZooKeeperProbe`], a seam small enough to
//! stub out in tests, and treats every probe failure as a warning.
//!
//! [`ZkFourLetterClient`] is the real implementation: a plain TCP
//! connection issuing the `mntr` four-letter-word command and scraping the
//! `zk_version` / `zk_zxid` lines out of the response.

use crate::error::{BackupError, Result};
use crate::zxid::Zxid;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Default timeout for probe connections and reads
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of the live cluster's version and current ZXID
pub trait ZooKeeperProbe {
    /// Server version string
    fn version(&self) -> Result<String>;

    /// The cluster's current (highest) ZXID
    fn current_zxid(&self) -> Result<Zxid>;
}

/// Four-letter-word client over a plain TCP connection
#[derive(Debug, Clone)]
pub struct ZkFourLetterClient {
    host: String,
    timeout: Duration,
}

impl ZkFourLetterClient {
    /// Client for `host` (host:port) with the given per-operation timeout
    pub fn new(host: impl Into<String>, timeout: Duration) -> Self {
        ZkFourLetterClient {
            host: host.into(),
            timeout,
        }
    }

    /// Quick liveness check via `ruok`
    pub fn is_alive(&self) -> bool {
        self.four_letter_word("ruok")
            .map(|response| response.trim() == "imok")
            .unwrap_or(false)
    }

    /// Issue one four-letter-word command and collect the full response
    fn four_letter_word(&self, word: &str) -> Result<String> {
        let addr = self
            .host
            .to_socket_addrs()
            .map_err(|e| {
                BackupError::zookeeper("failed to resolve host")
                    .with_context("host", &self.host)
                    .with_source(e)
            })?
            .next()
            .ok_or_else(|| {
                BackupError::zookeeper("failed to resolve host").with_context("host", &self.host)
            })?;

        let mut stream = TcpStream::connect_timeout(&addr, self.timeout).map_err(|e| {
            BackupError::zookeeper("failed to connect to zookeeper")
                .with_context("host", &self.host)
                .with_source(e)
        })?;

        let _ = stream.set_read_timeout(Some(self.timeout));
        let _ = stream.set_write_timeout(Some(self.timeout));

        stream.write_all(word.as_bytes()).map_err(|e| {
            BackupError::zookeeper("failed to send command")
                .with_context("host", &self.host)
                .with_context("command", word)
                .with_source(e)
        })?;

        // the server closes the connection after answering a four-letter word
        let mut response = String::new();
        stream.read_to_string(&mut response).map_err(|e| {
            BackupError::zookeeper("failed to read response")
                .with_context("host", &self.host)
                .with_context("command", word)
                .with_source(e)
        })?;

        Ok(response)
    }
}

impl ZooKeeperProbe for ZkFourLetterClient {
    fn version(&self) -> Result<String> {
        let stats = self.four_letter_word("mntr")?;
        Ok(parse_mntr_version(&stats).unwrap_or_else(|| "unknown".to_string()))
    }

    fn current_zxid(&self) -> Result<Zxid> {
        let stats = self.four_letter_word("mntr")?;
        parse_mntr_zxid(&stats)
    }
}

fn parse_mntr_version(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        line.strip_prefix("zk_version")
            .map(|rest| rest.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

fn parse_mntr_zxid(output: &str) -> Result<Zxid> {
    for line in output.lines() {
        if !line.starts_with("zk_zxid") {
            continue;
        }

        let value = line.split_whitespace().nth(1).ok_or_else(|| {
            BackupError::zookeeper("malformed zk_zxid line").with_context("line", line)
        })?;

        let bare = value.strip_prefix("0x").unwrap_or(value);
        return Zxid::from_hex(bare).map_err(|e| {
            BackupError::zookeeper("failed to parse zxid")
                .with_context("value", value)
                .with_source(e)
        });
    }

    Err(BackupError::zookeeper("zk_zxid not found in mntr output"))
}
