//! # zkbackup CLI
//!
//! Backup, verification and restore of ZooKeeper data directories.
//!
//! ```bash
//! # Full backup with post-copy verification
//! zkbackup backup \
//!     --zk-data-dir /zookeeper/data/version-2 \
//!     --zk-log-dir /zookeeper/datalog/version-2 \
//!     --output-dir /backup/zookeeper
//!
//! # Check an existing backup, repairing corrupted logs
//! zkbackup verify --backup-dir /backup/zookeeper/backup-20250115-103000 --fix
//!
//! # Restore it
//! zkbackup restore \
//!     --backup-dir /backup/zookeeper/backup-20250115-103000 \
//!     --zk-data-dir /zookeeper/data/version-2 \
//!     --zk-log-dir /zookeeper/datalog/version-2
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::PathBuf;
use zkbackup::{
    BackupConfig, BackupEngine, OutputFormat, RestoreConfig, RestoreEngine, Result, VerifyConfig,
    VerifyEngine, VerifyReport, ZkFourLetterClient, Zxid, DEFAULT_PROBE_TIMEOUT, DEFAULT_ZK_HOST,
};

/// ZooKeeper backup and restore tool
#[derive(Parser)]
#[command(name = "zkbackup")]
#[command(version)]
#[command(about = "Backup, verify and restore ZooKeeper snapshots and transaction logs")]
#[command(long_about = "zkbackup is a reliable backup and restore tool for ZooKeeper.\n\n\
It provides:\n\
- Full backup of ZooKeeper data\n\
- Reliable restore with validation\n\
- TxnLog verification and repair")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backup ZooKeeper data
    Backup {
        /// ZooKeeper dataDir path
        #[arg(long)]
        zk_data_dir: PathBuf,

        /// ZooKeeper dataLogDir path
        #[arg(long)]
        zk_log_dir: PathBuf,

        /// Backup output directory
        #[arg(long)]
        output_dir: PathBuf,

        /// ZooKeeper host address
        #[arg(long, default_value = DEFAULT_ZK_HOST)]
        zk_host: String,

        /// Backup ID (auto-generated if not set)
        #[arg(long)]
        backup_id: Option<String>,

        /// Skip verification after the copy
        #[arg(long)]
        no_verify: bool,
    },

    /// Restore ZooKeeper data from a backup
    Restore {
        /// Backup directory path
        #[arg(long)]
        backup_dir: PathBuf,

        /// Target ZooKeeper dataDir path
        #[arg(long)]
        zk_data_dir: PathBuf,

        /// Target ZooKeeper dataLogDir path
        #[arg(long)]
        zk_log_dir: PathBuf,

        /// Restore without confirmation
        #[arg(long)]
        force: bool,

        /// Show what would be restored without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Skip backup verification before restore
        #[arg(long)]
        skip_verify: bool,

        /// Drop transactions beyond this ZXID (hex, 0x prefix optional)
        #[arg(long)]
        truncate_to_zxid: Option<String>,
    },

    /// Verify the integrity of a backup
    Verify {
        /// Backup directory path
        #[arg(long)]
        backup_dir: PathBuf,

        /// Repair corrupted transaction logs in place
        #[arg(long)]
        fix: bool,

        /// Report format
        #[arg(long, value_enum, default_value = "text")]
        output_format: OutputFormatArg,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormatArg {
    Text,
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Text => OutputFormat::Text,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Backup {
            zk_data_dir,
            zk_log_dir,
            output_dir,
            zk_host,
            backup_id,
            no_verify,
        } => cmd_backup(BackupConfig {
            zk_data_dir,
            zk_log_dir,
            output_dir,
            zk_host,
            backup_id: backup_id.unwrap_or_default(),
            verify: !no_verify,
        }),

        Commands::Restore {
            backup_dir,
            zk_data_dir,
            zk_log_dir,
            force,
            dry_run,
            skip_verify,
            truncate_to_zxid,
        } => {
            let truncate_to_zxid = truncate_to_zxid
                .map(|raw| Zxid::from_hex(raw.trim_start_matches("0x")))
                .transpose()?;

            cmd_restore(RestoreConfig {
                backup_dir,
                zk_data_dir,
                zk_log_dir,
                force,
                dry_run,
                skip_verify,
                truncate_to_zxid,
            })
        }

        Commands::Verify {
            backup_dir,
            fix,
            output_format,
        } => cmd_verify(VerifyConfig {
            backup_dir,
            fix,
            output_format: output_format.into(),
        }),
    }
}

fn cmd_backup(config: BackupConfig) -> Result<()> {
    let probe = ZkFourLetterClient::new(
        if config.zk_host.is_empty() {
            DEFAULT_ZK_HOST.to_string()
        } else {
            config.zk_host.clone()
        },
        DEFAULT_PROBE_TIMEOUT,
    );

    let mut engine = BackupEngine::new(config).with_probe(&probe);
    let info = engine.run()?;

    println!("{}", info.generate_text_report());
    println!(
        "{} {}",
        "Backup completed:".green().bold(),
        engine.backup_dir().display()
    );

    Ok(())
}

fn cmd_restore(config: RestoreConfig) -> Result<()> {
    RestoreEngine::new(config).run()?;
    println!("{}", "Restore completed".green().bold());
    Ok(())
}

fn cmd_verify(config: VerifyConfig) -> Result<()> {
    let output_format = config.output_format;
    let report = VerifyEngine::new(config).run()?;

    match output_format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report).map_err(|e| {
                zkbackup::BackupError::io("failed to render report").with_source(e)
            })?;
            println!("{}", json);
        }
        OutputFormat::Text => print_text_report(&report),
    }

    if !report.is_clean() {
        return Err(zkbackup::BackupError::validation("backup contains corrupted files")
            .with_context("corrupted", report.unrepaired_files()));
    }

    Ok(())
}

fn print_text_report(report: &VerifyReport) {
    println!("Verifying backup: {}\n", report.backup_dir.display());

    for (path, result) in &report.files {
        if result.is_valid {
            println!(
                "  {} {} ({} txns)",
                "ok".green(),
                path.display(),
                result.valid_count
            );
        } else {
            println!(
                "  {} {} ({})",
                "corrupted".red().bold(),
                path.display(),
                result.corruption_kind.as_deref().unwrap_or("unknown")
            );
        }
    }

    println!("\n{}", report.summary());

    if report.is_clean() {
        println!("{}", "Verification completed".green().bold());
    }
}
