use crate::config::LedgerConfig;
use crate::io::ReportKind;
use crate::strategy::BatchConfig;
use crate::types::ShareRate;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay a retail ledger command log and print a report
#[derive(Parser, Debug)]
#[command(name = "retail-ledger")]
#[command(about = "Replay a retail ledger command log and print a report", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing ledger commands
    #[arg(value_name = "INPUT", help = "Path to the command log CSV file")]
    pub input_file: PathBuf,

    /// Replay strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Replay strategy: 'sync' for sequential or 'async' for conflict-group parallel"
    )]
    pub strategy: StrategyType,

    /// Number of commands per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of commands per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Number of worker threads (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Number of runtime worker threads (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Report printed to stdout after replay
    #[arg(long = "report", value_name = "REPORT", default_value = "customers")]
    pub report: ReportKind,

    /// TOML configuration file
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Owner whose ledger partition the commands run against
    #[arg(long = "owner", value_name = "OWNER", default_value = "default")]
    pub owner: String,

    /// Partner share rate, overriding file and environment (e.g. 0.25)
    #[arg(long = "partner-share-rate", value_name = "RATE")]
    pub partner_share_rate: Option<ShareRate>,

    /// JSON snapshot to seed the ledger with before replay
    #[arg(long = "snapshot-in", value_name = "FILE")]
    pub snapshot_in: Option<PathBuf>,

    /// Write the final ledger as a JSON snapshot
    #[arg(long = "snapshot-out", value_name = "FILE")]
    pub snapshot_out: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long = "log-json")]
    pub log_json: bool,
}

/// Available replay strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Missing values fall back to the defaults; zero values are replaced by
    /// the defaults with a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        let default = BatchConfig::default();
        BatchConfig::new(
            self.batch_size.unwrap_or(default.batch_size),
            self.max_concurrent_batches
                .unwrap_or(default.max_concurrent_batches),
        )
    }

    /// Apply flags that take precedence over file and environment settings
    pub fn apply_overrides(&self, config: &mut LedgerConfig) {
        if let Some(rate) = self.partner_share_rate {
            config.partner_share_rate = rate;
        }
    }
}
