// CLI module
// Command-line interface, argument parsing and the replay run itself

mod args;

pub use args::{CliArgs, StrategyType};

use crate::config::LedgerConfig;
use crate::core::{LedgerEngine, LedgerStore, MemoryStore};
use crate::io::{read_snapshot, write_report, write_snapshot};
use crate::strategy::{create_strategy, ReplaySummary};
use crate::types::{LedgerError, OwnerId};
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use tracing::info;

/// Parse command-line arguments using clap
///
/// On invalid arguments or `--help`, clap prints the message and exits.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

/// Replay the command log named by `args` and write the chosen report
///
/// Steps:
/// 1. Load configuration (defaults, TOML file, environment, then flags)
/// 2. Create the owner's store, seeded from `--snapshot-in` if given
/// 3. Replay the log with the selected strategy
/// 4. Write the report to `output` and the snapshot to `--snapshot-out`
///
/// # Errors
///
/// Configuration, snapshot and file errors are fatal. Rejected commands are
/// not; they are logged and counted in the returned summary.
pub fn run(args: &CliArgs, output: &mut dyn Write) -> Result<ReplaySummary, LedgerError> {
    let mut config = LedgerConfig::load(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    config.validate()?;

    let store = MemoryStore::new(config.store.clone()).scope(OwnerId::new(args.owner.as_str()));
    if let Some(path) = &args.snapshot_in {
        store.load_snapshot(&read_snapshot(path)?)?;
    }
    let engine = Arc::new(LedgerEngine::new(store, config));

    let batch_config =
        matches!(args.strategy, StrategyType::Async).then(|| args.to_batch_config());
    let strategy = create_strategy(args.strategy, batch_config);
    let summary = strategy.replay(&args.input_file, &engine)?;
    info!(
        owner = %args.owner,
        applied = summary.applied,
        rejected = summary.rejected,
        unreadable = summary.unreadable,
        "replay finished"
    );

    let snapshot = engine.snapshot()?;
    write_report(
        args.report,
        &snapshot,
        engine.config(),
        engine.store().now(),
        output,
    )?;
    if let Some(path) = &args.snapshot_out {
        write_snapshot(path, &snapshot)?;
    }

    Ok(summary)
}
