//! Retail ledger CLI
//!
//! Replays a CSV command log against an in-memory ledger and prints a report.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- commands.csv > customers.csv
//! cargo run -- --strategy sync --report stock commands.csv
//! cargo run -- --report summary --partner-share-rate 0.25 commands.csv
//! cargo run -- --snapshot-in before.json --snapshot-out after.json commands.csv
//! RUST_LOG=info cargo run -- --log-json commands.csv
//! ```
//!
//! Reports go to stdout, logs to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success (rejected commands do not change the exit code)
//! - 1: Fatal error (bad configuration, unreadable input or snapshot, etc.)

use retail_ledger::{cli, logging};
use std::process;

fn main() {
    let args = cli::parse_args();
    logging::init(args.log_json);

    let mut output = std::io::stdout();
    if let Err(e) = cli::run(&args, &mut output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
