//! End-to-end integration tests
//!
//! These tests drive the complete replay pipeline through `cli::run` using
//! predefined CSV fixtures. Each test:
//! 1. Replays input.csv from a fixture directory
//! 2. Renders the requested report into memory
//! 3. Compares the report with expected.csv
//!
//! Fixtures live in tests/fixtures/ and cover:
//! - Sale, payment and refund flows
//! - Returns and stock restocking
//! - Overselling and stock maintenance on sold items
//! - Partner settlement
//! - Archive and restore of namesake customers
//! - Malformed and rejected rows
//!
//! Each fixture runs with both the sync and the async strategy.

#[cfg(test)]
mod tests {
    use clap::Parser;
    use retail_ledger::cli::{run, CliArgs, StrategyType};
    use retail_ledger::strategy::ReplaySummary;
    use rstest::rstest;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn strategy_flag(strategy: StrategyType) -> &'static str {
        match strategy {
            StrategyType::Sync => "sync",
            StrategyType::Async => "async",
        }
    }

    /// Run the CLI with `extra` flags and return the report and summary
    fn run_cli(input: &Path, strategy: StrategyType, extra: &[&str]) -> (String, ReplaySummary) {
        let input = input.to_string_lossy().into_owned();
        let mut argv = vec!["retail-ledger", "--strategy", strategy_flag(strategy)];
        argv.extend_from_slice(extra);
        argv.push(&input);

        let args = CliArgs::try_parse_from(&argv).expect("Failed to parse arguments");
        let mut output = Vec::new();
        let summary = run(&args, &mut output)
            .unwrap_or_else(|e| panic!("Failed to replay {}: {}", input, e));
        let report = String::from_utf8(output).expect("Report is not UTF-8");
        (report, summary)
    }

    /// Replay a fixture and compare the report with expected.csv
    ///
    /// # Panics
    ///
    /// Panics if fixture files are missing or the report does not match.
    fn run_test_fixture(fixture_name: &str, report: &str, strategy: StrategyType) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let input_path = format!("{}/input.csv", fixture_dir);
        let expected_path = format!("{}/expected.csv", fixture_dir);

        assert!(
            Path::new(&input_path).exists(),
            "Input file not found: {}",
            input_path
        );
        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        let (actual_output, _) = run_cli(Path::new(&input_path), strategy, &["--report", report]);

        assert_eq!(
            actual_output, expected_output,
            "\n\nReport mismatch for fixture: {} (strategy: {:?})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, strategy, actual_output, expected_output
        );
    }

    #[rstest]
    #[case("happy_path", "customers")]
    #[case("sale_return", "customers")]
    #[case("oversell", "stock")]
    #[case("partner_settlement", "partner")]
    #[case("summary", "summary")]
    #[case("archive_restore", "customers")]
    #[case("stock_maintenance", "stock")]
    #[case("invalid_rows", "customers")]
    #[case("directory_order", "customers")]
    fn test_fixtures(
        #[case] fixture: &str,
        #[case] report: &str,
        #[values(StrategyType::Sync, StrategyType::Async)] strategy: StrategyType,
    ) {
        run_test_fixture(fixture, report, strategy);
    }

    #[rstest]
    fn test_replay_summary_counts(
        #[values(StrategyType::Sync, StrategyType::Async)] strategy: StrategyType,
    ) {
        let (_, summary) = run_cli(Path::new("tests/fixtures/invalid_rows/input.csv"), strategy, &[]);
        // gift, "abc" and the nameless payment never parse; Nobody, the
        // overpayment and the zero refund are refused by the engine
        assert_eq!(
            summary,
            ReplaySummary {
                applied: 3,
                rejected: 3,
                unreadable: 3
            }
        );
    }

    #[rstest]
    fn test_share_rate_flag_changes_partner_report(
        #[values(StrategyType::Sync, StrategyType::Async)] strategy: StrategyType,
    ) {
        let (report, _) = run_cli(
            Path::new("tests/fixtures/partner_settlement/input.csv"),
            strategy,
            &["--report", "partner", "--partner-share-rate", "0.5"],
        );
        assert!(report.contains("A1,Khaadi,Ali,500,250,pending"), "{report}");
        assert!(report.contains("A10,Khaadi,Ali,500,250,paid"), "{report}");
    }

    #[test]
    fn test_config_file_sets_share_rate() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = dir.path().join("ledger.toml");
        fs::write(&config_path, "partner_share_rate = 0.3\n").expect("Failed to write config");
        let config_flag = config_path.to_string_lossy().into_owned();

        let (report, _) = run_cli(
            Path::new("tests/fixtures/summary/input.csv"),
            StrategyType::Sync,
            &["--report", "summary", "--config", config_flag.as_str()],
        );
        // A1 and B1 are sold at 500 profit each
        assert!(report.contains("partner_share_total,300\n"), "{report}");
        assert!(report.contains("partner_share_paid,150\n"), "{report}");
    }

    #[test]
    fn test_invalid_config_file_is_fatal() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = dir.path().join("ledger.toml");
        fs::write(&config_path, "unknown_key = 1\n").expect("Failed to write config");
        let config_flag = config_path.to_string_lossy().into_owned();

        let args = CliArgs::try_parse_from([
            "retail-ledger",
            "--config",
            config_flag.as_str(),
            "tests/fixtures/happy_path/input.csv",
        ])
        .unwrap();
        assert!(run(&args, &mut Vec::new()).is_err());
    }

    #[rstest]
    fn test_snapshot_carries_state_between_runs(
        #[values(StrategyType::Sync, StrategyType::Async)] strategy: StrategyType,
    ) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let snapshot_path = dir.path().join("ledger.json");
        let snapshot_flag = snapshot_path.to_string_lossy().into_owned();

        run_cli(
            Path::new("tests/fixtures/happy_path/input.csv"),
            strategy,
            &["--snapshot-out", snapshot_flag.as_str()],
        );
        assert!(snapshot_path.exists());

        let next_log = dir.path().join("next.csv");
        fs::write(
            &next_log,
            "command,customer,codes,amount,brand,cost,price\n\
             intake,,B1,,Gul,500,800\n\
             sale,ali,B1,300,,,\n",
        )
        .expect("Failed to write log");

        let (report, summary) = run_cli(&next_log, strategy, &["--snapshot-in", snapshot_flag.as_str()]);
        assert_eq!(summary.applied, 2);
        assert_eq!(
            report,
            "customer,status,billed,paid,balance,at_risk,high_debt\n\
             Ali,active,2300,1800,500,false,false\n"
        );
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let args = CliArgs::try_parse_from(["retail-ledger", "tests/fixtures/nope/input.csv"]).unwrap();
        assert!(run(&args, &mut Vec::new()).is_err());
    }
}
