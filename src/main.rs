//! `crate-vendor` CLI entrypoint.
//!
//! Expands `.crate` archives into a vendor directory and writes the checksum
//! manifests cargo expects. Progress is logged to stdout.

use clap::Parser;
use clap::error::ErrorKind;
use crate_vendor::cli::Cli;
use crate_vendor::error::Result;
use crate_vendor::logging::{LogSink, StreamLogger};
use crate_vendor::vendor::vendor_source;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let exit_code = exit_code_for_parse_error(err.kind());
            if err.print().is_err() {
                // Best-effort; the exit code still reports the failure.
            }
            std::process::exit(exit_code);
        }
    };

    let mut log = StreamLogger::new(std::io::stdout(), cli.log_level());
    let run_result = run(&cli, &mut log);
    let exit_code = exit_code_for_run_result(run_result, &mut log);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, log: &mut dyn LogSink) -> Result<()> {
    vendor_source(&cli.source, &cli.vendor_dir, cli.vendor_options(), log)?;
    Ok(())
}

/// `--help` and `--version` are reported through clap's error path but are
/// not failures.
const fn exit_code_for_parse_error(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

fn exit_code_for_run_result(result: Result<()>, log: &mut dyn LogSink) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            log.error(&err.to_string());
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate_vendor::error::VendorError;
    use log::LevelFilter;
    use rstest::rstest;

    #[test]
    fn exit_code_for_run_result_returns_zero_on_success() {
        let mut log = StreamLogger::new(Vec::new(), LevelFilter::Info);
        let exit_code = exit_code_for_run_result(Ok(()), &mut log);
        assert_eq!(exit_code, 0);
        assert!(log.into_inner().is_empty());
    }

    #[test]
    fn exit_code_for_run_result_logs_error_and_returns_one() {
        let err = VendorError::Usage {
            message: "VENDOR_DIR missing must be existing directory".to_owned(),
        };

        let mut log = StreamLogger::new(Vec::new(), LevelFilter::Warn);
        let exit_code = exit_code_for_run_result(Err(err), &mut log);
        assert_eq!(exit_code, 1);

        let output = String::from_utf8(log.into_inner()).expect("log was not UTF-8");
        assert_eq!(output, "VENDOR_DIR missing must be existing directory\n");
    }

    #[rstest]
    #[case::help(ErrorKind::DisplayHelp, 0)]
    #[case::version(ErrorKind::DisplayVersion, 0)]
    #[case::missing_argument(ErrorKind::MissingRequiredArgument, 1)]
    #[case::conflict(ErrorKind::ArgumentConflict, 1)]
    fn parse_errors_map_to_exit_codes(#[case] kind: ErrorKind, #[case] expected: i32) {
        assert_eq!(exit_code_for_parse_error(kind), expected);
    }
}
