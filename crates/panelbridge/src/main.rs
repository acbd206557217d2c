mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "panelbridge", version, about = "Button and sound panel bridge")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Log level for the bridge crates (stderr). PANELBRIDGE_LOG overrides.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_subcommand() {
        let cli = Cli::try_parse_from([
            "panelbridge",
            "run",
            "--ticks",
            "100",
            "--press",
            "2@20",
            "--press",
            "0@40",
        ])
        .expect("run args should parse");

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.ticks, Some(100));
                assert_eq!(args.presses, vec!["2@20", "0@40"]);
                assert_eq!(args.hold, 50);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_ticks_with_duration() {
        let err = Cli::try_parse_from(["panelbridge", "run", "--ticks", "10", "--duration", "1s"])
            .expect_err("conflicting args should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn decode_requires_a_frame() {
        let err = Cli::try_parse_from(["panelbridge", "decode"]).expect_err("missing frame");
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn parses_encode_subcommand() {
        let cli = Cli::try_parse_from([
            "panelbridge",
            "--format",
            "raw",
            "encode",
            "-c",
            "2",
            "-d",
            "1",
            "-f",
            "5",
            "-v",
            "15",
        ])
        .expect("encode args should parse");
        assert!(matches!(cli.command, Command::Encode(_)));
        assert!(matches!(cli.format, Some(OutputFormat::Raw)));
    }
}
