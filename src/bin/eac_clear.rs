//! Thin CLI front end (spec §6): reads a [`ClearingRequest`] as JSON from
//! a file argument or stdin, runs [`run_market`], prints the
//! [`ClearingResult`] as pretty JSON. Not part of the library's scope
//! (spec §1 excludes "reporting") — it exists only so the crate is
//! runnable from a shell.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use eac_clearing::{run_market, ClearingRequest};

/// Clear an EAC market from a JSON clearing request.
#[derive(Parser)]
#[command(name = "eac-clear", about = "Clears an EAC market from a JSON clearing request")]
struct Cli {
    /// Path to a JSON `ClearingRequest`. Reads stdin when omitted.
    request: Option<PathBuf>,

    /// Solver/orchestration log verbosity (0 = silent solver output).
    #[arg(short, long, default_value_t = 0)]
    verbosity: u8,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let raw = match &cli.request {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(err) => {
                eprintln!("failed to read {}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => {
            let mut buf = String::new();
            if let Err(err) = std::io::stdin().read_to_string(&mut buf) {
                eprintln!("failed to read stdin: {err}");
                return ExitCode::FAILURE;
            }
            buf
        }
    };

    let mut request: ClearingRequest = match serde_json::from_str(&raw) {
        Ok(r) => r,
        Err(err) => {
            eprintln!("invalid clearing request: {err}");
            return ExitCode::FAILURE;
        }
    };
    request.config.verbosity = cli.verbosity;

    match run_market(&request) {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result).expect("ClearingResult serializes"));
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
