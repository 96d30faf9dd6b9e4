mod cli;
mod commands;
mod error;
mod output;
mod stdio_link;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

/// Logs go to stderr; stdout carries JSON output or, for `device --stdio`, the wire.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let pretty = cli.pretty;
    let Some(result) = commands::run(cli).await? else {
        return Ok(ExitCode::SUCCESS);
    };

    output::render(&result.data, pretty)?;
    if result.device_error {
        return Ok(ExitCode::from(3));
    }
    Ok(ExitCode::SUCCESS)
}
