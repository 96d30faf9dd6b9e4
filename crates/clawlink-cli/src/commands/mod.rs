mod device;
mod host;
mod ports;
mod schema;

use clawlink_core::Response;
use clawlink_host::ClientConfig;
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// What a command prints, and whether the device reported a failure.
pub struct CommandResult {
    pub data: Value,
    pub device_error: bool,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            device_error: false,
        }
    }

    pub fn from_response(response: &Response) -> Self {
        Self {
            data: response.to_value(),
            device_error: !response.is_ok(),
        }
    }
}

/// Run the selected command. `None` means nothing to print.
pub async fn run(cli: Cli) -> Result<Option<CommandResult>, CliError> {
    match &cli.command {
        Command::Ports(args) => return ports::run(args).map(Some),
        Command::Schema(args) => return schema::run(args).map(Some),
        Command::Device(args) => {
            device::run(&cli, args).await?;
            return Ok(None);
        }
        _ => {}
    }
    let result = tokio::task::spawn_blocking(move || host::run(&cli)).await??;
    Ok(Some(result))
}

/// Defaults, then `--config`, then environment and flags.
pub fn client_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(port) = &cli.port {
        config = config.with_endpoint(port.as_str());
    }
    if let Some(baud) = cli.baud {
        config = config.with_baud_rate(baud);
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if let Some(retries) = cli.retries {
        config = config.with_retry_count(retries);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;

    use super::*;

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "endpoint = \"/dev/ttyACM1\"\nbaud_rate = 9600\nretry_count = 5")
            .expect("write");
        let path = file.path().to_string_lossy().into_owned();

        let cli = Cli::try_parse_from([
            "clawlink",
            "--config",
            path.as_str(),
            "--port",
            "/dev/ttyUSB0",
            "--retries",
            "1",
            "tools",
        ])
        .expect("parse");
        let config = client_config(&cli).expect("config");

        assert_eq!(config.endpoint, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.retry_count, 1);
    }

    #[test]
    fn device_error_response_is_flagged() {
        let response = Response::error(clawlink_core::ErrorKind::UnknownTool, "Unknown tool: x");
        let result = CommandResult::from_response(&response);
        assert!(result.device_error);
        assert_eq!(result.data["code"], "unknown_tool");
    }
}
