use std::io;

use clawlink_agent::{AgentConfig, AgentEngine, AgentError, DeviceAgent};
use clawlink_core::{FramingError, Link, SerialLink};
use tracing::info;

use crate::cli::{Cli, DeviceArgs};
use crate::commands::client_config;
use crate::error::CliError;
use crate::stdio_link::StdioLink;

/// Serve a simulated board until Ctrl-C or the link closes.
pub async fn run(cli: &Cli, args: &DeviceArgs) -> Result<(), CliError> {
    let mut config = AgentConfig::default();
    if let Some(version) = &args.firmware_version {
        config = config.with_version(version.as_str());
    }
    if let Some(max_history) = args.max_history {
        config = config.with_max_history(max_history);
    }

    let link: Box<dyn Link + Send> = if args.stdio {
        info!("serving stdin/stdout");
        Box::new(StdioLink::spawn())
    } else {
        let client = client_config(cli)?;
        let port = SerialLink::open(&client.endpoint, client.baud_rate).map_err(|source| {
            CliError::Serial {
                endpoint: client.endpoint.clone(),
                source,
            }
        })?;
        info!(endpoint = %client.endpoint, baud = client.baud_rate, "serving serial endpoint");
        Box::new(port)
    };

    let mut agent = DeviceAgent::new(AgentEngine::new(config), link);
    let stop = agent.stop_handle();
    let mut worker = tokio::task::spawn_blocking(move || agent.run());

    let outcome = tokio::select! {
        outcome = &mut worker => outcome?,
        interrupted = tokio::signal::ctrl_c() => {
            interrupted?;
            info!("interrupt received, stopping device");
            stop.stop();
            worker.await?
        }
    };
    match outcome {
        Err(error) if is_link_closed(&error) => {
            info!("link closed");
            Ok(())
        }
        other => Ok(other?),
    }
}

fn is_link_closed(error: &AgentError) -> bool {
    matches!(
        error,
        AgentError::Framing(FramingError::Io(io_error))
            if io_error.kind() == io::ErrorKind::UnexpectedEof
    )
}
