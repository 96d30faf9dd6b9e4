use clawlink_host::{candidate_ports, is_candidate_port, ClientError};
use serde_json::{json, Value};

use crate::cli::PortsArgs;
use crate::commands::CommandResult;
use crate::error::CliError;

pub fn run(args: &PortsArgs) -> Result<CommandResult, CliError> {
    let ports: Vec<Value> = if args.all {
        serialport::available_ports()
            .map_err(ClientError::PortEnumeration)?
            .into_iter()
            .map(|port| {
                json!({
                    "port": port.port_name,
                    "candidate": is_candidate_port(&port.port_name),
                })
            })
            .collect()
    } else {
        candidate_ports()?
            .into_iter()
            .map(|port| json!({"port": port, "candidate": true}))
            .collect()
    };
    Ok(CommandResult::ok(json!({"ports": ports})))
}
