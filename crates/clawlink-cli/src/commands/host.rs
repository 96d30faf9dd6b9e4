//! Commands that talk to a device through [`Client`].
//!
//! Each prints the raw Response, so device-side errors stay visible and map to
//! exit code 3.

use clawlink_core::{ContextAction, Instruction, Link, SerialLink, StateAction};
use clawlink_host::{discover, Client};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::cli::{
    AdcCommand, Cli, Command, ContextCommand, GpioCommand, I2cCommand, PwmCommand, SpiCommand,
    StateCommand, SystemCommand,
};
use crate::commands::{client_config, CommandResult};
use crate::error::CliError;

pub fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let mut client = connect(cli)?;
    let result = execute(&mut client, &cli.command);
    for event in client.drain_events() {
        info!(event = %event.name, data = %event.data, "device event");
    }
    client.disconnect();
    result
}

fn connect(cli: &Cli) -> Result<Client<SerialLink>, CliError> {
    let config = client_config(cli)?;
    if cli.auto {
        return Ok(discover(&config)?);
    }
    let mut client = Client::open(config)?;
    client.connect()?;
    Ok(client)
}

fn execute<L: Link>(client: &mut Client<L>, command: &Command) -> Result<CommandResult, CliError> {
    let response = match command {
        Command::Info => {
            let info = client.device_info().ok_or(clawlink_host::ClientError::NotConnected)?;
            return Ok(CommandResult::ok(serde_json::to_value(info)?));
        }
        Command::Send(args) => client.execute_json(&args.json)?,
        other => client.execute(instruction(other)?)?,
    };
    Ok(CommandResult::from_response(&response))
}

fn params<const N: usize>(pairs: [(&str, Value); N]) -> Option<Map<String, Value>> {
    Some(
        pairs
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value))
            .collect(),
    )
}

fn parse_params(raw: Option<&str>) -> Result<Option<Map<String, Value>>, CliError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match serde_json::from_str(raw)? {
        Value::Object(map) => Ok(Some(map)),
        other => Err(CliError::Usage(format!(
            "--params must be a JSON object, got {other}"
        ))),
    }
}

/// JSON when it parses, otherwise the literal text.
fn state_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

fn instruction(command: &Command) -> Result<Instruction, CliError> {
    let instruction = match command {
        Command::Tools => Instruction::ListTools,
        Command::Exec(args) => Instruction::exec(&args.tool, parse_params(args.params.as_deref())?),
        Command::Gpio(args) => match &args.command {
            GpioCommand::Mode { pin, mode } => Instruction::exec(
                "gpio_mode",
                params([("pin", json!(pin)), ("mode", json!(mode.as_str()))]),
            ),
            GpioCommand::Write { pin, value } => Instruction::exec(
                "gpio_write",
                params([("pin", json!(pin)), ("value", json!(value))]),
            ),
            GpioCommand::Read { pin } => {
                Instruction::exec("gpio_read", params([("pin", json!(pin))]))
            }
        },
        Command::Pwm(args) => match &args.command {
            PwmCommand::Start {
                pin,
                frequency,
                duty,
            } => Instruction::exec(
                "pwm_start",
                params([
                    ("pin", json!(pin)),
                    ("frequency", json!(frequency)),
                    ("duty", json!(duty)),
                ]),
            ),
            PwmCommand::Stop { pin } => {
                Instruction::exec("pwm_stop", params([("pin", json!(pin))]))
            }
            PwmCommand::Duty { pin, duty } => Instruction::exec(
                "pwm_duty",
                params([("pin", json!(pin)), ("duty", json!(duty))]),
            ),
        },
        Command::Adc(args) => match &args.command {
            AdcCommand::Read { channel } => {
                Instruction::exec("adc_read", params([("channel", json!(channel))]))
            }
            AdcCommand::Voltage { channel } => {
                Instruction::exec("adc_read_voltage", params([("channel", json!(channel))]))
            }
        },
        Command::I2c(args) => match &args.command {
            I2cCommand::Scan => Instruction::exec("i2c_scan", None),
            I2cCommand::Read {
                address,
                register,
                length,
            } => Instruction::exec(
                "i2c_read",
                params([
                    ("address", json!(address)),
                    ("register", json!(register)),
                    ("length", json!(length)),
                ]),
            ),
            I2cCommand::Write {
                address,
                register,
                data,
            } => Instruction::exec(
                "i2c_write",
                params([
                    ("address", json!(address)),
                    ("register", json!(register)),
                    ("data", json!(data)),
                ]),
            ),
        },
        Command::Spi(args) => match &args.command {
            SpiCommand::Read { length } => {
                Instruction::exec("spi_read", params([("length", json!(length))]))
            }
            SpiCommand::Write { data } => {
                Instruction::exec("spi_write", params([("data", json!(data))]))
            }
        },
        Command::System(args) => match &args.command {
            SystemCommand::Info => Instruction::exec("system_info", None),
            SystemCommand::Reset => Instruction::exec("system_reset", None),
            SystemCommand::Time => Instruction::exec("get_time", None),
        },
        Command::Delay(args) => Instruction::exec(
            "delay",
            params([("milliseconds", json!(args.milliseconds))]),
        ),
        Command::Context(args) => Instruction::Context(match &args.command {
            ContextCommand::Get => ContextAction::Get,
            ContextCommand::Add { role, content } => ContextAction::Add {
                role: role.clone(),
                content: content.clone(),
            },
            ContextCommand::Clear => ContextAction::Clear,
        }),
        Command::State(args) => Instruction::State(match &args.command {
            StateCommand::Get { key } => StateAction::Get { key: key.clone() },
            StateCommand::Set { key, value } => StateAction::Set {
                key: key.clone(),
                value: state_value(value),
            },
        }),
        Command::Ports(_)
        | Command::Info
        | Command::Schema(_)
        | Command::Send(_)
        | Command::Device(_) => {
            return Err(CliError::Usage(
                "command does not map to a device instruction".to_owned(),
            ))
        }
    };
    Ok(instruction)
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use clap::Parser;
    use clawlink_agent::{AgentConfig, AgentEngine, DeviceAgent};
    use clawlink_core::MemoryLink;
    use clawlink_host::ClientConfig;

    use super::*;

    fn instruction_for(args: &[&str]) -> Instruction {
        let cli = Cli::try_parse_from(args).expect("parse");
        instruction(&cli.command).expect("instruction")
    }

    #[test]
    fn gpio_write_builds_exec() {
        assert_eq!(
            instruction_for(&["clawlink", "gpio", "write", "25", "1"]).to_value(),
            json!({"type": "exec", "tool": "gpio_write", "params": {"pin": 25, "value": 1}})
        );
    }

    #[test]
    fn i2c_write_accepts_hex_bytes() {
        assert_eq!(
            instruction_for(&["clawlink", "i2c", "write", "0x3c", "0x00", "0xff"]).to_value(),
            json!({
                "type": "exec",
                "tool": "i2c_write",
                "params": {"address": 60, "register": 0, "data": [0, 255]},
            })
        );
    }

    #[test]
    fn state_set_parses_json_or_keeps_text() {
        assert_eq!(state_value("42"), json!(42));
        assert_eq!(state_value("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(state_value("auto"), json!("auto"));
    }

    #[test]
    fn exec_params_must_be_an_object() {
        let cli = Cli::try_parse_from(["clawlink", "exec", "gpio_read", "--params", "[1]"])
            .expect("parse");
        assert!(matches!(instruction(&cli.command), Err(CliError::Usage(_))));
    }

    #[test]
    fn device_error_is_flagged_against_simulated_device() {
        let (host, device) = MemoryLink::pair();
        let config = AgentConfig::default().with_idle_sleep(Duration::from_millis(1));
        let mut agent = DeviceAgent::new(AgentEngine::new(config), device);
        let stop = agent.stop_handle();
        let worker = thread::spawn(move || agent.run());

        let mut client = Client::with_link(
            host,
            ClientConfig::default().with_timeout(Duration::from_secs(2)),
        );
        client.connect().expect("connect");

        let cli = Cli::try_parse_from(["clawlink", "exec", "warp_drive"]).expect("parse");
        let result = execute(&mut client, &cli.command).expect("execute");
        assert!(result.device_error);
        assert_eq!(result.data["error"], "Unknown tool: warp_drive");

        let cli = Cli::try_parse_from(["clawlink", "adc", "read", "0"]).expect("parse");
        let result = execute(&mut client, &cli.command).expect("execute");
        assert!(!result.device_error);

        stop.stop();
        worker.join().expect("join").expect("agent");
    }
}
