use clawlink_agent::AgentEngine;
use serde_json::Value;

use crate::cli::SchemaArgs;
use crate::commands::CommandResult;
use crate::error::CliError;

/// Schemas come from a local engine, so they match this build's firmware.
pub fn run(args: &SchemaArgs) -> Result<CommandResult, CliError> {
    let engine = AgentEngine::default();
    let registry = engine.registry();
    match &args.tool {
        Some(name) => registry
            .spec(name)
            .map(|spec| CommandResult::ok(spec.function_schema()))
            .ok_or_else(|| CliError::Usage(format!("unknown tool '{name}'"))),
        None => Ok(CommandResult::ok(Value::Array(registry.function_schemas()))),
    }
}
