use std::io::{self, Write};

use serde_json::Value;

use crate::error::CliError;

/// Write one JSON document to stdout.
pub fn render(data: &Value, pretty: bool) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if pretty {
        serde_json::to_writer_pretty(&mut out, data)?;
    } else {
        serde_json::to_writer(&mut out, data)?;
    }
    writeln!(out)?;
    Ok(())
}
