//! Serial port discovery.
//!
//! Boards enumerate as USB CDC (`ttyACM*`, `ttyUSB*`) or behind a Silicon Labs
//! bridge (`SLAB_USBtoUART`). Anything else is skipped.

use clawlink_core::SerialLink;
use tracing::{debug, info};

use crate::client::Client;
use crate::config::ClientConfig;
use crate::error::ClientError;

const CANDIDATE_MARKERS: [&str; 3] = ["USB", "ACM", "SLAB"];

/// Case-sensitive match on the port name.
pub fn is_candidate_port(name: &str) -> bool {
    CANDIDATE_MARKERS.iter().any(|marker| name.contains(marker))
}

pub fn candidate_ports() -> Result<Vec<String>, ClientError> {
    let ports = serialport::available_ports().map_err(ClientError::PortEnumeration)?;
    Ok(ports
        .into_iter()
        .map(|port| port.port_name)
        .filter(|name| is_candidate_port(name))
        .collect())
}

/// Handshake on each candidate in turn and return the first that answers.
///
/// `config.endpoint` is replaced by each candidate; the other settings apply
/// to every attempt.
pub fn discover(config: &ClientConfig) -> Result<Client<SerialLink>, ClientError> {
    let candidates = candidate_ports()?;
    debug!(candidates = ?candidates, "probing serial ports");
    for endpoint in &candidates {
        let attempt = Client::open(config.clone().with_endpoint(endpoint.as_str()))
            .and_then(|mut client| client.connect().map(|_| client));
        match attempt {
            Ok(client) => {
                info!(%endpoint, "device discovered");
                return Ok(client);
            }
            Err(error) => debug!(%endpoint, %error, "no device on port"),
        }
    }
    Err(ClientError::NoDevice {
        tried: candidates.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usb_and_acm_ports_are_candidates() {
        assert!(is_candidate_port("/dev/ttyACM0"));
        assert!(is_candidate_port("/dev/ttyUSB1"));
        assert!(is_candidate_port("/dev/cu.SLAB_USBtoUART"));
    }

    #[test]
    fn other_ports_are_skipped() {
        assert!(!is_candidate_port("/dev/ttyS0"));
        assert!(!is_candidate_port("COM3"));
        assert!(!is_candidate_port("/dev/ttyacm0"));
    }
}
