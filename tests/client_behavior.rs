//! Behaviour tests for host-side correlation, timeouts and retries.

use std::io::Write;
use std::time::Duration;

use clawlink_core::{ErrorKind, Instruction, MemoryLink};
use clawlink_host::{Client, ClientConfig};
use clawlink_tests::{ok_reply, ScriptedDevice, SimulatedDevice};
use serde_json::{json, Value};

fn no_reply(_: usize, _: &Value) -> Vec<String> {
    Vec::new()
}

// =============================================================================
// Retry counts
// =============================================================================

#[test]
fn when_device_never_answers_host_makes_one_plus_retry_count_attempts() {
    // Given: A device that swallows every request and a client with 2 retries
    let (device, mut client) = ScriptedDevice::client(2, no_reply);

    // When: An idempotent instruction is executed
    let response = client
        .execute(Instruction::exec("gpio_read", None))
        .expect("execute");

    // Then: The caller gets the synthetic timeout response
    assert_eq!(
        response.to_value(),
        json!({"status": "error", "error": "Timeout", "code": "timeout"})
    );
    // And: Exactly three identical requests went out
    let received = device.received();
    assert_eq!(received.len(), 3);
    assert!(received.iter().all(|request| request == &received[0]));
}

#[test]
fn when_first_attempt_succeeds_host_sends_exactly_once() {
    let (device, mut client) = ScriptedDevice::client(3, |_, request| {
        vec![ok_reply(request, json!({"pin": 1, "value": 0}))]
    });

    let response = client
        .execute(Instruction::exec("gpio_read", None))
        .expect("execute");

    assert!(response.is_ok());
    assert_eq!(device.received().len(), 1);
}

#[test]
fn when_first_attempt_is_lost_retry_carries_same_id_and_succeeds() {
    // Given: A device that drops the first request only
    let (device, mut client) = ScriptedDevice::client(3, |index, request| {
        if index == 0 {
            Vec::new()
        } else {
            vec![ok_reply(request, json!("second time lucky"))]
        }
    });

    // When: The host executes
    let response = client
        .execute(Instruction::exec("gpio_read", None))
        .expect("execute");

    // Then: The retry's answer is returned and both sends shared one id
    assert_eq!(response.result(), Some(&json!("second time lucky")));
    let received = device.received();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0]["id"], received[1]["id"]);
}

#[test]
fn non_idempotent_tool_is_never_resent_after_timeout() {
    let (device, mut client) = ScriptedDevice::client(3, no_reply);

    let response = client
        .execute(Instruction::exec("system_reset", None))
        .expect("execute");

    assert_eq!(response.kind(), Some(ErrorKind::Timeout));
    assert_eq!(device.received().len(), 1);
}

#[test]
fn context_add_is_treated_as_non_idempotent() {
    let (device, mut client) = ScriptedDevice::client(3, no_reply);

    assert!(!client.context_add("user", "hello").expect("add"));
    assert_eq!(device.received().len(), 1);
}

#[test]
fn retry_non_idempotent_opt_in_resends_unsafe_tools() {
    let (scripted, link) = ScriptedDevice::spawn(no_reply);
    let mut client = Client::with_link(
        link,
        clawlink_tests::fast_config()
            .with_retry_count(1)
            .with_retry_non_idempotent(true),
    );
    client.connect().expect("connect");

    let response = client
        .execute(Instruction::exec("system_reset", None))
        .expect("execute");

    assert!(response.is_timeout());
    assert_eq!(scripted.received().len(), 2);
}

// =============================================================================
// Correlation
// =============================================================================

#[test]
fn stale_response_from_an_earlier_request_is_discarded() {
    // Given: A device that first answers with someone else's id
    let (_device, mut client) = ScriptedDevice::client(0, |_, request| {
        vec![
            json!({"status": "ok", "data": {"result": "stale"}, "id": "not-yours"}).to_string(),
            ok_reply(request, json!("fresh")),
        ]
    });

    // When: The host executes
    let response = client
        .execute(Instruction::exec("gpio_read", None))
        .expect("execute");

    // Then: Only the matching answer is returned
    assert_eq!(response.result(), Some(&json!("fresh")));
}

#[test]
fn legacy_device_without_ids_is_still_understood() {
    let (_device, mut client) = ScriptedDevice::client(0, |_, _| {
        vec![json!({"status": "ok", "data": {"result": 7}}).to_string()]
    });

    let response = client
        .execute(Instruction::exec("gpio_read", None))
        .expect("execute");

    assert_eq!(response.result(), Some(&json!(7)));
}

#[test]
fn noise_and_events_between_request_and_response_are_tolerated() {
    let (_device, mut client) = ScriptedDevice::client(0, |_, request| {
        vec![
            "garbage that is not json".to_owned(),
            json!({"status": "ok", "event": "both"}).to_string(),
            json!({"event": "button", "data": {"pin": 14}}).to_string(),
            ok_reply(request, json!(true)),
        ]
    });

    let response = client
        .execute(Instruction::exec("gpio_read", None))
        .expect("execute");

    assert_eq!(response.result(), Some(&json!(true)));
    let events = client.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "button");
}

#[test]
fn invalid_json_from_caller_never_reaches_the_wire() {
    let (device, mut client) = ScriptedDevice::client(0, no_reply);

    let response = client.execute_json("{not json").expect("local");

    assert_eq!(response.error_message(), Some("Invalid JSON"));
    assert!(device.received().is_empty());
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn client_configured_from_toml_file_talks_to_device() {
    // Given: A config file with a short timeout
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "timeout_ms = 2000\nretry_count = 0\npoll_interval_ms = 1").expect("write");
    let config = ClientConfig::load(file.path()).expect("load");

    // When: A client built from it connects to a simulated device
    let (_device, link): (SimulatedDevice, MemoryLink) = SimulatedDevice::spawn_default();
    let mut client = Client::with_link(link, config);
    let info = client.connect().expect("connect");

    // Then: It sees the device and the configured timeout
    assert_eq!(info.tools.len(), 17);
    assert_eq!(client.config().timeout(), Duration::from_secs(2));
}
