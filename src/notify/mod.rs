//! Switch state telemetry
//!
//! Requests that command a device switch (`POST /device/<id>/zeroconf/switch`
//! with a `{"data": {"switch": "on"}}` body) produce a [`TelemetryEvent`] for
//! the HTTP-to-MQTT sender. Publishing is best-effort: failures are logged and
//! never change the outcome of the request that triggered them.
//!
//! The payload line is consumed by an existing time-series pipeline and must
//! stay byte-compatible: `sonoff,id=<device id> value=<true|false>`. The device
//! id is the raw, still percent-encoded path segment after `/device/`. The
//! proxy resolves that same segment, and for the 10-character ids issued by
//! the switch firmware it is the fragment the pipeline expects.

mod middleware;
mod publisher;

use serde::{Deserialize, Serialize};

pub use middleware::{NotifyState, notify_middleware};
pub use publisher::TelemetryPublisher;

use crate::proxy::split_device_path;

/// Switch state token that maps to `true`
pub const SWITCH_ON: &str = "on";

/// Path suffix of the switch control endpoint
pub const SWITCH_PATH_SUFFIX: &str = "zeroconf/switch";

/// MQTT topic for switch state events
pub const TELEMETRY_TOPIC: &str = "home/sonoff/state";

/// MQTT quality of service for switch state events
pub const TELEMETRY_QOS: u8 = 2;

/// Measurement name in the payload line
pub const MEASUREMENT: &str = "sonoff";

/// Switch control body sent to a device
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SwitchCommand {
    /// Device id as sent by the caller (informational only)
    #[serde(default, rename = "deviceid")]
    pub device_id: String,

    /// Command data
    #[serde(default)]
    pub data: SwitchData,
}

/// Data block of a [`SwitchCommand`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SwitchData {
    /// Desired state token, usually `on` or `off`
    #[serde(default)]
    pub switch: String,
}

impl SwitchCommand {
    /// The commanded state token
    #[must_use]
    pub fn desired_state(&self) -> &str {
        &self.data.switch
    }
}

/// Message handed to the MQTT sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub topic: String,
    pub qos: u8,
    pub retained: bool,
    pub payload: String,
}

impl TelemetryEvent {
    /// Build the switch state event for a device
    #[must_use]
    pub fn switch_state(device_id: &str, on: bool) -> Self {
        Self {
            topic: TELEMETRY_TOPIC.to_string(),
            qos: TELEMETRY_QOS,
            retained: false,
            payload: format!("{MEASUREMENT},id={device_id} value={on}"),
        }
    }
}

/// Map a switch state token to a boolean; only `on` is true
#[must_use]
pub fn get_state(state: &str) -> bool {
    state == SWITCH_ON
}

/// Decide whether a request should emit a switch state event
///
/// Returns `None` unless `path` ends with the switch suffix, `body` parses as
/// a [`SwitchCommand`] with a non-empty state, and `path` names a device.
#[must_use]
pub fn switch_event(path: &str, body: &[u8]) -> Option<TelemetryEvent> {
    if !path.ends_with(SWITCH_PATH_SUFFIX) {
        return None;
    }

    let command: SwitchCommand = serde_json::from_slice(body).ok()?;
    if command.desired_state().is_empty() {
        return None;
    }

    let Some((device_id, _)) = split_device_path(path) else {
        tracing::debug!(path, "switch command outside a device path");
        return None;
    };

    Some(TelemetryEvent::switch_state(
        device_id,
        get_state(command.desired_state()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWITCH_PATH: &str = "/device/1000a1b2c3/zeroconf/switch";

    #[test]
    fn get_state_only_accepts_on() {
        assert!(get_state("on"));
        assert!(!get_state("off"));
        assert!(!get_state("ON"));
        assert!(!get_state(""));
    }

    #[test]
    fn switch_on_payload_matches_pipeline_format() {
        let event = switch_event(
            SWITCH_PATH,
            br#"{"deviceid": "1000a1b2c3", "data": {"switch": "on"}}"#,
        )
        .unwrap();

        assert_eq!(event.topic, "home/sonoff/state");
        assert_eq!(event.qos, 2);
        assert!(!event.retained);
        assert_eq!(event.payload, "sonoff,id=1000a1b2c3 value=true");
    }

    #[test]
    fn other_states_map_to_false() {
        for body in [
            br#"{"data": {"switch": "off"}}"#.as_slice(),
            br#"{"data": {"switch": "toggle"}}"#.as_slice(),
        ] {
            let event = switch_event(SWITCH_PATH, body).unwrap();
            assert_eq!(event.payload, "sonoff,id=1000a1b2c3 value=false");
        }
    }

    #[test]
    fn no_event_without_switch_suffix() {
        let body = br#"{"data": {"switch": "on"}}"#;
        for path in [
            "/device/1000a1b2c3/zeroconf/info",
            "/device/1000a1b2c3/zeroconf/switch/extra",
            "/devices",
        ] {
            assert!(switch_event(path, body).is_none(), "{path}");
        }
    }

    #[test]
    fn no_event_for_unparsable_or_empty_state() {
        let bodies: [&[u8]; 6] = [
            b"",
            b"not json",
            br#"["on"]"#,
            br#"{"data": {"switch": 1}}"#,
            br#"{"data": {"switch": ""}}"#,
            br#"{"deviceid": "x"}"#,
        ];
        for body in bodies {
            assert!(switch_event(SWITCH_PATH, body).is_none());
        }
    }

    #[test]
    fn no_event_outside_device_paths() {
        let body = br#"{"data": {"switch": "on"}}"#;
        assert!(switch_event("/zeroconf/switch", body).is_none());
    }

    #[test]
    fn escaped_id_is_reported_as_sent() {
        let body = br#"{"data": {"switch": "on"}}"#;
        let path = "/device/lamp%201/zeroconf/switch";
        let event = switch_event(path, body).unwrap();
        assert_eq!(event.payload, "sonoff,id=lamp%201 value=true");
    }

    #[test]
    fn event_serializes_for_sender() {
        let event = TelemetryEvent::switch_state("abc", true);
        let value = serde_json::to_value(event).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "topic": "home/sonoff/state",
                "qos": 2,
                "retained": false,
                "payload": "sonoff,id=abc value=true"
            })
        );
    }
}
