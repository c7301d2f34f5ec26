//! Wire types shared by the websocket stream and the HTTP gateway.
//!
//! Stream frames use an `{"event": <name>, "data": <payload>}` envelope in
//! both directions. Field names on the wire are camelCase.

use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Inbound updates ──────────────────────────────────────────────────

/// One variable's value as the server reports it.
///
/// Timestamp and type are optional on the wire; the single-update form
/// frequently omits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawUpdate {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<String>,
}

/// Batched update form: `deviceId -> variableName -> update`.
///
/// Insertion order is preserved so triples are processed in the order the
/// server sent them.
pub type UpdateBatch = IndexMap<String, IndexMap<String, RawUpdate>>;

/// Single update form: `{deviceId?, variable, value, timestamp?, type?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleUpdate {
    #[serde(rename = "deviceId", default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub variable: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<String>,
}

impl SingleUpdate {
    /// Normalize into the batched form.
    ///
    /// A missing device id becomes `default_device`, a missing timestamp
    /// becomes the current time in seconds, a missing type becomes `""`.
    pub fn into_batch(self, default_device: &str) -> UpdateBatch {
        let device_id = self
            .device_id
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| default_device.to_owned());

        let update = RawUpdate {
            value: self.value,
            timestamp: Some(self.timestamp.unwrap_or_else(now_secs)),
            declared_type: Some(self.declared_type.unwrap_or_default()),
        };

        let mut variables = IndexMap::new();
        variables.insert(self.variable, update);

        let mut batch = IndexMap::new();
        batch.insert(device_id, variables);
        batch
    }
}

/// Current wall-clock time in (fractional) seconds.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

// ── Acknowledgements ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeAck {
    #[serde(rename = "subscriberId")]
    pub subscriber_id: String,
    #[serde(default)]
    pub variable: String,
    #[serde(rename = "deviceId", default)]
    pub device_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeAck {
    #[serde(rename = "subscriberId")]
    pub subscriber_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    #[serde(default)]
    pub message: String,
}

// ── InboundFrame ─────────────────────────────────────────────────────

/// A recognised frame from the update stream.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    VariableUpdates(UpdateBatch),
    VariableUpdate(SingleUpdate),
    SubscribeSuccess(SubscribeAck),
    UnsubscribeSuccess(UnsubscribeAck),
    Error(ServerError),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

impl InboundFrame {
    /// Parse a text frame.
    ///
    /// Returns `Ok(None)` for well-formed frames carrying an event this
    /// client does not handle.
    pub fn parse(text: &str) -> Result<Option<Self>, serde_json::Error> {
        let envelope: Envelope = serde_json::from_str(text)?;

        let frame = match envelope.event.as_str() {
            "variable_updates" => Self::VariableUpdates(serde_json::from_value(envelope.data)?),
            "variable_update" => Self::VariableUpdate(serde_json::from_value(envelope.data)?),
            "subscribe_success" => Self::SubscribeSuccess(serde_json::from_value(envelope.data)?),
            "unsubscribe_success" => {
                Self::UnsubscribeSuccess(serde_json::from_value(envelope.data)?)
            }
            "error" => Self::Error(serde_json::from_value(envelope.data)?),
            other => {
                tracing::debug!(event = other, "ignoring unhandled stream event");
                return Ok(None);
            }
        };

        Ok(Some(frame))
    }
}

// ── Outbound intents ─────────────────────────────────────────────────

/// A subscription intent sent to the server over the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientIntent {
    SubscribeVariable {
        #[serde(rename = "subscriberId")]
        subscriber_id: String,
        variable: String,
        #[serde(rename = "deviceId")]
        device_id: String,
    },
    UnsubscribeVariable {
        #[serde(rename = "subscriberId")]
        subscriber_id: String,
    },
}

impl ClientIntent {
    pub fn subscribe(
        subscriber_id: impl Into<String>,
        variable: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self::SubscribeVariable {
            subscriber_id: subscriber_id.into(),
            variable: variable.into(),
            device_id: device_id.into(),
        }
    }

    pub fn unsubscribe(subscriber_id: impl Into<String>) -> Self {
        Self::UnsubscribeVariable {
            subscriber_id: subscriber_id.into(),
        }
    }

    pub fn subscriber_id(&self) -> &str {
        match self {
            Self::SubscribeVariable { subscriber_id, .. }
            | Self::UnsubscribeVariable { subscriber_id } => subscriber_id,
        }
    }
}

// ── Request/response gateway ─────────────────────────────────────────

/// Outcome flag carried by every gateway response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteRequest {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub variable: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResponse {
    pub status: ApiStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WriteResponse {
    pub fn is_success(&self) -> bool {
        self.status == ApiStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub variable: String,
    #[serde(rename = "useCache")]
    pub use_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResponse {
    pub status: ApiStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ReadResponse {
    pub fn is_success(&self) -> bool {
        self.status == ApiStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsResponse {
    pub status: ApiStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatisticsResponse {
    pub fn is_success(&self) -> bool {
        self.status == ApiStatus::Success
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_batched_updates_in_order() {
        // Keys deliberately out of alphabetical order.
        let text = r#"{
            "event": "variable_updates",
            "data": {
                "plc_001": {
                    "Light.Kitchen.bOn": { "value": true, "timestamp": 100, "type": "BOOL" },
                    "Hvac.rSetpoint": { "value": 21.5, "timestamp": 101, "type": "REAL" }
                }
            }
        }"#;

        let Some(InboundFrame::VariableUpdates(batch)) = InboundFrame::parse(text).unwrap() else {
            panic!("expected a batched update");
        };

        let vars = &batch["plc_001"];
        let names: Vec<&str> = vars.keys().map(String::as_str).collect();
        assert_eq!(names, ["Light.Kitchen.bOn", "Hvac.rSetpoint"]);
        assert_eq!(vars["Light.Kitchen.bOn"].value, json!(true));
        assert_eq!(vars["Light.Kitchen.bOn"].timestamp, Some(100.0));
        assert_eq!(vars["Hvac.rSetpoint"].declared_type.as_deref(), Some("REAL"));
    }

    #[test]
    fn parse_single_update_with_optional_fields_missing() {
        let text = r#"{"event":"variable_update","data":{"variable":"Pump.bRun","value":false}}"#;

        let Some(InboundFrame::VariableUpdate(update)) = InboundFrame::parse(text).unwrap() else {
            panic!("expected a single update");
        };
        assert_eq!(update.device_id, None);
        assert_eq!(update.timestamp, None);
        assert_eq!(update.declared_type, None);
    }

    #[test]
    fn single_update_normalizes_to_batch() {
        let update = SingleUpdate {
            device_id: None,
            variable: "Pump.bRun".into(),
            value: json!(true),
            timestamp: None,
            declared_type: None,
        };

        let batch = update.into_batch("plc_001");
        let raw = &batch["plc_001"]["Pump.bRun"];
        assert_eq!(raw.value, json!(true));
        assert!(raw.timestamp.unwrap() > 0.0);
        assert_eq!(raw.declared_type.as_deref(), Some(""));
    }

    #[test]
    fn single_update_keeps_explicit_device() {
        let update = SingleUpdate {
            device_id: Some("plc_002".into()),
            variable: "Door.bOpen".into(),
            value: json!(1),
            timestamp: Some(42.0),
            declared_type: Some("BOOL".into()),
        };

        let batch = update.into_batch("plc_001");
        assert!(!batch.contains_key("plc_001"));
        assert_eq!(batch["plc_002"]["Door.bOpen"].timestamp, Some(42.0));
    }

    #[test]
    fn parse_acknowledgements_and_errors() {
        let ack = r#"{"event":"subscribe_success","data":{"subscriberId":"w1","variable":"A","deviceId":"plc_001"}}"#;
        assert_eq!(
            InboundFrame::parse(ack).unwrap(),
            Some(InboundFrame::SubscribeSuccess(SubscribeAck {
                subscriber_id: "w1".into(),
                variable: "A".into(),
                device_id: "plc_001".into(),
            }))
        );

        let err = r#"{"event":"error","data":{"message":"unknown variable"}}"#;
        assert_eq!(
            InboundFrame::parse(err).unwrap(),
            Some(InboundFrame::Error(ServerError {
                message: "unknown variable".into()
            }))
        );
    }

    #[test]
    fn unknown_event_is_ignored() {
        let text = r#"{"event":"camera_frame","data":{"bytes":"..."}}"#;
        assert_eq!(InboundFrame::parse(text).unwrap(), None);
    }

    #[test]
    fn malformed_frame_is_an_error() {
        assert!(InboundFrame::parse("not json").is_err());
        assert!(InboundFrame::parse(r#"{"event":"variable_update","data":{}}"#).is_err());
    }

    #[test]
    fn intents_serialize_with_camel_case_fields() {
        let sub = ClientIntent::subscribe("w1", "Light.Kitchen.bOn", "plc_001");
        assert_eq!(
            serde_json::to_value(&sub).unwrap(),
            json!({
                "event": "subscribe_variable",
                "data": {
                    "subscriberId": "w1",
                    "variable": "Light.Kitchen.bOn",
                    "deviceId": "plc_001"
                }
            })
        );

        let unsub = ClientIntent::unsubscribe("w1");
        assert_eq!(
            serde_json::to_value(&unsub).unwrap(),
            json!({ "event": "unsubscribe_variable", "data": { "subscriberId": "w1" } })
        );
        assert_eq!(unsub.subscriber_id(), "w1");
    }

    #[test]
    fn read_error_response_without_value() {
        let resp: ReadResponse =
            serde_json::from_value(json!({ "status": "error", "message": "no such tag" })).unwrap();
        assert!(!resp.is_success());
        assert_eq!(resp.value, None);
        assert_eq!(resp.message.as_deref(), Some("no such tag"));
    }

    #[test]
    fn statistics_response_status() {
        let ok: StatisticsResponse = serde_json::from_value(json!({
            "status": "success",
            "statistics": { "activeSubscriptions": 2 }
        }))
        .unwrap();
        assert!(ok.is_success());

        let failed: StatisticsResponse =
            serde_json::from_value(json!({ "status": "error", "message": "busy" })).unwrap();
        assert!(!failed.is_success());
        assert_eq!(failed.statistics, None);
    }

    #[test]
    fn now_secs_is_unix_seconds() {
        let now = now_secs();
        assert!(now > 1_600_000_000.0 && now < 10_000_000_000.0);
    }
}
