use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const STATUS_SUCCESS: i64 = 0;
/// JSON wire "unknown error", used when a non-2xx body has no status of its own.
pub const STATUS_UNKNOWN_ERROR: i64 = 13;
/// Synthesized locally when a wait-until deadline passes. Never sent by the server.
pub const STATUS_WAIT_TIMEOUT: i64 = 1000;

/// Outcome of one wire command, relayed upstream as `command-value`.
///
/// Fields other than `status`, `value` and `sessionId` that the server sent
/// are kept in `extra` and relayed unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub status: i64,
    #[serde(default)]
    pub value: Value,
    #[serde(
        rename = "sessionId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CommandResult {
    pub fn new(status: i64, value: Value) -> Self {
        Self {
            status,
            value,
            session_id: None,
            extra: Map::new(),
        }
    }

    /// Stand-in for a wire call that produced no body.
    pub fn empty(session_id: Option<&str>) -> Self {
        Self {
            session_id: session_id.map(str::to_string),
            ..Self::new(STATUS_SUCCESS, Value::Null)
        }
    }

    pub fn wait_timeout() -> Self {
        Self::new(STATUS_WAIT_TIMEOUT, Value::Null)
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    /// Build from a decoded JSON object, filling in what the server left out.
    pub fn from_wire_object(mut object: Map<String, Value>, fallback_status: i64) -> Self {
        let status = object
            .remove("status")
            .and_then(|status| status.as_i64())
            .unwrap_or(fallback_status);
        let value = object.remove("value").unwrap_or(Value::Null);
        let session_id = object
            .remove("sessionId")
            .and_then(|id| id.as_str().map(str::to_string));

        Self {
            status,
            value,
            session_id,
            extra: object,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({ "status": self.status, "value": self.value })
        })
    }
}
