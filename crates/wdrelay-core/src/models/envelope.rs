//! Inbound command envelope.
//!
//! Envelopes arrive as loosely-typed JSON from the controller. Routing only
//! needs `uuid` and `source-adapter`, so that part is read separately from the
//! full command, which is parsed on the adapter worker.

use crate::config::WaitDefaults;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use wdrelay_traits::NotifyTarget;

pub const SCREENSHOT_COMMAND: &str = "screenshot";

#[derive(Debug, Error, PartialEq)]
pub enum EnvelopeError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

type Result<T> = std::result::Result<T, EnvelopeError>;

/// Key of the adapter context a command belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub script_id: String,
    pub adapter_id: String,
}

impl RouteKey {
    pub fn from_envelope(envelope: &Value) -> Result<Self> {
        Ok(Self {
            script_id: required_id(envelope, "uuid")?,
            adapter_id: required_id(envelope, "source-adapter")?,
        })
    }

    pub fn notify_target(&self) -> NotifyTarget {
        NotifyTarget::new(self.script_id.clone(), self.adapter_id.clone())
    }
}

/// The wire command carried by an envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverCommand {
    pub name: String,
    /// Echoed back verbatim in the result notification.
    pub id: Value,
    pub params: Map<String, Value>,
    pub capabilities: Value,
}

impl DriverCommand {
    pub fn session_id(&self) -> Option<String> {
        self.params
            .get("sessionId")
            .and_then(id_to_string)
    }

    pub fn id_label(&self) -> String {
        id_to_string(&self.id).unwrap_or_else(|| self.id.to_string())
    }

    pub fn is_screenshot(&self) -> bool {
        self.name == SCREENSHOT_COMMAND
    }
}

/// Polling parameters of a wait-until command.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitUntil {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub expected_value: Option<Value>,
}

impl WaitUntil {
    pub fn matches(&self, status: i64, value: &Value) -> bool {
        if status != 0 {
            return false;
        }
        match &self.expected_value {
            Some(expected) => value == expected,
            None => true,
        }
    }
}

/// One logical automation step, immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub route: RouteKey,
    /// `{script}_{adapter}_{command id}`, for diagnostics only.
    pub trace_id: String,
    pub testcase_name: Option<String>,
    pub replay_id: Option<String>,
    pub result_path: Option<String>,
    pub command: DriverCommand,
    pub wait_until: Option<WaitUntil>,
}

impl CommandRequest {
    pub fn parse(envelope: &Value, defaults: &WaitDefaults) -> Result<Self> {
        let route = RouteKey::from_envelope(envelope)?;
        let data = envelope
            .get("data")
            .ok_or(EnvelopeError::MissingField("data"))?;
        if !data.is_object() {
            return Err(invalid("data", "expected an object"));
        }

        let name = data
            .get("command-name")
            .ok_or(EnvelopeError::MissingField("command-name"))?
            .as_str()
            .ok_or_else(|| invalid("command-name", "expected a string"))?
            .to_string();
        let params = match data.get("command-params") {
            Some(Value::Object(params)) => params.clone(),
            Some(_) => return Err(invalid("command-params", "expected an object")),
            None => return Err(EnvelopeError::MissingField("command-params")),
        };
        let capabilities = data
            .get("command-capabilities")
            .cloned()
            .ok_or(EnvelopeError::MissingField("command-capabilities"))?;
        let id = match data.get("command-id") {
            Some(Value::Null) | None => return Err(EnvelopeError::MissingField("command-id")),
            Some(id) => id.clone(),
        };

        let wait_until = parse_wait_until(data, defaults)?;

        let command = DriverCommand {
            name,
            id,
            params,
            capabilities,
        };
        let script_ref = optional_id(envelope, "script_id").unwrap_or_else(|| route.script_id.clone());
        let trace_id = format!("{}_{}_{}", script_ref, route.adapter_id, command.id_label());

        Ok(Self {
            route,
            trace_id,
            testcase_name: optional_id(envelope, "testcase-name"),
            replay_id: optional_id(envelope, "test-replay-id"),
            result_path: optional_id(envelope, "result-path"),
            command,
            wait_until,
        })
    }

    pub fn notify_target(&self) -> NotifyTarget {
        self.route.notify_target()
    }
}

fn parse_wait_until(data: &Value, defaults: &WaitDefaults) -> Result<Option<WaitUntil>> {
    let enabled = match data.get("wait-until") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => return Err(invalid("wait-until", "expected a boolean")),
    };
    if !enabled {
        return Ok(None);
    }

    let timeout = seconds_field(data, "wait-until-timeout")?.unwrap_or(defaults.timeout);
    let poll_interval = seconds_field(data, "wait-until-pool")?.unwrap_or(defaults.poll_interval);
    let expected_value = match data.get("wait-until-value") {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.clone()),
    };

    Ok(Some(WaitUntil {
        timeout,
        poll_interval,
        expected_value,
    }))
}

fn seconds_field(data: &Value, field: &'static str) -> Result<Option<Duration>> {
    let Some(raw) = data.get(field) else {
        return Ok(None);
    };
    let secs = raw
        .as_f64()
        .ok_or_else(|| invalid(field, "expected a number of seconds"))?;
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|err| invalid(field, err.to_string()))
}

fn required_id(envelope: &Value, field: &'static str) -> Result<String> {
    let raw = envelope
        .get(field)
        .ok_or(EnvelopeError::MissingField(field))?;
    id_to_string(raw).ok_or_else(|| invalid(field, "expected a string or number"))
}

fn optional_id(envelope: &Value, field: &str) -> Option<String> {
    envelope.get(field).and_then(id_to_string)
}

fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> EnvelopeError {
    EnvelopeError::InvalidField {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(data: Value) -> Value {
        json!({
            "uuid": "script-1",
            "source-adapter": 3,
            "testcase-name": "login",
            "test-replay-id": 0,
            "result-path": "/results/run-1",
            "data": data,
        })
    }

    #[test]
    fn route_accepts_numeric_adapter_ids() {
        let route = RouteKey::from_envelope(&envelope(json!({}))).unwrap();
        assert_eq!(route.script_id, "script-1");
        assert_eq!(route.adapter_id, "3");
    }

    #[test]
    fn route_requires_source_adapter() {
        let err = RouteKey::from_envelope(&json!({"uuid": "s"})).unwrap_err();
        assert_eq!(err, EnvelopeError::MissingField("source-adapter"));
    }

    #[test]
    fn parse_immediate_command() {
        let request = CommandRequest::parse(
            &envelope(json!({
                "command-name": "get",
                "command-id": 12,
                "command-params": {"url": "http://x", "sessionId": "abc"},
                "command-capabilities": {},
            })),
            &WaitDefaults::default(),
        )
        .unwrap();

        assert_eq!(request.command.name, "get");
        assert_eq!(request.command.session_id().as_deref(), Some("abc"));
        assert_eq!(request.trace_id, "script-1_3_12");
        assert_eq!(request.replay_id.as_deref(), Some("0"));
        assert!(request.wait_until.is_none());
    }

    #[test]
    fn trace_id_prefers_script_id_field() {
        let mut raw = envelope(json!({
            "command-name": "getTitle",
            "command-id": "c1",
            "command-params": {},
            "command-capabilities": null,
        }));
        raw["script_id"] = json!("tc-42");
        let request = CommandRequest::parse(&raw, &WaitDefaults::default()).unwrap();
        assert_eq!(request.trace_id, "tc-42_3_c1");
        assert_eq!(request.route.script_id, "script-1");
    }

    #[test]
    fn wait_until_uses_defaults() {
        let request = CommandRequest::parse(
            &envelope(json!({
                "command-name": "findElement",
                "command-id": 1,
                "command-params": {},
                "command-capabilities": {},
                "wait-until": true,
            })),
            &WaitDefaults::default(),
        )
        .unwrap();

        let wait = request.wait_until.unwrap();
        assert_eq!(wait.timeout, Duration::from_secs(10));
        assert_eq!(wait.poll_interval, Duration::from_millis(500));
        assert_eq!(wait.expected_value, None);
    }

    #[test]
    fn wait_until_reads_overrides() {
        let request = CommandRequest::parse(
            &envelope(json!({
                "command-name": "getTitle",
                "command-id": 1,
                "command-params": {},
                "command-capabilities": {},
                "wait-until": true,
                "wait-until-timeout": 2.5,
                "wait-until-pool": 0.1,
                "wait-until-value": "Home",
            })),
            &WaitDefaults::default(),
        )
        .unwrap();

        let wait = request.wait_until.unwrap();
        assert_eq!(wait.timeout, Duration::from_millis(2500));
        assert_eq!(wait.poll_interval, Duration::from_millis(100));
        assert_eq!(wait.expected_value, Some(json!("Home")));
    }

    #[test]
    fn wait_until_rejects_negative_timeout() {
        let err = CommandRequest::parse(
            &envelope(json!({
                "command-name": "getTitle",
                "command-id": 1,
                "command-params": {},
                "command-capabilities": {},
                "wait-until": true,
                "wait-until-timeout": -1.0,
            })),
            &WaitDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EnvelopeError::InvalidField {
                field: "wait-until-timeout",
                ..
            }
        ));
    }

    #[test]
    fn missing_capabilities_is_rejected() {
        let err = CommandRequest::parse(
            &envelope(json!({
                "command-name": "get",
                "command-id": 1,
                "command-params": {},
            })),
            &WaitDefaults::default(),
        )
        .unwrap_err();
        assert_eq!(err, EnvelopeError::MissingField("command-capabilities"));
    }

    #[test]
    fn wait_matches_status_and_expected_value() {
        let wait = WaitUntil {
            timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(10),
            expected_value: Some(json!(true)),
        };
        assert!(wait.matches(0, &json!(true)));
        assert!(!wait.matches(0, &json!(false)));
        assert!(!wait.matches(7, &json!(true)));

        let any = WaitUntil {
            expected_value: None,
            ..wait
        };
        assert!(any.matches(0, &Value::Null));
    }
}
