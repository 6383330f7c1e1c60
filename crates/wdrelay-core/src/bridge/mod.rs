//! Wire client bound to an already-established WebDriver session.
//!
//! The bridge never creates or deletes sessions: the session lives in the
//! local automation server and the controller hands us its identifier. Each
//! call is one HTTP request against `http://{host}:{port}/wd/hub/`.

pub mod commands;

use crate::models::{CommandResult, STATUS_SUCCESS, STATUS_UNKNOWN_ERROR};
use reqwest::{Client, Method};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Invalid server url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Missing parameter '{parameter}' for command {command}")]
    MissingParameter { command: String, parameter: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// HTTP client for the local automation server. System proxies are ignored
/// since the server is always reached locally.
pub fn build_client(request_timeout: Option<Duration>) -> reqwest::Result<Client> {
    let mut builder = Client::builder().no_proxy();
    if let Some(timeout) = request_timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

pub struct SessionDriverBridge {
    client: Client,
    base_url: Url,
    session_id: Option<String>,
    capabilities: Value,
}

impl SessionDriverBridge {
    /// Bind to `base_url` and an existing session. No request is sent.
    pub fn attach(
        client: Client,
        base_url: &str,
        session_id: Option<String>,
        capabilities: Value,
    ) -> Result<Self, BridgeError> {
        let mut base_url = Url::parse(base_url).map_err(|source| BridgeError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        if base_url.cannot_be_a_base() {
            return Err(BridgeError::InvalidUrl {
                url: base_url.to_string(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            });
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            session_id,
            capabilities,
        })
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn capabilities(&self) -> &Value {
        &self.capabilities
    }

    /// Issue exactly one wire command.
    pub async fn execute(
        &self,
        command: &str,
        params: &Map<String, Value>,
    ) -> Result<CommandResult, BridgeError> {
        let mut params = params.clone();
        if let Some(session_id) = &self.session_id
            && !params.contains_key("sessionId")
        {
            params.insert("sessionId".to_string(), Value::String(session_id.clone()));
        }

        let wire = commands::lookup(command)
            .ok_or_else(|| BridgeError::UnknownCommand(command.to_string()))?;
        let path = commands::render_path(command, wire.template, &params)?;
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|source| BridgeError::InvalidUrl {
                url: path.clone(),
                source,
            })?;

        debug!(command, method = %wire.method, %url, "Sending wire command");

        let mut request = self
            .client
            .request(wire.method.clone(), url)
            .header(reqwest::header::ACCEPT, "application/json");
        if wire.method == Method::POST || wire.method == Method::PUT {
            request = request.json(&Value::Object(params));
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(normalize_response(status, &body, self.session_id.as_deref()))
    }
}

/// Map an HTTP reply onto a `CommandResult` the way the Selenium remote
/// connection does.
pub fn normalize_response(http_status: u16, body: &str, session_id: Option<&str>) -> CommandResult {
    if (400..=500).contains(&http_status) {
        return CommandResult::new(i64::from(http_status), Value::String(body.to_string()));
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return CommandResult::empty(session_id);
    }

    let fallback_status = if (200..300).contains(&http_status) {
        STATUS_SUCCESS
    } else {
        STATUS_UNKNOWN_ERROR
    };

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(object)) => CommandResult::from_wire_object(object, fallback_status),
        Ok(value) => CommandResult::new(fallback_status, value),
        Err(_) => CommandResult::new(fallback_status, Value::String(trimmed.to_string())),
    }
}
