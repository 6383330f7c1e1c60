//! Test doubles: an in-process WebDriver server and a recording controller.

use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use wdrelay_traits::{ControllerChannel, NotifyTarget};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Parsed JSON body, `Value::Null` when the request had none.
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl MockReply {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Default)]
struct MockState {
    replies: Mutex<VecDeque<MockReply>>,
    fallback: Mutex<Option<MockReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Minimal WebDriver server bound to `127.0.0.1:0`.
///
/// Replies are served from a FIFO queue; once it is empty the fallback reply
/// is used, or `{"status":0,"value":null}` when none is set.
pub struct MockWebDriver {
    port: u16,
    state: Arc<MockState>,
    server: JoinHandle<()>,
}

impl MockWebDriver {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let router = Router::new()
            .fallback(handle_request)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock webdriver");
        let port = listener.local_addr().expect("mock webdriver addr").port();
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self {
            port,
            state,
            server,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}/wd/hub/", self.port)
    }

    pub fn push_reply(&self, reply: MockReply) {
        self.state.replies.lock().push_back(reply);
    }

    pub fn push_json(&self, status: u16, body: Value) {
        self.push_reply(MockReply::json(status, body));
    }

    pub fn set_fallback(&self, reply: MockReply) {
        *self.state.fallback.lock() = Some(reply);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().len()
    }
}

impl Drop for MockWebDriver {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn handle_request(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    body: String,
) -> Response {
    let parsed = if body.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body))
    };
    state.requests.lock().push(RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        body: parsed,
    });

    let reply = state
        .replies
        .lock()
        .pop_front()
        .or_else(|| state.fallback.lock().clone())
        .unwrap_or_else(|| MockReply::json(200, serde_json::json!({"status": 0, "value": null})));

    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, "application/json;charset=UTF-8")],
        reply.body,
    )
        .into_response()
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Notify {
        target: NotifyTarget,
        data: Value,
    },
    Error {
        target: NotifyTarget,
        message: String,
    },
    Upload {
        file_name: String,
        result_path: String,
        data: Vec<u8>,
    },
}

/// Controller double that records every delivery in order.
#[derive(Default)]
pub struct RecordingController {
    events: Mutex<Vec<ControllerEvent>>,
}

impl RecordingController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ControllerEvent> {
        self.events.lock().clone()
    }

    pub fn notifications(&self) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ControllerEvent::Notify { data, .. } => Some(data),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ControllerEvent::Error { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn uploads(&self) -> Vec<(String, String, Vec<u8>)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ControllerEvent::Upload {
                    file_name,
                    result_path,
                    data,
                } => Some((file_name, result_path, data)),
                _ => None,
            })
            .collect()
    }

    /// Wait until at least `count` events were recorded or `timeout` elapses.
    pub async fn wait_for_events(&self, count: usize, timeout: Duration) -> Vec<ControllerEvent> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let events = self.events();
            if events.len() >= count || tokio::time::Instant::now() >= deadline {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl ControllerChannel for RecordingController {
    async fn send_notify(&self, target: &NotifyTarget, data: Value) -> Result<()> {
        self.events.lock().push(ControllerEvent::Notify {
            target: target.clone(),
            data,
        });
        Ok(())
    }

    async fn send_error(&self, target: &NotifyTarget, message: &str) -> Result<()> {
        self.events.lock().push(ControllerEvent::Error {
            target: target.clone(),
            message: message.to_string(),
        });
        Ok(())
    }

    async fn upload_data(&self, file_name: &str, result_path: &str, data: Vec<u8>) -> Result<()> {
        self.events.lock().push(ControllerEvent::Upload {
            file_name: file_name.to_string(),
            result_path: result_path.to_string(),
            data,
        });
        Ok(())
    }
}
