//! Routing of controller notifications onto per-adapter workers and
//! execution of the carried automation command.

mod registry;
mod wait;

pub use registry::{AdapterJob, ContextError, ContextRegistry};
pub use wait::poll_until;

use crate::artifact::{screenshot_upload, strip_result_screen};
use crate::bridge::{SessionDriverBridge, build_client};
use crate::config::DispatchConfig;
use crate::models::{CommandRequest, CommandResult, RouteKey};
use anyhow::{Context, Result};
use futures::FutureExt;
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use wdrelay_traits::{ControllerChannel, NotifyTarget};

/// Turns inbound command envelopes into wire calls and relays the outcome
/// to the controller. Cheap to clone.
#[derive(Clone)]
pub struct CommandDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    controller: Arc<dyn ControllerChannel>,
    client: Client,
    config: DispatchConfig,
}

impl CommandDispatcher {
    pub fn new(controller: Arc<dyn ControllerChannel>, config: DispatchConfig) -> Result<Self> {
        let client = build_client(config.request_timeout).context("Failed to build HTTP client")?;
        Ok(Self {
            inner: Arc::new(DispatcherInner {
                controller,
                client,
                config,
            }),
        })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.inner.config
    }

    /// Queue the envelope on its adapter worker.
    ///
    /// Returns `false` when the envelope was dropped: missing routing fields
    /// or an unknown context. Nothing is sent upstream in that case.
    pub fn handle_notify(&self, registry: &ContextRegistry, envelope: Value) -> bool {
        let route = match RouteKey::from_envelope(&envelope) {
            Ok(route) => route,
            Err(err) => {
                error!(error = %err, "Unable to route notify");
                return false;
            }
        };

        let dispatcher = self.clone();
        let job = async move { dispatcher.exec_action(envelope).await }.boxed();

        match registry.enqueue(&route, job) {
            Ok(()) => {
                debug!(script_id = %route.script_id, adapter_id = %route.adapter_id, "Action queued");
                true
            }
            Err(err @ ContextError::UnknownScript(_)) => {
                error!(script_id = %route.script_id, "{}", err);
                false
            }
            Err(err) => {
                error!(
                    script_id = %route.script_id,
                    adapter_id = %route.adapter_id,
                    "{}",
                    err
                );
                false
            }
        }
    }

    /// Run one command envelope to completion. Runs on the adapter worker.
    pub async fn exec_action(&self, envelope: Value) {
        let request = match CommandRequest::parse(&envelope, &self.inner.config.wait_defaults) {
            Ok(request) => request,
            Err(err) => {
                error!(error = %err, "unable to read request");
                return;
            }
        };
        let target = request.notify_target();
        let trace_id = request.trace_id.as_str();
        debug!(trace_id, command = %request.command.name, "Executing command");

        let bridge = match SessionDriverBridge::attach(
            self.inner.client.clone(),
            &self.inner.config.server_url,
            request.command.session_id(),
            request.command.capabilities.clone(),
        ) {
            Ok(bridge) => bridge,
            Err(err) => {
                error!(trace_id, error = %err, "unable to prepare driver");
                self.report_error(&target, &format!("unable to run selenium: {}", err))
                    .await;
                return;
            }
        };

        match self.run_command(&request, &target, &bridge).await {
            Ok(()) => debug!(trace_id, "Command terminated, notify sent"),
            Err(err) => {
                error!(trace_id, error = %err, "unable to execute action");
                self.report_error(&target, &format!("unable to execute action: {:#}", err))
                    .await;
            }
        }
    }

    async fn run_command(
        &self,
        request: &CommandRequest,
        target: &NotifyTarget,
        bridge: &SessionDriverBridge,
    ) -> Result<()> {
        let command = &request.command;

        if let Some(wait) = &request.wait_until {
            let result = poll_until(wait, &request.trace_id, move || {
                bridge.execute(&command.name, &command.params)
            })
            .await;
            return self.notify(request, target, &result).await;
        }

        let mut result = bridge.execute(&command.name, &command.params).await?;
        if !result.is_success() {
            warn!(trace_id = %request.trace_id, status = result.status, "Error on wire response");
            strip_result_screen(&mut result);
        }
        self.notify(request, target, &result).await?;

        if command.is_screenshot() {
            info!(trace_id = %request.trace_id, "Uploading screenshot");
            let upload = screenshot_upload(request, &result, &self.inner.config.screenshot_extension)?;
            self.inner
                .controller
                .upload_data(&upload.file_name, &upload.result_path, upload.data)
                .await
                .context("Failed to upload screenshot")?;
        }
        Ok(())
    }

    async fn notify(
        &self,
        request: &CommandRequest,
        target: &NotifyTarget,
        result: &CommandResult,
    ) -> Result<()> {
        self.inner
            .controller
            .send_notify(target, notification(request, result))
            .await
            .context("Failed to send notify")
    }

    async fn report_error(&self, target: &NotifyTarget, message: &str) {
        if let Err(err) = self.inner.controller.send_error(target, message).await {
            error!(
                script_id = %target.script_id,
                adapter_id = %target.adapter_id,
                error = %err,
                "Unable to deliver error to controller"
            );
        }
    }
}

/// `{command-name, command-id, command-value}` as relayed to the controller.
pub fn notification(request: &CommandRequest, result: &CommandResult) -> Value {
    json!({
        "command-name": request.command.name,
        "command-id": request.command.id,
        "command-value": result.to_value(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{ControllerEvent, MockReply, MockWebDriver, RecordingController};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    fn setup(server_url: String) -> (CommandDispatcher, Arc<RecordingController>, ContextRegistry) {
        let controller = Arc::new(RecordingController::new());
        let config = DispatchConfig {
            server_url,
            ..Default::default()
        };
        let dispatcher = CommandDispatcher::new(controller.clone(), config).unwrap();
        let registry = ContextRegistry::new();
        registry.register_adapter("s1", "a1");
        (dispatcher, controller, registry)
    }

    fn envelope(adapter: &str, id: u64, name: &str, params: Value) -> Value {
        json!({
            "uuid": "s1",
            "source-adapter": adapter,
            "testcase-name": "login",
            "test-replay-id": "0",
            "result-path": "/results/run1",
            "data": {
                "command-name": name,
                "command-id": id,
                "command-params": params,
                "command-capabilities": {"browserName": "chrome"},
            }
        })
    }

    #[tokio::test]
    async fn navigate_sends_one_notify_with_server_value() {
        let server = MockWebDriver::start().await;
        server.push_json(200, json!({"status": 0, "value": null, "sessionId": "abc"}));
        let (dispatcher, controller, registry) = setup(server.base_url());

        let queued = dispatcher.handle_notify(
            &registry,
            envelope("a1", 1, "get", json!({"sessionId": "abc", "url": "http://x"})),
        );
        assert!(queued);
        registry.drain().await;

        let events = controller.events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            ControllerEvent::Notify {
                target: NotifyTarget::new("s1", "a1"),
                data: json!({
                    "command-name": "get",
                    "command-id": 1,
                    "command-value": {"status": 0, "value": null, "sessionId": "abc"},
                }),
            }
        );
        assert_eq!(server.request_count(), 1);
        assert_eq!(server.requests()[0].path, "/wd/hub/session/abc/url");
    }

    #[tokio::test]
    async fn immediate_mode_notifies_error_status_without_retry() {
        let server = MockWebDriver::start().await;
        server.push_json(200, json!({"status": 7, "value": "no such element"}));
        let (dispatcher, controller, registry) = setup(server.base_url());

        dispatcher.handle_notify(
            &registry,
            envelope("a1", 2, "findElement", json!({"sessionId": "abc", "using": "id", "value": "x"})),
        );
        registry.drain().await;

        let notes = controller.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0]["command-value"]["status"], json!(7));
        assert!(controller.errors().is_empty());
        assert_eq!(server.request_count(), 1);
    }

    #[tokio::test]
    async fn inline_screen_is_stripped_from_error_value() {
        let server = MockWebDriver::start().await;
        server.push_reply(MockReply::text(
            500,
            r#"{"status":13,"value":{"message":"boom","screen":"iVBORw0KGgo=","class":"x"}}"#,
        ));
        let (dispatcher, controller, registry) = setup(server.base_url());

        dispatcher.handle_notify(
            &registry,
            envelope("a1", 3, "clickElement", json!({"sessionId": "abc", "id": "e1"})),
        );
        registry.drain().await;

        let notes = controller.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0]["command-value"]["status"], json!(500));
        assert_eq!(
            notes[0]["command-value"]["value"],
            json!(r#"{"status":13,"value":{"message":"boom","class":"x"}}"#)
        );
    }

    #[tokio::test]
    async fn screenshot_notifies_then_uploads_decoded_bytes() {
        let server = MockWebDriver::start().await;
        let png = b"\x89PNG\r\n\x1a\nfake".to_vec();
        server.push_json(200, json!({"status": 0, "value": STANDARD.encode(&png)}));
        let (dispatcher, controller, registry) = setup(server.base_url());

        dispatcher.handle_notify(
            &registry,
            envelope("a1", 4, "screenshot", json!({"sessionId": "abc"})),
        );
        registry.drain().await;

        let events = controller.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ControllerEvent::Notify { .. }));
        assert_eq!(
            events[1],
            ControllerEvent::Upload {
                file_name: "login_0_ADPa1_step4_screenshot.png".to_string(),
                result_path: "/results/run1".to_string(),
                data: png,
            }
        );
    }

    #[tokio::test]
    async fn malformed_screenshot_reports_execution_error() {
        let server = MockWebDriver::start().await;
        server.push_json(200, json!({"status": 0, "value": "%%%not-base64%%%"}));
        let (dispatcher, controller, registry) = setup(server.base_url());

        dispatcher.handle_notify(
            &registry,
            envelope("a1", 5, "screenshot", json!({"sessionId": "abc"})),
        );
        registry.drain().await;

        assert_eq!(controller.notifications().len(), 1);
        assert!(controller.uploads().is_empty());
        let errors = controller.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("unable to execute action: "));
    }

    #[tokio::test]
    async fn unknown_context_is_dropped_silently() {
        let server = MockWebDriver::start().await;
        let (dispatcher, controller, registry) = setup(server.base_url());

        let mut unknown_script = envelope("a1", 1, "getTitle", json!({"sessionId": "abc"}));
        unknown_script["uuid"] = json!("s9");
        assert!(!dispatcher.handle_notify(&registry, unknown_script));
        assert!(!dispatcher.handle_notify(
            &registry,
            envelope("a9", 1, "getTitle", json!({"sessionId": "abc"})),
        ));
        registry.drain().await;

        assert!(controller.events().is_empty());
        assert_eq!(server.request_count(), 0);
    }

    #[tokio::test]
    async fn unparseable_envelope_is_dropped_on_worker() {
        let server = MockWebDriver::start().await;
        let (dispatcher, controller, registry) = setup(server.base_url());

        let broken = json!({"uuid": "s1", "source-adapter": "a1", "data": {"command-id": 1}});
        assert!(dispatcher.handle_notify(&registry, broken));
        registry.drain().await;

        assert!(controller.events().is_empty());
        assert_eq!(server.request_count(), 0);
    }

    #[tokio::test]
    async fn invalid_server_url_sends_one_error() {
        let (dispatcher, controller, registry) = setup("not a url".to_string());

        dispatcher.handle_notify(&registry, envelope("a1", 1, "getTitle", json!({})));
        registry.drain().await;

        let errors = controller.errors();
        assert_eq!(controller.events().len(), 1);
        assert!(errors[0].starts_with("unable to run selenium: "));
    }

    #[tokio::test]
    async fn transport_failure_sends_one_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let (dispatcher, controller, registry) =
            setup(format!("http://127.0.0.1:{}/wd/hub/", port));

        dispatcher.handle_notify(
            &registry,
            envelope("a1", 1, "getTitle", json!({"sessionId": "abc"})),
        );
        registry.drain().await;

        let errors = controller.errors();
        assert_eq!(controller.events().len(), 1);
        assert!(errors[0].starts_with("unable to execute action: "));
    }

    #[tokio::test]
    async fn unknown_command_sends_one_error() {
        let server = MockWebDriver::start().await;
        let (dispatcher, controller, registry) = setup(server.base_url());

        dispatcher.handle_notify(&registry, envelope("a1", 1, "teleport", json!({})));
        registry.drain().await;

        assert_eq!(controller.errors().len(), 1);
        assert_eq!(controller.events().len(), 1);
        assert_eq!(server.request_count(), 0);
    }

    #[tokio::test]
    async fn wait_until_notifies_matching_response() {
        let server = MockWebDriver::start().await;
        server.push_json(200, json!({"status": 0, "value": "Loading"}));
        server.push_json(200, json!({"status": 0, "value": "Home"}));
        let (dispatcher, controller, registry) = setup(server.base_url());

        let mut request = envelope("a1", 6, "getTitle", json!({"sessionId": "abc"}));
        request["data"]["wait-until"] = json!(true);
        request["data"]["wait-until-timeout"] = json!(5.0);
        request["data"]["wait-until-pool"] = json!(0.05);
        request["data"]["wait-until-value"] = json!("Home");
        dispatcher.handle_notify(&registry, request);
        registry.drain().await;

        let notes = controller.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0]["command-value"], json!({"status": 0, "value": "Home"}));
        assert_eq!(server.request_count(), 2);
    }

    #[tokio::test]
    async fn wait_until_times_out_with_sentinel() {
        let server = MockWebDriver::start().await;
        server.set_fallback(MockReply::json(404, json!({"status": 7, "value": "no such element"})));
        let (dispatcher, controller, registry) = setup(server.base_url());

        let mut request = envelope("a1", 7, "findElement", json!({"sessionId": "abc", "using": "id", "value": "x"}));
        request["data"]["wait-until"] = json!(true);
        request["data"]["wait-until-timeout"] = json!(0.2);
        request["data"]["wait-until-pool"] = json!(0.05);
        dispatcher.handle_notify(&registry, request);
        registry.drain().await;

        let notes = controller.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0]["command-value"], json!({"status": 1000, "value": null}));
        assert!(controller.errors().is_empty());

        // No polling once the deadline has passed.
        let after_timeout = server.request_count();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(server.request_count(), after_timeout);
    }

    #[tokio::test]
    async fn wait_until_ignores_transport_errors() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let (dispatcher, controller, registry) =
            setup(format!("http://127.0.0.1:{}/wd/hub/", port));

        let mut request = envelope("a1", 8, "getTitle", json!({"sessionId": "abc"}));
        request["data"]["wait-until"] = json!(true);
        request["data"]["wait-until-timeout"] = json!(0.1);
        request["data"]["wait-until-pool"] = json!(0.02);
        dispatcher.handle_notify(&registry, request);
        registry.drain().await;

        assert!(controller.errors().is_empty());
        let notes = controller.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0]["command-value"]["status"], json!(1000));
    }

    #[tokio::test]
    async fn same_adapter_commands_keep_order() {
        let server = MockWebDriver::start().await;
        server.push_reply(MockReply::json(200, json!({"status": 0, "value": "first"})).with_delay(Duration::from_millis(100)));
        server.push_json(200, json!({"status": 0, "value": "second"}));
        let (dispatcher, controller, registry) = setup(server.base_url());

        dispatcher.handle_notify(&registry, envelope("a1", 1, "getTitle", json!({"sessionId": "abc"})));
        dispatcher.handle_notify(&registry, envelope("a1", 2, "getTitle", json!({"sessionId": "abc"})));
        registry.drain().await;

        let ids: Vec<Value> = controller
            .notifications()
            .into_iter()
            .map(|note| note["command-id"].clone())
            .collect();
        assert_eq!(ids, vec![json!(1), json!(2)]);
        let values: Vec<Value> = controller
            .notifications()
            .into_iter()
            .map(|note| note["command-value"]["value"].clone())
            .collect();
        assert_eq!(values, vec![json!("first"), json!("second")]);
    }

    #[tokio::test]
    async fn slow_adapter_does_not_block_others() {
        let server = MockWebDriver::start().await;
        let (dispatcher, controller, registry) = setup(server.base_url());
        registry.register_adapter("s1", "a2");

        // a1 polls until timeout while a2 completes immediately.
        server.set_fallback(MockReply::json(200, json!({"status": 7, "value": null})));
        let mut slow = envelope("a1", 1, "getTitle", json!({"sessionId": "abc"}));
        slow["data"]["wait-until"] = json!(true);
        slow["data"]["wait-until-timeout"] = json!(1.0);
        slow["data"]["wait-until-pool"] = json!(0.05);
        dispatcher.handle_notify(&registry, slow);
        dispatcher.handle_notify(&registry, envelope("a2", 2, "getTitle", json!({"sessionId": "abc"})));

        let events = controller.wait_for_events(1, WAIT).await;
        match &events[0] {
            ControllerEvent::Notify { target, .. } => assert_eq!(target.adapter_id, "a2"),
            other => panic!("unexpected event {other:?}"),
        }

        registry.drain().await;
        assert_eq!(controller.notifications().len(), 2);
    }
}
