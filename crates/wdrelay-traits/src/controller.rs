use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Reply destination of an inbound command: the test script and the adapter
/// inside it that issued the command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotifyTarget {
    pub script_id: String,
    pub adapter_id: String,
}

impl NotifyTarget {
    pub fn new(script_id: impl Into<String>, adapter_id: impl Into<String>) -> Self {
        Self {
            script_id: script_id.into(),
            adapter_id: adapter_id.into(),
        }
    }
}

impl fmt::Display for NotifyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.script_id, self.adapter_id)
    }
}

/// Upstream delivery channels provided by the controller transport.
#[async_trait]
pub trait ControllerChannel: Send + Sync {
    /// Relay a command result to the adapter that issued the command.
    async fn send_notify(&self, target: &NotifyTarget, data: Value) -> Result<()>;

    /// Report an execution failure as a plain message.
    async fn send_error(&self, target: &NotifyTarget, message: &str) -> Result<()>;

    /// Hand a binary artifact to the controller's file-upload collaborator.
    async fn upload_data(&self, file_name: &str, result_path: &str, data: Vec<u8>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingChannel {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ControllerChannel for CountingChannel {
        async fn send_notify(&self, target: &NotifyTarget, _data: Value) -> Result<()> {
            self.calls.lock().unwrap().push(format!("notify:{}", target));
            Ok(())
        }

        async fn send_error(&self, target: &NotifyTarget, message: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("error:{}:{}", target, message));
            Ok(())
        }

        async fn upload_data(&self, file_name: &str, _result_path: &str, data: Vec<u8>) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("upload:{}:{}", file_name, data.len()));
            Ok(())
        }
    }

    #[test]
    fn notify_target_displays_script_and_adapter() {
        let target = NotifyTarget::new("script-1", "7");
        assert_eq!(target.to_string(), "script-1/7");
    }

    #[test]
    fn notify_target_serializes_snake_case_fields() {
        let target = NotifyTarget::new("s", "a");
        let value = serde_json::to_value(&target).unwrap();
        assert_eq!(value, json!({"script_id": "s", "adapter_id": "a"}));
    }

    #[tokio::test]
    async fn channel_is_object_safe() {
        let counting = std::sync::Arc::new(CountingChannel::default());
        let channel: std::sync::Arc<dyn ControllerChannel> = counting.clone();
        let target = NotifyTarget::new("s", "a");
        channel.send_notify(&target, json!({})).await.unwrap();
        channel.send_error(&target, "boom").await.unwrap();
        channel.upload_data("shot.png", "/tmp", vec![1, 2, 3]).await.unwrap();

        let calls = counting.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec!["notify:s/a", "error:s/a:boom", "upload:shot.png:3"]
        );
    }
}
