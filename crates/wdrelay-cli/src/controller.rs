//! Local controller that speaks JSON lines on stdout.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::info;
use wdrelay_traits::{ControllerChannel, NotifyTarget};

/// One outbound line.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutboundEvent<'a> {
    Notify {
        #[serde(flatten)]
        target: &'a NotifyTarget,
        data: Value,
    },
    Error {
        #[serde(flatten)]
        target: &'a NotifyTarget,
        message: &'a str,
    },
    Upload {
        file_name: &'a str,
        result_path: &'a str,
        path: String,
        size: usize,
    },
}

pub struct JsonLinesController<W> {
    writer: Mutex<W>,
    results_dir: Option<PathBuf>,
}

impl JsonLinesController<tokio::io::Stdout> {
    pub fn stdout(results_dir: Option<PathBuf>) -> Self {
        Self::new(tokio::io::stdout(), results_dir)
    }
}

impl<W> JsonLinesController<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W, results_dir: Option<PathBuf>) -> Self {
        Self {
            writer: Mutex::new(writer),
            results_dir,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    async fn emit(&self, event: &OutboundEvent<'_>) -> Result<()> {
        let mut line = serde_json::to_vec(event).context("Failed to encode event")?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    fn upload_dir(&self, result_path: &str) -> PathBuf {
        let result_path = Path::new(result_path);
        match &self.results_dir {
            Some(root) if result_path.is_relative() => root.join(result_path),
            _ => result_path.to_path_buf(),
        }
    }
}

#[async_trait]
impl<W> ControllerChannel for JsonLinesController<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send_notify(&self, target: &NotifyTarget, data: Value) -> Result<()> {
        self.emit(&OutboundEvent::Notify { target, data }).await
    }

    async fn send_error(&self, target: &NotifyTarget, message: &str) -> Result<()> {
        self.emit(&OutboundEvent::Error { target, message }).await
    }

    async fn upload_data(&self, file_name: &str, result_path: &str, data: Vec<u8>) -> Result<()> {
        if !is_plain_file_name(file_name) {
            bail!("Invalid upload file name: {file_name:?}");
        }
        let dir = self.upload_dir(result_path);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let path = dir.join(file_name);
        tokio::fs::write(&path, &data)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), size = data.len(), "Artifact uploaded");

        self.emit(&OutboundEvent::Upload {
            file_name,
            result_path,
            path: path.display().to_string(),
            size: data.len(),
        })
        .await
    }
}

/// A single normal path component: no separators, no `..`, no root.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
