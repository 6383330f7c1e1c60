//! Post-processing of command results that carry binary artifacts.

use crate::models::{CommandRequest, CommandResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use thiserror::Error;

/// Marker that introduces the diagnostic screenshot Selenium embeds in error
/// messages.
pub const INLINE_SCREEN_MARKER: &str = r#","screen":""#;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Screenshot value is not a base64 string")]
    NotText,

    #[error("Invalid base64 screenshot: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Missing field for artifact upload: {0}")]
    MissingField(&'static str),
}

/// An artifact ready to be handed to the controller's upload collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactUpload {
    pub file_name: String,
    pub result_path: String,
    pub data: Vec<u8>,
}

/// Remove every inline `,"screen":"<payload>"` block, keeping the text around it.
pub fn strip_inline_screen(value: &str) -> String {
    let mut stripped = value.to_string();
    while let Some((head, rest)) = stripped.split_once(INLINE_SCREEN_MARKER) {
        // An unterminated payload runs to the end of the value.
        let tail = rest.split_once('"').map(|(_, tail)| tail).unwrap_or("");
        stripped = format!("{head}{tail}");
    }
    stripped
}

/// Strip the inline screen from a failed result whose value is text.
pub fn strip_result_screen(result: &mut CommandResult) {
    if let Value::String(text) = &result.value
        && text.contains(INLINE_SCREEN_MARKER)
    {
        result.value = Value::String(strip_inline_screen(text));
    }
}

pub fn extract_screenshot(value: &Value) -> Result<Vec<u8>, ArtifactError> {
    let encoded = value.as_str().ok_or(ArtifactError::NotText)?;
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(STANDARD.decode(compact.as_bytes())?)
}

/// `{testcase}_{replay}_ADP{adapter}_step{command id}_{command}.{extension}`
pub fn screenshot_file_name(
    request: &CommandRequest,
    extension: &str,
) -> Result<String, ArtifactError> {
    let testcase = request
        .testcase_name
        .as_deref()
        .ok_or(ArtifactError::MissingField("testcase-name"))?;
    let replay = request
        .replay_id
        .as_deref()
        .ok_or(ArtifactError::MissingField("test-replay-id"))?;

    Ok(format!(
        "{}_{}_ADP{}_step{}_{}.{}",
        testcase,
        replay,
        request.route.adapter_id,
        request.command.id_label(),
        request.command.name,
        extension.to_lowercase()
    ))
}

pub fn screenshot_upload(
    request: &CommandRequest,
    result: &CommandResult,
    extension: &str,
) -> Result<ArtifactUpload, ArtifactError> {
    let result_path = request
        .result_path
        .clone()
        .ok_or(ArtifactError::MissingField("result-path"))?;
    let file_name = screenshot_file_name(request, extension)?;
    let data = extract_screenshot(&result.value)?;

    Ok(ArtifactUpload {
        file_name,
        result_path,
        data,
    })
}
