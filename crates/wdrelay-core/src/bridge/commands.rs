//! Wire command table: command name to HTTP method and path template.
//!
//! Names follow the Selenium 3 remote command set. Templates use `$name`
//! placeholders that are filled from the command parameters.

use super::BridgeError;
use reqwest::Method;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct WireCommand {
    pub method: Method,
    pub template: &'static str,
}

pub fn lookup(name: &str) -> Option<WireCommand> {
    let (method, template) = match name {
        "getStatus" => (Method::GET, "/status"),
        "newSession" => (Method::POST, "/session"),
        "getAllSessions" => (Method::GET, "/sessions"),
        "quit" | "deleteSession" => (Method::DELETE, "/session/$sessionId"),
        "getCurrentWindowHandle" => (Method::GET, "/session/$sessionId/window_handle"),
        "w3cGetCurrentWindowHandle" => (Method::GET, "/session/$sessionId/window"),
        "getWindowHandles" => (Method::GET, "/session/$sessionId/window_handles"),
        "w3cGetWindowHandles" => (Method::GET, "/session/$sessionId/window/handles"),
        "get" | "navigate" => (Method::POST, "/session/$sessionId/url"),
        "goForward" => (Method::POST, "/session/$sessionId/forward"),
        "goBack" => (Method::POST, "/session/$sessionId/back"),
        "refresh" => (Method::POST, "/session/$sessionId/refresh"),
        "executeScript" => (Method::POST, "/session/$sessionId/execute"),
        "w3cExecuteScript" => (Method::POST, "/session/$sessionId/execute/sync"),
        "w3cExecuteScriptAsync" => (Method::POST, "/session/$sessionId/execute/async"),
        "executeAsyncScript" => (Method::POST, "/session/$sessionId/execute_async"),
        "getCurrentUrl" => (Method::GET, "/session/$sessionId/url"),
        "getTitle" => (Method::GET, "/session/$sessionId/title"),
        "getPageSource" => (Method::GET, "/session/$sessionId/source"),
        "screenshot" => (Method::GET, "/session/$sessionId/screenshot"),
        "elementScreenshot" => (Method::GET, "/session/$sessionId/element/$id/screenshot"),
        "findElement" => (Method::POST, "/session/$sessionId/element"),
        "findElements" => (Method::POST, "/session/$sessionId/elements"),
        "w3cGetActiveElement" => (Method::GET, "/session/$sessionId/element/active"),
        "getActiveElement" => (Method::POST, "/session/$sessionId/element/active"),
        "findChildElement" => (Method::POST, "/session/$sessionId/element/$id/element"),
        "findChildElements" => (Method::POST, "/session/$sessionId/element/$id/elements"),
        "clickElement" => (Method::POST, "/session/$sessionId/element/$id/click"),
        "clearElement" => (Method::POST, "/session/$sessionId/element/$id/clear"),
        "submitElement" => (Method::POST, "/session/$sessionId/element/$id/submit"),
        "getElementText" => (Method::GET, "/session/$sessionId/element/$id/text"),
        "sendKeysToElement" => (Method::POST, "/session/$sessionId/element/$id/value"),
        "sendKeysToActiveElement" => (Method::POST, "/session/$sessionId/keys"),
        "uploadFile" => (Method::POST, "/session/$sessionId/file"),
        "getElementValue" => (Method::GET, "/session/$sessionId/element/$id/value"),
        "getElementTagName" => (Method::GET, "/session/$sessionId/element/$id/name"),
        "isElementSelected" => (Method::GET, "/session/$sessionId/element/$id/selected"),
        "setElementSelected" => (Method::POST, "/session/$sessionId/element/$id/selected"),
        "isElementEnabled" => (Method::GET, "/session/$sessionId/element/$id/enabled"),
        "isElementDisplayed" => (Method::GET, "/session/$sessionId/element/$id/displayed"),
        "getElementLocation" => (Method::GET, "/session/$sessionId/element/$id/location"),
        "getElementLocationOnceScrolledIntoView" => {
            (Method::GET, "/session/$sessionId/element/$id/location_in_view")
        }
        "getElementSize" => (Method::GET, "/session/$sessionId/element/$id/size"),
        "getElementRect" => (Method::GET, "/session/$sessionId/element/$id/rect"),
        "getElementAttribute" => (Method::GET, "/session/$sessionId/element/$id/attribute/$name"),
        "getElementProperty" => (Method::GET, "/session/$sessionId/element/$id/property/$name"),
        "getElementValueOfCssProperty" => {
            (Method::GET, "/session/$sessionId/element/$id/css/$propertyName")
        }
        "getCookies" => (Method::GET, "/session/$sessionId/cookie"),
        "addCookie" => (Method::POST, "/session/$sessionId/cookie"),
        "getCookie" => (Method::GET, "/session/$sessionId/cookie/$name"),
        "deleteAllCookies" => (Method::DELETE, "/session/$sessionId/cookie"),
        "deleteCookie" => (Method::DELETE, "/session/$sessionId/cookie/$name"),
        "switchToFrame" => (Method::POST, "/session/$sessionId/frame"),
        "switchToParentFrame" => (Method::POST, "/session/$sessionId/frame/parent"),
        "switchToWindow" => (Method::POST, "/session/$sessionId/window"),
        "close" => (Method::DELETE, "/session/$sessionId/window"),
        "implicitlyWait" => (Method::POST, "/session/$sessionId/timeouts/implicit_wait"),
        "setScriptTimeout" => (Method::POST, "/session/$sessionId/timeouts/async_script"),
        "setTimeouts" => (Method::POST, "/session/$sessionId/timeouts"),
        "dismissAlert" => (Method::POST, "/session/$sessionId/dismiss_alert"),
        "w3cDismissAlert" => (Method::POST, "/session/$sessionId/alert/dismiss"),
        "acceptAlert" => (Method::POST, "/session/$sessionId/accept_alert"),
        "w3cAcceptAlert" => (Method::POST, "/session/$sessionId/alert/accept"),
        "setAlertValue" => (Method::POST, "/session/$sessionId/alert_text"),
        "w3cSetAlertValue" => (Method::POST, "/session/$sessionId/alert/text"),
        "getAlertText" => (Method::GET, "/session/$sessionId/alert_text"),
        "w3cGetAlertText" => (Method::GET, "/session/$sessionId/alert/text"),
        "mouseClick" => (Method::POST, "/session/$sessionId/click"),
        "actions" => (Method::POST, "/session/$sessionId/actions"),
        "clearActionState" => (Method::DELETE, "/session/$sessionId/actions"),
        "mouseDoubleClick" => (Method::POST, "/session/$sessionId/doubleclick"),
        "mouseButtonDown" => (Method::POST, "/session/$sessionId/buttondown"),
        "mouseButtonUp" => (Method::POST, "/session/$sessionId/buttonup"),
        "mouseMoveTo" => (Method::POST, "/session/$sessionId/moveto"),
        "getWindowSize" => (Method::GET, "/session/$sessionId/window/$windowHandle/size"),
        "w3cGetWindowSize" => (Method::GET, "/session/$sessionId/window/size"),
        "setWindowSize" => (Method::POST, "/session/$sessionId/window/$windowHandle/size"),
        "w3cSetWindowSize" => (Method::POST, "/session/$sessionId/window/size"),
        "getWindowPosition" => (Method::GET, "/session/$sessionId/window/$windowHandle/position"),
        "setWindowPosition" => (Method::POST, "/session/$sessionId/window/$windowHandle/position"),
        "getWindowRect" => (Method::GET, "/session/$sessionId/window/rect"),
        "setWindowRect" => (Method::POST, "/session/$sessionId/window/rect"),
        "windowMaximize" => (Method::POST, "/session/$sessionId/window/$windowHandle/maximize"),
        "w3cMaximizeWindow" => (Method::POST, "/session/$sessionId/window/maximize"),
        "minimizeWindow" => (Method::POST, "/session/$sessionId/window/minimize"),
        "fullscreenWindow" => (Method::POST, "/session/$sessionId/window/fullscreen"),
        "setScreenOrientation" => (Method::POST, "/session/$sessionId/orientation"),
        "getScreenOrientation" => (Method::GET, "/session/$sessionId/orientation"),
        "getLog" => (Method::POST, "/session/$sessionId/log"),
        "getAvailableLogTypes" => (Method::GET, "/session/$sessionId/log/types"),
        _ => return None,
    };

    Some(WireCommand { method, template })
}

/// Fill `$placeholder`s from `params`. A placeholder without a matching
/// string or number parameter is an error.
pub fn render_path(
    command: &str,
    template: &str,
    params: &Map<String, Value>,
) -> Result<String, BridgeError> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('$') {
        rendered.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let key = &after[..end];

        let value = match params.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(BridgeError::MissingParameter {
                    command: command.to_string(),
                    parameter: key.to_string(),
                });
            }
        };
        rendered.push_str(&value);
        rest = &after[end..];
    }
    rendered.push_str(rest);

    Ok(rendered)
}
