//! Serde shapes for event payloads
//!
//! Services disagree on field names (`id` vs `tool_call_id`, `params` vs
//! `parameters`), and some send both. Alternatives are therefore separate
//! optional fields merged after decoding rather than serde aliases, which
//! reject payloads carrying both spellings.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use super::PermissionPayload;
use crate::error::{TetherError, TetherResult};
use crate::recovery::RetryHint;

pub(super) fn from_value<T: DeserializeOwned>(
    event_type: &str,
    payload: &Value,
) -> TetherResult<T> {
    serde_json::from_value(payload.clone())
        .map_err(|e| TetherError::decode(event_type, e.to_string()))
}

/// Tool parameters as an object, or as a JSON-encoded string of one
fn parameter_map(
    event_type: &str,
    field: &str,
    value: Option<Value>,
) -> TetherResult<Option<HashMap<String, Value>>> {
    let value = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => return Ok(None),
        Some(Value::String(text)) => serde_json::from_str(&text).map_err(|e| {
            TetherError::decode(event_type, format!("`{}` is not valid JSON: {}", field, e))
        })?,
        Some(value) => value,
    };
    match value {
        Value::Object(map) => Ok(Some(map.into_iter().collect())),
        other => Err(TetherError::decode(
            event_type,
            format!("`{}` must be an object, got {}", field, kind_of(&other)),
        )),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn required(event_type: &str, field: &str, value: Option<String>) -> TetherResult<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| TetherError::decode(event_type, format!("missing field `{}`", field)))
}

/// Text fragment of a `thinking` or `content` event; a bare string is accepted
pub(super) fn delta(event_type: &str, payload: &Value) -> TetherResult<String> {
    if let Some(text) = payload.as_str() {
        return Ok(text.to_string());
    }
    let delta: DeltaPayload = from_value(event_type, payload)?;
    delta
        .content
        .or(delta.delta)
        .or(delta.text)
        .ok_or_else(|| TetherError::decode(event_type, "missing field `content`"))
}

#[derive(Debug, Deserialize)]
struct DeltaPayload {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    delta: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawToolPayload {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    tool_call_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    parameters: Option<Value>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    input: Option<Value>,
}

pub(super) struct ToolPayload {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub parameters: Option<HashMap<String, Value>>,
}

pub(super) fn tool(event_type: &str, payload: &Value) -> TetherResult<ToolPayload> {
    let raw: RawToolPayload = from_value(event_type, payload)?;
    let parameters = match parameter_map(event_type, "parameters", raw.parameters)? {
        Some(map) => Some(map),
        None => match parameter_map(event_type, "params", raw.params)? {
            Some(map) => Some(map),
            None => parameter_map(event_type, "input", raw.input)?,
        },
    };
    Ok(ToolPayload {
        id: required(event_type, "id", raw.id.or(raw.tool_call_id))?,
        name: raw.name.or(raw.tool_name),
        description: raw.description,
        status: raw.status,
        parameters,
    })
}

#[derive(Debug, Deserialize)]
struct RawExecutionPayload {
    #[serde(default)]
    tool_call_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    progress: Option<String>,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub(super) struct ExecutionPayload {
    pub tool_call_id: String,
    pub success: Option<bool>,
    pub progress: Option<String>,
    pub result: Option<String>,
    pub error: Option<String>,
}

/// Shared shape of `tool_execution_start` and `tool_execution_complete`
pub(super) fn execution(event_type: &str, payload: &Value) -> TetherResult<ExecutionPayload> {
    let raw: RawExecutionPayload = from_value(event_type, payload)?;
    Ok(ExecutionPayload {
        tool_call_id: required(event_type, "tool_call_id", raw.tool_call_id.or(raw.id))?,
        success: raw.success,
        progress: raw.progress,
        result: raw.result,
        error: raw.error,
    })
}

#[derive(Debug, Deserialize)]
struct RawPermissionPayload {
    id: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    tool_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    action: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    parameters: Option<Value>,
}

pub(super) fn permission(event_type: &str, payload: &Value) -> TetherResult<PermissionPayload> {
    let raw: RawPermissionPayload = from_value(event_type, payload)?;
    let params = match parameter_map(event_type, "params", raw.params)? {
        Some(map) => map,
        None => parameter_map(event_type, "parameters", raw.parameters)?.unwrap_or_default(),
    };
    Ok(PermissionPayload {
        id: raw.id,
        session_id: raw.session_id,
        tool_name: raw.tool_name,
        description: raw.description,
        action: raw.action,
        path: raw.path,
        params,
    })
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct CompletePayload {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    /// Milliseconds
    #[serde(default)]
    pub reasoning_duration: Option<f64>,
    #[serde(default, rename = "reasoningDuration")]
    pub reasoning_duration_camel: Option<f64>,
}

impl CompletePayload {
    /// Final reasoning text, when the service sent a non-empty one
    pub fn reasoning(&self) -> Option<String> {
        self.reasoning.clone().filter(|text| !text.is_empty())
    }

    pub fn reasoning_duration(&self) -> Option<Duration> {
        self.reasoning_duration
            .or(self.reasoning_duration_camel)
            .and_then(millis)
    }
}

fn millis(ms: f64) -> Option<Duration> {
    (ms.is_finite() && ms >= 0.0).then(|| Duration::from_micros((ms * 1000.0).round() as u64))
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ErrorPayload {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub retry_after_ms: Option<u64>,
    /// Milliseconds, same unit as `retry_after_ms`
    #[serde(default)]
    pub retry_after: Option<f64>,
    #[serde(default)]
    pub attempt: Option<u32>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl ErrorPayload {
    /// Human-readable message from `message`, or from `error` as a string
    /// or an object with its own `message`
    pub fn text(&self) -> Option<String> {
        self.message.clone().or_else(|| match &self.error {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Object(map)) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
    }

    /// A zero or missing delay means the error is not a rate limit
    pub fn retry_hint(&self) -> Option<RetryHint> {
        let retry_after_ms = self
            .retry_after_ms
            .or_else(|| self.retry_after.and_then(millis).map(|d| d.as_millis() as u64))
            .filter(|ms| *ms > 0)?;
        Some(RetryHint {
            retry_after_ms,
            attempt: self.attempt,
            max_attempts: self.max_attempts,
        })
    }
}
