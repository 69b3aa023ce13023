//! reqwest-based session backend

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::json;
use tether_core::{EventStream, SessionBackend, TetherError, TetherResult};

use crate::config::HttpBackendConfig;
use crate::sse::sse_record_stream;

/// Header carrying the resumption cursor on reconnect
pub const LAST_EVENT_ID: &str = "Last-Event-ID";

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Session backend speaking HTTP for calls and SSE for events
///
/// Requests are sent once; retrying is left to the caller.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> TetherResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .default_headers(default_headers(&config)?)
            .build()
            .map_err(|e| {
                TetherError::config_with_context(
                    format!("Failed to build HTTP client: {}", e),
                    "http client",
                )
            })?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpBackendConfig {
        &self.config
    }

    async fn post(
        &self,
        operation: &str,
        url: String,
        body: serde_json::Value,
    ) -> TetherResult<()> {
        tracing::debug!(operation, url = %url, "sending request");
        let request = self
            .client
            .post(&url)
            .timeout(self.config.request_timeout)
            .json(&body);
        let response = send(operation, request).await?;
        check_status(operation, response).await?;
        Ok(())
    }
}

fn default_headers(config: &HttpBackendConfig) -> TetherResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = &config.api_key {
        let value = HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|_| {
            TetherError::config_with_context("api_key is not a valid header value", "http.api_key")
        })?;
        headers.insert(AUTHORIZATION, value);
    }
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            TetherError::config_with_context(
                format!("invalid header name '{}'", name),
                "http.headers",
            )
        })?;
        let value = HeaderValue::from_str(value).map_err(|_| {
            TetherError::config_with_context(
                format!("invalid value for header '{}'", name),
                "http.headers",
            )
        })?;
        headers.insert(name, value);
    }
    Ok(headers)
}

async fn send(operation: &str, request: RequestBuilder) -> TetherResult<Response> {
    request.send().await.map_err(|e| {
        if e.is_timeout() {
            TetherError::collaborator(operation, format!("request timed out: {}", e))
        } else {
            TetherError::collaborator(operation, format!("request failed: {}", e))
        }
    })
}

/// Turn a non-success status into a collaborator error carrying the code
async fn check_status(operation: &str, response: Response) -> TetherResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = truncate(body.trim());
    tracing::warn!(operation, status = status.as_u16(), body = %detail, "request rejected");
    let message = if detail.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, detail)
    };
    Err(TetherError::collaborator_with_status(
        operation,
        message,
        status.as_u16(),
    ))
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_ERROR_BODY_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
    format!("{}...", cut)
}

#[async_trait]
impl SessionBackend for HttpBackend {
    async fn open_event_stream(
        &self,
        session_id: &str,
        last_event_id: Option<String>,
    ) -> TetherResult<EventStream> {
        let url = self.config.events_url(session_id);
        let mut request = self.client.get(&url).header(ACCEPT, "text/event-stream");
        if let Some(id) = &last_event_id {
            request = request.header(LAST_EVENT_ID, id.as_str());
        }
        tracing::info!(
            session_id,
            url = %url,
            last_event_id = ?last_event_id,
            "opening SSE stream"
        );

        let response = send("open_event_stream", request).await?;
        let response = check_status("open_event_stream", response).await?;
        Ok(sse_record_stream(response.bytes_stream()))
    }

    async fn send_message(&self, session_id: &str, content: &str) -> TetherResult<()> {
        self.post(
            "send_message",
            self.config.message_url(session_id),
            json!({ "content": content }),
        )
        .await
    }

    async fn cancel_processing(&self, session_id: &str) -> TetherResult<()> {
        self.post("cancel_processing", self.config.cancel_url(session_id), json!({}))
            .await
    }

    async fn grant_permission(&self, request_id: &str) -> TetherResult<()> {
        self.post(
            "grant_permission",
            self.config.grant_url(request_id),
            json!({ "granted": true }),
        )
        .await
    }

    async fn deny_permission(&self, request_id: &str) -> TetherResult<()> {
        self.post(
            "deny_permission",
            self.config.deny_url(request_id),
            json!({ "granted": false }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_header_is_config_error() {
        let config = HttpBackendConfig::default().with_header("bad header", "x");
        assert!(matches!(
            HttpBackend::new(config),
            Err(TetherError::Config { .. })
        ));
    }

    #[test]
    fn test_truncate_long_bodies() {
        let body = "x".repeat(MAX_ERROR_BODY_CHARS + 10);
        let cut = truncate(&body);
        assert_eq!(cut.len(), MAX_ERROR_BODY_CHARS + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate("short"), "short");
    }
}
