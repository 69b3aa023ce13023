//! HTTP backend configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tether_core::{TetherError, TetherResult};

/// Endpoint paths, relative to `base_url`
///
/// `{session_id}` and `{permission_id}` placeholders are substituted per
/// call after percent-encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointTemplates {
    pub events: String,
    pub message: String,
    pub cancel: String,
    pub grant_permission: String,
    pub deny_permission: String,
}

impl Default for EndpointTemplates {
    fn default() -> Self {
        Self {
            events: "/sessions/{session_id}/events".to_string(),
            message: "/sessions/{session_id}/messages".to_string(),
            cancel: "/sessions/{session_id}/cancel".to_string(),
            grant_permission: "/permissions/{permission_id}/grant".to_string(),
            deny_permission: "/permissions/{permission_id}/deny".to_string(),
        }
    }
}

/// Settings for [`HttpBackend`](crate::HttpBackend)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub endpoints: EndpointTemplates,
    /// Timeout for request/response calls; the event stream has none
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Sent as a bearer token when set
    pub api_key: Option<String>,
    /// Extra headers sent on every request
    pub headers: HashMap<String, String>,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            endpoints: EndpointTemplates::default(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            api_key: None,
            headers: HashMap::new(),
        }
    }
}

impl HttpBackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn validate(&self) -> TetherResult<()> {
        let base = self.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(TetherError::config_with_context(
                format!("base_url must be an http(s) URL, got '{}'", self.base_url),
                "http.base_url",
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(TetherError::config_with_context(
                "request_timeout must be greater than zero",
                "http.request_timeout",
            ));
        }
        Ok(())
    }

    /// Absolute URL for a template with its placeholder filled in
    pub fn url(&self, template: &str, placeholder: &str, value: &str) -> String {
        let path = template.replace(&format!("{{{}}}", placeholder), &encode_segment(value));
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn events_url(&self, session_id: &str) -> String {
        self.url(&self.endpoints.events, "session_id", session_id)
    }

    pub fn message_url(&self, session_id: &str) -> String {
        self.url(&self.endpoints.message, "session_id", session_id)
    }

    pub fn cancel_url(&self, session_id: &str) -> String {
        self.url(&self.endpoints.cancel, "session_id", session_id)
    }

    pub fn grant_url(&self, permission_id: &str) -> String {
        self.url(&self.endpoints.grant_permission, "permission_id", permission_id)
    }

    pub fn deny_url(&self, permission_id: &str) -> String {
        self.url(&self.endpoints.deny_permission, "permission_id", permission_id)
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set
fn encode_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
