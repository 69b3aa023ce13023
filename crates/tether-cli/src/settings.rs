//! CLI configuration document
//!
//! One TOML file carries both layers:
//!
//! ```toml
//! [coordinator]
//! stop_timeout = "2s"
//!
//! [http]
//! base_url = "https://agent.example.com"
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tether_core::{ConfigLoader, CoordinatorConfig};
use tether_http::HttpBackendConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub coordinator: CoordinatorConfig,
    pub http: HttpBackendConfig,
}

impl Settings {
    /// Load the file, then apply environment and command-line overrides
    pub fn resolve(
        path: Option<&Path>,
        base_url: Option<String>,
        api_key: Option<String>,
    ) -> anyhow::Result<Self> {
        let mut loader = ConfigLoader::new();
        if let Some(path) = path {
            loader = loader.with_file(path);
        }
        if let Some(path) = loader.resolve_path() {
            tracing::debug!(path = %path.display(), "loading configuration");
        }

        let mut settings: Settings = loader.load()?;
        settings
            .coordinator
            .apply_env()
            .context("invalid coordinator environment override")?;
        settings.apply_overrides(base_url, api_key);
        settings.validate()?;
        Ok(settings)
    }

    pub fn apply_overrides(&mut self, base_url: Option<String>, api_key: Option<String>) {
        if let Some(base_url) = base_url {
            self.http.base_url = base_url;
        }
        if let Some(api_key) = api_key {
            self.http.api_key = Some(api_key);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.coordinator
            .validate()
            .context("invalid [coordinator] settings")?;
        self.http.validate().context("invalid [http] settings")?;
        Ok(())
    }

    /// Copy safe to print, with the API key masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.http.api_key.is_some() {
            copy.http.api_key = Some("********".to_string());
        }
        copy
    }
}
