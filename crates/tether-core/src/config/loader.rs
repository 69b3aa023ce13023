//! File and environment configuration loading

use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::CoordinatorConfig;
use crate::error::{TetherError, TetherResult};

/// Prefix for environment overrides, e.g. `TETHER_STOP_TIMEOUT_MS`
pub const ENV_PREFIX: &str = "TETHER_";

const DEFAULT_FILE_NAME: &str = "tether.toml";

/// Resolves configuration from defaults, a TOML file, and the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit config file instead of searching for `tether.toml`
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// The file that will be read, if any exists
    ///
    /// An explicit path is returned even when missing so the caller gets a
    /// clear error; the implicit search only returns existing files.
    pub fn resolve_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.path {
            return Some(path.clone());
        }
        let local = PathBuf::from(DEFAULT_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("tether").join(DEFAULT_FILE_NAME))
            .filter(|p| p.exists())
    }

    /// Load a whole document, falling back to defaults when no file is found
    pub fn load<T: DeserializeOwned + Default>(&self) -> TetherResult<T> {
        match self.resolve_path() {
            Some(path) => load_file(&path),
            None => Ok(T::default()),
        }
    }
}

/// Parse a TOML file into any configuration document
pub fn load_file<T: DeserializeOwned>(path: &Path) -> TetherResult<T> {
    let content = fs::read_to_string(path).map_err(|e| {
        TetherError::config_with_context(
            format!("Failed to read config file: {}", e),
            format!("Reading configuration from '{}'", path.display()),
        )
    })?;

    toml::from_str(&content).map_err(|e| {
        TetherError::config_with_context(
            format!("Failed to parse TOML config: {}", e),
            format!("Deserializing TOML configuration from '{}'", path.display()),
        )
    })
}

impl CoordinatorConfig {
    /// Apply `TETHER_*` overrides from the process environment
    pub fn apply_env(&mut self) -> TetherResult<()> {
        self.apply_env_from(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> TetherResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(raw) = var("STOP_TIMEOUT_MS") {
            self.stop_timeout = Duration::from_millis(parse_env("STOP_TIMEOUT_MS", &raw)?);
        }
        if let Some(raw) = var("SEEN_EVENT_CAPACITY") {
            self.seen_event_capacity = parse_env("SEEN_EVENT_CAPACITY", &raw)?;
        }
        if let Some(raw) = var("MAX_ATTEMPTS") {
            self.default_max_attempts = parse_env("MAX_ATTEMPTS", &raw)?;
        }
        if let Some(raw) = var("BACKOFF_INITIAL_MS") {
            self.backoff.initial_delay =
                Duration::from_millis(parse_env("BACKOFF_INITIAL_MS", &raw)?);
        }
        if let Some(raw) = var("BACKOFF_JITTER") {
            self.backoff.jitter = parse_env("BACKOFF_JITTER", &raw)?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> TetherResult<T> {
    raw.trim().parse().map_err(|_| {
        TetherError::config_with_context(
            format!("Invalid {}{} value: '{}'", ENV_PREFIX, name, raw),
            "environment override",
        )
    })
}
