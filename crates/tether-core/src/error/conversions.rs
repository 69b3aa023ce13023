//! From trait implementations for TetherError conversions

use super::types::TetherError;

impl From<toml::de::Error> for TetherError {
    fn from(error: toml::de::Error) -> Self {
        Self::config_with_context(error.to_string(), "TOML parse")
    }
}
