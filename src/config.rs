//! Sync configuration.

use serde::{Deserialize, Serialize};

pub const DEFAULT_COLLECTION: &str = "movies";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings shared by the gateway and the subscription manager.
///
/// ```toml
/// collection = "movies"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Name of the flat collection holding the movie documents.
    pub collection: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

impl SyncConfig {
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collection.trim().is_empty() {
            return Err(ConfigError::Invalid("collection must not be blank".into()));
        }
        Ok(())
    }
}
