use serde::{Deserialize, Serialize};

use kvorm_types::KEY_DELIMITER;

use crate::error::{ModelError, ModelResult};

/// Mapper configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// First component of every default key prefix.
    pub namespace: String,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            namespace: "kvorm".into(),
        }
    }
}

impl MapperConfig {
    /// A configuration with a custom namespace.
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Check that the namespace can head a store key.
    pub fn validate(&self) -> ModelResult<()> {
        if self.namespace.is_empty() {
            return Err(ModelError::Configuration(
                "namespace must not be empty".into(),
            ));
        }
        if self.namespace.contains(KEY_DELIMITER) {
            return Err(ModelError::Configuration(format!(
                "namespace {:?} must not contain {KEY_DELIMITER:?}",
                self.namespace
            )));
        }
        Ok(())
    }

    /// Parse and validate a configuration from TOML text. Missing keys take
    /// their defaults.
    pub fn from_toml_str(text: &str) -> ModelResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| ModelError::Configuration(format!("invalid mapper config: {e}")))?;
        config.validate()?;
        tracing::debug!(namespace = %config.namespace, "loaded mapper config");
        Ok(config)
    }
}
