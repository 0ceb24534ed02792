//! Configuration for the mapper.

use figment::Figment;
use serde::{Deserialize, Serialize};

/// Key of the mapper section inside an application figment.
pub const CONFIG_SECTION: &str = "mapper";

/// Mapper settings, read from the `mapper` config section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct MapperConfig {
    /// Prefix prepended to the upper camel case field name to form a setter
    /// name (default: `set`).
    pub setter_prefix: String,
    /// Maximum relation nesting below the top-level entity (default: 32).
    pub max_depth: usize,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            setter_prefix: "set".to_owned(),
            max_depth: 32,
        }
    }
}

impl MapperConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_setter_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.setter_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Extract the `mapper` section from an application figment.
    ///
    /// A figment without the section yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the section exists but cannot be deserialized,
    /// including unknown keys.
    pub fn from_figment(figment: &Figment) -> Result<Self, figment::Error> {
        if !figment.contains(CONFIG_SECTION) {
            tracing::debug!("No mapper config section, using defaults");
            return Ok(Self::default());
        }
        figment.extract_inner(CONFIG_SECTION)
    }
}
