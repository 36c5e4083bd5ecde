//! Configuration for the comparison client

use serde::{Deserialize, Serialize};
use std::path::Path;
use log::debug;

/// Default comparison server base URL
pub const DEFAULT_API_BASE: &str = "http://localhost:8080/api";

/// Default health probe interval
pub const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 30;

/// Number of models selected after the model list loads
pub const DEFAULT_INITIAL_SELECTION: usize = 3;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig
{   /// Comparison server base URL
    pub api_base: String
  , /// Request timeout in seconds (transport default when unset)
    pub timeout_secs: Option<u64>
  , /// Health probe interval in seconds; unset disables polling
    pub health_interval_secs: Option<u64>
  , /// How many models to select once the list is loaded
    pub initial_selection: usize
}

impl Default for CompareConfig
{   fn default() -> Self
    {   CompareConfig
        {   api_base: DEFAULT_API_BASE.to_string()
          , timeout_secs: None
          , health_interval_secs: Some(DEFAULT_HEALTH_INTERVAL_SECS)
          , initial_selection: DEFAULT_INITIAL_SELECTION
        }
    }
}

impl CompareConfig
{   /// Load configuration from a JSON file.
    /// Missing keys take their default values.
    pub fn from_json_file(path: &Path)
      -> Result<Self, crate::error::Error>
    {   debug!("Loading config from {}", path.display());
        let raw = std::fs::read_to_string(path)
          .map_err(|e| {
            crate::error::Error::InvalidConfiguration(
              format!("{}: {}", path.display(), e)
            )
          })?;
        let config: CompareConfig = serde_json::from_str(&raw)
          .map_err(|e| {
            crate::error::Error::InvalidConfiguration(e.to_string())
          })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the client cannot work with
    pub fn validate(&self) -> Result<(), crate::error::Error>
    {   if self.api_base.trim().is_empty()
        {   return Err(crate::error::Error::InvalidConfiguration(
              "api_base must not be empty".to_string()
            ));
        }
        if self.health_interval_secs == Some(0)
        {   return Err(crate::error::Error::InvalidConfiguration(
              "health_interval_secs must be positive".to_string()
            ));
        }
        Ok(())
    }

    /// Base URL with any trailing slash removed
    pub fn api_base(&self) -> &str
    {   self.api_base.trim_end_matches('/')
    }
}
