//! Built-in defaults (layer 1)
//!
//! Hardcoded defaults for all configuration values.

use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// REDCap API endpoint
    pub api_url: String,

    /// Directory receiving `<project>.yaml` files (default: ".")
    pub settings_dir: String,

    /// Field identifying a project record (default: "project_name")
    pub record_id_field: String,

    /// Form holding general settings (default: "general")
    pub general_form: String,

    /// Per-request HTTP timeout in seconds (default: 30)
    pub timeout_seconds: u64,

    /// Attempts per REDCap request including the first (default: 3)
    pub retry_max_attempts: u32,

    /// Delay before the first retry in milliseconds (default: 500)
    pub retry_initial_delay_ms: u64,

    /// Upper bound for a retry delay in milliseconds (default: 8000)
    pub retry_max_delay_ms: u64,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            api_url: "https://redcap.vanderbilt.edu/api/".to_string(),
            settings_dir: ".".to_string(),
            record_id_field: "project_name".to_string(),
            general_form: "general".to_string(),
            timeout_seconds: 30,
            retry_max_attempts: 3,
            retry_initial_delay_ms: 500,
            retry_max_delay_ms: 8000,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "api_url": self.api_url,
            "settings_dir": self.settings_dir,
            "record_id_field": self.record_id_field,
            "general_form": self.general_form,
            "http": {
                "timeout_seconds": self.timeout_seconds
            },
            "retry": {
                "max_attempts": self.retry_max_attempts,
                "initial_delay_ms": self.retry_initial_delay_ms,
                "max_delay_ms": self.retry_max_delay_ms
            }
        })
    }
}
