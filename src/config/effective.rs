//! Effective configuration with provenance
//!
//! Captures the merged configuration, the typed settings derived from it and
//! where each contributing layer came from.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dax_redcap::{RedcapClientConfig, RetryPolicy};

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use crate::settings::RecordLayout;

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Host,
    File,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    /// Origin of this source
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// HTTP settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    pub timeout_seconds: u64,
}

/// Retry settings for REDCap requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

/// Typed settings for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// REDCap API endpoint
    pub api_url: String,

    /// API token, when supplied through a config file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Output directory for settings files
    pub settings_dir: PathBuf,

    /// Record-id field of the REDCap project
    pub record_id_field: String,

    /// Form holding general settings
    pub general_form: String,

    pub http: HttpSettings,

    pub retry: RetrySettings,
}

impl SettingsConfig {
    /// Field naming used by the settings builders
    pub fn layout(&self) -> RecordLayout {
        RecordLayout {
            record_id_field: self.record_id_field.clone(),
            general_form: self.general_form.clone(),
        }
    }

    /// The API token; a run cannot start without one
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(ConfigError::InvalidValue {
                field: "api_key".to_string(),
                reason: "no REDCap API key given (--key or REDCAP_API_KEY)".to_string(),
            }),
        }
    }

    /// Configuration for the REDCap client
    pub fn client_config(&self) -> RedcapClientConfig {
        RedcapClientConfig {
            api_url: self.api_url.clone(),
            timeout: Duration::from_secs(self.http.timeout_seconds),
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
                max_delay: Duration::from_millis(self.retry.max_delay_ms),
            },
        }
    }
}

/// Effective configuration with provenance
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    /// Typed settings (secrets intact)
    pub settings: SettingsConfig,

    /// The merged configuration object with secrets redacted, safe to log
    pub redacted: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,

    /// Redacted key paths
    pub redactions: Vec<String>,
}

/// Keys that contain secrets and should be redacted
const SECRET_KEYS: &[&str] = &["password", "token", "secret", "api_key", "credential"];

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {reason}")]
    IoError { path: String, reason: String },

    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl EffectiveConfig {
    /// Default host config location (`~/.config/dax-settings/config.toml`)
    pub fn default_host_path() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".config/dax-settings/config.toml"))
    }

    /// Build effective config from layers.
    ///
    /// A missing host file is skipped; a missing explicit file is an error.
    pub fn build(
        host_config_path: Option<&Path>,
        config_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = Vec::new();
        let mut sources = Vec::new();

        // Layer 1: Built-in defaults
        layers.push(BuiltinDefaults::default().to_value());
        sources.push(ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        });

        // Layer 2: Host config
        if let Some(path) = host_config_path {
            if path.exists() {
                let (value, digest) = Self::load_toml_file(path)?;
                layers.push(value);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::Host,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            }
        }

        // Layer 3: Explicit config file
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            let (value, digest) = Self::load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin: ConfigOrigin::File,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        // Layer 4: CLI overrides
        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let mut merged = merge_layers(layers);

        let settings: SettingsConfig = serde_json::from_value(merged.clone())
            .map_err(|e| ConfigError::ParseError(format!("invalid configuration: {}", e)))?;
        Self::validate(&settings)?;

        let redactions = Self::redact_secrets(&mut merged);

        Ok(Self {
            settings,
            redacted: merged,
            sources,
            redactions,
        })
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;

        let toml_value: toml::Value = toml::from_str(&contents).map_err(|e| {
            ConfigError::ParseError(format!("TOML parse error in {}: {}", path.display(), e))
        })?;

        Ok((Self::toml_to_json(toml_value), digest))
    }

    /// Convert TOML Value to JSON Value
    fn toml_to_json(toml: toml::Value) -> Value {
        match toml {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Number(i.into()),
            toml::Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Self::toml_to_json).collect())
            }
            toml::Value::Table(table) => Value::Object(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::toml_to_json(v)))
                    .collect(),
            ),
        }
    }

    fn validate(settings: &SettingsConfig) -> Result<(), ConfigError> {
        if settings.api_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_url".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if settings.record_id_field.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "record_id_field".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if settings.general_form.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "general_form".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if settings.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if settings.http.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "http.timeout_seconds".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Redact secrets in the config, returning list of redacted paths
    fn redact_secrets(value: &mut Value) -> Vec<String> {
        let mut redactions = Vec::new();
        Self::redact_recursive(value, String::new(), &mut redactions);
        redactions
    }

    fn redact_recursive(value: &mut Value, path: String, redactions: &mut Vec<String>) {
        match value {
            Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let current_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };

                    let is_secret = SECRET_KEYS.iter().any(|s| key_lower.contains(s));

                    if is_secret && !val.is_object() && !val.is_array() && !val.is_null() {
                        *val = Value::String("[REDACTED]".to_string());
                        redactions.push(current_path);
                    } else {
                        Self::redact_recursive(val, current_path, redactions);
                    }
                }
            }
            Value::Array(arr) => {
                for (i, val) in arr.iter_mut().enumerate() {
                    let current_path = format!("{}[{}]", path, i);
                    Self::redact_recursive(val, current_path, redactions);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_only() {
        let config = EffectiveConfig::build(None, None, None).unwrap();

        assert_eq!(config.settings.settings_dir, PathBuf::from("."));
        assert_eq!(config.settings.record_id_field, "project_name");
        assert_eq!(config.settings.retry.max_attempts, 3);
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].origin, ConfigOrigin::Builtin);
        assert!(config.redactions.is_empty());
    }

    #[test]
    fn test_layer_precedence() {
        let host = toml_file(
            "settings_dir = \"/host/settings\"\n[retry]\nmax_attempts = 5\n",
        );
        let file = toml_file("settings_dir = \"/file/settings\"\n[http]\ntimeout_seconds = 90\n");
        let cli = json!({"api_url": "https://redcap.example.org/api/"});

        let config =
            EffectiveConfig::build(Some(host.path()), Some(file.path()), Some(cli)).unwrap();

        assert_eq!(config.settings.settings_dir, PathBuf::from("/file/settings"));
        assert_eq!(config.settings.retry.max_attempts, 5);
        assert_eq!(config.settings.retry.initial_delay_ms, 500);
        assert_eq!(config.settings.http.timeout_seconds, 90);
        assert_eq!(config.settings.api_url, "https://redcap.example.org/api/");

        let origins: Vec<_> = config.sources.iter().map(|s| s.origin.clone()).collect();
        assert_eq!(
            origins,
            vec![
                ConfigOrigin::Builtin,
                ConfigOrigin::Host,
                ConfigOrigin::File,
                ConfigOrigin::Cli
            ]
        );
        assert_eq!(config.sources[1].digest.as_ref().unwrap().len(), 64);
    }

    #[test]
    fn test_missing_host_file_is_skipped() {
        let config =
            EffectiveConfig::build(Some(Path::new("/nonexistent/dax/config.toml")), None, None)
                .unwrap();
        assert_eq!(config.sources.len(), 1);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = EffectiveConfig::build(None, Some(Path::new("/nonexistent/dax.toml")), None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_api_key_redacted_but_kept_in_settings() {
        let file = toml_file("api_key = \"0123456789ABCDEF\"\n");
        let config = EffectiveConfig::build(None, Some(file.path()), None).unwrap();

        assert_eq!(config.settings.api_key.as_deref(), Some("0123456789ABCDEF"));
        assert_eq!(config.redacted["api_key"], "[REDACTED]");
        assert_eq!(config.redactions, vec!["api_key".to_string()]);
    }

    #[test]
    fn test_invalid_toml() {
        let file = toml_file("settings_dir = \n");
        let err = EffectiveConfig::build(None, Some(file.path()), None).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let cli = json!({"retry": {"max_attempts": "many"}});
        let err = EffectiveConfig::build(None, None, Some(cli)).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let cli = json!({"retry": {"max_attempts": 0}});
        let err = EffectiveConfig::build(None, None, Some(cli)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "retry.max_attempts"));
    }

    #[test]
    fn test_client_config_conversion() {
        let config = EffectiveConfig::build(None, None, None).unwrap();
        let client = config.settings.client_config();

        assert_eq!(client.timeout, Duration::from_secs(30));
        assert_eq!(client.retry.max_attempts, 3);
        assert_eq!(client.retry.max_delay, Duration::from_millis(8000));

        let layout = config.settings.layout();
        assert_eq!(layout.general_form, "general");
    }

    #[test]
    fn test_require_api_key() {
        let config = EffectiveConfig::build(None, None, None).unwrap();
        assert!(matches!(
            config.settings.require_api_key(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "api_key"
        ));

        let cli = json!({"api_key": "  "});
        let config = EffectiveConfig::build(None, None, Some(cli)).unwrap();
        assert!(config.settings.require_api_key().is_err());

        let cli = json!({"api_key": "ABC123"});
        let config = EffectiveConfig::build(None, None, Some(cli)).unwrap();
        assert_eq!(config.settings.require_api_key().unwrap(), "ABC123");
    }
}
