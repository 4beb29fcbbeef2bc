//! Provider manifests, configuration values and setup-form entries.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::logging::LogLevel;

/// Config key holding the per-instance log level.
pub const CONF_LOG_LEVEL: &str = "log_level";

/// Kind of provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    #[default]
    Music,
    Player,
    Metadata,
    Plugin,
}

/// Static description of a provider, shipped with its code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderManifest {
    #[serde(rename = "type")]
    pub type_: ProviderType,
    pub domain: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Upstream libraries/services the provider talks to.
    #[serde(default)]
    pub requirements: Vec<String>,
}

/// A stored configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Null,
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

/// Raw values submitted from a setup form (or stored for an instance).
pub type ConfigValues = HashMap<String, ConfigValue>;

/// Configuration of one provider instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub instance_id: String,
    /// Custom friendly name set by the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub values: ConfigValues,
}

impl ProviderConfig {
    pub fn new<S: Into<String>>(instance_id: S) -> Self {
        Self {
            instance_id: instance_id.into(),
            name: None,
            values: ConfigValues::new(),
        }
    }

    /// Builder-style setter for a config value.
    pub fn with_value<K: Into<String>, V: Into<ConfigValue>>(mut self, key: K, value: V) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get_value(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    /// Non-empty string value for `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get_value(key)
            .and_then(ConfigValue::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn log_level(&self) -> LogLevel {
        self.get_str(CONF_LOG_LEVEL)
            .map(LogLevel::parse)
            .unwrap_or_default()
    }
}

/// Kind of form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntryType {
    Boolean,
    String,
    SecureString,
    Integer,
    Float,
    Label,
    Divider,
    Action,
}

/// Selectable option of a config entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigValueOption {
    pub title: String,
    pub value: ConfigValue,
}

/// One field of a provider's setup form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    #[serde(rename = "type")]
    pub type_: ConfigEntryType,
    pub label: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<ConfigValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ConfigValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ConfigValueOption>,
    /// Action key the form triggers for this entry (e.g. an OAuth flow).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_label: Option<String>,
    #[serde(default)]
    pub advanced: bool,
}

impl ConfigEntry {
    pub fn new<K: Into<String>, L: Into<String>>(key: K, type_: ConfigEntryType, label: L) -> Self {
        Self {
            key: key.into(),
            type_,
            label: label.into(),
            required: false,
            description: None,
            default_value: None,
            value: None,
            options: Vec::new(),
            action: None,
            action_label: None,
            advanced: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_action<A: Into<String>, L: Into<String>>(mut self, action: A, label: L) -> Self {
        self.action = Some(action.into());
        self.action_label = Some(label.into());
        self
    }

    pub fn with_value(mut self, value: Option<ConfigValue>) -> Self {
        self.value = value;
        self
    }
}

/// The log-level entry every provider exposes.
pub fn log_level_entry() -> ConfigEntry {
    let mut entry = ConfigEntry::new(CONF_LOG_LEVEL, ConfigEntryType::String, "Log level");
    entry.default_value = Some(ConfigValue::from(LogLevel::Global.as_str()));
    entry.options = LogLevel::ALL
        .iter()
        .map(|level| ConfigValueOption {
            title: level.as_str().to_string(),
            value: ConfigValue::from(level.as_str()),
        })
        .collect();
    entry.advanced = true;
    entry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_str_skips_empty_values() {
        let config = ProviderConfig::new("deezer--1")
            .with_value("access_token", "")
            .with_value("client_id", "abc");
        assert_eq!(config.get_str("access_token"), None);
        assert_eq!(config.get_str("client_id"), Some("abc"));
        assert_eq!(config.get_str("missing"), None);
    }

    #[test]
    fn test_log_level_from_config() {
        let config = ProviderConfig::new("x").with_value(CONF_LOG_LEVEL, "DEBUG");
        assert_eq!(config.log_level(), LogLevel::Debug);
        assert_eq!(ProviderConfig::new("y").log_level(), LogLevel::Global);
    }

    #[test]
    fn test_config_value_untagged() {
        let values: ConfigValues =
            serde_json::from_str(r#"{"a": "x", "b": true, "c": 3}"#).unwrap();
        assert_eq!(values["a"], ConfigValue::String("x".into()));
        assert_eq!(values["b"], ConfigValue::Bool(true));
        assert_eq!(values["c"], ConfigValue::Int(3));
    }

    #[test]
    fn test_config_value_null() {
        let values: ConfigValues = serde_json::from_str(r#"{"name": null, "x": 1.5}"#).unwrap();
        assert_eq!(values["name"], ConfigValue::Null);
        assert_eq!(values["x"], ConfigValue::Float(1.5));
        assert_eq!(serde_json::to_string(&ConfigValue::Null).unwrap(), "null");

        let config = ProviderConfig {
            values,
            ..ProviderConfig::new("soundcloud--1")
        };
        assert_eq!(config.get_str("name"), None);
    }

    #[test]
    fn test_log_level_entry_options() {
        let entry = log_level_entry();
        assert_eq!(entry.key, CONF_LOG_LEVEL);
        assert_eq!(entry.options.len(), LogLevel::ALL.len());
        assert!(!entry.required);
    }
}
