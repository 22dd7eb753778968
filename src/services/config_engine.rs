// bookdash Config Engine
// Loads the server configuration from a JSON file, layers BOOKDASH_* environment
// overrides on top, and supports updating, saving and resetting individual values.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::types::config::ServerConfig;
use crate::types::errors::ConfigError;

/// Config file used when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "bookdash.json";

pub const ENV_DATA_DIR: &str = "BOOKDASH_DATA_DIR";
pub const ENV_UPLOAD_DIR: &str = "BOOKDASH_UPLOAD_DIR";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "BOOKDASH_FETCH_TIMEOUT_SECS";
pub const ENV_ALLOW_REGISTRATION: &str = "BOOKDASH_ALLOW_REGISTRATION";

/// Trait defining the config engine interface.
pub trait ConfigEngineTrait {
    fn load(&mut self) -> Result<ServerConfig, ConfigError>;
    fn save(&self) -> Result<(), ConfigError>;
    fn get_config(&self) -> &ServerConfig;
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), ConfigError>;
    fn reset(&mut self) -> Result<(), ConfigError>;
    fn get_config_path(&self) -> &str;
}

/// Config engine that persists `ServerConfig` as JSON on disk.
pub struct ConfigEngine {
    config_path: String,
    config: ServerConfig,
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnv(format!("{}={}", key, other))),
    }
}

impl ConfigEngine {
    /// Creates a ConfigEngine for `path_override`, or `bookdash.json` in the
    /// working directory.
    pub fn new(path_override: Option<String>) -> Self {
        Self {
            config_path: path_override.unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string()),
            config: ServerConfig::default(),
        }
    }

    /// Applies overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.config.data_dir = dir;
        }
        if let Some(dir) = lookup(ENV_UPLOAD_DIR) {
            self.config.upload_dir = dir;
        }
        if let Some(raw) = lookup(ENV_FETCH_TIMEOUT_SECS) {
            self.config.fetch_timeout_secs = raw.trim().parse().map_err(|_| {
                ConfigError::InvalidEnv(format!("{}={}", ENV_FETCH_TIMEOUT_SECS, raw))
            })?;
        }
        if let Some(raw) = lookup(ENV_ALLOW_REGISTRATION) {
            self.config.allow_registration_default = parse_bool(ENV_ALLOW_REGISTRATION, &raw)?;
        }
        Ok(())
    }
}

impl ConfigEngineTrait for ConfigEngine {
    /// Loads the config file.
    ///
    /// If the file does not exist, returns the defaults.
    /// If the file exists but is malformed, returns a serialization error.
    /// Missing keys take their default values.
    fn load(&mut self) -> Result<ServerConfig, ConfigError> {
        let path = Path::new(&self.config_path);

        if !path.exists() {
            debug!(path = %self.config_path, "no config file, using defaults");
            self.config = ServerConfig::default();
            return Ok(self.config.clone());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("Failed to read config file: {}", e)))?;

        self.config = serde_json::from_str(&content).map_err(|e| {
            ConfigError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;
        Ok(self.config.clone())
    }

    fn save(&self) -> Result<(), ConfigError> {
        let path = Path::new(&self.config_path);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ConfigError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.config).map_err(|e| {
            ConfigError::SerializationError(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, json)
            .map_err(|e| ConfigError::IoError(format!("Failed to write config file: {}", e)))
    }

    fn get_config(&self) -> &ServerConfig {
        &self.config
    }

    /// Updates one value by dot-notation key path, validates it by
    /// deserializing the whole config, then saves.
    ///
    /// # Examples
    /// - `"upload_dir"` → updates `config.upload_dir`
    /// - `"fetch_timeout_secs"` → updates `config.fetch_timeout_secs`
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), ConfigError> {
        if key.is_empty() {
            return Err(ConfigError::InvalidKey("Key cannot be empty".to_string()));
        }
        let parts: Vec<&str> = key.split('.').collect();

        let mut json_value = serde_json::to_value(&self.config).map_err(|e| {
            ConfigError::SerializationError(format!("Failed to serialize config: {}", e))
        })?;

        {
            let (last, parents) = match parts.split_last() {
                Some(split) => split,
                None => return Err(ConfigError::InvalidKey(key.to_string())),
            };
            let mut current = &mut json_value;
            for part in parents {
                current = current
                    .get_mut(*part)
                    .ok_or_else(|| ConfigError::InvalidKey(format!("Key '{}' not found in config", key)))?;
            }
            match current {
                serde_json::Value::Object(map) if map.contains_key(*last) => {
                    map.insert(last.to_string(), value);
                }
                _ => {
                    return Err(ConfigError::InvalidKey(format!(
                        "Key '{}' not found in config",
                        key
                    )))
                }
            }
        }

        self.config = serde_json::from_value(json_value).map_err(|e| {
            ConfigError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;

        self.save()
    }

    /// Resets the config to defaults and saves to disk.
    fn reset(&mut self) -> Result<(), ConfigError> {
        self.config = ServerConfig::default();
        self.save()
    }

    fn get_config_path(&self) -> &str {
        &self.config_path
    }
}
