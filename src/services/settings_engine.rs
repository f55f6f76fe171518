// Smartmarks Settings Engine
// Manages app settings: loading, saving, updating individual values, and resetting to defaults.
// Settings are stored as a JSON file at the platform-specific config path; a few
// values can be overridden from the environment without touching the file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::platform;
use crate::types::errors::SettingsError;
use crate::types::settings::{AppSettings, BackendMode};

pub const ENV_BACKEND_MODE: &str = "SMARTMARKS_BACKEND_MODE";
pub const ENV_BACKEND_URL: &str = "SMARTMARKS_BACKEND_URL";
pub const ENV_ANON_KEY: &str = "SMARTMARKS_ANON_KEY";
pub const ENV_CHANNEL_CAPACITY: &str = "SMARTMARKS_CHANNEL_CAPACITY";
pub const ENV_DATA_DIR: &str = "SMARTMARKS_DATA_DIR";

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&mut self) -> Result<AppSettings, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    fn get_settings(&self) -> &AppSettings;
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError>;
    fn reset(&mut self) -> Result<(), SettingsError>;
    fn get_config_path(&self) -> &str;
}

/// Settings engine implementation that persists settings as JSON on disk.
pub struct SettingsEngine {
    config_path: String,
    settings: AppSettings,
}

impl SettingsEngine {
    /// Creates a new SettingsEngine.
    ///
    /// If `path_override` is `Some`, uses that path for the config file.
    /// Otherwise, uses the platform-specific config directory with `settings.json`.
    pub fn new(path_override: Option<String>) -> Self {
        let config_path = match path_override {
            Some(p) => p,
            None => platform::get_config_dir()
                .join("settings.json")
                .to_string_lossy()
                .to_string(),
        };

        Self {
            config_path,
            settings: AppSettings::default(),
        }
    }

    /// The stored settings with environment overrides applied.
    pub fn effective_settings(&self) -> AppSettings {
        with_overrides(self.settings.clone(), |name| std::env::var(name).ok())
    }

    /// Where the local store keeps its database file.
    pub fn database_path(&self) -> PathBuf {
        let data_dir = std::env::var(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| platform::get_data_dir());
        data_dir.join(&self.settings.storage.database_file)
    }
}

/// Applies environment overrides read through `lookup`. Unparseable values are
/// ignored with a warning.
pub fn with_overrides<F>(mut settings: AppSettings, lookup: F) -> AppSettings
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(mode) = lookup(ENV_BACKEND_MODE) {
        match mode.trim().to_ascii_lowercase().as_str() {
            "local" => settings.backend.mode = BackendMode::Local,
            "remote" => settings.backend.mode = BackendMode::Remote,
            other => tracing::warn!("invalid {ENV_BACKEND_MODE} {other:?}, ignoring"),
        }
    }
    if let Some(url) = lookup(ENV_BACKEND_URL) {
        if url.starts_with("http://") || url.starts_with("https://") {
            settings.backend.url = url;
        } else {
            tracing::warn!("invalid {ENV_BACKEND_URL} {url:?}, ignoring");
        }
    }
    if let Some(key) = lookup(ENV_ANON_KEY) {
        settings.backend.anon_key = key;
    }
    if let Some(raw) = lookup(ENV_CHANNEL_CAPACITY) {
        match raw.trim().parse::<usize>() {
            Ok(capacity) if capacity > 0 => settings.realtime.channel_capacity = capacity,
            _ => tracing::warn!("invalid {ENV_CHANNEL_CAPACITY} {raw:?}, ignoring"),
        }
    }
    settings
}

impl SettingsEngineTrait for SettingsEngine {
    /// Loads settings from the JSON config file.
    ///
    /// If the file does not exist, returns default settings.
    /// If the file exists but is malformed, returns a serialization error.
    fn load(&mut self) -> Result<AppSettings, SettingsError> {
        let path = Path::new(&self.config_path);

        if !path.exists() {
            self.settings = AppSettings::default();
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SettingsError::IoError(format!("Failed to read config file: {}", e)))?;

        let settings: AppSettings = serde_json::from_str(&content).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;

        self.settings = settings;
        Ok(self.settings.clone())
    }

    /// Saves the current settings, creating parent directories as needed.
    fn save(&self) -> Result<(), SettingsError> {
        let path = Path::new(&self.config_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        fs::write(path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    fn get_settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Updates an individual setting by dot-notation key path, e.g.
    /// `"backend.url"` or `"realtime.channel_capacity"`.
    ///
    /// The new value must deserialize into `AppSettings`. Saves to disk after
    /// a successful update.
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError> {
        if key.is_empty() {
            return Err(SettingsError::InvalidKey("Key cannot be empty".to_string()));
        }

        let parts: Vec<&str> = key.split('.').collect();

        let mut json_value = serde_json::to_value(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        {
            let (last, parents) = parts
                .split_last()
                .ok_or_else(|| SettingsError::InvalidKey(key.to_string()))?;
            let mut current = &mut json_value;
            for part in parents {
                current = current.get_mut(*part).ok_or_else(|| {
                    SettingsError::InvalidKey(format!("Key '{}' not found in settings", key))
                })?;
            }
            match current {
                serde_json::Value::Object(map) if map.contains_key(*last) => {
                    map.insert(last.to_string(), value);
                }
                _ => {
                    return Err(SettingsError::InvalidKey(format!(
                        "Key '{}' not found in settings",
                        key
                    )));
                }
            }
        }

        let new_settings: AppSettings = serde_json::from_value(json_value).map_err(|e| {
            SettingsError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;

        self.settings = new_settings;
        self.save()?;

        Ok(())
    }

    /// Resets all settings to defaults and saves to disk.
    fn reset(&mut self) -> Result<(), SettingsError> {
        self.settings = AppSettings::default();
        self.save()?;
        Ok(())
    }

    fn get_config_path(&self) -> &str {
        &self.config_path
    }
}
