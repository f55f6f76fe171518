use serde::{Deserialize, Serialize};

/// Top-level application settings container.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppSettings {
    pub backend: BackendSettings,
    pub auth: AuthSettings,
    pub realtime: RealtimeSettings,
    pub storage: StorageSettings,
}

/// Which store implementation the app talks to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// SQLite file on this machine with an in-process change feed.
    Local,
    /// Hosted backend reached over HTTP.
    Remote,
}

/// Connection details for the hosted backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendSettings {
    pub mode: BackendMode,
    pub url: String,
    pub anon_key: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            mode: BackendMode::Local,
            url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
        }
    }
}

/// OAuth sign-in settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSettings {
    pub provider: String,
    /// Origin the provider redirects back to; the callback path is appended.
    pub site_url: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            provider: "google".to_string(),
            site_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Realtime change feed settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeSettings {
    /// Bounded queue length per subscriber.
    pub channel_capacity: usize,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// Local storage settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageSettings {
    /// SQLite file name, resolved against the data directory.
    pub database_file: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_file: "smartmarks.db".to_string(),
        }
    }
}
