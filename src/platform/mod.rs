// Smartmarks platform paths
// Linux:   $XDG_CONFIG_HOME/smartmarks, $XDG_DATA_HOME/smartmarks
// macOS:   ~/Library/Application Support/Smartmarks
// Windows: %APPDATA%/Smartmarks

use std::env;
use std::path::PathBuf;

#[cfg(not(target_os = "windows"))]
fn home_dir() -> PathBuf {
    PathBuf::from(env::var("HOME").unwrap_or_else(|_| String::from("/tmp")))
}

/// Returns the platform-specific configuration directory.
pub fn get_config_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        home_dir().join("Library").join("Application Support").join("Smartmarks")
    }
    #[cfg(target_os = "windows")]
    {
        let appdata = env::var("APPDATA")
            .unwrap_or_else(|_| String::from("C:\\Users\\Default\\AppData\\Roaming"));
        PathBuf::from(appdata).join("Smartmarks")
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        match env::var("XDG_CONFIG_HOME") {
            Ok(xdg) => PathBuf::from(xdg).join("smartmarks"),
            Err(_) => home_dir().join(".config").join("smartmarks"),
        }
    }
}

/// Returns the platform-specific data directory. Same as the config
/// directory on macOS and Windows.
pub fn get_data_dir() -> PathBuf {
    #[cfg(any(target_os = "macos", target_os = "windows"))]
    {
        get_config_dir()
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        match env::var("XDG_DATA_HOME") {
            Ok(xdg) => PathBuf::from(xdg).join("smartmarks"),
            Err(_) => home_dir().join(".local").join("share").join("smartmarks"),
        }
    }
}
