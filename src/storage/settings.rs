//! Application settings and configuration

use crate::i18n::Locale;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default push gateway endpoint
pub const DEFAULT_PUSH_ENDPOINT: &str = "https://exp.host/--/api/v2/push/send";

/// Application settings
///
/// Persistent configuration for the chat client.
/// Settings are stored in JSON format and can be loaded/saved from disk.
///
/// # Example
/// ```rust,no_run
/// use convsync::storage::Settings;
///
/// // Load settings (returns default if file doesn't exist)
/// let mut settings = Settings::load("settings.json").expect("Failed to load");
///
/// settings.page_size = 50;
/// settings.save("settings.json").expect("Failed to save");
///
/// println!("Database: {}", settings.database_path);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Messages requested per page
    pub page_size: usize,
    /// Quiet period after the last keystroke before typing status clears
    pub typing_idle_ms: u64,
    /// Fraction of one viewport from the oldest message that triggers "load more"
    pub load_more_threshold: f64,
    /// Push gateway endpoint
    pub push_endpoint: String,
    /// Send push notifications after each message
    pub enable_notifications: bool,
    /// SQLite database backing the feed
    pub database_path: String,
    /// UI language
    pub locale: Locale,
}

impl Settings {
    /// Load settings from a JSON file
    ///
    /// # Arguments
    /// * `path` - Path to the settings file
    ///
    /// # Returns
    /// The loaded settings, or default settings if file doesn't exist
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Storage(format!("Failed to read settings: {}", e)))?;

        // Handle empty file (return defaults)
        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let settings: Self = serde_json::from_str(&data)
            .map_err(|e| Error::Storage(format!("Failed to parse settings: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a JSON file
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("Failed to create settings directory: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Storage(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(path, json)
            .map_err(|e| Error::Storage(format!("Failed to write settings: {}", e)))?;

        Ok(())
    }

    /// Reject values the sync engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::Storage("page_size must be at least 1".to_string()));
        }
        if !(self.load_more_threshold > 0.0) {
            return Err(Error::Storage(format!(
                "load_more_threshold must be positive, got {}",
                self.load_more_threshold
            )));
        }
        Ok(())
    }

    /// Typing idle period as a duration
    pub fn typing_idle(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.typing_idle_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: 20,
            typing_idle_ms: 2000,
            load_more_threshold: 0.5,
            push_endpoint: DEFAULT_PUSH_ENDPOINT.to_string(),
            enable_notifications: true,
            database_path: "./data/convsync.db".to_string(),
            locale: Locale::En,
        }
    }
}
