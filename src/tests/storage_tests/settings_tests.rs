// Settings Tests - Testing Settings persistence and validation

use crate::i18n::Locale;
use crate::storage::settings::DEFAULT_PUSH_ENDPOINT;
use crate::storage::Settings;
use crate::Error;
use tempfile::{NamedTempFile, TempDir};

#[test]
fn test_settings_default() {
    let settings = Settings::default();

    assert_eq!(settings.page_size, 20);
    assert_eq!(settings.typing_idle_ms, 2000);
    assert_eq!(settings.load_more_threshold, 0.5);
    assert_eq!(settings.push_endpoint, DEFAULT_PUSH_ENDPOINT);
    assert!(settings.enable_notifications);
    assert_eq!(settings.locale, Locale::En);
    assert_eq!(settings.typing_idle(), std::time::Duration::from_millis(2000));
}

#[test]
fn test_settings_save_and_load() {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let path = temp_file.path();

    let mut settings = Settings::default();
    settings.page_size = 50;
    settings.locale = Locale::Yi;
    settings.database_path = "/custom/chat.db".to_string();
    settings.save(path).expect("Failed to save settings");

    let loaded = Settings::load(path).expect("Failed to load settings");
    assert_eq!(loaded.page_size, 50);
    assert_eq!(loaded.locale, Locale::Yi);
    assert_eq!(loaded.database_path, "/custom/chat.db");
    assert_eq!(loaded.typing_idle_ms, 2000);
}

#[test]
fn test_settings_locale_serialized_as_code() {
    let mut settings = Settings::default();
    settings.locale = Locale::Yi;

    let json = serde_json::to_string(&settings).expect("Failed to serialize");
    assert!(json.contains(r#""locale":"yi""#));
}

#[test]
fn test_settings_load_nonexistent() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("nonexistent.json");

    let settings = Settings::load(&path).expect("Failed to load settings");
    assert_eq!(settings.page_size, 20);
}

#[test]
fn test_settings_load_empty_file() {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    std::fs::write(temp_file.path(), "  \n").expect("Failed to write");

    let settings = Settings::load(temp_file.path()).expect("Failed to load settings");
    assert_eq!(settings.page_size, 20);
}

#[test]
fn test_settings_partial_file_uses_defaults() {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    std::fs::write(temp_file.path(), r#"{"page_size": 5}"#).expect("Failed to write");

    let settings = Settings::load(temp_file.path()).expect("Failed to load settings");
    assert_eq!(settings.page_size, 5);
    assert_eq!(settings.typing_idle_ms, 2000);
    assert!(settings.enable_notifications);
}

#[test]
fn test_settings_rejects_zero_page_size() {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    std::fs::write(temp_file.path(), r#"{"page_size": 0}"#).expect("Failed to write");

    let result = Settings::load(temp_file.path());
    assert!(matches!(result, Err(Error::Storage(_))));
}

#[test]
fn test_settings_rejects_non_positive_threshold() {
    let mut settings = Settings::default();
    settings.load_more_threshold = 0.0;
    assert!(settings.validate().is_err());

    settings.load_more_threshold = 1.5;
    assert!(settings.validate().is_ok());
}

#[test]
fn test_settings_malformed_json() {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    std::fs::write(temp_file.path(), "{ not json").expect("Failed to write");

    assert!(matches!(Settings::load(temp_file.path()), Err(Error::Storage(_))));
}

#[test]
fn test_settings_save_creates_parent_dirs() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("nested").join("dir").join("settings.json");

    Settings::default().save(&path).expect("Failed to save settings");
    assert!(path.exists());
}
