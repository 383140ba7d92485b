use super::data::{path_display, Config};
use super::io::ConfigError;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_nonexistent_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nonexistent_config.toml");

    let config = Config::load_from_path(&config_path).expect("Failed to load config");

    assert_eq!(config, Config::default());
}

#[test]
fn test_config_persistence_lifecycle() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nested").join("config.toml");

    let mut config = Config {
        default_provider: Some("gemini".to_string()),
        ..Default::default()
    };
    config.set_default_model("Gemini".to_string(), "gemini-1.5-pro".to_string());
    config.set_base_url("gemini".to_string(), "http://localhost:9000".to_string());
    config.save_to_path(&config_path).expect("save failed");

    let loaded = Config::load_from_path(&config_path).expect("load failed");
    assert_eq!(loaded.default_provider.as_deref(), Some("gemini"));
    assert_eq!(loaded.default_model_for("GEMINI"), Some("gemini-1.5-pro"));
    assert_eq!(loaded.base_url_for("gemini"), Some("http://localhost:9000"));

    let mut loaded = loaded;
    loaded.unset_default_model("gemini");
    loaded.unset_base_url("Gemini");
    loaded.save_to_path(&config_path).expect("second save failed");

    let reloaded = Config::load_from_path(&config_path).expect("reload failed");
    assert_eq!(reloaded.default_model_for("gemini"), None);
    assert!(reloaded.base_urls.is_empty());
}

#[test]
fn test_invalid_toml_reports_parse_error_with_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "default_provider = [").expect("write failed");

    let err = Config::load_from_path(&config_path).expect_err("parse should fail");
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("config.toml"));
}

#[cfg(unix)]
#[test]
fn test_path_display_uses_tilde_under_home() {
    if let Some(home) = std::env::var_os("HOME") {
        let path = std::path::PathBuf::from(home).join(".config/tokenlens");
        assert_eq!(path_display(&path), "~/.config/tokenlens");
    }
}

#[test]
fn test_mutate_at_saves_only_on_success() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");

    Config::mutate_at(&config_path, |config| {
        config.default_provider = Some("openai".to_string());
        Ok(())
    })
    .expect("mutation should succeed");
    let loaded = Config::load_from_path(&config_path).expect("load failed");
    assert_eq!(loaded.default_provider.as_deref(), Some("openai"));

    let result: Result<(), _> = Config::mutate_at(&config_path, |config| {
        config.default_provider = Some("anthropic".to_string());
        Err("rejected".into())
    });
    assert!(result.is_err());
    let loaded = Config::load_from_path(&config_path).expect("load failed");
    assert_eq!(loaded.default_provider.as_deref(), Some("openai"));
}
