use super::*;
use tempfile::TempDir;

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn run_set(path: &Path, key: &str, values: &[&str]) -> Result<String, SettingError> {
    let config = Config::load_from_path(path).expect("load");
    let ctx = SetContext {
        config: &config,
        config_path: path,
    };
    let registry = SettingRegistry::new();
    let handler = registry
        .get(key)
        .ok_or_else(|| SettingError::UnknownKey(key.to_string()))?;
    handler.set(&args(values), &ctx)
}

fn run_unset(path: &Path, key: &str, value: Option<&str>) -> Result<String, SettingError> {
    let config = Config::load_from_path(path).expect("load");
    let ctx = SetContext {
        config: &config,
        config_path: path,
    };
    SettingRegistry::new()
        .get(key)
        .expect("known key")
        .unset(value, &ctx)
}

#[test]
fn default_provider_is_canonicalised() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.toml");

    let message = run_set(&path, "default-provider", &["GEMINI"]).expect("set");
    assert!(message.contains("gemini"));
    let config = Config::load_from_path(&path).expect("reload");
    assert_eq!(config.default_provider.as_deref(), Some("gemini"));

    run_unset(&path, "default-provider", None).expect("unset");
    let config = Config::load_from_path(&path).expect("reload");
    assert!(config.default_provider.is_none());
}

#[test]
fn default_model_must_belong_to_the_provider() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.toml");

    let err = run_set(&path, "default-model", &["openai", "gemini-1.5-pro"]).expect_err("reject");
    assert!(matches!(err, SettingError::UnknownModel { .. }));
    assert!(!path.exists());

    run_set(&path, "default-model", &["gemini", "gemini-1.5-pro"]).expect("set");
    let config = Config::load_from_path(&path).expect("reload");
    assert_eq!(config.default_model_for("gemini"), Some("gemini-1.5-pro"));
}

#[test]
fn missing_arguments_are_reported_with_an_example() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.toml");

    let err = run_set(&path, "default-model", &["gemini"]).expect_err("missing model");
    assert!(matches!(err, SettingError::MissingArgs { .. }));
    let err = run_unset(&path, "base-url", None).expect_err("missing provider");
    assert!(matches!(err, SettingError::MissingArgs { .. }));
}

#[test]
fn base_url_requires_http_scheme() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.toml");

    let err = run_set(&path, "base-url", &["gemini", "localhost:8080"]).expect_err("scheme");
    assert!(matches!(err, SettingError::InvalidUrl(_)));

    run_set(&path, "base-url", &["gemini", "http://localhost:8080/v1beta/"]).expect("set");
    let config = Config::load_from_path(&path).expect("reload");
    assert_eq!(config.base_url_for("gemini"), Some("http://localhost:8080/v1beta"));
}

#[test]
fn unknown_keys_and_providers_are_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.toml");

    assert!(matches!(
        run_set(&path, "theme", &["dark"]),
        Err(SettingError::UnknownKey(_))
    ));
    assert!(matches!(
        run_set(&path, "default-provider", &["nope"]),
        Err(SettingError::UnknownProvider { .. })
    ));
}

#[test]
fn format_all_lists_keys_in_display_order() {
    let mut config = Config {
        default_provider: Some("gemini".into()),
        ..Default::default()
    };
    config.set_default_model("gemini".into(), "gemini-1.5-pro".into());

    let output = SettingRegistry::new().format_all(&config);
    let provider_at = output.find("default-provider: gemini").expect("provider");
    let models_at = output.find("gemini: gemini-1.5-pro").expect("models");
    assert!(provider_at < models_at);
    assert!(output.contains("base-urls: (none set)"));
}
