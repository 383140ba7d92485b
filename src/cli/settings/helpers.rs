//! Helper functions for settings operations.

use std::path::Path;

use crate::core::builtin_providers::{find_builtin_provider, BuiltinProvider};
use crate::core::config::data::Config;

use super::error::SettingError;

/// Wrapper around [`Config::mutate_at`] that maps errors to
/// `SettingError::ConfigError` and returns `message` on success.
pub fn mutate_config_with_message<F>(
    config_path: &Path,
    mutator: F,
    message: String,
) -> Result<String, SettingError>
where
    F: FnOnce(&mut Config),
{
    Config::mutate_at(config_path, |config| {
        mutator(config);
        Ok(())
    })
    .map_err(|e| SettingError::ConfigError(e.to_string()))?;
    Ok(message)
}

pub fn success_set(key: &str, value: &str) -> String {
    format!("✅ Set {key} to: {value}")
}

pub fn success_unset(key: &str) -> String {
    format!("✅ Unset {key}")
}

/// Resolves a provider identifier case-insensitively against the catalogue.
pub fn validate_provider(input: &str) -> Result<BuiltinProvider, SettingError> {
    find_builtin_provider(input).ok_or_else(|| SettingError::UnknownProvider {
        input: input.to_string(),
    })
}

pub fn validate_url(input: &str) -> Result<String, SettingError> {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        Ok(trimmed.to_string())
    } else {
        Err(SettingError::InvalidUrl(input.to_string()))
    }
}

/// Renders a provider-keyed map in stable order.
pub fn format_provider_map(label: &str, entries: &std::collections::HashMap<String, String>) -> String {
    if entries.is_empty() {
        return format!("  {label}: (none set)");
    }
    let mut output = format!("  {label}:");
    let mut sorted: Vec<_> = entries.iter().collect();
    sorted.sort();
    for (provider, value) in sorted {
        output.push_str(&format!("\n    {provider}: {value}"));
    }
    output
}
