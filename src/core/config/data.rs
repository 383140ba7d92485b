use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    pub default_provider: Option<String>,
    /// Preferred model per provider id
    #[serde(default)]
    pub default_models: HashMap<String, String>,
    /// API base URL overrides per provider id
    #[serde(default)]
    pub base_urls: HashMap<String, String>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

impl Config {
    pub fn default_model_for(&self, provider: &str) -> Option<&str> {
        self.default_models
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(provider))
            .map(|(_, model)| model.as_str())
    }

    pub fn set_default_model(&mut self, provider: String, model: String) {
        self.default_models
            .insert(provider.to_ascii_lowercase(), model);
    }

    pub fn unset_default_model(&mut self, provider: &str) {
        self.default_models
            .retain(|id, _| !id.eq_ignore_ascii_case(provider));
    }

    pub fn base_url_for(&self, provider: &str) -> Option<&str> {
        self.base_urls
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(provider))
            .map(|(_, url)| url.as_str())
    }

    pub fn set_base_url(&mut self, provider: String, url: String) {
        self.base_urls.insert(provider.to_ascii_lowercase(), url);
    }

    pub fn unset_base_url(&mut self, provider: &str) {
        self.base_urls
            .retain(|id, _| !id.eq_ignore_ascii_case(provider));
    }
}
