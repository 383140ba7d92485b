//! Built-in provider catalogue
//!
//! Providers, their models, and the adapter mode are embedded at build time
//! from `builtin_providers.toml`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltinProvider {
    pub id: String,
    pub display_name: String,
    pub mode: Option<String>,
    pub api_key_env: Option<String>,
    pub base_url: String,
    pub default_model: String,
    pub models: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BuiltinProvidersConfig {
    providers: Vec<BuiltinProvider>,
}

impl BuiltinProvider {
    /// Adapter mode; providers without one only estimate token counts.
    pub fn adapter_mode(&self) -> &str {
        self.mode.as_deref().unwrap_or("approximate")
    }

    pub fn is_gemini_mode(&self) -> bool {
        self.adapter_mode() == "gemini"
    }

    pub fn has_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}

/// Load built-in providers from the embedded configuration
pub fn load_builtin_providers() -> Vec<BuiltinProvider> {
    const CONFIG_CONTENT: &str = include_str!("../builtin_providers.toml");

    let config: BuiltinProvidersConfig =
        toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtin_providers.toml");

    config.providers
}

/// Find a built-in provider by ID (case-insensitive)
pub fn find_builtin_provider(id: &str) -> Option<BuiltinProvider> {
    load_builtin_providers()
        .into_iter()
        .find(|p| p.id.eq_ignore_ascii_case(id))
}
