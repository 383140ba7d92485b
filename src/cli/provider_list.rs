use crate::core::builtin_providers::{load_builtin_providers, BuiltinProvider};
use crate::core::config::Config;

pub fn list_providers(config: &Config) {
    print!("{}", render_provider_table(&load_builtin_providers(), config, |var| {
        std::env::var_os(var).is_some_and(|value| !value.is_empty())
    }));
}

/// Renders the catalogue with default markers and key availability.
/// `has_env` reports whether an environment variable is set.
pub fn render_provider_table(
    providers: &[BuiltinProvider],
    config: &Config,
    has_env: impl Fn(&str) -> bool,
) -> String {
    if providers.is_empty() {
        return "No providers available.\n".to_string();
    }

    let default_provider = config.default_provider.as_deref();
    let mut output = String::from("Available providers:\n\n");
    output.push_str(&format!(
        "{:<12} {:<18} {:<6} {:<18} {}\n",
        "PROVIDER", "NAME", "CHAT", "KEY", "MODELS"
    ));

    for provider in providers {
        let id = if default_provider.is_some_and(|d| d.eq_ignore_ascii_case(&provider.id)) {
            format!("{}*", provider.id)
        } else {
            provider.id.clone()
        };
        let chat = if provider.is_gemini_mode() { "yes" } else { "soon" };
        let key = match provider.api_key_env.as_deref() {
            Some(var) if has_env(var) => format!("✅ {var}"),
            Some(var) => format!("❌ {var}"),
            None => "-".to_string(),
        };
        let default_model = config
            .default_model_for(&provider.id)
            .unwrap_or(provider.default_model.as_str());
        let models = provider
            .models
            .iter()
            .map(|model| {
                if model == default_model {
                    format!("{model}*")
                } else {
                    model.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        output.push_str(&format!(
            "{:<12} {:<18} {:<6} {:<18} {}\n",
            id, provider.display_name, chat, key, models
        ));
    }

    output.push_str("\n* = default provider / model\n");
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_marks_defaults_and_key_status() {
        let mut config = Config {
            default_provider: Some("Gemini".into()),
            ..Default::default()
        };
        config.set_default_model("gemini".into(), "gemini-1.5-pro".into());

        let table = render_provider_table(&load_builtin_providers(), &config, |var| {
            var == "GEMINI_API_KEY"
        });

        let gemini = table
            .lines()
            .find(|line| line.starts_with("gemini*"))
            .expect("gemini row");
        assert!(gemini.contains("✅ GEMINI_API_KEY"));
        assert!(gemini.contains("gemini-1.5-pro*"));
        assert!(!gemini.contains("gemini-2.0-flash*"));

        let openai = table
            .lines()
            .find(|line| line.starts_with("openai"))
            .expect("openai row");
        assert!(openai.contains("❌ OPENAI_API_KEY"));
        assert!(openai.contains("soon"));
    }
}
