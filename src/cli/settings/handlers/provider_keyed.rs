//! Provider-keyed setting handlers for HashMap<String, String> settings.

use crate::cli::settings::error::SettingError;
use crate::cli::settings::helpers::{
    format_provider_map, mutate_config_with_message, validate_provider, validate_url,
};
use crate::cli::settings::{SetContext, SettingHandler};
use crate::core::config::data::Config;

/// Handler for the `default-model` setting.
pub struct DefaultModelHandler;

impl SettingHandler for DefaultModelHandler {
    fn key(&self) -> &'static str {
        "default-model"
    }

    fn set(&self, args: &[String], ctx: &SetContext<'_>) -> Result<String, SettingError> {
        if args.len() < 2 {
            return Err(SettingError::MissingArgs {
                hint: "To set a default model, specify the provider and model:",
                example: "tokenlens set default-model gemini gemini-1.5-pro",
            });
        }

        let provider = validate_provider(&args[0])?;
        let model = args[1..].join(" ");
        if !provider.has_model(&model) {
            return Err(SettingError::UnknownModel {
                provider: provider.id,
                model,
            });
        }

        let message = format!(
            "✅ Set default-model for provider '{}' to: {}",
            provider.id, model
        );
        mutate_config_with_message(
            ctx.config_path,
            move |config| config.set_default_model(provider.id, model),
            message,
        )
    }

    fn unset(&self, args: Option<&str>, ctx: &SetContext<'_>) -> Result<String, SettingError> {
        let provider = args.ok_or(SettingError::MissingArgs {
            hint: "To unset a default model, specify the provider:",
            example: "tokenlens unset default-model gemini",
        })?;
        let provider = validate_provider(provider)?.id;
        let message = format!("✅ Unset default-model for provider: {provider}");

        mutate_config_with_message(
            ctx.config_path,
            move |config| config.unset_default_model(&provider),
            message,
        )
    }

    fn format(&self, config: &Config) -> String {
        format_provider_map("default-models", &config.default_models)
    }
}

/// Handler for the `base-url` setting, mainly for proxies and local mocks.
pub struct BaseUrlHandler;

impl SettingHandler for BaseUrlHandler {
    fn key(&self) -> &'static str {
        "base-url"
    }

    fn set(&self, args: &[String], ctx: &SetContext<'_>) -> Result<String, SettingError> {
        if args.len() != 2 {
            return Err(SettingError::MissingArgs {
                hint: "To override a base URL, specify the provider and URL:",
                example: "tokenlens set base-url gemini http://localhost:8080/v1beta",
            });
        }

        let provider = validate_provider(&args[0])?.id;
        let url = validate_url(&args[1])?;
        let message = format!("✅ Set base-url for provider '{provider}' to: {url}");

        mutate_config_with_message(
            ctx.config_path,
            move |config| config.set_base_url(provider, url),
            message,
        )
    }

    fn unset(&self, args: Option<&str>, ctx: &SetContext<'_>) -> Result<String, SettingError> {
        let provider = args.ok_or(SettingError::MissingArgs {
            hint: "To remove a base URL override, specify the provider:",
            example: "tokenlens unset base-url gemini",
        })?;
        let provider = validate_provider(provider)?.id;
        let message = format!("✅ Unset base-url for provider: {provider}");

        mutate_config_with_message(
            ctx.config_path,
            move |config| config.unset_base_url(&provider),
            message,
        )
    }

    fn format(&self, config: &Config) -> String {
        format_provider_map("base-urls", &config.base_urls)
    }
}
