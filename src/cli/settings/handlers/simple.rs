//! Simple setting handlers for single-value settings.

use crate::cli::settings::error::SettingError;
use crate::cli::settings::helpers::{
    mutate_config_with_message, success_set, success_unset, validate_provider,
};
use crate::cli::settings::{SetContext, SettingHandler};
use crate::core::config::data::Config;

/// Handler for the `default-provider` setting.
pub struct DefaultProviderHandler;

impl SettingHandler for DefaultProviderHandler {
    fn key(&self) -> &'static str {
        "default-provider"
    }

    fn set(&self, args: &[String], ctx: &SetContext<'_>) -> Result<String, SettingError> {
        if args.is_empty() {
            return Err(SettingError::MissingArgs {
                hint: "To set a default provider, specify the provider:",
                example: "tokenlens set default-provider gemini",
            });
        }

        let provider = validate_provider(&args.join(" "))?.id;
        let message = success_set("default-provider", &provider);

        mutate_config_with_message(
            ctx.config_path,
            move |config| config.default_provider = Some(provider),
            message,
        )
    }

    fn unset(&self, _args: Option<&str>, ctx: &SetContext<'_>) -> Result<String, SettingError> {
        mutate_config_with_message(
            ctx.config_path,
            |config| config.default_provider = None,
            success_unset("default-provider"),
        )
    }

    fn format(&self, config: &Config) -> String {
        match &config.default_provider {
            Some(provider) => format!("  default-provider: {provider}"),
            None => "  default-provider: (unset)".to_string(),
        }
    }
}
