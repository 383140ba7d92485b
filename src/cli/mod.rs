//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat_repl;
pub mod count;
pub mod provider_list;
pub mod settings;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::cli::chat_repl::run_chat;
use crate::cli::count::run_count;
use crate::cli::provider_list::list_providers;
use crate::cli::settings::{SetContext, SettingError, SettingRegistry};
use crate::core::app::{apply_action, App, AppAction};
use crate::core::builtin_providers::find_builtin_provider;
use crate::core::config::Config;
use crate::core::content::PdfDocument;
use crate::core::providers::ProviderRegistry;
use crate::utils::logging::init_tracing;

#[derive(Parser)]
#[command(name = "tokenlens", version)]
#[command(about = "Count LLM tokens for text and PDFs, and chat about them")]
#[command(
    long_about = "tokenlens counts the tokens a document costs with a given provider and model, \
and holds a streaming chat about pasted text or a PDF. Text and PDF conversations are kept \
separately, each with its own token usage ledger.\n\n\
Credentials:\n\
  --api-key overrides the provider's environment variable:\n\
  GEMINI_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY\n\n\
Environment Variables:\n\
  TOKENLENS_LOG     Log filter directives (default: warn)\n\n\
Chat commands:\n\
  /help             Show all chat commands\n\
  Ctrl+C            Cancel the reply in flight, or quit when idle"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Provider to use (see `tokenlens providers`)
    #[arg(short = 'p', long, global = true, value_name = "PROVIDER")]
    pub provider: Option<String>,

    /// Model to use; must be one of the provider's models
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// API key, overriding the provider's environment variable
    #[arg(short = 'k', long, global = true, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Write diagnostics to this file instead of stderr
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List providers, their models, and whether a key is available
    Providers,
    /// Count the tokens of a text file or a PDF
    Count {
        /// Plain text file to count
        #[arg(long, value_name = "FILE", conflicts_with = "pdf", required_unless_present = "pdf")]
        text: Option<PathBuf>,
        /// PDF file to count
        #[arg(long, value_name = "FILE")]
        pdf: Option<PathBuf>,
    },
    /// Start an interactive chat (default)
    Chat {
        /// Text file to discuss in the text context
        #[arg(long, value_name = "FILE")]
        text: Option<PathBuf>,
        /// PDF to discuss in the pdf context
        #[arg(long, value_name = "FILE")]
        pdf: Option<PathBuf>,
    },
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value(s) for the key, e.g. `gemini gemini-1.5-pro` for default-model
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
        /// Provider for provider-keyed settings
        value: Option<String>,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.log.as_deref())?;

    match args.command.unwrap_or(Commands::Chat {
        text: None,
        pdf: None,
    }) {
        Commands::Providers => {
            let config = Config::load()?;
            list_providers(&config);
            Ok(())
        }
        Commands::Set { key, value } => {
            let config_path = Config::get_config_path()?;
            let config = Config::load_from_path(&config_path)?;
            let registry = SettingRegistry::new();
            let Some(key) = key else {
                println!("{}", registry.format_all(&config));
                return Ok(());
            };
            let ctx = SetContext {
                config: &config,
                config_path: &config_path,
            };
            let result = registry
                .get(&key)
                .ok_or_else(|| SettingError::UnknownKey(key.clone()))
                .and_then(|handler| handler.set(&value, &ctx));
            report_setting(result)
        }
        Commands::Unset { key, value } => {
            let config_path = Config::get_config_path()?;
            let config = Config::load_from_path(&config_path)?;
            let registry = SettingRegistry::new();
            let ctx = SetContext {
                config: &config,
                config_path: &config_path,
            };
            let result = registry
                .get(&key)
                .ok_or_else(|| SettingError::UnknownKey(key.clone()))
                .and_then(|handler| handler.unset(value.as_deref(), &ctx));
            report_setting(result)
        }
        Commands::Count { text, pdf } => {
            let mut app = build_app(
                args.provider.as_deref(),
                args.model.as_deref(),
                args.api_key.as_deref(),
            )?;
            run_count(&mut app, text, pdf).await
        }
        Commands::Chat { text, pdf } => {
            let mut app = build_app(
                args.provider.as_deref(),
                args.model.as_deref(),
                args.api_key.as_deref(),
            )?;
            if let Some(path) = text {
                let story = std::fs::read_to_string(&path)
                    .map_err(|err| format!("Cannot read {}: {err}", path.display()))?;
                apply_action(&mut app, AppAction::SetStoryText { text: story });
            }
            if let Some(path) = pdf {
                apply_action(
                    &mut app,
                    AppAction::SetPdf {
                        document: Some(PdfDocument::open(path)),
                    },
                );
            }
            run_chat(app, args.api_key).await
        }
    }
}

fn report_setting(result: Result<String, SettingError>) -> Result<(), Box<dyn Error>> {
    match result {
        Ok(message) => {
            println!("{message}");
            Ok(())
        }
        Err(err) => {
            err.print();
            std::process::exit(1);
        }
    }
}

/// Builds the app from config, CLI overrides and the resolved credential.
fn build_app(
    provider: Option<&str>,
    model: Option<&str>,
    api_key: Option<&str>,
) -> Result<App, Box<dyn Error>> {
    let config = Config::load()?;
    let client = reqwest::Client::builder().build()?;
    let registry = ProviderRegistry::builtin(client, &config);
    let mut app = App::from_config(
        registry,
        &config,
        provider,
        model,
        String::new(),
    )?;

    let credential = resolve_credential(api_key, app.selection().provider_id());
    debug!(
        provider = app.selection().provider_id(),
        model = app.selection().model_id(),
        has_credential = !credential.is_empty(),
        "app initialised"
    );
    apply_action(&mut app, AppAction::SetCredential { credential });
    Ok(app)
}

/// An explicit key wins; otherwise the provider's environment variable is
/// used. Missing keys resolve to an empty credential, which the app reports.
pub fn resolve_credential(explicit: Option<&str>, provider_id: &str) -> String {
    if let Some(key) = explicit.filter(|key| !key.trim().is_empty()) {
        return key.trim().to_string();
    }
    find_builtin_provider(provider_id)
        .and_then(|provider| provider.api_key_env)
        .and_then(|var| std::env::var(var).ok())
        .map(|key| key.trim().to_string())
        .unwrap_or_default()
}
