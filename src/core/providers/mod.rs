//! Provider adapters and the registry the orchestrator selects them from.
//!
//! Every provider, including the ones without chat support, implements
//! [`ProviderAdapter`] so the orchestrator never needs to know which vendor it
//! talks to.

mod approximate;
mod gemini;

pub use approximate::ApproximateProvider;
pub use gemini::GeminiProvider;

use std::error::Error;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures_util::Stream;
use tokio_util::sync::CancellationToken;

use crate::api::{ContentPart, MessageContent, ResponseFragment, TokenCount};
use crate::core::builtin_providers::{load_builtin_providers, BuiltinProvider};
use crate::core::config::Config;
use crate::core::error::ProviderError;
use crate::core::message::ChatRole;

/// Lazy, finite, non-restartable sequence of response fragments. Consumers
/// may drop it early.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<ResponseFragment, ProviderError>> + Send>>;

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> &str;

    fn display_name(&self) -> &str;

    /// Synchronous capability probe. Adapters returning `false` must still
    /// fail chat calls with [`ProviderError::Unsupported`].
    fn supports_chat(&self) -> bool;

    async fn count_tokens_for_text(
        &self,
        credential: &str,
        model: &str,
        text: &str,
    ) -> Result<TokenCount, ProviderError>;

    async fn count_tokens_for_pdf(
        &self,
        credential: &str,
        model: &str,
        base64_payload: &str,
        file_name: Option<&str>,
    ) -> Result<TokenCount, ProviderError>;

    async fn create_chat_session(
        &self,
        credential: &str,
        model: &str,
        system_instruction: Option<&str>,
    ) -> Result<SessionHandle, ProviderError>;

    async fn send_message_in_chat(
        &self,
        session: &SessionHandle,
        content: MessageContent,
        cancel_token: Option<CancellationToken>,
    ) -> Result<FragmentStream, ProviderError>;
}

/// One completed exchange entry in a session's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: ChatRole,
    pub parts: Vec<ContentPart>,
}

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

struct SessionState {
    id: u64,
    provider_id: String,
    credential: String,
    model: String,
    system_instruction: Option<String>,
    history: Mutex<Vec<HistoryEntry>>,
}

/// Opaque chat session handle. Clones share the same conversation history.
#[derive(Clone)]
pub struct SessionHandle(Arc<SessionState>);

impl SessionHandle {
    pub fn new(
        provider_id: &str,
        credential: &str,
        model: &str,
        system_instruction: Option<&str>,
    ) -> Self {
        Self(Arc::new(SessionState {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            provider_id: provider_id.to_string(),
            credential: credential.to_string(),
            model: model.to_string(),
            system_instruction: system_instruction.map(str::to_owned),
            history: Mutex::new(Vec::new()),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn provider_id(&self) -> &str {
        &self.0.provider_id
    }

    pub fn credential(&self) -> &str {
        &self.0.credential
    }

    pub fn model(&self) -> &str {
        &self.0.model
    }

    pub fn system_instruction(&self) -> Option<&str> {
        self.0.system_instruction.as_deref()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.lock_history().clone()
    }

    /// Records a finished turn so later requests carry the conversation.
    pub fn push_exchange(&self, user_parts: Vec<ContentPart>, model_reply: String) {
        let mut history = self.lock_history();
        history.push(HistoryEntry {
            role: ChatRole::User,
            parts: user_parts,
        });
        history.push(HistoryEntry {
            role: ChatRole::Model,
            parts: vec![ContentPart::text(model_reply)],
        });
    }

    fn lock_history(&self) -> MutexGuard<'_, Vec<HistoryEntry>> {
        self.0
            .history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.0.id)
            .field("provider_id", &self.0.provider_id)
            .field("model", &self.0.model)
            .finish_non_exhaustive()
    }
}

impl PartialEq for SessionHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    pub id: String,
    pub display_name: String,
}

#[derive(Clone)]
pub struct RegisteredProvider {
    pub info: BuiltinProvider,
    pub adapter: Arc<dyn ProviderAdapter>,
}

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<RegisteredProvider>,
}

impl ProviderRegistry {
    /// Builds adapters for the embedded catalogue, applying base URL
    /// overrides from the config.
    pub fn builtin(client: reqwest::Client, config: &Config) -> Self {
        let providers = load_builtin_providers()
            .into_iter()
            .map(|info| {
                let adapter: Arc<dyn ProviderAdapter> = if info.is_gemini_mode() {
                    let base_url = config
                        .base_url_for(&info.id)
                        .map(str::to_owned)
                        .unwrap_or_else(|| info.base_url.clone());
                    Arc::new(GeminiProvider::new(client.clone(), &info.id, base_url))
                } else {
                    Arc::new(ApproximateProvider::new(&info.id, &info.display_name))
                };
                RegisteredProvider { info, adapter }
            })
            .collect();
        Self { providers }
    }

    pub fn from_parts(providers: Vec<RegisteredProvider>) -> Self {
        Self { providers }
    }

    pub fn list(&self) -> Vec<ProviderInfo> {
        self.providers
            .iter()
            .map(|p| ProviderInfo {
                id: p.info.id.clone(),
                display_name: p.info.display_name.clone(),
            })
            .collect()
    }

    pub fn find(&self, id: &str) -> Option<&RegisteredProvider> {
        self.providers
            .iter()
            .find(|p| p.info.id.eq_ignore_ascii_case(id))
    }

    pub fn adapter(&self, id: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.find(id).map(|p| Arc::clone(&p.adapter))
    }

    pub fn models_of(&self, id: &str) -> &[String] {
        self.find(id)
            .map(|p| p.info.models.as_slice())
            .unwrap_or(&[])
    }

    pub fn first(&self) -> Option<&RegisteredProvider> {
        self.providers.first()
    }
}

#[derive(Debug)]
pub enum SelectionError {
    UnknownProvider(String),
    UnknownModel { provider: String, model: String },
    NoProviders,
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionError::UnknownProvider(id) => write!(f, "Unknown provider '{id}'"),
            SelectionError::UnknownModel { provider, model } => {
                write!(f, "Model '{model}' is not available for provider '{provider}'")
            }
            SelectionError::NoProviders => write!(f, "No providers are registered"),
        }
    }
}

impl Error for SelectionError {}

/// The active provider and model. The model is always one of the provider's
/// listed models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSelection {
    provider_id: String,
    model_id: String,
}

impl ProviderSelection {
    /// Picks `provider_id` (or the first registered provider) and `model_id`
    /// (or that provider's default model).
    pub fn resolve(
        registry: &ProviderRegistry,
        provider_id: Option<&str>,
        model_id: Option<&str>,
    ) -> Result<Self, SelectionError> {
        let provider = match provider_id.filter(|id| !id.is_empty()) {
            Some(id) => registry
                .find(id)
                .ok_or_else(|| SelectionError::UnknownProvider(id.to_string()))?,
            None => registry.first().ok_or(SelectionError::NoProviders)?,
        };

        let model_id = match model_id.filter(|m| !m.is_empty()) {
            Some(model) if provider.info.has_model(model) => model.to_string(),
            Some(model) => {
                return Err(SelectionError::UnknownModel {
                    provider: provider.info.id.clone(),
                    model: model.to_string(),
                })
            }
            None => provider.info.default_model.clone(),
        };

        Ok(Self {
            provider_id: provider.info.id.clone(),
            model_id,
        })
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}
