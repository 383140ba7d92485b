//! Orchestration state for the two chat contexts and token counting.
//!
//! [`App`] is only mutated through [`apply_action`]. Work that needs the
//! network is returned as an [`AppCommand`] and executed by
//! [`crate::core::chat_stream::ChatStreamService`], which reports back with
//! further actions.

use std::sync::Arc;

use crate::api::TokenCount;
use crate::core::config::Config;
use crate::core::content::PdfDocument;
use crate::core::providers::{
    ProviderAdapter, ProviderInfo, ProviderRegistry, ProviderSelection, SelectionError,
};

pub mod actions;
pub mod context;

pub use actions::{apply_action, AppAction, AppCommand};
pub use context::ChatContext;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Text,
    Pdf,
}

impl ContextKind {
    pub const ALL: [ContextKind; 2] = [ContextKind::Text, ContextKind::Pdf];

    pub fn as_str(self) -> &'static str {
        match self {
            ContextKind::Text => "text",
            ContextKind::Pdf => "pdf",
        }
    }

    pub fn system_instruction(self) -> &'static str {
        match self {
            ContextKind::Text => {
                "You are a helpful assistant discussing user-provided text. \
                 Answer questions about the text accurately and concisely."
            }
            ContextKind::Pdf => {
                "You are a helpful assistant discussing a user-provided PDF document. \
                 Answer questions about the document accurately and concisely."
            }
        }
    }

    pub fn chat_operation(self) -> &'static str {
        match self {
            ContextKind::Text => "send text chat message",
            ContextKind::Pdf => "send pdf chat message",
        }
    }

    pub fn count_operation(self) -> &'static str {
        match self {
            ContextKind::Text => "analyze text tokens",
            ContextKind::Pdf => "analyze pdf tokens",
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct CountState {
    pub(crate) result: Option<TokenCount>,
    pub(crate) pending_request: Option<u64>,
}

impl CountState {
    fn invalidate(&mut self) {
        self.result = None;
        self.pending_request = None;
    }
}

pub struct App {
    pub(crate) registry: ProviderRegistry,
    pub(crate) selection: ProviderSelection,
    pub(crate) credential: String,
    pub(crate) story_text: String,
    pub(crate) pdf: Option<PdfDocument>,
    pub(crate) text_context: ChatContext,
    pub(crate) pdf_context: ChatContext,
    pub(crate) text_count: CountState,
    pub(crate) pdf_count: CountState,
    pub(crate) credential_error: Option<String>,
    pub(crate) generic_error: Option<String>,
    next_turn_id: u64,
    next_request_id: u64,
}

impl App {
    pub fn new(registry: ProviderRegistry, selection: ProviderSelection, credential: String) -> Self {
        Self {
            registry,
            selection,
            credential,
            story_text: String::new(),
            pdf: None,
            text_context: ChatContext::default(),
            pdf_context: ChatContext::default(),
            text_count: CountState::default(),
            pdf_count: CountState::default(),
            credential_error: None,
            generic_error: None,
            next_turn_id: 0,
            next_request_id: 0,
        }
    }

    /// Resolves the starting selection from explicit choices, then the
    /// config defaults, then the catalogue defaults.
    pub fn from_config(
        registry: ProviderRegistry,
        config: &Config,
        provider: Option<&str>,
        model: Option<&str>,
        credential: String,
    ) -> Result<Self, SelectionError> {
        let provider = provider.or(config.default_provider.as_deref());
        let model = model.or_else(|| {
            let provider_id = provider.or_else(|| registry.first().map(|p| p.info.id.as_str()))?;
            config.default_model_for(provider_id)
        });
        let selection = ProviderSelection::resolve(&registry, provider, model)?;
        Ok(Self::new(registry, selection, credential))
    }

    pub fn providers(&self) -> Vec<ProviderInfo> {
        self.registry.list()
    }

    pub fn models_of(&self, provider_id: &str) -> &[String] {
        self.registry.models_of(provider_id)
    }

    pub fn models(&self) -> &[String] {
        self.registry.models_of(self.selection.provider_id())
    }

    pub fn selection(&self) -> &ProviderSelection {
        &self.selection
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn credential_error(&self) -> Option<&str> {
        self.credential_error.as_deref()
    }

    pub fn generic_error(&self) -> Option<&str> {
        self.generic_error.as_deref()
    }

    pub fn story_text(&self) -> &str {
        &self.story_text
    }

    pub fn pdf(&self) -> Option<&PdfDocument> {
        self.pdf.as_ref()
    }

    pub fn context(&self, kind: ContextKind) -> &ChatContext {
        match kind {
            ContextKind::Text => &self.text_context,
            ContextKind::Pdf => &self.pdf_context,
        }
    }

    pub(crate) fn context_mut(&mut self, kind: ContextKind) -> &mut ChatContext {
        match kind {
            ContextKind::Text => &mut self.text_context,
            ContextKind::Pdf => &mut self.pdf_context,
        }
    }

    pub fn token_count(&self, kind: ContextKind) -> Option<TokenCount> {
        self.count_state(kind).result
    }

    pub fn is_counting(&self, kind: ContextKind) -> bool {
        self.count_state(kind).pending_request.is_some()
    }

    pub(crate) fn count_state(&self, kind: ContextKind) -> &CountState {
        match kind {
            ContextKind::Text => &self.text_count,
            ContextKind::Pdf => &self.pdf_count,
        }
    }

    pub(crate) fn count_state_mut(&mut self, kind: ContextKind) -> &mut CountState {
        match kind {
            ContextKind::Text => &mut self.text_count,
            ContextKind::Pdf => &mut self.pdf_count,
        }
    }

    pub(crate) fn adapter(&self) -> Option<Arc<dyn ProviderAdapter>> {
        self.registry.adapter(self.selection.provider_id())
    }

    pub(crate) fn allocate_turn_id(&mut self) -> u64 {
        self.next_turn_id += 1;
        self.next_turn_id
    }

    pub(crate) fn allocate_request_id(&mut self) -> u64 {
        self.next_request_id += 1;
        self.next_request_id
    }

    /// Drops everything tied to the current provider and model.
    pub(crate) fn reset_provider_state(&mut self) {
        self.text_context.reset();
        self.pdf_context.reset();
        self.text_count.invalidate();
        self.pdf_count.invalidate();
    }

    pub(crate) fn reset_content_state(&mut self, kind: ContextKind) {
        self.context_mut(kind).reset();
        self.count_state_mut(kind).invalidate();
    }
}
