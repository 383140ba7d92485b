use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::{MessageContent, ResponseFragment, TokenCount};
use crate::core::app::{apply_action, App, AppCommand};
use crate::core::builtin_providers::BuiltinProvider;
use crate::core::chat_stream::{run_token_count, run_turn};
use crate::core::content::PdfDocument;
use crate::core::error::{validate_request, ProviderError};
use crate::core::providers::{
    ApproximateProvider, FragmentStream, ProviderAdapter, ProviderRegistry, ProviderSelection,
    RegisteredProvider, SessionHandle,
};

pub const TEST_STORY: &str = "Once upon a time there was a token counter.";
pub const TEST_PDF_BYTES: &[u8] = b"%PDF-1.4 test document";

type Script = Vec<Result<ResponseFragment, ProviderError>>;

/// Provider whose replies are queued up front by the test.
pub struct ScriptedProvider {
    id: String,
    display_name: String,
    scripts: Mutex<Vec<Script>>,
    session_error: Mutex<Option<ProviderError>>,
    sessions_created: AtomicUsize,
    count_calls: AtomicUsize,
    sent: Mutex<Vec<MessageContent>>,
}

impl ScriptedProvider {
    pub const PDF_TOKENS: u64 = 258;

    pub fn new(id: &str, display_name: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            scripts: Mutex::new(Vec::new()),
            session_error: Mutex::new(None),
            sessions_created: AtomicUsize::new(0),
            count_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Queues the fragments returned by the next send.
    pub fn script(&self, fragments: Script) {
        self.scripts.lock().unwrap().push(fragments);
    }

    pub fn fail_sessions_with(&self, error: ProviderError) {
        *self.session_error.lock().unwrap() = Some(error);
    }

    pub fn sessions_created(&self) -> usize {
        self.sessions_created.load(Ordering::SeqCst)
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<MessageContent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn supports_chat(&self) -> bool {
        true
    }

    async fn count_tokens_for_text(
        &self,
        credential: &str,
        model: &str,
        text: &str,
    ) -> Result<TokenCount, ProviderError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        validate_request(credential, model)?;
        Ok(TokenCount::exact(text.split_whitespace().count() as u64))
    }

    async fn count_tokens_for_pdf(
        &self,
        credential: &str,
        model: &str,
        _base64_payload: &str,
        _file_name: Option<&str>,
    ) -> Result<TokenCount, ProviderError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        validate_request(credential, model)?;
        Ok(TokenCount::exact(Self::PDF_TOKENS))
    }

    async fn create_chat_session(
        &self,
        credential: &str,
        model: &str,
        system_instruction: Option<&str>,
    ) -> Result<SessionHandle, ProviderError> {
        validate_request(credential, model)?;
        if let Some(error) = self.session_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.sessions_created.fetch_add(1, Ordering::SeqCst);
        Ok(SessionHandle::new(&self.id, credential, model, system_instruction))
    }

    async fn send_message_in_chat(
        &self,
        _session: &SessionHandle,
        content: MessageContent,
        _cancel_token: Option<CancellationToken>,
    ) -> Result<FragmentStream, ProviderError> {
        self.sent.lock().unwrap().push(content);
        let mut scripts = self.scripts.lock().unwrap();
        let script = if scripts.is_empty() {
            Vec::new()
        } else {
            scripts.remove(0)
        };
        Ok(Box::pin(stream::iter(script)))
    }
}

pub fn test_provider_info(id: &str, display_name: &str) -> BuiltinProvider {
    BuiltinProvider {
        id: id.to_string(),
        display_name: display_name.to_string(),
        mode: None,
        api_key_env: None,
        base_url: "http://localhost".to_string(),
        default_model: format!("{id}-model"),
        models: vec![format!("{id}-model"), format!("{id}-model-large")],
    }
}

/// App with a scripted chat provider selected, a credential, story text and
/// a loaded PDF. A second, chat-less provider is registered as "stub".
pub fn create_test_app() -> (App, Arc<ScriptedProvider>) {
    let scripted = Arc::new(ScriptedProvider::new("scripted", "Scripted"));
    let registry = ProviderRegistry::from_parts(vec![
        RegisteredProvider {
            info: test_provider_info("scripted", "Scripted"),
            adapter: scripted.clone(),
        },
        RegisteredProvider {
            info: test_provider_info("stub", "Stub"),
            adapter: Arc::new(ApproximateProvider::new("stub", "Stub")),
        },
    ]);
    let selection = ProviderSelection::resolve(&registry, None, None).unwrap();

    let mut app = App::new(registry, selection, "test-key".to_string());
    app.story_text = TEST_STORY.to_string();
    app.pdf = Some(PdfDocument::from_bytes("test.pdf", TEST_PDF_BYTES));
    (app, scripted)
}

/// Runs a command to completion in the current task and feeds every action
/// it reports back into the app.
pub async fn drive(app: &mut App, command: AppCommand) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    match command {
        AppCommand::SpawnTurn(params) => run_turn(params, &tx).await,
        AppCommand::CountTokens(params) => run_token_count(params, &tx).await,
    }
    drop(tx);
    while let Some(action) = rx.recv().await {
        assert!(apply_action(app, action).is_none());
    }
}
