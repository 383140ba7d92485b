use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::MessageContent;
use crate::core::app::{AppAction, AppCommand, ContextKind};
use crate::core::content::ContentSource;
use crate::core::error::ProviderError;
use crate::core::providers::{ProviderAdapter, SessionHandle};

/// Everything a background turn needs; nothing here borrows from `App`.
pub struct TurnParams {
    pub adapter: Arc<dyn ProviderAdapter>,
    pub credential: String,
    pub model: String,
    pub context: ContextKind,
    pub turn_id: u64,
    pub session: Option<SessionHandle>,
    pub system_instruction: String,
    pub content: MessageContent,
    pub cancel_token: CancellationToken,
}

pub struct TokenCountParams {
    pub adapter: Arc<dyn ProviderAdapter>,
    pub credential: String,
    pub model: String,
    pub target: ContextKind,
    pub source: ContentSource,
    pub request_id: u64,
}

/// Runs one chat turn and reports progress as actions.
///
/// The cancellation token is polled once per fragment. Once it fires the
/// task stops consuming the stream without reporting anything further; the
/// app has already annotated the turn.
pub async fn run_turn(params: TurnParams, tx: &mpsc::UnboundedSender<AppAction>) {
    let TurnParams {
        adapter,
        credential,
        model,
        context,
        turn_id,
        session,
        system_instruction,
        content,
        cancel_token,
    } = params;

    let fail = |error: ProviderError| {
        let _ = tx.send(AppAction::TurnFailed {
            context,
            turn_id,
            error,
        });
    };

    let session = match session {
        Some(session) => session,
        None => match adapter
            .create_chat_session(&credential, &model, Some(&system_instruction))
            .await
        {
            Ok(session) => {
                debug!(context = context.as_str(), session = session.id(), "session created");
                let _ = tx.send(AppAction::SessionReady {
                    context,
                    turn_id,
                    session: session.clone(),
                });
                session
            }
            Err(error) => {
                fail(error);
                return;
            }
        },
    };

    if cancel_token.is_cancelled() {
        return;
    }

    let mut stream = match adapter
        .send_message_in_chat(&session, content, Some(cancel_token.clone()))
        .await
    {
        Ok(stream) => stream,
        Err(error) => {
            fail(error);
            return;
        }
    };
    let _ = tx.send(AppAction::StreamOpened { context, turn_id });

    while let Some(item) = stream.next().await {
        if cancel_token.is_cancelled() {
            return;
        }
        match item {
            Ok(fragment) => {
                let _ = tx.send(AppAction::AppendFragment {
                    context,
                    turn_id,
                    fragment,
                });
            }
            Err(error) => {
                fail(error);
                return;
            }
        }
    }

    let _ = tx.send(AppAction::TurnCompleted { context, turn_id });
}

pub async fn run_token_count(params: TokenCountParams, tx: &mpsc::UnboundedSender<AppAction>) {
    let TokenCountParams {
        adapter,
        credential,
        model,
        target,
        source,
        request_id,
    } = params;

    let result = match &source {
        ContentSource::Text(text) => adapter.count_tokens_for_text(&credential, &model, text).await,
        ContentSource::Pdf(document) => match document.payload() {
            Some(payload) => {
                adapter
                    .count_tokens_for_pdf(&credential, &model, payload, Some(document.file_name()))
                    .await
            }
            None => Err(ProviderError::Validation("PDF data is empty.".to_string())),
        },
    };

    let action = match result {
        Ok(count) => AppAction::TokenCountLoaded {
            target,
            request_id,
            count,
        },
        Err(error) => AppAction::TokenCountFailed {
            target,
            request_id,
            error,
        },
    };
    let _ = tx.send(action);
}

/// Spawns background work onto the tokio runtime and funnels its results
/// into one channel the front end drains.
#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<AppAction>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AppAction>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn execute(&self, command: AppCommand) {
        match command {
            AppCommand::SpawnTurn(params) => self.spawn_turn(params),
            AppCommand::CountTokens(params) => self.spawn_token_count(params),
        }
    }

    pub fn spawn_turn(&self, params: TurnParams) {
        let tx = self.tx.clone();
        let cancel_token = params.cancel_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = run_turn(params, &tx) => {}
                _ = cancel_token.cancelled() => {}
            }
        });
    }

    pub fn spawn_token_count(&self, params: TokenCountParams) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            run_token_count(params, &tx).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ResponseFragment, TokenCount, UsageSnapshot};
    use crate::core::content::PdfDocument;
    use crate::utils::test_utils::ScriptedProvider;

    fn turn_params(provider: Arc<ScriptedProvider>, session: Option<SessionHandle>) -> TurnParams {
        TurnParams {
            adapter: provider,
            credential: "test-key".to_string(),
            model: "scripted-model".to_string(),
            context: ContextKind::Text,
            turn_id: 3,
            session,
            system_instruction: ContextKind::Text.system_instruction().to_string(),
            content: MessageContent::Text("hello".to_string()),
            cancel_token: CancellationToken::new(),
        }
    }

    async fn collect(params: TurnParams) -> Vec<AppAction> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        run_turn(params, &tx).await;
        drop(tx);
        let mut actions = Vec::new();
        while let Some(action) = rx.recv().await {
            actions.push(action);
        }
        actions
    }

    #[tokio::test]
    async fn turn_without_session_reports_session_then_fragments() {
        let provider = Arc::new(ScriptedProvider::new("scripted", "Scripted"));
        provider.script(vec![
            Ok(ResponseFragment::text("Hel")),
            Ok(ResponseFragment::text("lo").with_usage(UsageSnapshot {
                prompt_count: Some(5),
                cached_input_count: None,
                completion_count: Some(2),
            })),
        ]);

        let actions = collect(turn_params(Arc::clone(&provider), None)).await;

        assert!(matches!(actions[0], AppAction::SessionReady { turn_id: 3, .. }));
        assert!(matches!(actions[1], AppAction::StreamOpened { .. }));
        assert!(matches!(actions[2], AppAction::AppendFragment { .. }));
        assert!(matches!(actions[3], AppAction::AppendFragment { .. }));
        assert!(matches!(actions[4], AppAction::TurnCompleted { .. }));
        assert_eq!(actions.len(), 5);
        assert_eq!(provider.sessions_created(), 1);
    }

    #[tokio::test]
    async fn existing_session_is_reused() {
        let provider = Arc::new(ScriptedProvider::new("scripted", "Scripted"));
        provider.script(vec![Ok(ResponseFragment::text("ok"))]);
        let session = SessionHandle::new("scripted", "test-key", "scripted-model", None);

        let actions = collect(turn_params(Arc::clone(&provider), Some(session))).await;

        assert!(matches!(actions[0], AppAction::StreamOpened { .. }));
        assert_eq!(provider.sessions_created(), 0);
    }

    #[tokio::test]
    async fn session_failure_is_reported_once() {
        let provider = Arc::new(ScriptedProvider::new("scripted", "Scripted"));
        provider.fail_sessions_with(ProviderError::Unknown("boom".into()));

        let actions = collect(turn_params(provider, None)).await;

        assert_eq!(actions.len(), 1);
        assert!(matches!(
            &actions[0],
            AppAction::TurnFailed { error: ProviderError::Unknown(msg), .. } if msg == "boom"
        ));
    }

    #[tokio::test]
    async fn mid_stream_error_stops_the_turn() {
        let provider = Arc::new(ScriptedProvider::new("scripted", "Scripted"));
        provider.script(vec![
            Ok(ResponseFragment::text("partial")),
            Err(ProviderError::Unknown("connection reset".into())),
            Ok(ResponseFragment::text("never")),
        ]);

        let actions = collect(turn_params(provider, None)).await;

        assert!(matches!(actions.last(), Some(AppAction::TurnFailed { .. })));
        assert!(!actions
            .iter()
            .any(|a| matches!(a, AppAction::TurnCompleted { .. })));
    }

    #[tokio::test]
    async fn cancelled_turn_reports_nothing_after_session() {
        let provider = Arc::new(ScriptedProvider::new("scripted", "Scripted"));
        provider.script(vec![Ok(ResponseFragment::text("late"))]);
        let params = turn_params(Arc::clone(&provider), None);
        params.cancel_token.cancel();

        let actions = collect(params).await;

        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], AppAction::SessionReady { .. }));
        assert!(provider.sent().is_empty());
    }

    #[tokio::test]
    async fn token_count_reports_result_with_request_id() {
        let provider = Arc::new(ScriptedProvider::new("scripted", "Scripted"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        run_token_count(
            TokenCountParams {
                adapter: provider.clone(),
                credential: "test-key".into(),
                model: "scripted-model".into(),
                target: ContextKind::Pdf,
                source: ContentSource::Pdf(PdfDocument::from_bytes("doc.pdf", b"%PDF-1.4")),
                request_id: 9,
            },
            &tx,
        )
        .await;

        match rx.recv().await {
            Some(AppAction::TokenCountLoaded {
                target,
                request_id,
                count,
            }) => {
                assert_eq!(target, ContextKind::Pdf);
                assert_eq!(request_id, 9);
                assert_eq!(count, TokenCount::exact(ScriptedProvider::PDF_TOKENS));
            }
            other => panic!("unexpected action: {other:?}"),
        }
        assert_eq!(provider.count_calls(), 1);
    }
}
