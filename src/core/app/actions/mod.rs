mod selection;
mod stream_errors;
mod streaming;
mod token_count;

use super::{App, ContextKind};
use crate::api::{ResponseFragment, TokenCount};
use crate::core::chat_stream::{TokenCountParams, TurnParams};
use crate::core::content::PdfDocument;
use crate::core::error::ProviderError;
use crate::core::providers::SessionHandle;

pub use streaming::build_turn_content;

#[derive(Debug)]
pub enum AppAction {
    SubmitMessage {
        context: ContextKind,
        message: String,
    },
    CancelTurn {
        context: ContextKind,
    },
    ClearContext {
        context: ContextKind,
    },
    SessionReady {
        context: ContextKind,
        turn_id: u64,
        session: SessionHandle,
    },
    StreamOpened {
        context: ContextKind,
        turn_id: u64,
    },
    AppendFragment {
        context: ContextKind,
        turn_id: u64,
        fragment: ResponseFragment,
    },
    TurnCompleted {
        context: ContextKind,
        turn_id: u64,
    },
    TurnFailed {
        context: ContextKind,
        turn_id: u64,
        error: ProviderError,
    },
    CountTokens {
        target: ContextKind,
    },
    TokenCountLoaded {
        target: ContextKind,
        request_id: u64,
        count: TokenCount,
    },
    TokenCountFailed {
        target: ContextKind,
        request_id: u64,
        error: ProviderError,
    },
    SelectProvider {
        provider_id: String,
    },
    SelectModel {
        model_id: String,
    },
    SetCredential {
        credential: String,
    },
    SetStoryText {
        text: String,
    },
    SetPdf {
        document: Option<PdfDocument>,
    },
    DismissErrors,
}

pub enum AppCommand {
    SpawnTurn(TurnParams),
    CountTokens(TokenCountParams),
}

pub fn apply_action(app: &mut App, action: AppAction) -> Option<AppCommand> {
    match action {
        AppAction::SubmitMessage { .. }
        | AppAction::CancelTurn { .. }
        | AppAction::ClearContext { .. }
        | AppAction::SessionReady { .. }
        | AppAction::StreamOpened { .. }
        | AppAction::AppendFragment { .. }
        | AppAction::TurnCompleted { .. }
        | AppAction::TurnFailed { .. } => streaming::handle_streaming_action(app, action),

        AppAction::CountTokens { .. }
        | AppAction::TokenCountLoaded { .. }
        | AppAction::TokenCountFailed { .. } => token_count::handle_token_count_action(app, action),

        AppAction::SelectProvider { .. }
        | AppAction::SelectModel { .. }
        | AppAction::SetCredential { .. }
        | AppAction::SetStoryText { .. }
        | AppAction::SetPdf { .. }
        | AppAction::DismissErrors => selection::handle_selection_action(app, action),
    }
}
