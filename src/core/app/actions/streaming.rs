use tracing::debug;

use super::stream_errors::handle_turn_failure;
use super::{App, AppAction, AppCommand, ContextKind};
use crate::api::{ContentPart, MessageContent, ResponseFragment, StructuredPayload};
use crate::core::chat_stream::TurnParams;
use crate::core::content::PdfDocument;
use crate::core::error::ProviderError;
use crate::core::error_route::{classify, ErrorRoute};
use crate::core::message::ChatMessage;

pub(super) fn handle_streaming_action(app: &mut App, action: AppAction) -> Option<AppCommand> {
    match action {
        AppAction::SubmitMessage { context, message } => submit_message(app, context, message),
        AppAction::CancelTurn { context } => {
            if app.context_mut(context).cancel_turn() {
                debug!(context = context.as_str(), "turn cancelled");
            }
            None
        }
        AppAction::ClearContext { context } => {
            app.context_mut(context).reset();
            None
        }
        AppAction::SessionReady {
            context,
            turn_id,
            session,
        } => {
            let chat = app.context_mut(context);
            if chat.is_current_turn(turn_id) {
                chat.attach_session(session);
            }
            None
        }
        AppAction::StreamOpened { context, turn_id } => {
            if app.context(context).is_current_turn(turn_id) {
                ensure_placeholder(app, context);
            }
            None
        }
        AppAction::AppendFragment {
            context,
            turn_id,
            fragment,
        } => {
            if app.context(context).is_current_turn(turn_id) {
                append_fragment(app, context, fragment);
            }
            None
        }
        AppAction::TurnCompleted { context, turn_id } => {
            if app.context(context).is_current_turn(turn_id) {
                finalize_turn(app, context);
            }
            None
        }
        AppAction::TurnFailed {
            context,
            turn_id,
            error,
        } => {
            if !app.context(context).is_current_turn(turn_id) {
                return None;
            }
            handle_turn_failure(app, context, error);
            None
        }
        _ => None,
    }
}

fn submit_message(app: &mut App, kind: ContextKind, message: String) -> Option<AppCommand> {
    let message = message.trim().to_string();
    if message.is_empty() {
        return None;
    }

    if let Err(rejection) = check_entry(app, kind) {
        app.context_mut(kind).set_error(rejection);
        return None;
    }
    let adapter = app.adapter()?;

    let first_turn = {
        let chat = app.context(kind);
        chat.session().is_none() || chat.user_message_count() == 0
    };
    let content = build_turn_content(kind, first_turn, &message, &app.story_text, app.pdf.as_ref());

    let user_message = ChatMessage::user(message);
    let user_message_id = user_message.id.clone();
    let turn_id = app.allocate_turn_id();
    let chat = app.context_mut(kind);
    chat.push(user_message);
    let cancel_token = chat.begin_turn(turn_id, user_message_id.clone());

    let content = match content {
        Ok(content) => content,
        Err(err) => {
            chat.remove(&user_message_id);
            chat.finish_turn();
            if let ErrorRoute::Generic(text) = classify(&err, kind.chat_operation()) {
                chat.set_error(text);
            }
            return None;
        }
    };

    debug!(
        context = kind.as_str(),
        turn_id,
        first_turn,
        provider = app.selection.provider_id(),
        "spawning chat turn"
    );

    Some(AppCommand::SpawnTurn(TurnParams {
        adapter,
        credential: app.credential.clone(),
        model: app.selection.model_id().to_string(),
        context: kind,
        turn_id,
        session: app.context(kind).session().cloned(),
        system_instruction: kind.system_instruction().to_string(),
        content,
        cancel_token,
    }))
}

/// Rejections that leave the context untouched apart from its error slot.
fn check_entry(app: &App, kind: ContextKind) -> Result<(), String> {
    if app.credential.trim().is_empty() {
        return Err(ProviderError::missing_credential().message());
    }

    let Some(adapter) = app.adapter() else {
        return Err(format!(
            "Provider '{}' is not available.",
            app.selection.provider_id()
        ));
    };
    if !adapter.supports_chat() {
        let unsupported = ProviderError::unsupported(adapter.display_name(), "chat");
        if let ErrorRoute::ComingSoon(text) = classify(&unsupported, kind.chat_operation()) {
            return Err(text);
        }
    }

    match kind {
        ContextKind::Text if app.story_text.trim().is_empty() => {
            Err("Please enter some text before starting a chat.".to_string())
        }
        ContextKind::Pdf if app.pdf.is_none() => {
            Err("Please select a PDF file before starting a chat.".to_string())
        }
        _ => Ok(()),
    }
}

/// Builds the message sent for one user turn. The first turn of a session
/// carries the source material; later turns send the query alone.
pub fn build_turn_content(
    kind: ContextKind,
    first_turn: bool,
    message: &str,
    story_text: &str,
    pdf: Option<&PdfDocument>,
) -> Result<MessageContent, ProviderError> {
    if !first_turn {
        return Ok(MessageContent::Text(message.to_string()));
    }

    match kind {
        ContextKind::Text => Ok(MessageContent::Text(format!(
            "Here is the text to discuss:\n---BEGIN TEXT---\n{story_text}\n---END TEXT---\n\n\
             My question is: {message}"
        ))),
        ContextKind::Pdf => {
            let payload = pdf.and_then(PdfDocument::payload).ok_or_else(|| {
                ProviderError::Validation(
                    "PDF data is not available. Please select the file again.".to_string(),
                )
            })?;
            Ok(MessageContent::Structured(StructuredPayload {
                parts: vec![
                    ContentPart::pdf(payload),
                    ContentPart::text(format!(
                        "Regarding the attached PDF document, my question is: {message}"
                    )),
                ],
            }))
        }
    }
}

fn ensure_placeholder(app: &mut App, kind: ContextKind) -> Option<String> {
    let chat = app.context_mut(kind);
    if let Some(id) = chat.turn().and_then(|turn| turn.model_message_id.clone()) {
        return Some(id);
    }
    let placeholder = ChatMessage::model_placeholder();
    let id = placeholder.id.clone();
    chat.push(placeholder);
    chat.turn_mut()?.model_message_id = Some(id.clone());
    Some(id)
}

fn append_fragment(app: &mut App, kind: ContextKind, fragment: ResponseFragment) {
    let cancelled = app
        .context(kind)
        .turn()
        .is_some_and(|turn| turn.cancel_token.is_cancelled());
    if cancelled {
        app.context_mut(kind).cancel_turn();
        return;
    }

    let Some(id) = ensure_placeholder(app, kind) else {
        return;
    };
    let chat = app.context_mut(kind);
    if let Some(usage) = fragment.usage.as_ref() {
        if let Some(turn) = chat.turn_mut() {
            turn.usage.fold(usage);
        }
    }
    if let Some(message) = chat.message_mut(&id) {
        message.content.push_str(&fragment.text);
    }
}

fn finalize_turn(app: &mut App, kind: ContextKind) {
    let chat = app.context_mut(kind);
    let Some(turn) = chat.finish_turn() else {
        return;
    };
    if let Some(id) = turn.model_message_id.as_deref() {
        if let Some(message) = chat.message_mut(id) {
            message.is_streaming = false;
        }
    }
    turn.usage.commit(chat.ledger_mut());
    debug!(context = kind.as_str(), turn_id = turn.turn_id, "turn completed");
}
