use tracing::{debug, warn};

use super::{App, ContextKind};
use crate::core::error::ProviderError;
use crate::core::error_route::{classify, ErrorRoute};

pub(super) fn handle_turn_failure(app: &mut App, kind: ContextKind, error: ProviderError) {
    let route = classify(&error, kind.chat_operation());
    let chat = app.context_mut(kind);
    let Some(turn) = chat.finish_turn() else {
        return;
    };
    let pending_id = turn
        .model_message_id
        .clone()
        .unwrap_or_else(|| turn.user_message_id.clone());

    match route {
        ErrorRoute::Silent => {
            debug!(context = kind.as_str(), "turn aborted");
            if let Some(message) = chat.message_mut(&pending_id) {
                message.mark_cancelled();
            }
        }
        ErrorRoute::Credential(text) => {
            warn!(context = kind.as_str(), error = %error, "credential failure");
            chat.remove(&turn.user_message_id);
            if let Some(id) = turn.model_message_id.as_deref() {
                chat.remove(id);
            }
            chat.detach_session();
            app.credential_error = Some(text);
        }
        ErrorRoute::ComingSoon(text) => {
            chat.remove(&turn.user_message_id);
            if let Some(id) = turn.model_message_id.as_deref() {
                chat.remove(id);
            }
            chat.set_error(text);
        }
        ErrorRoute::Generic(text) => {
            warn!(context = kind.as_str(), error = %error, "chat turn failed");
            chat.set_error(text);
            if let Some(message) = chat.message_mut(&pending_id) {
                message.mark_failed();
            }
        }
    }
}
