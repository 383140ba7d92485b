use tracing::{debug, warn};

use super::{App, AppAction, AppCommand, ContextKind};
use crate::core::chat_stream::TokenCountParams;
use crate::core::content::ContentSource;
use crate::core::error::ProviderError;
use crate::core::error_route::{classify, ErrorRoute};

pub(super) fn handle_token_count_action(app: &mut App, action: AppAction) -> Option<AppCommand> {
    match action {
        AppAction::CountTokens { target } => request_count(app, target),
        AppAction::TokenCountLoaded {
            target,
            request_id,
            count,
        } => {
            let state = app.count_state_mut(target);
            if state.pending_request == Some(request_id) {
                state.pending_request = None;
                state.result = Some(count);
                debug!(target = target.as_str(), total = count.total, "token count loaded");
            }
            None
        }
        AppAction::TokenCountFailed {
            target,
            request_id,
            error,
        } => {
            let state = app.count_state_mut(target);
            if state.pending_request != Some(request_id) {
                return None;
            }
            state.pending_request = None;
            state.result = None;
            match classify(&error, target.count_operation()) {
                ErrorRoute::Credential(text) => app.credential_error = Some(text),
                ErrorRoute::Generic(text) | ErrorRoute::ComingSoon(text) => {
                    warn!(target = target.as_str(), error = %error, "token count failed");
                    app.generic_error = Some(text);
                }
                ErrorRoute::Silent => {}
            }
            None
        }
        _ => None,
    }
}

fn request_count(app: &mut App, target: ContextKind) -> Option<AppCommand> {
    if app.credential.trim().is_empty() {
        app.credential_error = Some(ProviderError::missing_credential().message());
        return None;
    }

    let source = match target {
        ContextKind::Text if app.story_text.trim().is_empty() => {
            app.generic_error = Some("Please enter some text to analyze.".to_string());
            return None;
        }
        ContextKind::Text => ContentSource::Text(app.story_text.clone()),
        ContextKind::Pdf => match app.pdf.as_ref() {
            Some(doc) if doc.payload().is_some() => ContentSource::Pdf(doc.clone()),
            Some(_) => {
                app.generic_error =
                    Some("PDF data is not available. Please select the file again.".to_string());
                return None;
            }
            None => {
                app.generic_error = Some("Please select a PDF file to analyze.".to_string());
                return None;
            }
        },
    };

    let adapter = app.adapter()?;
    let request_id = app.allocate_request_id();
    let state = app.count_state_mut(target);
    state.pending_request = Some(request_id);
    state.result = None;
    app.generic_error = None;

    Some(AppCommand::CountTokens(TokenCountParams {
        adapter,
        credential: app.credential.clone(),
        model: app.selection.model_id().to_string(),
        target,
        source,
        request_id,
    }))
}
