use tracing::{debug, info};

use super::{App, AppAction, AppCommand, ContextKind};
use crate::core::providers::ProviderSelection;

pub(super) fn handle_selection_action(app: &mut App, action: AppAction) -> Option<AppCommand> {
    match action {
        AppAction::SelectProvider { provider_id } => {
            match ProviderSelection::resolve(&app.registry, Some(&provider_id), None) {
                Ok(selection) => apply_selection(app, selection),
                Err(err) => app.generic_error = Some(err.to_string()),
            }
            None
        }
        AppAction::SelectModel { model_id } => {
            let provider_id = app.selection.provider_id().to_string();
            match ProviderSelection::resolve(&app.registry, Some(&provider_id), Some(&model_id)) {
                Ok(selection) => apply_selection(app, selection),
                Err(err) => app.generic_error = Some(err.to_string()),
            }
            None
        }
        AppAction::SetCredential { credential } => {
            let credential = credential.trim().to_string();
            if credential != app.credential {
                for kind in ContextKind::ALL {
                    let chat = app.context_mut(kind);
                    chat.cancel_turn();
                    chat.detach_session();
                }
                app.credential = credential;
            }
            app.credential_error = None;
            None
        }
        AppAction::SetStoryText { text } => {
            if text != app.story_text {
                app.story_text = text;
                app.reset_content_state(ContextKind::Text);
            }
            None
        }
        AppAction::SetPdf { document } => {
            if let Some(doc) = document.as_ref() {
                info!(file = doc.file_name(), loaded = doc.payload().is_some(), "pdf selected");
            }
            app.pdf = document;
            app.reset_content_state(ContextKind::Pdf);
            None
        }
        AppAction::DismissErrors => {
            app.credential_error = None;
            app.generic_error = None;
            for kind in ContextKind::ALL {
                app.context_mut(kind).clear_error();
            }
            None
        }
        _ => None,
    }
}

fn apply_selection(app: &mut App, selection: ProviderSelection) {
    if selection == app.selection {
        return;
    }
    debug!(
        provider = selection.provider_id(),
        model = selection.model_id(),
        "selection changed"
    );
    app.selection = selection;
    app.reset_provider_state();
    app.generic_error = None;
}
