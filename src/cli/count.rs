use std::error::Error;
use std::fs;
use std::path::PathBuf;

use crate::core::app::{apply_action, App, AppAction, ContextKind};
use crate::core::chat_stream::ChatStreamService;
use crate::core::content::PdfDocument;

/// One-shot token count for a text file or a PDF.
pub async fn run_count(
    app: &mut App,
    text: Option<PathBuf>,
    pdf: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let (target, label) = match (text, pdf) {
        (Some(path), _) => {
            let story = fs::read_to_string(&path)
                .map_err(|err| format!("Cannot read {}: {err}", path.display()))?;
            apply_action(app, AppAction::SetStoryText { text: story });
            (ContextKind::Text, path.display().to_string())
        }
        (None, Some(path)) => {
            let document = PdfDocument::open(&path);
            let label = document.file_name().to_string();
            apply_action(
                app,
                AppAction::SetPdf {
                    document: Some(document),
                },
            );
            (ContextKind::Pdf, label)
        }
        (None, None) => return Err("Specify --text FILE or --pdf FILE".into()),
    };

    let (service, mut rx) = ChatStreamService::new();
    if let Some(command) = apply_action(app, AppAction::CountTokens { target }) {
        service.execute(command);
        while app.is_counting(target) {
            let Some(action) = rx.recv().await else {
                break;
            };
            apply_action(app, action);
        }
    }

    if let Some(message) = app.credential_error().or(app.generic_error()) {
        return Err(message.to_string().into());
    }

    let count = app
        .token_count(target)
        .ok_or("Token count did not complete")?;
    println!(
        "{label}: {} ({} / {})",
        count.display(),
        app.selection().provider_id(),
        app.selection().model_id()
    );
    Ok(())
}
