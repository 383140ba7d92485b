//! Line-oriented chat front end.
//!
//! Reads commands and questions from stdin, applies them to the [`App`], and
//! prints streamed replies as the background turn reports fragments.

use std::collections::HashMap;
use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::resolve_credential;
use crate::core::app::{apply_action, App, AppAction, ContextKind};
use crate::core::chat_stream::ChatStreamService;
use crate::core::content::PdfDocument;
use crate::core::message::ChatRole;

const HELP: &str = "\
Commands:
  /text              Switch to the text conversation
  /pdf               Switch to the PDF conversation
  /load FILE         Load a text file as the story text
  /open FILE         Select a PDF file
  /tokens            Count tokens for the current conversation's content
  /usage             Show token usage for the current conversation
  /cancel            Cancel the reply in flight
  /clear             Clear the current conversation
  /provider ID       Switch provider (clears both conversations)
  /model ID          Switch model (clears both conversations)
  /key KEY           Set the API key
  /dismiss           Dismiss error messages
  /help              Show this help
  /quit              Exit
Anything else is sent as a question.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Send(String),
    Switch(ContextKind),
    Load(PathBuf),
    Open(PathBuf),
    Tokens,
    Usage,
    Cancel,
    Clear,
    Provider(String),
    Model(String),
    Key(String),
    Dismiss,
    Help,
    Quit,
    Invalid(String),
}

pub fn parse_command(line: &str) -> Option<ReplCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(ReplCommand::Send(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let needs_arg = |build: fn(String) -> ReplCommand| {
        if arg.is_empty() {
            ReplCommand::Invalid(format!("/{name} needs an argument"))
        } else {
            build(arg.to_string())
        }
    };

    let command = match name {
        "text" => ReplCommand::Switch(ContextKind::Text),
        "pdf" => ReplCommand::Switch(ContextKind::Pdf),
        "load" => needs_arg(|arg| ReplCommand::Load(PathBuf::from(arg))),
        "open" => needs_arg(|arg| ReplCommand::Open(PathBuf::from(arg))),
        "tokens" => ReplCommand::Tokens,
        "usage" => ReplCommand::Usage,
        "cancel" => ReplCommand::Cancel,
        "clear" => ReplCommand::Clear,
        "provider" => needs_arg(ReplCommand::Provider),
        "model" => needs_arg(ReplCommand::Model),
        "key" => needs_arg(ReplCommand::Key),
        "dismiss" => ReplCommand::Dismiss,
        "help" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        other => ReplCommand::Invalid(format!("Unknown command: /{other}")),
    };
    Some(command)
}

/// Prints whatever changed in the app since the last call.
#[derive(Default)]
struct Renderer {
    /// Bytes already printed per model message id.
    printed: HashMap<String, usize>,
    loading: HashMap<ContextKind, bool>,
    context_errors: HashMap<ContextKind, Option<String>>,
    credential_error: Option<String>,
    generic_error: Option<String>,
    token_counts: HashMap<ContextKind, Option<String>>,
}

impl Renderer {
    fn render(&mut self, app: &App, out: &mut impl Write) -> io::Result<()> {
        for kind in ContextKind::ALL {
            let chat = app.context(kind);

            if let Some(last) = chat.messages().last().filter(|m| m.role == ChatRole::Model) {
                match self.printed.get(&last.id) {
                    Some(printed) => {
                        if let Some(delta) = last.content.get(*printed..) {
                            write!(out, "{delta}")?;
                        }
                    }
                    None => write!(out, "\n[{}] model: {}", kind.as_str(), last.content)?,
                }
                self.printed.insert(last.id.clone(), last.content.len());
            }

            let was_loading = self.loading.insert(kind, chat.is_loading()).unwrap_or(false);
            if was_loading && !chat.is_loading() {
                writeln!(out)?;
            }

            let error = chat.error().map(str::to_owned);
            if self.context_errors.get(&kind) != Some(&error) {
                if let Some(message) = error.as_deref() {
                    writeln!(out, "⚠️  [{}] {message}", kind.as_str())?;
                }
                self.context_errors.insert(kind, error);
            }

            let count = app.token_count(kind).map(|count| count.display());
            if self.token_counts.get(&kind) != Some(&count) {
                if let Some(count) = count.as_deref() {
                    writeln!(out, "[{}] {count}", kind.as_str())?;
                }
                self.token_counts.insert(kind, count);
            }
        }

        let credential = app.credential_error().map(str::to_owned);
        if credential != self.credential_error {
            if let Some(message) = credential.as_deref() {
                writeln!(out, "🔑 {message}")?;
            }
            self.credential_error = credential;
        }

        let generic = app.generic_error().map(str::to_owned);
        if generic != self.generic_error {
            if let Some(message) = generic.as_deref() {
                writeln!(out, "❌ {message}")?;
            }
            self.generic_error = generic;
        }

        out.flush()
    }
}

enum Flow {
    Continue,
    Quit,
}

struct ChatSession {
    app: App,
    service: ChatStreamService,
    active: ContextKind,
    explicit_key: Option<String>,
}

impl ChatSession {
    fn dispatch(&mut self, action: AppAction) {
        if let Some(command) = apply_action(&mut self.app, action) {
            self.service.execute(command);
        }
    }

    fn handle(&mut self, command: ReplCommand, out: &mut impl Write) -> io::Result<Flow> {
        match command {
            ReplCommand::Send(message) => {
                writeln!(out, "[{}] you: {message}", self.active.as_str())?;
                self.dispatch(AppAction::SubmitMessage {
                    context: self.active,
                    message,
                });
            }
            ReplCommand::Switch(kind) => {
                self.active = kind;
                writeln!(out, "Switched to the {} conversation.", kind.as_str())?;
            }
            ReplCommand::Load(path) => match std::fs::read_to_string(&path) {
                Ok(text) => {
                    self.dispatch(AppAction::SetStoryText { text });
                    writeln!(out, "Loaded {} as the story text.", path.display())?;
                }
                Err(err) => writeln!(out, "❌ Cannot read {}: {err}", path.display())?,
            },
            ReplCommand::Open(path) => {
                let document = PdfDocument::open(&path);
                if document.payload().is_none() {
                    writeln!(out, "❌ Cannot read {}", path.display())?;
                } else {
                    writeln!(out, "Selected {}.", document.file_name())?;
                }
                self.dispatch(AppAction::SetPdf {
                    document: Some(document),
                });
            }
            ReplCommand::Tokens => self.dispatch(AppAction::CountTokens {
                target: self.active,
            }),
            ReplCommand::Usage => match self.app.context(self.active).ledger() {
                Some(ledger) => writeln!(out, "[{}] {}", self.active.as_str(), ledger.summary())?,
                None => writeln!(out, "[{}] no session yet", self.active.as_str())?,
            },
            ReplCommand::Cancel => self.dispatch(AppAction::CancelTurn {
                context: self.active,
            }),
            ReplCommand::Clear => {
                self.dispatch(AppAction::ClearContext {
                    context: self.active,
                });
                writeln!(out, "Cleared the {} conversation.", self.active.as_str())?;
            }
            ReplCommand::Provider(provider_id) => {
                self.dispatch(AppAction::SelectProvider { provider_id });
                let credential = resolve_credential(
                    self.explicit_key.as_deref(),
                    self.app.selection().provider_id(),
                );
                self.dispatch(AppAction::SetCredential { credential });
                self.print_selection(out)?;
            }
            ReplCommand::Model(model_id) => {
                self.dispatch(AppAction::SelectModel { model_id });
                self.print_selection(out)?;
            }
            ReplCommand::Key(key) => {
                self.explicit_key = Some(key.clone());
                self.dispatch(AppAction::SetCredential { credential: key });
                writeln!(out, "API key updated.")?;
            }
            ReplCommand::Dismiss => self.dispatch(AppAction::DismissErrors),
            ReplCommand::Help => writeln!(out, "{HELP}")?,
            ReplCommand::Quit => return Ok(Flow::Quit),
            ReplCommand::Invalid(message) => writeln!(out, "❌ {message}")?,
        }
        Ok(Flow::Continue)
    }

    fn print_selection(&self, out: &mut impl Write) -> io::Result<()> {
        let selection = self.app.selection();
        writeln!(
            out,
            "Using {} / {} (models: {})",
            selection.provider_id(),
            selection.model_id(),
            self.app.models().join(", ")
        )
    }
}

pub async fn run_chat(app: App, explicit_key: Option<String>) -> Result<(), Box<dyn Error>> {
    let (service, mut rx) = ChatStreamService::new();
    let mut session = ChatSession {
        app,
        service,
        active: ContextKind::Text,
        explicit_key,
    };
    let mut renderer = Renderer::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = io::stdout();

    writeln!(stdout, "tokenlens chat. Type /help for commands.")?;
    session.print_selection(&mut stdout)?;
    renderer.render(&session.app, &mut stdout)?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if let Some(command) = parse_command(&line) {
                    if let Flow::Quit = session.handle(command, &mut stdout)? {
                        break;
                    }
                }
            }
            Some(action) = rx.recv() => {
                session.dispatch(action);
            }
            _ = tokio::signal::ctrl_c() => {
                let active = session.active;
                if session.app.context(active).can_cancel() {
                    session.dispatch(AppAction::CancelTurn { context: active });
                } else {
                    break;
                }
            }
        }
        renderer.render(&session.app, &mut stdout)?;
    }

    for kind in ContextKind::ALL {
        session.dispatch(AppAction::ClearContext { context: kind });
    }
    Ok(())
}
