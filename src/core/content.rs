//! Content sources a context can be about: pasted text or a PDF file.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, warn};

/// A selected PDF. The base64 payload is derived once on selection and
/// reused for token counting and chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfDocument {
    file_name: String,
    base64_payload: Option<String>,
}

impl PdfDocument {
    /// Reads and encodes the file. A read failure leaves the payload empty;
    /// callers report that when the payload is needed.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let base64_payload = match fs::read(path) {
            Ok(bytes) => {
                debug!(path = %path.display(), bytes = bytes.len(), "encoded pdf");
                Some(STANDARD.encode(bytes))
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read pdf");
                None
            }
        };
        Self {
            file_name: file_name_of(path),
            base64_payload,
        }
    }

    pub fn from_bytes(file_name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            file_name: file_name.into(),
            base64_payload: Some(STANDARD.encode(bytes)),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn payload(&self) -> Option<&str> {
        self.base64_payload.as_deref().filter(|p| !p.is_empty())
    }
}

/// What a token-count request measures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Text(String),
    Pdf(PdfDocument),
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
