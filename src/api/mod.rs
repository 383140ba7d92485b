use serde::{Deserialize, Serialize};

pub const PDF_MIME_TYPE: &str = "application/pdf";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// One element of a structured chat payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentPart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn pdf(base64_payload: impl Into<String>) -> Self {
        ContentPart::InlineData {
            inline_data: InlineData {
                mime_type: PDF_MIME_TYPE.to_string(),
                data: base64_payload.into(),
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            ContentPart::InlineData { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredPayload {
    pub parts: Vec<ContentPart>,
}

/// What a chat turn sends to the provider: either the raw message or a
/// structured payload carrying attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    Structured(StructuredPayload),
}

impl MessageContent {
    pub fn into_parts(self) -> Vec<ContentPart> {
        match self {
            MessageContent::Text(text) => vec![ContentPart::Text { text }],
            MessageContent::Structured(payload) => payload.parts,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Structured(_) => None,
        }
    }
}

/// Usage metadata attached to a streamed fragment. Every field is optional
/// because providers report usage on some fragments only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub prompt_count: Option<u64>,
    pub cached_input_count: Option<u64>,
    pub completion_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseFragment {
    pub text: String,
    pub usage: Option<UsageSnapshot>,
}

impl ResponseFragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: UsageSnapshot) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Result of a token-count request. `approximate` is set by adapters that
/// estimate instead of asking the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCount {
    pub total: u64,
    pub approximate: bool,
}

impl TokenCount {
    pub fn exact(total: u64) -> Self {
        Self {
            total,
            approximate: false,
        }
    }

    pub fn approximate(total: u64) -> Self {
        Self {
            total,
            approximate: true,
        }
    }

    pub fn display(&self) -> String {
        if self.approximate {
            format!("~{} tokens (approx.)", self.total)
        } else {
            format!("{} tokens", self.total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_payload_serializes_inline_data_then_text() {
        let payload = StructuredPayload {
            parts: vec![ContentPart::pdf("JVBERi0="), ContentPart::text("Summarize it")],
        };

        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "parts": [
                    {"inlineData": {"mimeType": "application/pdf", "data": "JVBERi0="}},
                    {"text": "Summarize it"}
                ]
            })
        );
    }

    #[test]
    fn text_content_becomes_single_text_part() {
        let parts = MessageContent::Text("hello".into()).into_parts();
        assert_eq!(parts, vec![ContentPart::text("hello")]);
        assert_eq!(parts[0].as_text(), Some("hello"));
    }

    #[test]
    fn token_count_display_labels_estimates() {
        assert_eq!(TokenCount::exact(42).display(), "42 tokens");
        assert_eq!(TokenCount::approximate(7).display(), "~7 tokens (approx.)");
    }
}
