use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{FragmentStream, ProviderAdapter, SessionHandle};
use crate::api::{MessageContent, TokenCount};
use crate::core::error::{validate_request, ProviderError};

const CHARS_PER_TOKEN: u64 = 4;
const PAYLOAD_BYTES_PER_TOKEN: u64 = 200;

/// Provider without a backing implementation yet. Token counts are local
/// estimates flagged as approximate; chat is unsupported.
pub struct ApproximateProvider {
    id: String,
    display_name: String,
}

impl ApproximateProvider {
    pub fn new(id: &str, display_name: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for ApproximateProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn supports_chat(&self) -> bool {
        false
    }

    async fn count_tokens_for_text(
        &self,
        credential: &str,
        model: &str,
        text: &str,
    ) -> Result<TokenCount, ProviderError> {
        validate_request(credential, model)?;
        let chars = text.chars().count() as u64;
        Ok(TokenCount::approximate(chars.div_ceil(CHARS_PER_TOKEN)))
    }

    async fn count_tokens_for_pdf(
        &self,
        credential: &str,
        model: &str,
        base64_payload: &str,
        _file_name: Option<&str>,
    ) -> Result<TokenCount, ProviderError> {
        validate_request(credential, model)?;
        if base64_payload.is_empty() {
            return Err(ProviderError::Validation("PDF data is empty.".to_string()));
        }
        let len = base64_payload.len() as u64;
        Ok(TokenCount::approximate(len.div_ceil(PAYLOAD_BYTES_PER_TOKEN)))
    }

    async fn create_chat_session(
        &self,
        credential: &str,
        _model: &str,
        _system_instruction: Option<&str>,
    ) -> Result<SessionHandle, ProviderError> {
        if credential.trim().is_empty() {
            return Err(ProviderError::missing_credential());
        }
        Err(ProviderError::unsupported(&self.display_name, "chat"))
    }

    async fn send_message_in_chat(
        &self,
        _session: &SessionHandle,
        _content: MessageContent,
        _cancel_token: Option<CancellationToken>,
    ) -> Result<FragmentStream, ProviderError> {
        Err(ProviderError::unsupported(&self.display_name, "chat"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ApproximateProvider {
        ApproximateProvider::new("openai", "OpenAI")
    }

    #[tokio::test]
    async fn text_estimate_rounds_up_quarter_of_characters() {
        let count = provider()
            .count_tokens_for_text("key", "gpt-4o", "hello world")
            .await
            .expect("count");
        assert_eq!(count, TokenCount::approximate(3));
    }

    #[tokio::test]
    async fn pdf_estimate_uses_payload_length() {
        let payload = "A".repeat(401);
        let count = provider()
            .count_tokens_for_pdf("key", "gpt-4o", &payload, Some("doc.pdf"))
            .await
            .expect("count");
        assert_eq!(count.total, 3);
        assert!(count.approximate);
    }

    #[tokio::test]
    async fn empty_pdf_payload_is_a_validation_error() {
        let err = provider()
            .count_tokens_for_pdf("key", "gpt-4o", "", None)
            .await
            .expect_err("empty payload");
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[tokio::test]
    async fn blank_credential_is_rejected_before_estimating() {
        let err = provider()
            .count_tokens_for_text(" ", "gpt-4o", "text")
            .await
            .expect_err("credential");
        assert!(matches!(err, ProviderError::Credential(_)));
    }

    #[tokio::test]
    async fn chat_operations_are_unsupported() {
        let provider = provider();
        let err = provider
            .create_chat_session("key", "gpt-4o", None)
            .await
            .expect_err("unsupported");
        assert!(err.is_unsupported());

        let blank = provider
            .create_chat_session("", "gpt-4o", None)
            .await
            .expect_err("credential");
        assert!(matches!(blank, ProviderError::Credential(_)));

        let session = SessionHandle::new("openai", "key", "gpt-4o", None);
        let send = provider
            .send_message_in_chat(&session, MessageContent::Text("hi".into()), None)
            .await;
        assert!(matches!(send, Err(ProviderError::Unsupported { .. })));
    }
}
