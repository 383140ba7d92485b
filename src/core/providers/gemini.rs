use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};
use memchr::memchr;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{FragmentStream, HistoryEntry, ProviderAdapter, SessionHandle};
use crate::api::{ContentPart, MessageContent, ResponseFragment, TokenCount, UsageSnapshot};
use crate::core::error::{validate_request, ProviderError};
use crate::core::message::ChatRole;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Adapter for the Generative Language REST API.
pub struct GeminiProvider {
    client: reqwest::Client,
    id: String,
    base_url: String,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<ContentPart>,
}

impl GeminiContent {
    fn user(parts: Vec<ContentPart>) -> Self {
        Self {
            role: ChatRole::User.as_str().to_string(),
            parts,
        }
    }
}

impl From<HistoryEntry> for GeminiContent {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            role: entry.role.as_str().to_string(),
            parts: entry.parts,
        }
    }
}

#[derive(Serialize)]
struct CountTokensRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<ContentPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<StreamCandidate>,
    usage_metadata: Option<UsageMetadata>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct StreamCandidate {
    content: Option<StreamContent>,
}

#[derive(Deserialize)]
struct StreamContent {
    #[serde(default)]
    parts: Vec<StreamPart>,
}

#[derive(Deserialize)]
struct StreamPart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    cached_content_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
}

impl GeminiProvider {
    pub fn new(client: reqwest::Client, id: &str, base_url: impl Into<String>) -> Self {
        Self {
            client,
            id: id.to_string(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, model: &str, action: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.base_url.trim_end_matches('/'),
            model.trim(),
            action
        )
    }

    async fn post_json<T: Serialize>(
        &self,
        url: &str,
        credential: &str,
        body: &T,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, credential)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            warn!(%status, "gemini request failed");
            return Err(ProviderError::Unknown(format!(
                "Gemini API error ({status}): {}",
                error_summary(&body)
            )));
        }

        Ok(response)
    }

    async fn count_parts(
        &self,
        credential: &str,
        model: &str,
        parts: Vec<ContentPart>,
    ) -> Result<TokenCount, ProviderError> {
        let request = CountTokensRequest {
            contents: vec![GeminiContent::user(parts)],
        };
        let response = self
            .post_json(&self.endpoint(model, "countTokens"), credential, &request)
            .await?;
        let parsed: CountTokensResponse = response.json().await?;
        Ok(TokenCount::exact(parsed.total_tokens))
    }
}

#[async_trait]
impl ProviderAdapter for GeminiProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        "Google Gemini"
    }

    fn supports_chat(&self) -> bool {
        true
    }

    async fn count_tokens_for_text(
        &self,
        credential: &str,
        model: &str,
        text: &str,
    ) -> Result<TokenCount, ProviderError> {
        validate_request(credential, model)?;
        self.count_parts(credential, model, vec![ContentPart::text(text)])
            .await
    }

    async fn count_tokens_for_pdf(
        &self,
        credential: &str,
        model: &str,
        base64_payload: &str,
        file_name: Option<&str>,
    ) -> Result<TokenCount, ProviderError> {
        validate_request(credential, model)?;
        if base64_payload.is_empty() {
            return Err(ProviderError::Validation("PDF data is empty.".to_string()));
        }
        debug!(file = file_name.unwrap_or("<unnamed>"), "counting pdf tokens");
        self.count_parts(credential, model, vec![ContentPart::pdf(base64_payload)])
            .await
    }

    async fn create_chat_session(
        &self,
        credential: &str,
        model: &str,
        system_instruction: Option<&str>,
    ) -> Result<SessionHandle, ProviderError> {
        validate_request(credential, model)?;
        let session = SessionHandle::new(&self.id, credential, model, system_instruction);
        debug!(session = session.id(), model, "created gemini chat session");
        Ok(session)
    }

    async fn send_message_in_chat(
        &self,
        session: &SessionHandle,
        content: MessageContent,
        cancel_token: Option<CancellationToken>,
    ) -> Result<FragmentStream, ProviderError> {
        if session.provider_id() != self.id {
            return Err(ProviderError::Validation(format!(
                "Session was created by provider '{}'",
                session.provider_id()
            )));
        }
        validate_request(session.credential(), session.model())?;

        let user_parts = content.into_parts();
        if user_parts.is_empty() {
            return Err(ProviderError::Validation("Message is empty.".to_string()));
        }

        let mut contents: Vec<GeminiContent> = session
            .history()
            .into_iter()
            .map(GeminiContent::from)
            .collect();
        contents.push(GeminiContent::user(user_parts.clone()));

        let request = GenerateContentRequest {
            contents,
            system_instruction: session.system_instruction().map(|text| SystemInstruction {
                parts: vec![ContentPart::text(text)],
            }),
        };

        let url = format!(
            "{}?alt=sse",
            self.endpoint(session.model(), "streamGenerateContent")
        );
        let response = self
            .post_json(&url, session.credential(), &request)
            .await?;
        debug!(session = session.id(), "gemini stream opened");

        let state = SseState {
            bytes: Box::pin(response.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec()))),
            buffer: Vec::new(),
            pending: VecDeque::new(),
            cancel_token,
            session: session.clone(),
            user_parts: Some(user_parts),
            reply: String::new(),
            eof: false,
            failed: false,
        };

        Ok(Box::pin(stream::unfold(state, SseState::step)))
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Vec<u8>>> + Send>>;

enum ChunkOutcome {
    Data(Vec<u8>),
    Failed(ProviderError),
    Cancelled,
    Eof,
}

struct SseState {
    bytes: ByteStream,
    buffer: Vec<u8>,
    pending: VecDeque<Result<ResponseFragment, ProviderError>>,
    cancel_token: Option<CancellationToken>,
    session: SessionHandle,
    user_parts: Option<Vec<ContentPart>>,
    reply: String,
    eof: bool,
    failed: bool,
}

impl SseState {
    async fn step(mut self) -> Option<(Result<ResponseFragment, ProviderError>, Self)> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                match &item {
                    Ok(fragment) => self.reply.push_str(&fragment.text),
                    Err(_) => {
                        self.failed = true;
                        self.pending.clear();
                    }
                }
                return Some((item, self));
            }

            if self.failed {
                return None;
            }

            if self.eof {
                self.commit_history();
                return None;
            }

            match self.next_chunk().await {
                ChunkOutcome::Data(bytes) => self.ingest(&bytes),
                ChunkOutcome::Eof => {
                    self.flush_tail();
                    self.eof = true;
                }
                ChunkOutcome::Cancelled => {
                    self.failed = true;
                    return Some((Err(ProviderError::Aborted), self));
                }
                ChunkOutcome::Failed(err) => {
                    self.failed = true;
                    return Some((Err(err), self));
                }
            }
        }
    }

    async fn next_chunk(&mut self) -> ChunkOutcome {
        let next = match &self.cancel_token {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return ChunkOutcome::Cancelled,
                    next = self.bytes.next() => next,
                }
            }
            None => self.bytes.next().await,
        };

        match next {
            Some(Ok(bytes)) => ChunkOutcome::Data(bytes),
            Some(Err(err)) => ChunkOutcome::Failed(err.into()),
            None => ChunkOutcome::Eof,
        }
    }

    fn ingest(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line = String::from_utf8_lossy(&self.buffer[..newline_pos]).into_owned();
            self.buffer.drain(..=newline_pos);
            self.process_line(line.trim());
        }
    }

    fn flush_tail(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        self.process_line(line.trim());
    }

    fn process_line(&mut self, line: &str) {
        if let Some(item) = line
            .strip_prefix("data:")
            .map(str::trim_start)
            .and_then(parse_stream_payload)
        {
            self.pending.push_back(item);
        }
    }

    fn commit_history(&mut self) {
        if let Some(parts) = self.user_parts.take() {
            self.session
                .push_exchange(parts, std::mem::take(&mut self.reply));
        }
    }
}

/// Turns one SSE `data:` payload into a fragment. Payloads without text or
/// usage produce nothing.
fn parse_stream_payload(payload: &str) -> Option<Result<ResponseFragment, ProviderError>> {
    if payload.is_empty() {
        return None;
    }

    let chunk: StreamChunk = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(_) => {
            return Some(Err(ProviderError::Unknown(format!(
                "Gemini API error: {}",
                error_summary(payload)
            ))))
        }
    };

    if let Some(error) = chunk.error {
        let message = error
            .message
            .unwrap_or_else(|| "unknown streaming error".to_string());
        return Some(Err(ProviderError::Unknown(format!(
            "Gemini API error: {message}"
        ))));
    }

    let text: String = chunk
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    let usage = chunk.usage_metadata.map(|usage| UsageSnapshot {
        prompt_count: usage.prompt_token_count,
        cached_input_count: usage.cached_content_token_count,
        completion_count: usage.candidates_token_count,
    });

    if text.is_empty() && usage.is_none() {
        return None;
    }

    Some(Ok(ResponseFragment { text, usage }))
}

fn error_summary(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let summary = serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .or_else(|| value.pointer("/0/error/message"))
                .or_else(|| value.get("message"))
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| trimmed.to_string());

    summary.split_whitespace().collect::<Vec<_>>().join(" ")
}
