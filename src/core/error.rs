use std::error::Error;
use std::fmt;

/// Failures raised by provider adapters and by the orchestrator's own
/// precondition checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Missing or rejected credential.
    Credential(String),

    /// Missing model, missing content, or a malformed payload.
    Validation(String),

    /// The provider does not implement this capability.
    Unsupported {
        provider: String,
        operation: &'static str,
    },

    /// The user cancelled the request while it was streaming.
    Aborted,

    /// Anything else, typically transport or API failures.
    Unknown(String),
}

impl ProviderError {
    pub fn missing_credential() -> Self {
        ProviderError::Credential("API key is required. Please enter your API key.".to_string())
    }

    pub fn unsupported(provider: impl Into<String>, operation: &'static str) -> Self {
        ProviderError::Unsupported {
            provider: provider.into(),
            operation,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, ProviderError::Unsupported { .. })
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Credential(message)
            | ProviderError::Validation(message)
            | ProviderError::Unknown(message) => write!(f, "{message}"),
            ProviderError::Unsupported {
                provider,
                operation,
            } => write!(f, "{operation} is not supported by {provider}"),
            ProviderError::Aborted => write!(f, "request was cancelled"),
        }
    }
}

impl Error for ProviderError {}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Unknown(err.to_string())
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Unknown(format!("invalid response from provider: {err}"))
    }
}

/// Blank credentials and models are rejected by every adapter before any
/// network activity.
pub fn validate_request(credential: &str, model: &str) -> Result<(), ProviderError> {
    if credential.trim().is_empty() {
        return Err(ProviderError::missing_credential());
    }
    if model.trim().is_empty() {
        return Err(ProviderError::Validation(
            "A model must be selected.".to_string(),
        ));
    }
    Ok(())
}
