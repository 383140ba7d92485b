//! Routing of failures to the banners the view shows.

use super::error::ProviderError;

/// Case-insensitive markers that identify credential, permission, and quota
/// problems in provider error messages.
const CREDENTIAL_SIGNALS: &[&str] = &[
    "api key",
    "permission",
    "quota",
    "authentication_error",
    "billing_not_active",
    "incorrect api key",
    "api_key_missing",
    "insufficient_quota",
    "rate_limit_exceeded",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorRoute {
    /// Persistent banner asking the user to check their API key.
    Credential(String),
    /// Dismissible banner, already prefixed with the failed operation.
    Generic(String),
    /// The provider lacks the capability; shown in place, not as a failure.
    ComingSoon(String),
    /// Cancellation, never shown as a banner.
    Silent,
}

pub fn classify(error: &ProviderError, operation: &str) -> ErrorRoute {
    match error {
        ProviderError::Aborted => ErrorRoute::Silent,
        ProviderError::Credential(message) => ErrorRoute::Credential(message.clone()),
        ProviderError::Unsupported { provider, .. } => ErrorRoute::ComingSoon(format!(
            "{} is not available for {provider} yet (coming soon).",
            capitalize(operation)
        )),
        other => {
            let message = other.message();
            if is_credential_message(&message) {
                ErrorRoute::Credential(format!(
                    "{}. Please check your API key, its permissions, and your quota.",
                    message.trim_end().trim_end_matches('.')
                ))
            } else {
                ErrorRoute::Generic(format!("Failed to {operation}: {message}"))
            }
        }
    }
}

pub fn is_credential_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    CREDENTIAL_SIGNALS.iter().any(|signal| lower.contains(signal))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
