use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

pub const CANCELLED_SUFFIX: &str = " [cancelled]";
pub const ERROR_SUFFIX: &str = " [Error]";

static NEXT_MESSAGE_SEQ: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChatRole {
    User,
    Model,
    System,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
            ChatRole::System => "system",
        }
    }

    pub fn is_user(self) -> bool {
        self == ChatRole::User
    }
}

impl AsRef<str> for ChatRole {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<&str> for ChatRole {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(ChatRole::User),
            "model" => Ok(ChatRole::Model),
            "system" => Ok(ChatRole::System),
            _ => Err(format!("invalid chat role: {value}")),
        }
    }
}

impl TryFrom<String> for ChatRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<ChatRole> for String {
    fn from(value: ChatRole) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub is_streaming: bool,
    pub error: bool,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: next_message_id(role),
            role,
            content: content.into(),
            is_streaming: false,
            error: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn model_placeholder() -> Self {
        Self {
            is_streaming: true,
            ..Self::new(ChatRole::Model, String::new())
        }
    }

    pub fn mark_cancelled(&mut self) {
        self.is_streaming = false;
        if !self.content.ends_with(CANCELLED_SUFFIX) {
            self.content.push_str(CANCELLED_SUFFIX);
        }
    }

    pub fn mark_failed(&mut self) {
        self.is_streaming = false;
        self.error = true;
        self.content.push_str(ERROR_SUFFIX);
    }

    pub fn is_cancelled(&self) -> bool {
        self.content.ends_with(CANCELLED_SUFFIX)
    }
}

fn next_message_id(role: ChatRole) -> String {
    let seq = NEXT_MESSAGE_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{seq}", role.as_str(), Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_ids_are_unique() {
        let a = ChatMessage::user("a");
        let b = ChatMessage::user("a");
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("user-"));
    }

    #[test]
    fn cancelling_twice_appends_suffix_once() {
        let mut msg = ChatMessage::model_placeholder();
        msg.content.push_str("partial");
        msg.mark_cancelled();
        msg.mark_cancelled();
        assert_eq!(msg.content, "partial [cancelled]");
        assert!(!msg.is_streaming);
        assert!(msg.is_cancelled());
    }

    #[test]
    fn failure_sets_error_flag_and_suffix() {
        let mut msg = ChatMessage::user("hi");
        msg.mark_failed();
        assert!(msg.error);
        assert_eq!(msg.content, "hi [Error]");
    }

    #[test]
    fn invalid_role_strings_are_rejected() {
        assert!(ChatRole::try_from("assistant").is_err());
        assert_eq!(ChatRole::try_from("model"), Ok(ChatRole::Model));
    }
}
