//! `ModelClient` trait - abstraction over the language-model collaborator.
//!
//! The core never calls a provider directly; whatever produces raw block
//! output for the parser implements this trait. Retries and streaming are
//! the implementer's concern.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions framing the generation.
    System,
    /// The person describing the project.
    User,
    /// Prior model output.
    Assistant,
}

/// One turn of conversation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Turn author.
    pub role: Role,
    /// Turn text.
    pub content: String,
}

impl Message {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Build an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Abstraction over language-model backends.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Produce raw text for a prompt given prior conversation context.
    ///
    /// The returned text is fed verbatim to the block parser.
    async fn generate(&self, prompt: &str, context: &[Message]) -> Result<String>;

    /// Human-readable description of the provider and model, for status
    /// output.
    fn description(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time verification that `ModelClient` is object-safe.
    #[test]
    fn test_model_client_is_object_safe() {
        fn _assert_object_safe(_: &dyn ModelClient) {}
    }

    #[test]
    fn test_message_serde_round_trip() {
        let message = Message::user("build me a landing page");
        let json = serde_json::to_string(&message).expect("should serialize");
        assert!(json.contains("\"role\":\"user\""));
        let back: Message = serde_json::from_str(&json).expect("should deserialize");
        assert_eq!(message, back);
    }
}
