use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ChatMessage;

/// One candidate completion returned by a model
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ChatMessage>,
    #[serde(default)]
    pub info: HashMap<String, serde_json::Value>,
}

impl Generation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            message: None,
            info: HashMap::new(),
        }
    }

    /// Generation produced by a chat model; carries the AI message.
    pub fn chat(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            message: Some(ChatMessage::ai(text.clone())),
            text,
            info: HashMap::new(),
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl TokenUsage {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Accumulate another usage delta into this one.
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Result of a single model invocation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelResult {
    pub generations: Vec<Generation>,
    pub usage: TokenUsage,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ModelResult {
    /// Text of the first generation, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.generations.first().map(|g| g.text.as_str())
    }

    /// Finish reason reported by the provider, when it reported one.
    pub fn finish_reason(&self) -> Option<&str> {
        self.metadata.get("finish_reason").and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_add() {
        let mut usage = TokenUsage::new(3, 1);
        usage.add(TokenUsage::new(0, 2));
        assert_eq!(usage, TokenUsage::new(3, 3));
        assert_eq!(usage.total_tokens, 6);
    }

    #[test]
    fn test_chat_generation_carries_message() {
        let generation = Generation::chat("hi");
        assert_eq!(generation.message, Some(ChatMessage::ai("hi")));
    }
}
