use crate::schema::{ChatMessage, StringifyOptions, stringify_messages};

/// A rendered prompt, consumable by both completion and chat models
#[derive(Debug, Clone, PartialEq)]
pub enum PromptValue {
    Text(String),
    Chat(Vec<ChatMessage>),
}

impl PromptValue {
    /// Prompt as a single string; chat prompts are stringified.
    pub fn to_text(&self) -> String {
        match self {
            PromptValue::Text(text) => text.clone(),
            PromptValue::Chat(messages) => {
                stringify_messages(messages, &StringifyOptions::default())
            }
        }
    }

    /// Prompt as messages; a text prompt becomes one human message.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        match self {
            PromptValue::Text(text) => vec![ChatMessage::human(text.clone())],
            PromptValue::Chat(messages) => messages.clone(),
        }
    }
}

impl From<&str> for PromptValue {
    fn from(text: &str) -> Self {
        PromptValue::Text(text.to_string())
    }
}

impl From<String> for PromptValue {
    fn from(text: String) -> Self {
        PromptValue::Text(text)
    }
}
