use serde::{Deserialize, Serialize};

/// Discriminant of a [`ChatMessage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMessageType {
    Human,
    Ai,
    System,
    Generic,
}

/// One turn of a conversation. Order within a sequence is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatMessage {
    Human { text: String },
    Ai { text: String },
    System { text: String },
    Generic { role: String, text: String },
}

impl ChatMessage {
    pub fn human(text: impl Into<String>) -> Self {
        ChatMessage::Human { text: text.into() }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        ChatMessage::Ai { text: text.into() }
    }

    pub fn system(text: impl Into<String>) -> Self {
        ChatMessage::System { text: text.into() }
    }

    pub fn generic(role: impl Into<String>, text: impl Into<String>) -> Self {
        ChatMessage::Generic {
            role: role.into(),
            text: text.into(),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            ChatMessage::Human { text }
            | ChatMessage::Ai { text }
            | ChatMessage::System { text }
            | ChatMessage::Generic { text, .. } => text,
        }
    }

    pub fn message_type(&self) -> ChatMessageType {
        match self {
            ChatMessage::Human { .. } => ChatMessageType::Human,
            ChatMessage::Ai { .. } => ChatMessageType::Ai,
            ChatMessage::System { .. } => ChatMessageType::System,
            ChatMessage::Generic { .. } => ChatMessageType::Generic,
        }
    }
}

/// Role prefixes used when flattening messages to text
#[derive(Debug, Clone)]
pub struct StringifyOptions {
    pub human_prefix: String,
    pub ai_prefix: String,
    pub system_prefix: String,
}

impl Default for StringifyOptions {
    fn default() -> Self {
        Self {
            human_prefix: "Human".to_string(),
            ai_prefix: "AI".to_string(),
            system_prefix: "System".to_string(),
        }
    }
}

impl StringifyOptions {
    pub fn with_human_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.human_prefix = prefix.into();
        self
    }

    pub fn with_ai_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.ai_prefix = prefix.into();
        self
    }
}

/// Render messages as `"<role>: <text>"` lines joined by newlines.
pub fn stringify_messages(messages: &[ChatMessage], opts: &StringifyOptions) -> String {
    messages
        .iter()
        .map(|message| {
            let role = match message {
                ChatMessage::Human { .. } => opts.human_prefix.as_str(),
                ChatMessage::Ai { .. } => opts.ai_prefix.as_str(),
                ChatMessage::System { .. } => opts.system_prefix.as_str(),
                ChatMessage::Generic { role, .. } => role.as_str(),
            };
            format!("{}: {}", role, message.text())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stringify_default_prefixes() {
        let messages = vec![
            ChatMessage::system("be brief"),
            ChatMessage::human("hi"),
            ChatMessage::ai("hello"),
            ChatMessage::generic("tool", "42"),
        ];

        let text = stringify_messages(&messages, &StringifyOptions::default());
        assert_eq!(text, "System: be brief\nHuman: hi\nAI: hello\ntool: 42");
    }

    #[test]
    fn test_stringify_custom_prefixes() {
        let messages = vec![ChatMessage::human("q"), ChatMessage::ai("a")];
        let opts = StringifyOptions::default()
            .with_human_prefix("User")
            .with_ai_prefix("Bot");

        assert_eq!(stringify_messages(&messages, &opts), "User: q\nBot: a");
    }

    #[test]
    fn test_message_type() {
        assert_eq!(ChatMessage::ai("x").message_type(), ChatMessageType::Ai);
        assert_eq!(ChatMessage::generic("r", "x").text(), "x");
    }
}
