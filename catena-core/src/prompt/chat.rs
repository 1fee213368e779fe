use super::{BasePromptTemplate, Formatter, PromptValue};
use crate::error::Result;
use crate::schema::{ChainValues, ChatMessage, ChatMessageType, Value};

#[derive(Debug, Clone)]
struct MessageTemplate {
    kind: ChatMessageType,
    role: String,
    formatter: Formatter,
}

/// Ordered message templates rendered into a chat prompt
#[derive(Debug, Clone, Default)]
pub struct ChatPromptTemplate {
    messages: Vec<MessageTemplate>,
    partials: ChainValues,
}

impl ChatPromptTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system(self, template: impl Into<String>) -> Result<Self> {
        self.push(ChatMessageType::System, "system", template)
    }

    pub fn human(self, template: impl Into<String>) -> Result<Self> {
        self.push(ChatMessageType::Human, "human", template)
    }

    pub fn ai(self, template: impl Into<String>) -> Result<Self> {
        self.push(ChatMessageType::Ai, "ai", template)
    }

    pub fn generic(self, role: impl Into<String>, template: impl Into<String>) -> Result<Self> {
        self.push(ChatMessageType::Generic, role, template)
    }

    pub fn with_partial(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.partials.insert(key, value);
        self
    }

    fn push(
        mut self,
        kind: ChatMessageType,
        role: impl Into<String>,
        template: impl Into<String>,
    ) -> Result<Self> {
        self.messages.push(MessageTemplate {
            kind,
            role: role.into(),
            formatter: Formatter::new(template)?,
        });
        Ok(self)
    }

    pub fn format_messages(&self, values: &ChainValues) -> Result<Vec<ChatMessage>> {
        let mut merged = values.clone();
        merged.merge(self.partials.clone());

        self.messages
            .iter()
            .map(|m| {
                let text = m.formatter.render(&merged)?;
                Ok(match m.kind {
                    ChatMessageType::Human => ChatMessage::human(text),
                    ChatMessageType::Ai => ChatMessage::ai(text),
                    ChatMessageType::System => ChatMessage::system(text),
                    ChatMessageType::Generic => ChatMessage::generic(m.role.clone(), text),
                })
            })
            .collect()
    }
}

impl BasePromptTemplate for ChatPromptTemplate {
    fn input_variables(&self) -> Vec<String> {
        let mut vars: Vec<String> = Vec::new();
        for field in self.messages.iter().flat_map(|m| m.formatter.fields()) {
            if !self.partials.contains_key(field) && !vars.contains(field) {
                vars.push(field.clone());
            }
        }
        vars
    }

    fn format_prompt(&self, values: &ChainValues) -> Result<PromptValue> {
        Ok(PromptValue::Chat(self.format_messages(values)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_prompt_preserves_order() {
        let prompt = ChatPromptTemplate::new()
            .system("You are {{persona}}.")
            .unwrap()
            .human("{{question}}")
            .unwrap()
            .generic("critic", "Be {{persona}}")
            .unwrap();

        assert_eq!(
            prompt.input_variables(),
            vec!["persona".to_string(), "question".to_string()]
        );

        let messages = prompt
            .format_messages(&ChainValues::from([("persona", "terse"), ("question", "2+2?")]))
            .unwrap();
        assert_eq!(
            messages,
            vec![
                ChatMessage::system("You are terse."),
                ChatMessage::human("2+2?"),
                ChatMessage::generic("critic", "Be terse"),
            ]
        );
    }
}
