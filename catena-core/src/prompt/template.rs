use super::{BasePromptTemplate, Formatter, PromptValue};
use crate::error::Result;
use crate::schema::{ChainValues, Value};

/// Text prompt template with optional pre-bound (partial) values.
///
/// Partials take precedence: a per-call value with the same key as a
/// partial is ignored.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    formatter: Formatter,
    partials: ChainValues,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        Ok(Self {
            formatter: Formatter::new(template)?,
            partials: ChainValues::new(),
        })
    }

    /// Bind a value at construction time
    pub fn with_partial(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.partials.insert(key, value);
        self
    }

    pub fn with_partials(mut self, partials: ChainValues) -> Self {
        self.partials.merge(partials);
        self
    }

    pub fn template(&self) -> &str {
        self.formatter.text()
    }

    pub fn partials(&self) -> &ChainValues {
        &self.partials
    }

    /// Every field referenced by the template, partials included
    pub fn required_fields(&self) -> &[String] {
        self.formatter.fields()
    }

    pub fn render(&self, values: &ChainValues) -> Result<String> {
        if self.partials.is_empty() {
            return self.formatter.render(values);
        }
        let mut merged = values.clone();
        merged.merge(self.partials.clone());
        self.formatter.render(&merged)
    }
}

impl BasePromptTemplate for PromptTemplate {
    fn input_variables(&self) -> Vec<String> {
        self.formatter
            .fields()
            .iter()
            .filter(|f| !self.partials.contains_key(f))
            .cloned()
            .collect()
    }

    fn format_prompt(&self, values: &ChainValues) -> Result<PromptValue> {
        Ok(PromptValue::Text(self.render(values)?))
    }
}
