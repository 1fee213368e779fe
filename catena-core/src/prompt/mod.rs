//! Prompt templates
//!
//! Templates use `{{name}}` placeholders (`{{ .name }}` is accepted too).
//! A template exposes the variables it needs so chains can validate their
//! inputs before any model call is made.

mod chat;
mod formatter;
mod template;
mod value;

pub use chat::ChatPromptTemplate;
pub use formatter::Formatter;
pub use template::PromptTemplate;
pub use value::PromptValue;

use crate::error::Result;
use crate::schema::ChainValues;

/// Anything that turns chain values into a prompt
pub trait BasePromptTemplate: Send + Sync {
    /// Variables the caller must supply (partials excluded)
    fn input_variables(&self) -> Vec<String>;

    fn format_prompt(&self, values: &ChainValues) -> Result<PromptValue>;
}
