//! Core data model shared by every component
//!
//! [`ChainValues`] is the interchange format between chains, prompts,
//! memories and agents. Values are tagged ([`Value`]) so a mismatch is a
//! typed error instead of a failed downcast.

mod document;
mod generation;
mod message;
mod retriever;
mod values;

pub use document::Document;
pub use generation::{Generation, ModelResult, TokenUsage};
pub use message::{ChatMessage, ChatMessageType, StringifyOptions, stringify_messages};
pub use retriever::Retriever;
pub use values::{ChainValues, Value};
