//! Token counting
//!
//! Tokenizers are pure functions from text to a count. Models default to
//! [`SimpleTokenizer`] unless given a provider-accurate one such as
//! [`Gpt2Tokenizer`].

use regex::Regex;
use std::sync::{Arc, LazyLock};
use tiktoken_rs::CoreBPE;

use crate::error::{CatenaError, Result};
use crate::schema::{ChatMessage, StringifyOptions, stringify_messages};

/// Counts tokens in text or message sequences
pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> Result<usize>;

    /// Flattens messages to text, then counts.
    fn count_message_tokens(&self, messages: &[ChatMessage]) -> Result<usize> {
        self.count_tokens(&stringify_messages(messages, &StringifyOptions::default()))
    }
}

/// Approximates BPE tokenization: each word run and each punctuation mark
/// counts as one token.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTokenizer;

impl SimpleTokenizer {
    pub fn new() -> Self {
        Self
    }
}

impl Tokenizer for SimpleTokenizer {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        static TOKEN_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\w+|[^\w\s]").unwrap());

        Ok(TOKEN_RE.find_iter(text).count())
    }
}

/// GPT-2 byte-pair encoding (`r50k_base`)
#[derive(Clone)]
pub struct Gpt2Tokenizer {
    bpe: Arc<CoreBPE>,
}

impl Gpt2Tokenizer {
    /// Load the encoding tables.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the bundled ranks fail to load.
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::r50k_base().map_err(|e| {
            CatenaError::Configuration(format!("Failed to load GPT-2 encoding: {}", e))
        })?;
        Ok(Self { bpe: Arc::new(bpe) })
    }

    pub fn encode(&self, text: &str) -> Vec<usize> {
        self.bpe
            .encode_with_special_tokens(text)
            .into_iter()
            .map(|rank| rank as usize)
            .collect()
    }
}

impl std::fmt::Debug for Gpt2Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Gpt2Tokenizer")
    }
}

impl Tokenizer for Gpt2Tokenizer {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(self.bpe.encode_with_special_tokens(text).len())
    }
}
