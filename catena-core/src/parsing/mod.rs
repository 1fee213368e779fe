//! Output parsing
//!
//! Turns free-form model text into structured values. Parsers never retry
//! or repair: text that does not fit the expected shape is an
//! [`UnableToParseOutput`](crate::error::CatenaError::UnableToParseOutput)
//! error for the caller to handle.
//!
//! # Example
//!
//! ```rust,ignore
//! use catena_core::parsing::{MrklOutputParser, OutputParser};
//!
//! let parser = MrklOutputParser::new("output");
//! let decision = parser.parse("Action: search\nAction Input: capital of France")?;
//! ```

mod bash;
mod grade;
mod mrkl;

pub use bash::BashOutputParser;
pub use grade::{Grade, GradeOutputParser};
pub use mrkl::{FINAL_ANSWER_MARKER, MrklOutputParser};

use crate::error::Result;

/// Trait for output parsers
pub trait OutputParser: Send + Sync {
    /// The output type produced by this parser
    type Output;

    /// Parse the raw output string
    fn parse(&self, raw: &str) -> Result<Self::Output>;

    /// Get the parser name for debugging
    fn name(&self) -> &'static str;
}
