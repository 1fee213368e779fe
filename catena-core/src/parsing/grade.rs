//! Grade parser for QA evaluation

use serde::{Deserialize, Serialize};

use super::OutputParser;
use crate::error::{CatenaError, Result};
use crate::schema::Value;

/// Verdict returned by an evaluation chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Grade {
    Correct,
    Incorrect,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Correct => "CORRECT",
            Grade::Incorrect => "INCORRECT",
        }
    }

    /// First word of `text` that is a verdict, ignoring case and punctuation.
    pub fn from_text(text: &str) -> Option<Grade> {
        text.split(|c: char| !c.is_alphanumeric())
            .find_map(|word| match word.to_ascii_uppercase().as_str() {
                "CORRECT" => Some(Grade::Correct),
                "INCORRECT" => Some(Grade::Incorrect),
                _ => None,
            })
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalizes raw grading text to `CORRECT` or `INCORRECT`
#[derive(Debug, Clone, Copy, Default)]
pub struct GradeOutputParser;

impl GradeOutputParser {
    pub fn new() -> Self {
        Self
    }
}

impl OutputParser for GradeOutputParser {
    type Output = Value;

    fn parse(&self, raw: &str) -> Result<Value> {
        Grade::from_text(raw)
            .map(|grade| Value::from(grade.as_str()))
            .ok_or_else(|| CatenaError::UnableToParseOutput(raw.to_string()))
    }

    fn name(&self) -> &'static str {
        "grade"
    }
}
