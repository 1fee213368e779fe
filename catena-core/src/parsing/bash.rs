//! Extracts shell commands from fenced code blocks

use regex::Regex;
use std::sync::LazyLock;

use super::OutputParser;
use crate::error::{CatenaError, Result};

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:bash|sh)?[ \t]*\n(.*?)```").unwrap());

/// Collects the non-empty lines of every ```` ```bash ```` block.
#[derive(Debug, Clone, Default)]
pub struct BashOutputParser;

impl BashOutputParser {
    pub fn new() -> Self {
        Self
    }
}

impl OutputParser for BashOutputParser {
    type Output = Vec<String>;

    fn parse(&self, raw: &str) -> Result<Vec<String>> {
        let commands: Vec<String> = FENCE_RE
            .captures_iter(raw)
            .flat_map(|caps| {
                caps[1]
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();

        if commands.is_empty() {
            return Err(CatenaError::UnableToParseOutput(format!(
                "no bash code block in: {}",
                raw
            )));
        }
        Ok(commands)
    }

    fn name(&self) -> &'static str {
        "bash"
    }
}
