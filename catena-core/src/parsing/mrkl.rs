//! MRKL (zero-shot ReAct) output parser
//!
//! Format:
//! ```text
//! Thought: I need to search for information
//! Action: search
//! Action Input: capital of France
//! ```
//! or, once the model is done:
//! ```text
//! Thought: I now know the final answer
//! Final Answer: Paris
//! ```

use regex::Regex;
use std::sync::LazyLock;

use super::OutputParser;
use crate::agent::{AgentAction, AgentDecision, AgentFinish};
use crate::error::{CatenaError, Result};
use crate::schema::ChainValues;

/// Marker that ends the agent loop
pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";

static ACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Action:\s*(.+)\s*Action Input:\s*(.+)").unwrap());

/// Parses one MRKL generation into an action or a final answer
#[derive(Debug, Clone)]
pub struct MrklOutputParser {
    output_key: String,
}

impl Default for MrklOutputParser {
    fn default() -> Self {
        Self::new("output")
    }
}

impl MrklOutputParser {
    /// `output_key` names the answer in the finish's return values
    pub fn new(output_key: impl Into<String>) -> Self {
        Self {
            output_key: output_key.into(),
        }
    }

    pub fn output_key(&self) -> &str {
        &self.output_key
    }
}

impl OutputParser for MrklOutputParser {
    type Output = AgentDecision;

    fn parse(&self, raw: &str) -> Result<AgentDecision> {
        if let Some((_, answer)) = raw.rsplit_once(FINAL_ANSWER_MARKER) {
            return Ok(AgentDecision::Finish(AgentFinish {
                return_values: ChainValues::new().with(self.output_key.clone(), answer.trim()),
                log: raw.to_string(),
            }));
        }

        let caps = ACTION_RE
            .captures(raw)
            .ok_or_else(|| CatenaError::UnableToParseOutput(raw.to_string()))?;

        Ok(AgentDecision::Actions(vec![AgentAction {
            tool: caps[1].trim().to_string(),
            tool_input: caps[2].trim().to_string(),
            log: raw.to_string(),
        }]))
    }

    fn name(&self) -> &'static str {
        "mrkl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<AgentDecision> {
        MrklOutputParser::default().parse(raw)
    }

    #[test]
    fn test_action() {
        let decision = parse("Action: search\nAction Input: capital of France").unwrap();
        match decision {
            AgentDecision::Actions(actions) => {
                assert_eq!(actions.len(), 1);
                assert_eq!(actions[0].tool, "search");
                assert_eq!(actions[0].tool_input, "capital of France");
                assert_eq!(
                    actions[0].log,
                    "Action: search\nAction Input: capital of France"
                );
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn test_action_with_thought_and_padding() {
        let raw = "I should look this up.\nAction:   calculator  \nAction Input:  2 + 2  ";
        match parse(raw).unwrap() {
            AgentDecision::Actions(actions) => {
                assert_eq!(actions[0].tool, "calculator");
                assert_eq!(actions[0].tool_input, "2 + 2");
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn test_final_answer() {
        let raw = "Thought: I now know the final answer\nFinal Answer: Paris";
        match parse(raw).unwrap() {
            AgentDecision::Finish(finish) => {
                assert_eq!(finish.return_values.get_string("output").unwrap(), "Paris");
                assert_eq!(finish.log, raw);
            }
            other => panic!("expected finish, got {other:?}"),
        }
    }

    #[test]
    fn test_final_answer_uses_last_marker() {
        let raw = "Final Answer: draft\nFinal Answer: 42";
        match parse(raw).unwrap() {
            AgentDecision::Finish(finish) => {
                assert_eq!(finish.return_values.get_string("output").unwrap(), "42");
            }
            other => panic!("expected finish, got {other:?}"),
        }
    }

    #[test]
    fn test_final_answer_beats_action() {
        let raw = "Action: search\nAction Input: x\nFinal Answer: done";
        assert!(matches!(parse(raw).unwrap(), AgentDecision::Finish(_)));
    }

    #[test]
    fn test_unparseable_output() {
        let err = parse("I am not sure what to do.").unwrap_err();
        match err {
            CatenaError::UnableToParseOutput(text) => {
                assert_eq!(text, "I am not sure what to do.")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_custom_output_key() {
        let parser = MrklOutputParser::new("answer");
        match parser.parse("Final Answer: yes").unwrap() {
            AgentDecision::Finish(finish) => {
                assert_eq!(finish.return_values.get_string("answer").unwrap(), "yes");
            }
            other => panic!("expected finish, got {other:?}"),
        }
    }
}
