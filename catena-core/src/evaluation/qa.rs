//! Grading answers against a reference answer

use std::sync::Arc;

use super::{Record, Source, check_prompt, grading_inputs};
use crate::chain::{Chain, LlmChain, apply};
use crate::context::RunContext;
use crate::error::Result;
use crate::model::LanguageModel;
use crate::parsing::GradeOutputParser;
use crate::prompt::PromptTemplate;
use crate::schema::ChainValues;

const QA_EVAL_TEMPLATE: &str = "You are a teacher grading a quiz.
You are given a question, the student's answer, and the true answer, and are asked to score the student answer as either CORRECT or INCORRECT.

Example Format:
QUESTION: question here
STUDENT ANSWER: student's answer here
TRUE ANSWER: true answer here
GRADE: CORRECT or INCORRECT here

Grade the student answers based ONLY on their factual accuracy. Ignore differences in punctuation and phrasing between the student answer and true answer. It is OK if the student answer contains more information than the true answer, as long as it does not contain any conflicting statements. Begin! 

QUESTION: {{query}}
STUDENT ANSWER: {{result}}
TRUE ANSWER: {{answer}}
GRADE:";

/// Grades predictions against reference answers.
///
/// The prompt sees `query` and `answer` from each example and `result` from
/// the matching prediction; the record keys they are read from are
/// configurable.
pub struct QaEvalChain {
    llm_chain: LlmChain,
    question_key: String,
    answer_key: String,
    prediction_key: String,
}

impl QaEvalChain {
    pub fn new(model: Arc<dyn LanguageModel>) -> Result<Self> {
        Self::with_prompt(model, PromptTemplate::new(QA_EVAL_TEMPLATE)?)
    }

    /// # Errors
    ///
    /// Returns a configuration error if `prompt` uses variables other than
    /// `query`, `answer` and `result`.
    pub fn with_prompt(model: Arc<dyn LanguageModel>, prompt: PromptTemplate) -> Result<Self> {
        check_prompt(&prompt, &["query", "answer", "result"])?;
        Ok(Self {
            llm_chain: LlmChain::new(model, prompt),
            question_key: "query".to_string(),
            answer_key: "answer".to_string(),
            prediction_key: "result".to_string(),
        })
    }

    /// Normalize each verdict to `CORRECT` / `INCORRECT`; anything else fails the batch
    pub fn with_grade_parser(mut self) -> Self {
        self.llm_chain = self
            .llm_chain
            .with_output_parser(Arc::new(GradeOutputParser::new()));
        self
    }

    pub fn with_question_key(mut self, key: impl Into<String>) -> Self {
        self.question_key = key.into();
        self
    }

    pub fn with_answer_key(mut self, key: impl Into<String>) -> Self {
        self.answer_key = key.into();
        self
    }

    pub fn with_prediction_key(mut self, key: impl Into<String>) -> Self {
        self.prediction_key = key.into();
        self
    }

    pub fn question_key(&self) -> &str {
        &self.question_key
    }

    pub fn answer_key(&self) -> &str {
        &self.answer_key
    }

    pub fn prediction_key(&self) -> &str {
        &self.prediction_key
    }

    /// Key of the verdict in each result
    pub fn output_key(&self) -> &str {
        self.llm_chain.output_key()
    }

    /// Grade `predictions[i]` against `examples[i]` for every `i`.
    ///
    /// # Errors
    ///
    /// `InvalidInputValues` if the slices differ in length or a record lacks
    /// a configured key; otherwise the first grading failure.
    pub async fn evaluate(
        &self,
        examples: &[Record],
        predictions: &[Record],
        ctx: &RunContext,
    ) -> Result<Vec<ChainValues>> {
        let inputs = grading_inputs(
            examples,
            predictions,
            &[
                ("query", Source::Example, self.question_key.as_str()),
                ("answer", Source::Example, self.answer_key.as_str()),
                ("result", Source::Prediction, self.prediction_key.as_str()),
            ],
        )?;
        tracing::debug!(
            chain = self.llm_chain.chain_type(),
            examples = inputs.len(),
            "Grading answers"
        );
        apply(&self.llm_chain, inputs, ctx).await
    }
}
