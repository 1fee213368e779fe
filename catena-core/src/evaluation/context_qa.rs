//! Grading answers against source context instead of a reference answer

use std::sync::Arc;

use super::{Record, Source, check_prompt, grading_inputs};
use crate::chain::{LlmChain, apply};
use crate::context::RunContext;
use crate::error::Result;
use crate::model::LanguageModel;
use crate::parsing::GradeOutputParser;
use crate::prompt::PromptTemplate;
use crate::schema::ChainValues;

const CONTEXT_QA_EVAL_TEMPLATE: &str = "You are a teacher grading a quiz.
You are given a question, the context the question is about, and the student's answer. 
You are asked to score the student's answer as either CORRECT or INCORRECT, based on the context.

Example Format:
QUESTION: question here
CONTEXT: context the question is about here
STUDENT ANSWER: student's answer here
GRADE: CORRECT or INCORRECT here

Grade the student answers based ONLY on their factual accuracy. 
Ignore differences in punctuation and phrasing between the student answer and true answer. 
It is OK if the student answer contains more information than the true answer, as long as 
it does not contain any conflicting statements. Begin! 

QUESTION: {{query}}
CONTEXT: {{context}}
STUDENT ANSWER: {{result}}
GRADE:";

/// Grades predictions using the context each question was asked about.
pub struct ContextQaEvalChain {
    llm_chain: LlmChain,
    question_key: String,
    context_key: String,
    prediction_key: String,
}

impl ContextQaEvalChain {
    pub fn new(model: Arc<dyn LanguageModel>) -> Result<Self> {
        Self::with_prompt(model, PromptTemplate::new(CONTEXT_QA_EVAL_TEMPLATE)?)
    }

    pub fn with_prompt(model: Arc<dyn LanguageModel>, prompt: PromptTemplate) -> Result<Self> {
        check_prompt(&prompt, &["query", "context", "result"])?;
        Ok(Self {
            llm_chain: LlmChain::new(model, prompt),
            question_key: "query".to_string(),
            context_key: "context".to_string(),
            prediction_key: "result".to_string(),
        })
    }

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

    pub fn with_context_key(mut self, key: impl Into<String>) -> Self {
        self.context_key = key.into();
        self
    }

    pub fn with_prediction_key(mut self, key: impl Into<String>) -> Self {
        self.prediction_key = key.into();
        self
    }

    pub fn output_key(&self) -> &str {
        self.llm_chain.output_key()
    }

    /// Grade `predictions[i]` against the context of `examples[i]`.
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
                ("context", Source::Example, self.context_key.as_str()),
                ("result", Source::Prediction, self.prediction_key.as_str()),
            ],
        )?;
        apply(&self.llm_chain, inputs, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatenaError;
    use crate::model::FakeModel;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_grades_against_context() {
        let model = Arc::new(FakeModel::new([" correct "]));
        let eval = ContextQaEvalChain::new(model.clone())
            .unwrap()
            .with_grade_parser();

        let results = eval
            .evaluate(
                &[record(&[
                    ("query", "Who wrote it?"),
                    ("context", "The memo was written by Ada."),
                ])],
                &[record(&[("result", "Ada")])],
                &RunContext::new(),
            )
            .await
            .unwrap();

        assert_eq!(results[0].get_string("text").unwrap(), "CORRECT");
        assert!(model.prompts()[0].to_text().ends_with(
            "QUESTION: Who wrote it?\nCONTEXT: The memo was written by Ada.\nSTUDENT ANSWER: Ada\nGRADE:"
        ));
    }

    #[tokio::test]
    async fn test_missing_context_field() {
        let eval = ContextQaEvalChain::new(Arc::new(FakeModel::new(["CORRECT"]))).unwrap();

        let err = eval
            .evaluate(
                &[record(&[("query", "q")])],
                &[record(&[("result", "r")])],
                &RunContext::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CatenaError::InvalidInputValues(ref m) if m.contains("context")));
    }
}
