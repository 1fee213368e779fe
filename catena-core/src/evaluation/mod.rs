//! LLM-graded evaluation of question answering
//!
//! An evaluator renders a grading prompt for every (example, prediction)
//! pair and runs the batch through [`chain::apply`](crate::chain::apply).
//! [`EvalSummary`] tallies the verdicts.
//!
//! # Example
//!
//! ```rust,ignore
//! use catena_core::evaluation::{EvalDataset, EvalSummary, QaEvalChain};
//!
//! let dataset = EvalDataset::load("qa.json")?;
//! let eval = QaEvalChain::new(model)?.with_grade_parser();
//! let graded = eval.evaluate(&dataset.examples, &dataset.predictions, &ctx).await?;
//! println!("{:?}", EvalSummary::from_results(&graded, eval.output_key()));
//! ```

mod context_qa;
mod qa;

pub use context_qa::ContextQaEvalChain;
pub use qa::QaEvalChain;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{CatenaError, Result};
use crate::parsing::Grade;
use crate::prompt::{BasePromptTemplate, PromptTemplate};
use crate::schema::{ChainValues, Value};

/// One example or prediction: field name to text
pub type Record = HashMap<String, String>;

/// Examples and the predictions to grade against them, index-aligned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalDataset {
    pub examples: Vec<Record>,
    pub predictions: Vec<Record>,
}

impl EvalDataset {
    /// Load a dataset from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Verdict counts over a batch of graded results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvalSummary {
    pub correct: usize,
    pub incorrect: usize,
    /// Results whose text held no verdict
    pub ungraded: usize,
}

impl EvalSummary {
    pub fn from_results(results: &[ChainValues], key: &str) -> Self {
        let mut summary = Self::default();
        for result in results {
            let grade = result
                .get(key)
                .and_then(|v| v.as_str())
                .and_then(Grade::from_text);
            match grade {
                Some(Grade::Correct) => summary.correct += 1,
                Some(Grade::Incorrect) => summary.incorrect += 1,
                None => summary.ungraded += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.correct + self.incorrect + self.ungraded
    }

    /// Fraction graded correct; 0 for an empty batch
    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            n => self.correct as f64 / n as f64,
        }
    }
}

/// Where a prompt variable is read from
enum Source {
    Example,
    Prediction,
}

/// Pair up examples and predictions into grading inputs.
///
/// `fields` maps each prompt variable to its source record and key.
fn grading_inputs(
    examples: &[Record],
    predictions: &[Record],
    fields: &[(&str, Source, &str)],
) -> Result<Vec<ChainValues>> {
    if examples.len() != predictions.len() {
        return Err(CatenaError::InvalidInputValues(format!(
            "{} examples but {} predictions",
            examples.len(),
            predictions.len()
        )));
    }

    examples
        .iter()
        .zip(predictions)
        .enumerate()
        .map(|(index, (example, prediction))| {
            fields
                .iter()
                .map(|(variable, source, key)| {
                    let (record, kind) = match source {
                        Source::Example => (example, "example"),
                        Source::Prediction => (prediction, "prediction"),
                    };
                    let text = record.get(*key).ok_or_else(|| {
                        CatenaError::InvalidInputValues(format!(
                            "{} {} has no '{}' field",
                            kind, index, key
                        ))
                    })?;
                    Ok((variable.to_string(), Value::from(text.as_str())))
                })
                .collect::<Result<ChainValues>>()
        })
        .collect()
}

/// Reject a grading prompt that needs variables the evaluator never binds.
fn check_prompt(prompt: &PromptTemplate, allowed: &[&str]) -> Result<()> {
    match prompt
        .input_variables()
        .into_iter()
        .find(|v| !allowed.contains(&v.as_str()))
    {
        Some(unknown) => Err(CatenaError::Configuration(format!(
            "grading prompt uses unknown variable '{}', expected only {:?}",
            unknown, allowed
        ))),
        None => Ok(()),
    }
}
