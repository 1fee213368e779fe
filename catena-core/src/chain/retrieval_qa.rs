//! Question answering over retrieved documents

use async_trait::async_trait;
use std::sync::Arc;

use super::{Chain, LlmChain, StuffDocumentsChain, call};
use crate::context::RunContext;
use crate::error::Result;
use crate::model::LanguageModel;
use crate::prompt::PromptTemplate;
use crate::schema::{ChainValues, Retriever};

const DEFAULT_QA_TEMPLATE: &str = "Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.

{{context}}

Question: {{question}}
Helpful Answer:";

/// Fetches documents for a query and answers it with a stuff chain.
pub struct RetrievalQaChain {
    retriever: Arc<dyn Retriever>,
    combine_chain: StuffDocumentsChain,
    input_key: String,
    question_variable: String,
    output_key: String,
    source_documents_key: Option<String>,
    verbose: bool,
}

impl RetrievalQaChain {
    pub fn new(retriever: Arc<dyn Retriever>, combine_chain: StuffDocumentsChain) -> Self {
        Self {
            retriever,
            combine_chain,
            input_key: "query".to_string(),
            question_variable: "question".to_string(),
            output_key: "result".to_string(),
            source_documents_key: None,
            verbose: false,
        }
    }

    /// Build with the default question-answering prompt.
    pub fn from_model(model: Arc<dyn LanguageModel>, retriever: Arc<dyn Retriever>) -> Result<Self> {
        let llm_chain = LlmChain::new(model, PromptTemplate::new(DEFAULT_QA_TEMPLATE)?);
        Ok(Self::new(
            retriever,
            StuffDocumentsChain::new(Arc::new(llm_chain)),
        ))
    }

    pub fn with_input_key(mut self, key: impl Into<String>) -> Self {
        self.input_key = key.into();
        self
    }

    /// Variable of the combine prompt that receives the query
    pub fn with_question_variable(mut self, name: impl Into<String>) -> Self {
        self.question_variable = name.into();
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }

    /// Also return the retrieved documents under `sourceDocuments`
    pub fn with_return_source_documents(mut self, enabled: bool) -> Self {
        self.source_documents_key = enabled.then(|| "sourceDocuments".to_string());
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[async_trait]
impl Chain for RetrievalQaChain {
    fn chain_type(&self) -> &str {
        "retrieval_qa"
    }

    fn input_keys(&self) -> Vec<String> {
        vec![self.input_key.clone()]
    }

    fn output_keys(&self) -> Vec<String> {
        let mut keys = vec![self.output_key.clone()];
        keys.extend(self.source_documents_key.clone());
        keys
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    async fn call_inner(&self, inputs: ChainValues, ctx: &RunContext) -> Result<ChainValues> {
        let query = inputs.get_string(&self.input_key)?;

        let docs = ctx
            .guard(self.retriever.relevant_documents(query, ctx))
            .await?;
        tracing::debug!(documents = docs.len(), "Retrieved documents");

        let combine_inputs = ChainValues::new()
            .with(self.combine_chain.input_key(), docs.clone())
            .with(self.question_variable.clone(), query);
        let combined = call(&self.combine_chain, combine_inputs, ctx).await?;

        let answer_key = self.combine_chain.output_keys().remove(0);
        let answer = combined.require(&answer_key)?.clone();

        let mut outputs = ChainValues::new().with(self.output_key.clone(), answer);
        if let Some(key) = &self.source_documents_key {
            outputs.insert(key.clone(), docs);
        }
        Ok(outputs)
    }
}
