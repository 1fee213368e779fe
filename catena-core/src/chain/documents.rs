//! Document combination chains
//!
//! - [`StuffDocumentsChain`] joins every document into one context and asks once.
//! - [`RefineDocumentsChain`] folds documents in order, refining a running answer.
//! - [`MapReduceDocumentsChain`] asks about each document, then combines the answers.
//!
//! All three read their documents from `inputDocuments` by default and
//! reject an empty document list.

use async_trait::async_trait;
use std::sync::Arc;

use super::{Chain, LlmChain, call, predict};
use crate::context::RunContext;
use crate::error::Result;
use crate::prompt::PromptTemplate;
use crate::schema::{ChainValues, Document, Value};

const DEFAULT_INPUT_KEY: &str = "inputDocuments";
const DEFAULT_DOCUMENT_VARIABLE: &str = "context";

/// Renders one document to text with a template over `pageContent` and the
/// document's metadata keys; a metadata entry named `pageContent` takes
/// precedence. Without a template the page content is used verbatim.
#[derive(Debug, Clone, Default)]
pub struct DocumentFormatter {
    template: Option<PromptTemplate>,
}

impl DocumentFormatter {
    pub fn new(template: PromptTemplate) -> Self {
        Self {
            template: Some(template),
        }
    }

    pub fn format(&self, doc: &Document) -> Result<String> {
        let Some(template) = &self.template else {
            return Ok(doc.page_content.clone());
        };

        // Metadata is applied last and may shadow `pageContent`.
        let mut values = ChainValues::new().with("pageContent", doc.page_content.clone());
        for (key, value) in &doc.metadata {
            values.insert(key.clone(), Value::from_json(value));
        }
        template.render(&values)
    }
}

fn llm_inputs_without(chain: &LlmChain, excluded: &[&str]) -> Vec<String> {
    chain
        .input_keys()
        .into_iter()
        .filter(|k| !excluded.contains(&k.as_str()))
        .collect()
}

/// Stuffs all documents into a single prompt
pub struct StuffDocumentsChain {
    llm_chain: Arc<LlmChain>,
    input_key: String,
    document_variable: String,
    document_formatter: DocumentFormatter,
    separator: String,
    verbose: bool,
}

impl StuffDocumentsChain {
    pub fn new(llm_chain: Arc<LlmChain>) -> Self {
        Self {
            llm_chain,
            input_key: DEFAULT_INPUT_KEY.to_string(),
            document_variable: DEFAULT_DOCUMENT_VARIABLE.to_string(),
            document_formatter: DocumentFormatter::default(),
            separator: "\n\n".to_string(),
            verbose: false,
        }
    }

    pub fn with_input_key(mut self, key: impl Into<String>) -> Self {
        self.input_key = key.into();
        self
    }

    /// Prompt variable that receives the joined documents
    pub fn with_document_variable(mut self, name: impl Into<String>) -> Self {
        self.document_variable = name.into();
        self
    }

    pub fn with_document_formatter(mut self, formatter: DocumentFormatter) -> Self {
        self.document_formatter = formatter;
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub(crate) fn input_key(&self) -> &str {
        &self.input_key
    }

    fn combine(&self, docs: &[Document]) -> Result<String> {
        let parts = docs
            .iter()
            .map(|d| self.document_formatter.format(d))
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join(&self.separator))
    }
}

#[async_trait]
impl Chain for StuffDocumentsChain {
    fn chain_type(&self) -> &str {
        "stuff_documents"
    }

    fn input_keys(&self) -> Vec<String> {
        let mut keys = vec![self.input_key.clone()];
        keys.extend(llm_inputs_without(
            &self.llm_chain,
            &[self.document_variable.as_str()],
        ));
        keys
    }

    fn output_keys(&self) -> Vec<String> {
        self.llm_chain.output_keys()
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    async fn call_inner(&self, inputs: ChainValues, ctx: &RunContext) -> Result<ChainValues> {
        let context = self.combine(inputs.get_documents(&self.input_key)?)?;

        let mut rest = inputs.omit(&[self.input_key.as_str()]);
        rest.insert(self.document_variable.clone(), context);

        call(self.llm_chain.as_ref(), rest, ctx).await
    }
}

/// Folds documents in order into a running answer.
///
/// The first document goes through `initial_chain`; every later document is
/// passed with the current answer (`existingAnswer`) to `refine_chain`.
pub struct RefineDocumentsChain {
    initial_chain: Arc<LlmChain>,
    refine_chain: Arc<LlmChain>,
    input_key: String,
    document_variable: String,
    initial_response_name: String,
    document_formatter: DocumentFormatter,
    output_key: String,
    verbose: bool,
}

impl RefineDocumentsChain {
    pub fn new(initial_chain: Arc<LlmChain>, refine_chain: Arc<LlmChain>) -> Self {
        Self {
            initial_chain,
            refine_chain,
            input_key: DEFAULT_INPUT_KEY.to_string(),
            document_variable: DEFAULT_DOCUMENT_VARIABLE.to_string(),
            initial_response_name: "existingAnswer".to_string(),
            document_formatter: DocumentFormatter::default(),
            output_key: "text".to_string(),
            verbose: false,
        }
    }

    pub fn with_input_key(mut self, key: impl Into<String>) -> Self {
        self.input_key = key.into();
        self
    }

    pub fn with_document_variable(mut self, name: impl Into<String>) -> Self {
        self.document_variable = name.into();
        self
    }

    /// Prompt variable of the refine chain that receives the running answer
    pub fn with_initial_response_name(mut self, name: impl Into<String>) -> Self {
        self.initial_response_name = name.into();
        self
    }

    pub fn with_document_formatter(mut self, formatter: DocumentFormatter) -> Self {
        self.document_formatter = formatter;
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[async_trait]
impl Chain for RefineDocumentsChain {
    fn chain_type(&self) -> &str {
        "refine_documents"
    }

    fn input_keys(&self) -> Vec<String> {
        let excluded = [
            self.document_variable.as_str(),
            self.initial_response_name.as_str(),
        ];
        let mut keys = vec![self.input_key.clone()];
        for key in llm_inputs_without(&self.initial_chain, &excluded)
            .into_iter()
            .chain(llm_inputs_without(&self.refine_chain, &excluded))
        {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    fn output_keys(&self) -> Vec<String> {
        vec![self.output_key.clone()]
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    async fn call_inner(&self, inputs: ChainValues, ctx: &RunContext) -> Result<ChainValues> {
        let docs = inputs.get_documents(&self.input_key)?;
        let rest = inputs.omit(&[self.input_key.as_str()]);

        let mut answer = String::new();
        for (index, doc) in docs.iter().enumerate() {
            let mut step_inputs = rest.clone();
            step_inputs.insert(
                self.document_variable.clone(),
                self.document_formatter.format(doc)?,
            );

            answer = if index == 0 {
                predict(self.initial_chain.as_ref(), step_inputs, ctx).await?
            } else {
                step_inputs.insert(self.initial_response_name.clone(), answer);
                predict(self.refine_chain.as_ref(), step_inputs, ctx).await?
            };

            tracing::debug!(
                document = index,
                total = docs.len(),
                "Refined answer"
            );
        }

        Ok(ChainValues::new().with(self.output_key.clone(), answer))
    }
}

/// Runs `map_chain` on every document, then combines the per-document
/// answers with a stuff chain.
pub struct MapReduceDocumentsChain {
    map_chain: Arc<LlmChain>,
    reduce_chain: StuffDocumentsChain,
    input_key: String,
    document_variable: String,
    document_formatter: DocumentFormatter,
    verbose: bool,
}

impl MapReduceDocumentsChain {
    pub fn new(map_chain: Arc<LlmChain>, reduce_chain: StuffDocumentsChain) -> Self {
        Self {
            map_chain,
            reduce_chain,
            input_key: DEFAULT_INPUT_KEY.to_string(),
            document_variable: DEFAULT_DOCUMENT_VARIABLE.to_string(),
            document_formatter: DocumentFormatter::default(),
            verbose: false,
        }
    }

    pub fn with_input_key(mut self, key: impl Into<String>) -> Self {
        self.input_key = key.into();
        self
    }

    /// Prompt variable of the map chain that receives each document
    pub fn with_document_variable(mut self, name: impl Into<String>) -> Self {
        self.document_variable = name.into();
        self
    }

    pub fn with_document_formatter(mut self, formatter: DocumentFormatter) -> Self {
        self.document_formatter = formatter;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[async_trait]
impl Chain for MapReduceDocumentsChain {
    fn chain_type(&self) -> &str {
        "map_reduce_documents"
    }

    fn input_keys(&self) -> Vec<String> {
        let mut keys = vec![self.input_key.clone()];
        let reduce_inputs = self.reduce_chain.input_keys();
        for key in llm_inputs_without(&self.map_chain, &[self.document_variable.as_str()])
            .into_iter()
            .chain(
                reduce_inputs
                    .into_iter()
                    .filter(|k| k != self.reduce_chain.input_key()),
            )
        {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    fn output_keys(&self) -> Vec<String> {
        self.reduce_chain.output_keys()
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    async fn call_inner(&self, inputs: ChainValues, ctx: &RunContext) -> Result<ChainValues> {
        let docs = inputs.get_documents(&self.input_key)?;
        let rest = inputs.omit(&[self.input_key.as_str()]);

        let mut mapped = Vec::with_capacity(docs.len());
        for doc in docs {
            let mut map_inputs = rest.clone();
            map_inputs.insert(
                self.document_variable.clone(),
                self.document_formatter.format(doc)?,
            );
            let answer = predict(self.map_chain.as_ref(), map_inputs, ctx).await?;
            mapped.push(Document {
                page_content: answer,
                metadata: doc.metadata.clone(),
            });
        }

        let mut reduce_inputs = rest;
        reduce_inputs.insert(self.reduce_chain.input_key().to_string(), mapped);
        call(&self.reduce_chain, reduce_inputs, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatenaError;
    use crate::model::{FakeModel, LanguageModel};

    fn docs(contents: &[&str]) -> Value {
        Value::Documents(contents.iter().map(|c| Document::new(*c)).collect())
    }

    fn llm(model: Arc<dyn LanguageModel>, template: &str) -> Arc<LlmChain> {
        Arc::new(LlmChain::new(model, PromptTemplate::new(template).unwrap()))
    }

    #[test]
    fn test_document_formatter_uses_metadata() {
        let formatter =
            DocumentFormatter::new(PromptTemplate::new("[{{source}}] {{pageContent}}").unwrap());
        let doc = Document::new("body").with_metadata("source", serde_json::json!("wiki"));
        assert_eq!(formatter.format(&doc).unwrap(), "[wiki] body");
    }

    #[test]
    fn test_document_formatter_metadata_shadows_page_content() {
        let formatter = DocumentFormatter::new(PromptTemplate::new("{{pageContent}}").unwrap());
        let doc = Document::new("body").with_metadata("pageContent", serde_json::json!("meta"));
        assert_eq!(formatter.format(&doc).unwrap(), "meta");

        assert_eq!(DocumentFormatter::default().format(&doc).unwrap(), "body");
    }

    #[tokio::test]
    async fn test_stuff_joins_documents() {
        let model = Arc::new(FakeModel::new(["summary"]));
        let chain = StuffDocumentsChain::new(llm(
            model.clone(),
            "Summarize for {{audience}}:\n{{context}}",
        ));

        assert_eq!(chain.input_keys(), vec!["inputDocuments", "audience"]);

        let out = call(
            &chain,
            ChainValues::new()
                .with("inputDocuments", docs(&["one", "two"]))
                .with("audience", "kids"),
            &RunContext::new(),
        )
        .await
        .unwrap();

        assert_eq!(out.get_string("text").unwrap(), "summary");
        assert_eq!(
            model.prompts()[0].to_text(),
            "Summarize for kids:\none\n\ntwo"
        );
    }

    #[tokio::test]
    async fn test_refine_equals_manual_fold() {
        let initial_tpl = "Answer from: {{context}}";
        let refine_tpl = "Had: {{existingAnswer}}. Refine with: {{context}}";
        let responses = ["A0", "A1", "A2"];

        let model = Arc::new(FakeModel::new(responses));
        let chain = RefineDocumentsChain::new(
            llm(model.clone(), initial_tpl),
            llm(model.clone(), refine_tpl),
        );

        let out = call(
            &chain,
            ChainValues::new().with("inputDocuments", docs(&["d0", "d1", "d2"])),
            &RunContext::new(),
        )
        .await
        .unwrap();

        // same fold done by hand with a fresh model
        let manual_model = Arc::new(FakeModel::new(responses));
        let ctx = RunContext::new();
        let initial = llm(manual_model.clone(), initial_tpl);
        let refine = llm(manual_model.clone(), refine_tpl);
        let a0 = predict(initial.as_ref(), ChainValues::from([("context", "d0")]), &ctx)
            .await
            .unwrap();
        let a1 = predict(
            refine.as_ref(),
            ChainValues::from([("context", "d1"), ("existingAnswer", a0.as_str())]),
            &ctx,
        )
        .await
        .unwrap();
        let a2 = predict(
            refine.as_ref(),
            ChainValues::from([("context", "d2"), ("existingAnswer", a1.as_str())]),
            &ctx,
        )
        .await
        .unwrap();

        assert_eq!(out.get_string("text").unwrap(), a2);
        assert_eq!(model.prompts(), manual_model.prompts());
        assert_eq!(
            model.prompts()[2].to_text(),
            "Had: A1. Refine with: d2"
        );
    }

    #[tokio::test]
    async fn test_refine_rejects_empty_documents() {
        let model = Arc::new(FakeModel::new(["x"]));
        let chain = RefineDocumentsChain::new(
            llm(model.clone(), "{{context}}"),
            llm(model.clone(), "{{existingAnswer}} {{context}}"),
        );

        let err = call(
            &chain,
            ChainValues::new().with("inputDocuments", docs(&[])),
            &RunContext::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CatenaError::InvalidInputValues(_)));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_refine_stops_at_failing_step() {
        let model = Arc::new(FakeModel::new(["A0"]).with_fail_after(1));
        let chain = RefineDocumentsChain::new(
            llm(model.clone(), "{{context}}"),
            llm(model.clone(), "{{existingAnswer}} {{context}}"),
        );

        let err = call(
            &chain,
            ChainValues::new().with("inputDocuments", docs(&["d0", "d1", "d2"])),
            &RunContext::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CatenaError::Provider(_)));
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_map_reduce() {
        let map_model = Arc::new(FakeModel::new(["s0", "s1"]));
        let reduce_model = Arc::new(FakeModel::new(["final"]));
        let chain = MapReduceDocumentsChain::new(
            llm(map_model.clone(), "Summarize: {{context}}"),
            StuffDocumentsChain::new(llm(reduce_model.clone(), "Combine:\n{{context}}")),
        );

        let out = call(
            &chain,
            ChainValues::new().with("inputDocuments", docs(&["d0", "d1"])),
            &RunContext::new(),
        )
        .await
        .unwrap();

        assert_eq!(out.get_string("text").unwrap(), "final");
        assert_eq!(map_model.call_count(), 2);
        assert_eq!(reduce_model.prompts()[0].to_text(), "Combine:\ns0\n\ns1");
    }
}
