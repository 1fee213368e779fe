use async_trait::async_trait;

use super::Document;
use crate::context::RunContext;
use crate::error::Result;

/// Source of documents relevant to a query (vector store, search index, ...).
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn relevant_documents(&self, query: &str, ctx: &RunContext) -> Result<Vec<Document>>;
}
