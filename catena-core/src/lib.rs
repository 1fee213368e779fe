//! # Catena - composable chains and agents for language models
//!
//! Catena wires prompts, models, memories and tools into pipelines:
//! - Provider adapters for OpenAI and the Bedrock model families
//! - A model facade with streaming, cancellation and observers
//! - Chains with declared inputs/outputs and attached memory
//! - Document combination (stuff, refine, map-reduce) and retrieval QA
//! - A zero-shot ReAct agent loop with an iteration cap
//! - LLM-graded evaluation of question answering
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use catena_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = CatenaConfig::load()?;
//!     let model = ModelFactory::create(&config.model)?;
//!
//!     let chain = LlmChain::new(model, PromptTemplate::new("Name a city in {{country}}.")?);
//!     let answer = chain::run(&chain, "France", &RunContext::new()).await?;
//!     println!("{}", answer);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Everything a chain reads or writes is a [`schema::ChainValues`] map of
//! tagged [`schema::Value`]s. Every external boundary takes a
//! [`context::RunContext`], which carries the cancellation token and the
//! observers for one run.

pub mod agent;
pub mod callbacks;
pub mod chain;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluation;
pub mod memory;
pub mod model;
pub mod parsing;
pub mod prompt;
pub mod provider;
pub mod schema;
pub mod tokenizer;
pub mod tools;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{
        Agent, AgentAction, AgentDecision, AgentExecutor, AgentExecutorConfig, AgentFinish,
        AgentRun, AgentRunFailure, AgentStep, MrklPromptOptions, ZeroShotReactAgent,
    };
    pub use crate::callbacks::{Callback, CallbackManager, CallbackResult, LoggingCallback};
    pub use crate::chain::{
        self, Chain, DocumentFormatter, LlmBashChain, LlmChain, MapReduceDocumentsChain,
        RefineDocumentsChain, RetrievalQaChain, SequentialChain, SimpleSequentialChain,
        StuffDocumentsChain, TransformChain,
    };
    pub use crate::config::{
        AgentConfig, CatenaConfig, HttpConfig, ModelConfig, ModelKind, ProviderKind,
    };
    pub use crate::context::RunContext;
    pub use crate::error::{CatenaError, Result};
    pub use crate::evaluation::{
        ContextQaEvalChain, EvalDataset, EvalSummary, QaEvalChain,
    };
    pub use crate::memory::{ConversationBufferMemory, Memory, SimpleMemory};
    pub use crate::model::{
        ChatModel, FakeModel, GenerateOptions, LanguageModel, Llm, ModelFactory, ModelOptions,
    };
    pub use crate::parsing::{
        BashOutputParser, Grade, GradeOutputParser, MrklOutputParser, OutputParser,
    };
    pub use crate::prompt::{BasePromptTemplate, ChatPromptTemplate, PromptTemplate, PromptValue};
    pub use crate::provider::{
        BedrockAdapter, BedrockFamily, CohereAdapter, ContentHandler, HttpClient,
        JsonContentHandler, ModelParams, OpenAiAdapter, ProviderAdapter, ProviderClient,
        RetryConfig, RetryingClient, SagemakerAdapter,
    };
    pub use crate::schema::{
        ChainValues, ChatMessage, Document, Generation, ModelResult, Retriever, TokenUsage, Value,
    };
    pub use crate::tokenizer::{Gpt2Tokenizer, SimpleTokenizer, Tokenizer};
    pub use crate::tools::{BashProcess, BashTool, FnTool, Tool, ToolRegistry};
}
