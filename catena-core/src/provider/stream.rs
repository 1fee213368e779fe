//! Streaming token accumulation

use tokio_stream::StreamExt;

use super::{ProviderAdapter, StreamChunk, client::ChunkStream};
use crate::context::RunContext;
use crate::error::Result;
use crate::schema::TokenUsage;

/// Running state of a streamed completion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamAccumulator {
    pub text: String,
    pub usage: TokenUsage,
    pub finish_reason: Option<String>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk: tokens in arrival order, usage summed.
    pub fn push(&mut self, chunk: StreamChunk) {
        self.text.push_str(&chunk.token);
        self.usage.add(chunk.usage);
        if chunk.finish_reason.is_some() {
            self.finish_reason = chunk.finish_reason;
        }
    }
}

/// Drain `stream` through `adapter`.
///
/// Each non-empty token is reported to the run's observers before it is
/// appended. A stream that ends without a finish signal yields whatever was
/// accumulated; cancellation yields `Cancelled` and nothing else.
pub async fn accumulate_stream(
    adapter: &dyn ProviderAdapter,
    mut stream: ChunkStream,
    ctx: &RunContext,
) -> Result<StreamAccumulator> {
    let mut acc = StreamAccumulator::new();

    while let Some(item) = ctx.guard(async { Ok(stream.next().await) }).await? {
        let chunk = adapter.prepare_stream_chunk(&item?)?;
        if !chunk.token.is_empty() {
            ctx.callbacks().model_new_token(&chunk.token).await?;
        }
        acc.push(chunk);
    }

    if acc.finish_reason.is_none() {
        tracing::debug!(
            adapter = adapter.name(),
            chars = acc.text.len(),
            "Stream ended without a finish reason"
        );
    }

    Ok(acc)
}
