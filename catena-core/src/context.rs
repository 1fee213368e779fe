//! Per-run context threaded through every external call boundary
//!
//! A [`RunContext`] carries the caller's cancellation token and the observers
//! for the run. Cancellation surfaces as [`CatenaError::Cancelled`], never as
//! a partial result.

use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::callbacks::{CallbackManager, LoggingCallback};
use crate::error::{CatenaError, Result};

/// Cancellation and observer state for one run
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: Uuid,
    cancellation: CancellationToken,
    callbacks: CallbackManager,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            cancellation: CancellationToken::new(),
            callbacks: CallbackManager::new(),
        }
    }

    /// Use a caller-owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_callbacks(mut self, callbacks: CallbackManager) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn callbacks(&self) -> &CallbackManager {
        &self.callbacks
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fail with `Cancelled` if the run was already cancelled.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(CatenaError::Cancelled);
        }
        Ok(())
    }

    /// Context for a verbose component: same run, plus the logging observer.
    pub(crate) fn for_component(&self, verbose: bool) -> RunContext {
        if !verbose {
            return self.clone();
        }
        let mut ctx = self.clone();
        ctx.callbacks.register(Arc::new(LoggingCallback));
        ctx
    }

    /// Race `fut` against cancellation of this run.
    pub async fn guard<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check_cancelled()?;
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(CatenaError::Cancelled),
            res = fut => res,
        }
    }
}
