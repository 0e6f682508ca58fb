//! The dispatch engine: owns the adapter tree, the context pool and the
//! per-update task spawning.
//!
//! Update acquisition is sequential per source; every acquired update gets a
//! freshly spawned task, so dispatches run concurrently with no ordering
//! guarantee between their side effects. Within one walk everything is
//! synchronous and deterministic.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    adapter::AdapterTree,
    context::{ContextPool, DEFAULT_POOL_CAP},
    ports::BotTransport,
    update::Update,
};

#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    tree: AdapterTree,
    pool: Arc<ContextPool>,
    transport: Arc<dyn BotTransport>,
    cancel: CancellationToken,
    poll_backoff: Duration,
}

impl Engine {
    pub fn new(
        transport: Arc<dyn BotTransport>,
        tree: AdapterTree,
        poll_backoff: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let pool = Arc::new(ContextPool::new(transport.clone(), DEFAULT_POOL_CAP));
        Self {
            inner: Arc::new(EngineInner {
                tree,
                pool,
                transport,
                cancel,
                poll_backoff,
            }),
        }
    }

    /// Signal used to stop update acquisition. Already-spawned dispatch
    /// tasks run to completion.
    pub fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Hand one update to its own task and return immediately.
    ///
    /// The task boundary is where unexpected failures die: handler `Err`s are
    /// logged, panics are caught and logged, and in both cases the context
    /// guard still recycles the context. Nothing here can take down the
    /// ingestion loop or a sibling dispatch.
    pub fn dispatch(&self, update: Update) -> JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let update_id = update.id;
            let mut ctx = inner.pool.checkout(update);
            let walk = AssertUnwindSafe(inner.tree.run(&mut ctx)).catch_unwind();
            match walk.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::error!(update_id, error = %e, "handler chain failed");
                }
                Err(_) => {
                    tracing::error!(update_id, "handler chain panicked");
                }
            }
        })
    }

    /// Poll the transport until cancelled.
    ///
    /// The offset is the highest update id seen plus one, so a batch is never
    /// fetched twice. Transport failures are retried forever on a fixed
    /// backoff; there is no cap and no circuit breaker.
    pub async fn run_polling(&self) {
        let mut offset = 0i64;
        loop {
            tokio::select! {
                _ = self.inner.cancel.cancelled() => break,
                fetched = self.inner.transport.fetch_updates(offset) => match fetched {
                    Ok(updates) => {
                        for update in updates {
                            if update.id >= offset {
                                offset = update.id + 1;
                            }
                            self.dispatch(update);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, backoff = ?self.inner.poll_backoff, "fetch failed");
                        tokio::select! {
                            _ = self.inner.cancel.cancelled() => break,
                            _ = sleep(self.inner.poll_backoff) => {}
                        }
                    }
                }
            }
        }
        tracing::info!("polling stopped");
    }
}
