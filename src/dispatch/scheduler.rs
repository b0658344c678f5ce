use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::db::enums::MessageStatus;
use crate::db::store::Store;
use crate::dispatch::{
    DispatchError, DispatchOutcome, DispatchReport, DispatchService, RetryPolicy,
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EnqueueError {
    /// Bounded queue is at capacity; the producer should back off.
    #[error("dispatch queue is full")]
    QueueFull,
    #[error("dispatch workers are shut down")]
    Closed,
}

impl DispatchService {
    /// Synchronous execution: runs the pipeline inline under the configured
    /// deadline, with no per-route retry. On expiry the dispatch future is
    /// dropped — in-flight sender calls are abandoned best-effort, already
    /// succeeded deliveries stay delivered — and the caller gets a
    /// `TimedOut` report.
    pub async fn dispatch_sync(&self, message_id: i64) -> Result<DispatchReport, DispatchError> {
        let deadline = self.options().sync_deadline;
        match tokio::time::timeout(
            deadline,
            self.dispatch_message(message_id, &RetryPolicy::none()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(message_id, ?deadline, "synchronous dispatch exceeded its deadline");
                self.mark(message_id, MessageStatus::Failed).await;
                let message = self
                    .store()
                    .message_by_id(message_id)
                    .await?
                    .ok_or(DispatchError::MessageNotFound(message_id))?;
                let strategy = self
                    .store()
                    .topic_by_id(message.topic_id)
                    .await?
                    .map(|t| t.sending_strategy)
                    .unwrap_or_default();
                Ok(DispatchReport {
                    message_id,
                    topic_id: message.topic_id,
                    strategy,
                    outcome: DispatchOutcome::TimedOut,
                    deliveries: Vec::new(),
                })
            }
        }
    }
}

/// Asynchronous execution: a fixed-size worker pool draining a bounded
/// queue of accepted message ids. Workers apply the configured retry
/// policy; there is no overall deadline since no producer is waiting.
pub struct DispatchWorkerPool {
    tx: mpsc::Sender<i64>,
    handles: Vec<JoinHandle<()>>,
}

impl DispatchWorkerPool {
    pub fn start(service: Arc<DispatchService>, worker_count: usize, queue_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..worker_count.max(1))
            .map(|worker| {
                let rx = rx.clone();
                let service = service.clone();
                tokio::spawn(worker_loop(worker, rx, service))
            })
            .collect();

        Self { tx, handles }
    }

    /// Hands an accepted message to the pool without blocking the ingress
    /// request. A full queue is backpressure, not silent loss.
    pub fn try_enqueue(&self, message_id: i64) -> Result<(), EnqueueError> {
        self.tx.try_send(message_id).map_err(|err| match err {
            TrySendError::Full(_) => EnqueueError::QueueFull,
            TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Closes the queue and waits for workers to drain it.
    pub async fn shutdown(self) {
        drop(self.tx);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn worker_loop(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<i64>>>,
    service: Arc<DispatchService>,
) {
    loop {
        let message_id = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };
        let Some(message_id) = message_id else { break };

        let retry = service.options().retry.clone();
        match service.dispatch_message(message_id, &retry).await {
            Ok(report) => {
                info!(worker, message_id, outcome = ?report.outcome, "dispatch finished");
            }
            Err(err) => {
                error!(worker, message_id, error = %err, "dispatch failed");
            }
        }
    }
    debug!(worker, "dispatch worker stopped");
}
