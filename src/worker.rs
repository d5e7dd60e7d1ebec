//! Inference worker: owns the model backend on its own task.
//!
//! Callers never touch the backend directly. Each request travels over a
//! channel together with a oneshot sender for the reply, and the caller
//! waits at most the configured duration for it.
//!
//! The backend call itself cannot be interrupted. A request that times out
//! while running is still completed by the worker and its reply dropped, so
//! the next caller's wait also covers whatever is left of that call.
//! Requests whose caller already gave up before the worker reached them are
//! skipped without touching the backend.

use crate::api::{CompletionBackend, CompletionRequest, InferenceError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// Requests that may queue before `complete` waits for capacity.
const QUEUE_DEPTH: usize = 4;

struct Job {
    request: CompletionRequest,
    reply: oneshot::Sender<Result<String, InferenceError>>,
}

/// Handle to a running inference task.
#[derive(Debug)]
pub struct InferenceWorker {
    jobs: mpsc::Sender<Job>,
    wait: Duration,
    handle: JoinHandle<usize>,
}

impl InferenceWorker {
    /// Move `backend` onto a new task and return a handle to it.
    ///
    /// # Arguments
    ///
    /// * `backend` - The completion backend the worker owns from now on
    /// * `wait` - Longest time [`complete`](Self::complete) waits for one reply
    pub fn spawn<B>(backend: B, wait: Duration) -> Self
    where
        B: CompletionBackend + Send + Sync + 'static,
    {
        let (jobs, mut queue) = mpsc::channel::<Job>(QUEUE_DEPTH);
        let handle = tokio::spawn(async move {
            let mut served = 0usize;
            while let Some(job) = queue.recv().await {
                if job.reply.is_closed() {
                    debug!(served, "Caller stopped waiting before start; skipping request");
                    continue;
                }
                let result = backend.complete(&job.request).await;
                served += 1;
                if job.reply.send(result).is_err() {
                    debug!(served, "Caller stopped waiting; dropping completion");
                }
            }
            served
        });
        info!(?wait, "Inference worker started");
        Self { jobs, wait, handle }
    }

    /// Close the queue, let queued requests finish, and wait for the task.
    ///
    /// # Returns
    ///
    /// The number of requests passed to the backend.
    #[instrument(level = "info", skip_all)]
    pub async fn shutdown(self) -> usize {
        drop(self.jobs);
        match self.handle.await {
            Ok(served) => {
                info!(served, "Inference worker stopped");
                served
            }
            Err(e) => {
                warn!(error = %e, "Inference worker ended abnormally");
                0
            }
        }
    }
}

impl CompletionBackend for InferenceWorker {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, InferenceError> {
        let (reply, response) = oneshot::channel();
        let job = Job {
            request: request.clone(),
            reply,
        };
        self.jobs
            .send(job)
            .await
            .map_err(|_| InferenceError::WorkerGone)?;

        match timeout(self.wait, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(InferenceError::WorkerGone),
            Err(_) => Err(InferenceError::Timeout(self.wait)),
        }
    }
}
