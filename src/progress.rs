// Batch progress aggregation: drives independent tasks with a bounded
// number in flight, calls back once per completion with
// `completed / total`, and folds the boolean outcomes into a
// `BatchOutcome`. Completions are observed through a single
// `buffer_unordered` stream, so the counter is only touched by the task
// awaiting `run` and each task is counted once.

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

pub const TRACING_TARGET: &str = "tcstore_cli::progress";

/// One per-object operation. Errors must already be mapped to `false`.
pub type TransferTask = BoxFuture<'static, bool>;

/// Aggregate result of a batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Tasks that never completed because the batch was cancelled.
    pub cancelled: usize,
}

impl BatchOutcome {
    /// AND of every task result. An empty batch is a success.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0 && self.succeeded == self.total
    }

    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }
}

#[derive(Clone, Debug)]
pub struct BatchProgressTracker {
    max_in_flight: usize,
    cancel: CancellationToken,
}

impl BatchProgressTracker {
    /// `max_in_flight` of zero is treated as one.
    pub fn new(max_in_flight: usize) -> Self {
        Self::with_cancellation(max_in_flight, CancellationToken::new())
    }

    pub fn with_cancellation(max_in_flight: usize, cancel: CancellationToken) -> Self {
        BatchProgressTracker {
            max_in_flight: max_in_flight.max(1),
            cancel,
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Runs every task and reports progress after each completion.
    ///
    /// `on_progress` is invoked exactly once per completed task with a
    /// strictly increasing fraction in `(0.0, 1.0]`; the last call is
    /// `1.0` unless the batch is cancelled. Cancelling drops in-flight
    /// tasks and skips the ones not yet started.
    pub async fn run<I, F>(&self, tasks: I, mut on_progress: F) -> BatchOutcome
    where
        I: IntoIterator<Item = TransferTask>,
        F: FnMut(f64),
    {
        let tasks: Vec<TransferTask> = tasks.into_iter().collect();
        let total = tasks.len();
        let mut outcome = BatchOutcome {
            total,
            ..Default::default()
        };
        if total == 0 {
            return outcome;
        }

        tracing::debug!(
            target: TRACING_TARGET,
            total,
            max_in_flight = self.max_in_flight,
            "Starting batch"
        );

        let mut completions = stream::iter(tasks).buffer_unordered(self.max_in_flight);
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!(
                        target: TRACING_TARGET,
                        completed = outcome.completed(),
                        total,
                        "Batch cancelled"
                    );
                    break;
                }
                next = completions.next() => next,
            };
            let Some(ok) = next else { break };
            if ok {
                outcome.succeeded += 1;
            } else {
                outcome.failed += 1;
            }
            on_progress(outcome.completed() as f64 / total as f64);
        }

        outcome.cancelled = total - outcome.completed();
        tracing::debug!(
            target: TRACING_TARGET,
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            cancelled = outcome.cancelled,
            "Batch finished"
        );
        outcome
    }
}
