use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use engine_logging::{engine_debug, engine_info, engine_warn, RunLogger};
use futures_util::Stream;
use starcard_core::{update, Effect, Msg, RunState};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::worker::ItemWorker;
use crate::{CandidateItem, FailureKind, FetchError, FetchOutcome};

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Upper bound on workers doing network or image work at the same time.
    pub max_concurrency: usize,
    /// Outcomes buffered ahead of a slow consumer.
    pub channel_capacity: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            channel_capacity: 32,
        }
    }
}

/// Fans candidate items out to workers and fans their outcomes back in.
#[derive(Clone)]
pub struct Coordinator {
    worker: Arc<ItemWorker>,
    settings: CoordinatorSettings,
    logger: RunLogger,
}

impl Coordinator {
    pub fn new(worker: ItemWorker, settings: CoordinatorSettings, logger: RunLogger) -> Self {
        Self {
            worker: Arc::new(worker),
            settings,
            logger,
        }
    }

    /// Launches one task per item and returns the stream of their outcomes.
    ///
    /// Outcomes arrive in completion order. The stream yields exactly
    /// `items.len()` outcomes and then ends. Must be called from within a
    /// tokio runtime.
    pub fn run(&self, items: Vec<CandidateItem>) -> OutcomeStream {
        let (tx, rx) = mpsc::channel(self.settings.channel_capacity.max(1));
        let max_in_flight = self.settings.max_concurrency.max(1);
        let driver = Driver {
            worker: self.worker.clone(),
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            tx,
            logger: self.logger.clone(),
        };
        tokio::spawn(driver.drive(items));
        OutcomeStream { rx }
    }
}

/// Single owner of the run state and of the only outcome sender.
struct Driver {
    worker: Arc<ItemWorker>,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
    tx: mpsc::Sender<FetchOutcome>,
    logger: RunLogger,
}

impl Driver {
    async fn drive(self, items: Vec<CandidateItem>) {
        let total = items.len();
        let (mut state, _) = update(RunState::new(), Msg::Launch { total });

        let mut tasks = JoinSet::new();
        let mut contexts = HashMap::with_capacity(total);
        for (index, item) in items.into_iter().enumerate() {
            let context = item.context();
            self.worker.mark_queued(index, &context);

            let worker = self.worker.clone();
            let permits = self.permits.clone();
            let handle = tasks.spawn(async move {
                // Held until the worker finishes. The semaphore is never closed.
                let _permit = permits.acquire_owned().await.ok();
                worker.run(index, item).await
            });
            contexts.insert(handle.id(), context);
        }
        engine_debug!(
            self.logger,
            "Launched {} workers (at most {} in flight)",
            total,
            self.max_in_flight
        );

        let (next, effects) = update(state, Msg::AllLaunched);
        state = next;
        if effects.contains(&Effect::CloseStream) {
            engine_info!(self.logger, "No candidates to fetch");
            return;
        }

        let mut failed = 0usize;
        while let Some(joined) = tasks.join_next_with_id().await {
            let outcome = match joined {
                Ok((_, outcome)) => outcome,
                Err(err) => {
                    let context = contexts.remove(&err.id()).unwrap_or_default();
                    engine_warn!(self.logger, "Worker task died repo_url={} error={}", context, err);
                    FetchOutcome::Failure {
                        error: FetchError::new(FailureKind::TaskFailed, err.to_string()),
                        context,
                    }
                }
            };
            if !outcome.is_success() {
                failed += 1;
            }

            if self.tx.send(outcome).await.is_err() {
                // Dropping the JoinSet aborts the remaining workers.
                engine_warn!(
                    self.logger,
                    "Outcome stream dropped with {} workers outstanding",
                    state.outstanding()
                );
                return;
            }

            let (next, effects) = update(state, Msg::OutcomeProduced);
            state = next;
            if effects.contains(&Effect::CloseStream) {
                break;
            }
        }

        engine_info!(
            self.logger,
            "All {} workers finished ({} failed)",
            state.produced(),
            failed
        );
        // `self.tx` drops here, which ends the stream.
    }
}

/// Completion-ordered stream of outcomes; ends once every worker has reported.
pub struct OutcomeStream {
    rx: mpsc::Receiver<FetchOutcome>,
}

impl OutcomeStream {
    pub async fn next_outcome(&mut self) -> Option<FetchOutcome> {
        self.rx.recv().await
    }

    pub async fn collect_all(mut self) -> Vec<FetchOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.rx.recv().await {
            outcomes.push(outcome);
        }
        outcomes
    }
}

impl Stream for OutcomeStream {
    type Item = FetchOutcome;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
