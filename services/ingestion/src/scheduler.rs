use std::time::Duration;

use futures::future::join_all;
use schema::WriteRequest;
use store::{BatchWriteError, BatchWriter};
use tracing::{debug, error, warn};

use crate::DEFAULT_CONCURRENCY;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Succeeded,
    /// The store accepted the call but declined this many items. They are
    /// not retried.
    UnprocessedItems(usize),
    Failed(BatchWriteError),
}

impl BatchOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    /// 1-based position of the batch in the upload.
    pub sequence: usize,
    pub items: usize,
    pub outcome: BatchOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleSummary {
    pub waves: usize,
    pub results: Vec<BatchResult>,
}

impl ScheduleSummary {
    pub fn failed_batches(&self) -> usize {
        self.results
            .iter()
            .filter(|result| result.outcome.is_failure())
            .count()
    }
}

/// Dispatches batches in waves of at most `concurrency` concurrent calls.
///
/// A wave is pulled from the batch iterator only after every call of the
/// previous wave has settled, so no more than `concurrency` calls are ever
/// in flight. A failed call does not cancel its siblings or later waves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveScheduler {
    concurrency: usize,
    call_timeout: Option<Duration>,
}

impl Default for WaveScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl WaveScheduler {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            call_timeout: None,
        }
    }

    /// Without a timeout a call that never settles stalls the whole upload.
    pub fn with_call_timeout(mut self, call_timeout: Option<Duration>) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn run<W, I>(&self, writer: &W, table_name: &str, batches: I) -> ScheduleSummary
    where
        W: BatchWriter + ?Sized,
        I: IntoIterator<Item = Vec<WriteRequest>>,
    {
        let mut batches = batches.into_iter();
        let mut summary = ScheduleSummary::default();

        loop {
            let wave: Vec<Vec<WriteRequest>> = batches.by_ref().take(self.concurrency).collect();
            if wave.is_empty() {
                break;
            }
            summary.waves += 1;
            let first_sequence = summary.results.len() + 1;
            debug!(
                wave = summary.waves,
                batches = wave.len(),
                first_batch = first_sequence,
                "dispatching wave"
            );

            let calls = wave.into_iter().enumerate().map(|(offset, batch)| {
                self.dispatch(writer, table_name, first_sequence + offset, batch)
            });
            summary.results.extend(join_all(calls).await);
        }

        summary
    }

    async fn dispatch<W>(
        &self,
        writer: &W,
        table_name: &str,
        sequence: usize,
        batch: Vec<WriteRequest>,
    ) -> BatchResult
    where
        W: BatchWriter + ?Sized,
    {
        let items = batch.len();
        let call = writer.write_batch(table_name, batch);
        let settled = match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or_else(|_| Err(timeout_error(limit))),
            None => call.await,
        };

        let outcome = match settled {
            Ok(output) if output.unprocessed_items > 0 => {
                warn!(
                    batch = sequence,
                    items,
                    unprocessed_items = output.unprocessed_items,
                    "store declined part of the batch"
                );
                BatchOutcome::UnprocessedItems(output.unprocessed_items)
            }
            Ok(_) => {
                debug!(batch = sequence, items, "batch written");
                BatchOutcome::Succeeded
            }
            Err(err) => {
                error!(batch = sequence, items, error = %err, "batch write failed");
                BatchOutcome::Failed(err)
            }
        };

        BatchResult {
            sequence,
            items,
            outcome,
        }
    }
}

fn timeout_error(limit: Duration) -> BatchWriteError {
    BatchWriteError::Timeout {
        after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
    }
}
