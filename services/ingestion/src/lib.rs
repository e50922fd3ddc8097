pub mod api;
pub mod config;
pub mod logging;
pub mod partition;
pub mod scheduler;
pub mod transport;

use std::time::Duration;

use schema::{BatchWriteParams, ValidatedRequest, WriteRequest};
use store::{BatchWriter, MAX_BATCH_WRITE_ITEMS};
use thiserror::Error;
use tracing::info;

use crate::scheduler::{BatchResult, WaveScheduler};

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to build tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("http server failed: {0}")]
    Serve(#[source] std::io::Error),
    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSettings {
    pub batch_size: usize,
    pub concurrency: usize,
    pub call_timeout: Option<Duration>,
    /// Keep a copy of every batch call for the diagnostic echo response.
    pub echo_batches: bool,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_WRITE_ITEMS,
            concurrency: DEFAULT_CONCURRENCY,
            call_timeout: None,
            echo_batches: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub items_total: usize,
    pub waves: usize,
    /// One entry per batch, in batch order.
    pub results: Vec<BatchResult>,
    pub echoed: Vec<BatchWriteParams>,
}

impl IngestOutcome {
    pub fn batches_total(&self) -> usize {
        self.results.len()
    }
}

/// Transforms, partitions and writes the records of one validated upload.
///
/// Store failures never abort the upload: every batch gets a result and the
/// caller decides what to surface.
pub async fn ingest_records<W>(
    writer: &W,
    request: ValidatedRequest,
    settings: &IngestSettings,
) -> IngestOutcome
where
    W: BatchWriter + ?Sized,
{
    let ValidatedRequest {
        items,
        table_name,
        partition_key_name,
    } = request;
    let items_total = items.len();
    let batch_size = settings.batch_size.clamp(1, MAX_BATCH_WRITE_ITEMS);
    info!(
        table = %table_name,
        items = items_total,
        batches = items_total.div_ceil(batch_size),
        "ingesting records"
    );

    let requests = items
        .into_iter()
        .map(|item| WriteRequest::put(item, &partition_key_name));
    let mut echoed = Vec::new();
    let batches = partition::batches(requests, batch_size).inspect(|batch| {
        if settings.echo_batches {
            echoed.push(BatchWriteParams::new(&table_name, batch.clone()));
        }
    });

    let summary = WaveScheduler::new(settings.concurrency)
        .with_call_timeout(settings.call_timeout)
        .run(writer, &table_name, batches)
        .await;

    info!(
        table = %table_name,
        waves = summary.waves,
        batches = summary.results.len(),
        failed = summary.failed_batches(),
        "ingestion finished"
    );
    IngestOutcome {
        items_total,
        waves: summary.waves,
        results: summary.results,
        echoed,
    }
}
