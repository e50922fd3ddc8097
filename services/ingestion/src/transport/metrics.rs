use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Instant,
};

use crate::{IngestOutcome, scheduler::BatchOutcome};

/// Process-wide counters, rendered in the Prometheus text format.
#[derive(Debug)]
pub struct IngestMetrics {
    requests_total: AtomicU64,
    rejected_total: AtomicU64,
    items_total: AtomicU64,
    waves_total: AtomicU64,
    batches_succeeded_total: AtomicU64,
    batches_unprocessed_total: AtomicU64,
    batches_failed_total: AtomicU64,
    unprocessed_items_total: AtomicU64,
    started_at: Instant,
}

impl Default for IngestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            rejected_total: AtomicU64::new(0),
            items_total: AtomicU64::new(0),
            waves_total: AtomicU64::new(0),
            batches_succeeded_total: AtomicU64::new(0),
            batches_unprocessed_total: AtomicU64::new(0),
            batches_failed_total: AtomicU64::new(0),
            unprocessed_items_total: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn observe_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_rejected(&self) {
        self.rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_outcome(&self, outcome: &IngestOutcome) {
        self.items_total
            .fetch_add(outcome.items_total as u64, Ordering::Relaxed);
        self.waves_total
            .fetch_add(outcome.waves as u64, Ordering::Relaxed);
        for result in &outcome.results {
            match result.outcome {
                BatchOutcome::Succeeded => {
                    self.batches_succeeded_total.fetch_add(1, Ordering::Relaxed);
                }
                BatchOutcome::UnprocessedItems(count) => {
                    self.batches_unprocessed_total.fetch_add(1, Ordering::Relaxed);
                    self.unprocessed_items_total
                        .fetch_add(count as u64, Ordering::Relaxed);
                }
                BatchOutcome::Failed(_) => {
                    self.batches_failed_total.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    pub fn render(&self) -> String {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        format!(
            "# TYPE ingestion_upload_requests_total counter\n\
ingestion_upload_requests_total {}\n\
# TYPE ingestion_upload_rejected_total counter\n\
ingestion_upload_rejected_total {}\n\
# TYPE ingestion_items_total counter\n\
ingestion_items_total {}\n\
# TYPE ingestion_waves_total counter\n\
ingestion_waves_total {}\n\
# TYPE ingestion_batches_succeeded_total counter\n\
ingestion_batches_succeeded_total {}\n\
# TYPE ingestion_batches_unprocessed_total counter\n\
ingestion_batches_unprocessed_total {}\n\
# TYPE ingestion_batches_failed_total counter\n\
ingestion_batches_failed_total {}\n\
# TYPE ingestion_unprocessed_items_total counter\n\
ingestion_unprocessed_items_total {}\n\
# TYPE ingestion_uptime_seconds gauge\n\
ingestion_uptime_seconds {:.4}\n",
            load(&self.requests_total),
            load(&self.rejected_total),
            load(&self.items_total),
            load(&self.waves_total),
            load(&self.batches_succeeded_total),
            load(&self.batches_unprocessed_total),
            load(&self.batches_failed_total),
            load(&self.unprocessed_items_total),
            self.started_at.elapsed().as_secs_f64()
        )
    }
}
