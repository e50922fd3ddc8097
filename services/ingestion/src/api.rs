use serde::{Deserialize, Serialize};

use crate::{
    IngestOutcome,
    scheduler::{BatchOutcome, BatchResult},
};

/// Body of every 4xx answer: `{"message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Succeeded,
    UnprocessedItems,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch: usize,
    pub items: usize,
    pub status: BatchStatus,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub unprocessed_items: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-batch summary of one upload, returned in `report` response mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub table_name: String,
    pub items_total: usize,
    pub batches_total: usize,
    pub waves_total: usize,
    pub batches_succeeded: usize,
    pub batches_with_unprocessed_items: usize,
    pub batches_failed: usize,
    pub unprocessed_items: usize,
    pub batches: Vec<BatchReport>,
}

impl IngestReport {
    pub fn from_outcome(table_name: &str, outcome: &IngestOutcome) -> Self {
        let batches: Vec<BatchReport> = outcome.results.iter().map(BatchReport::from).collect();
        let count = |status: BatchStatus| batches.iter().filter(|b| b.status == status).count();

        Self {
            table_name: table_name.to_string(),
            items_total: outcome.items_total,
            batches_total: batches.len(),
            waves_total: outcome.waves,
            batches_succeeded: count(BatchStatus::Succeeded),
            batches_with_unprocessed_items: count(BatchStatus::UnprocessedItems),
            batches_failed: count(BatchStatus::Failed),
            unprocessed_items: batches.iter().map(|b| b.unprocessed_items).sum(),
            batches,
        }
    }
}

impl From<&BatchResult> for BatchReport {
    fn from(result: &BatchResult) -> Self {
        let (status, unprocessed_items, error) = match &result.outcome {
            BatchOutcome::Succeeded => (BatchStatus::Succeeded, 0, None),
            BatchOutcome::UnprocessedItems(count) => (BatchStatus::UnprocessedItems, *count, None),
            BatchOutcome::Failed(err) => (BatchStatus::Failed, 0, Some(err.to_string())),
        };
        Self {
            batch: result.sequence,
            items: result.items,
            status,
            unprocessed_items,
            error,
        }
    }
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}
