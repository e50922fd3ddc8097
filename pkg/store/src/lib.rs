mod dynamodb;
mod memory;

pub use dynamodb::{DynamoDbBatchWriter, StoreConfig};
pub use memory::InMemoryTableStore;

use async_trait::async_trait;
use schema::WriteRequest;
use thiserror::Error;

/// Hard per-call item limit of the table store's batch write.
pub const MAX_BATCH_WRITE_ITEMS: usize = 25;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchWriteOutput {
    /// Items the store accepted the call for but declined to write.
    pub unprocessed_items: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchWriteError {
    #[error("batch must contain at least one write request")]
    EmptyBatch,
    #[error("batch of {len} write requests exceeds the store limit of {max}")]
    TooLarge { len: usize, max: usize },
    #[error("table not found: {0}")]
    TableNotFound(String),
    #[error("item is missing key attribute '{0}' or it is not a string, number or binary")]
    MissingKey(String),
    #[error("invalid item: {0}")]
    InvalidItem(String),
    #[error("store request failed: {0}")]
    Store(String),
    #[error("store call timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },
}

/// The narrow interface the loader needs from the table store: one batch
/// write per call, callable concurrently from many tasks.
#[async_trait]
pub trait BatchWriter: Send + Sync {
    async fn write_batch(
        &self,
        table_name: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<BatchWriteOutput, BatchWriteError>;
}

pub(crate) fn check_batch_len(len: usize) -> Result<(), BatchWriteError> {
    if len == 0 {
        return Err(BatchWriteError::EmptyBatch);
    }
    if len > MAX_BATCH_WRITE_ITEMS {
        return Err(BatchWriteError::TooLarge {
            len,
            max: MAX_BATCH_WRITE_ITEMS,
        });
    }
    Ok(())
}
