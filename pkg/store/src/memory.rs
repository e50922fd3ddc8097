use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use schema::{AttributeValue, Item, WriteRequest};

use crate::{BatchWriteError, BatchWriteOutput, BatchWriter, check_batch_len};

#[derive(Debug)]
struct MemoryTable {
    partition_key: String,
    rows: BTreeMap<String, Item>,
}

/// Table store kept in process memory, with the same per-call rules as the
/// real one: a call is rejected as a whole when any put in it is invalid.
///
/// `with_max_items_per_call` simulates throttling: writes past the capacity
/// come back as unprocessed items instead of being stored.
#[derive(Debug, Default)]
pub struct InMemoryTableStore {
    tables: Mutex<HashMap<String, MemoryTable>>,
    max_items_per_call: Option<usize>,
    write_calls: AtomicUsize,
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_items_per_call(mut self, max_items: usize) -> Self {
        self.max_items_per_call = Some(max_items);
        self
    }

    pub fn with_table(self, table_name: &str, partition_key: &str) -> Self {
        self.create_table(table_name, partition_key);
        self
    }

    pub fn create_table(&self, table_name: &str, partition_key: &str) {
        if let Ok(mut tables) = self.tables.lock() {
            tables
                .entry(table_name.to_string())
                .or_insert_with(|| MemoryTable {
                    partition_key: partition_key.to_string(),
                    rows: BTreeMap::new(),
                });
        }
    }

    pub fn table_len(&self, table_name: &str) -> Option<usize> {
        let tables = self.tables.lock().ok()?;
        tables.get(table_name).map(|table| table.rows.len())
    }

    pub fn get_item(&self, table_name: &str, key: &AttributeValue) -> Option<Item> {
        let key = row_key(key)?;
        let tables = self.tables.lock().ok()?;
        tables.get(table_name)?.rows.get(&key).cloned()
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BatchWriter for InMemoryTableStore {
    async fn write_batch(
        &self,
        table_name: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<BatchWriteOutput, BatchWriteError> {
        self.write_calls.fetch_add(1, Ordering::Relaxed);
        check_batch_len(requests.len())?;

        let mut tables = self
            .tables
            .lock()
            .map_err(|_| BatchWriteError::Store("table store lock poisoned".to_string()))?;
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| BatchWriteError::TableNotFound(table_name.to_string()))?;

        let mut keyed = Vec::with_capacity(requests.len());
        let mut seen = HashSet::with_capacity(requests.len());
        for request in requests {
            if let Some(name) = request.malformed_attribute() {
                return Err(BatchWriteError::InvalidItem(format!(
                    "attribute '{name}' is not a typed value"
                )));
            }
            let key = request
                .partition_key(&table.partition_key)
                .and_then(row_key)
                .ok_or_else(|| BatchWriteError::MissingKey(table.partition_key.clone()))?;
            if !seen.insert(key.clone()) {
                return Err(BatchWriteError::InvalidItem(format!(
                    "duplicate key {key} in one batch"
                )));
            }
            keyed.push((key, request.put_request.item));
        }

        let accepted = self
            .max_items_per_call
            .map_or(keyed.len(), |max| max.min(keyed.len()));
        let unprocessed_items = keyed.len() - accepted;
        for (key, item) in keyed.into_iter().take(accepted) {
            table.rows.insert(key, item);
        }

        Ok(BatchWriteOutput { unprocessed_items })
    }
}

fn row_key(value: &AttributeValue) -> Option<String> {
    value
        .as_key_scalar()
        .map(|scalar| format!("{}:{scalar}", value.type_tag()))
}
