use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Attribute values in the table store's typed JSON shape
// ---------------------------------------------------------------------------

/// A single typed attribute as the table store encodes it on the wire,
/// e.g. `{"S": "alice"}` or `{"N": "42"}`.
///
/// Numbers stay as their decimal string and binary values as base64 text;
/// the store is the one that interprets them. Anything that is not a tagged
/// value lands in `Raw` untouched, so a bad record only fails its own batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    S(String),
    N(String),
    B(String),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    #[serde(rename = "BS")]
    Bs(Vec<String>),
    M(Item),
    L(Vec<AttributeValue>),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(untagged)]
    Raw(serde_json::Value),
}

impl AttributeValue {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::B(_) => "B",
            Self::Ss(_) => "SS",
            Self::Ns(_) => "NS",
            Self::Bs(_) => "BS",
            Self::M(_) => "M",
            Self::L(_) => "L",
            Self::Null(_) => "NULL",
            Self::Bool(_) => "BOOL",
            Self::Raw(_) => "RAW",
        }
    }

    /// `false` if this value, or any value nested in it, is `Raw`.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Self::M(item) => item.values().all(Self::is_well_formed),
            Self::L(values) => values.iter().all(Self::is_well_formed),
            Self::Raw(_) => false,
            _ => true,
        }
    }

    /// Key attributes must be a scalar string, number or binary.
    pub fn as_key_scalar(&self) -> Option<&str> {
        match self {
            Self::S(value) | Self::N(value) | Self::B(value) => Some(value),
            _ => None,
        }
    }
}

/// One record: attribute name to typed value.
pub type Item = BTreeMap<String, AttributeValue>;

// ---------------------------------------------------------------------------
// Ingestion request
// ---------------------------------------------------------------------------

/// The `content` object of an upload. It usually is the raw output of a
/// table scan, so the scan counters are accepted alongside `Items`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordsContent {
    #[serde(rename = "Items", default)]
    pub items: Option<Vec<Item>>,
    #[serde(rename = "Count", default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(
        rename = "ScannedCount",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub scanned_count: Option<u64>,
    #[serde(
        rename = "ConsumedCapacity",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub consumed_capacity: Option<serde_json::Value>,
}

/// Upload request as decoded from the wire. Every field is optional here so
/// that validation can name the one that is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestionRequest {
    #[serde(default)]
    pub content: Option<RecordsContent>,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub partition_key_name: Option<String>,
}

/// An upload that passed presence checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub items: Vec<Item>,
    pub table_name: String,
    pub partition_key_name: String,
}

// ---------------------------------------------------------------------------
// Write requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutRequest {
    #[serde(rename = "Item")]
    pub item: Item,
}

/// One put operation, shaped like the store's `{"PutRequest": {"Item": ...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    #[serde(rename = "PutRequest")]
    pub put_request: PutRequest,
}

impl WriteRequest {
    /// Wraps `item` as a put, carrying the partition key attribute over from
    /// the same item.
    ///
    /// An item without the key is not rejected here: the write request goes
    /// out without it and the store refuses the batch.
    pub fn put(mut item: Item, partition_key_name: &str) -> Self {
        if let Some(key) = item.remove(partition_key_name) {
            item.insert(partition_key_name.to_string(), key);
        }
        Self {
            put_request: PutRequest { item },
        }
    }

    pub fn item(&self) -> &Item {
        &self.put_request.item
    }

    pub fn partition_key(&self, partition_key_name: &str) -> Option<&AttributeValue> {
        self.put_request.item.get(partition_key_name)
    }

    /// Name of the first attribute that did not decode as a typed value.
    pub fn malformed_attribute(&self) -> Option<&str> {
        self.put_request
            .item
            .iter()
            .find(|(_, value)| !value.is_well_formed())
            .map(|(name, _)| name.as_str())
    }
}

/// Diagnostic echo of one batch call: `{"RequestItems": {"<table>": [...]}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchWriteParams {
    #[serde(rename = "RequestItems")]
    pub request_items: BTreeMap<String, Vec<WriteRequest>>,
}

impl BatchWriteParams {
    pub fn new(table_name: &str, requests: Vec<WriteRequest>) -> Self {
        let mut request_items = BTreeMap::new();
        request_items.insert(table_name.to_string(), requests);
        Self { request_items }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} field can't be null.")]
    MissingField(&'static str),
}

/// Presence checks in fixed order: `content`, `table_name`,
/// `partition_key_name`, `content.Items`. The first failure wins.
pub fn validate_ingestion_request(
    request: IngestionRequest,
) -> Result<ValidatedRequest, ValidationError> {
    let IngestionRequest {
        content,
        table_name,
        partition_key_name,
    } = request;

    let Some(content) = content else {
        return Err(ValidationError::MissingField("content"));
    };
    let Some(table_name) = table_name.filter(|value| !value.is_empty()) else {
        return Err(ValidationError::MissingField("table_name"));
    };
    let Some(partition_key_name) = partition_key_name.filter(|value| !value.is_empty()) else {
        return Err(ValidationError::MissingField("partition_key_name"));
    };
    let Some(items) = content.items else {
        return Err(ValidationError::MissingField("content.Items"));
    };

    Ok(ValidatedRequest {
        items,
        table_name,
        partition_key_name,
    })
}

/// Test helper: a string-keyed item with string attributes.
pub fn item_builder(pairs: &[(&str, &str)]) -> Item {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), AttributeValue::S(value.to_string())))
        .collect()
}
