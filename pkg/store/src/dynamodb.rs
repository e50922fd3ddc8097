use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::{
    Client,
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::Blob,
    types::{AttributeValue as DynamoValue, PutRequest, WriteRequest as DynamoWriteRequest},
};
use base64::{Engine, prelude::BASE64_STANDARD};
use schema::{AttributeValue, Item, WriteRequest};
use tracing::debug;

use crate::{BatchWriteError, BatchWriteOutput, BatchWriter, check_batch_len};

/// Connection settings for the table store. Built once at startup and never
/// changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub region: String,
    /// Endpoint override, e.g. a LocalStack URL.
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            region: "eu-west-1".to_string(),
            endpoint: Some("http://localhost:4566".to_string()),
            access_key_id: "local".to_string(),
            secret_access_key: "local".to_string(),
        }
    }
}

/// `BatchWriteItem` against DynamoDB or a compatible endpoint.
///
/// Unprocessed items reported by the store are counted, not retried.
#[derive(Debug, Clone)]
pub struct DynamoDbBatchWriter {
    client: Client,
}

impl DynamoDbBatchWriter {
    pub async fn connect(config: &StoreConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "static",
        );
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = config.endpoint.as_deref() {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;
        Self::from_client(Client::new(&sdk_config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BatchWriter for DynamoDbBatchWriter {
    async fn write_batch(
        &self,
        table_name: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<BatchWriteOutput, BatchWriteError> {
        check_batch_len(requests.len())?;
        let requests = requests
            .into_iter()
            .map(into_dynamo_write_request)
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .batch_write_item()
            .request_items(table_name, requests)
            .send()
            .await
            .map_err(|err| BatchWriteError::Store(DisplayErrorContext(&err).to_string()))?;

        let unprocessed_items = output
            .unprocessed_items()
            .map(|tables| tables.values().map(Vec::len).sum())
            .unwrap_or(0);
        debug!(table = table_name, unprocessed_items, "batch write call settled");
        Ok(BatchWriteOutput { unprocessed_items })
    }
}

fn into_dynamo_write_request(
    request: WriteRequest,
) -> Result<DynamoWriteRequest, BatchWriteError> {
    let item = into_dynamo_item(request.put_request.item)?;
    let put = PutRequest::builder()
        .set_item(Some(item))
        .build()
        .map_err(|err| BatchWriteError::InvalidItem(err.to_string()))?;
    Ok(DynamoWriteRequest::builder().put_request(put).build())
}

fn into_dynamo_item(item: Item) -> Result<HashMap<String, DynamoValue>, BatchWriteError> {
    item.into_iter()
        .map(|(name, value)| into_dynamo_value(value).map(|value| (name, value)))
        .collect()
}

fn into_dynamo_value(value: AttributeValue) -> Result<DynamoValue, BatchWriteError> {
    Ok(match value {
        AttributeValue::S(value) => DynamoValue::S(value),
        AttributeValue::N(value) => DynamoValue::N(value),
        AttributeValue::B(value) => DynamoValue::B(decode_blob(&value)?),
        AttributeValue::Ss(values) => DynamoValue::Ss(values),
        AttributeValue::Ns(values) => DynamoValue::Ns(values),
        AttributeValue::Bs(values) => DynamoValue::Bs(
            values
                .iter()
                .map(|value| decode_blob(value))
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::M(item) => DynamoValue::M(into_dynamo_item(item)?),
        AttributeValue::L(values) => DynamoValue::L(
            values
                .into_iter()
                .map(into_dynamo_value)
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::Null(value) => DynamoValue::Null(value),
        AttributeValue::Bool(value) => DynamoValue::Bool(value),
        AttributeValue::Raw(raw) => {
            return Err(BatchWriteError::InvalidItem(format!(
                "attribute value {raw} is not a typed value"
            )));
        }
    })
}

fn decode_blob(encoded: &str) -> Result<Blob, BatchWriteError> {
    BASE64_STANDARD
        .decode(encoded)
        .map(Blob::new)
        .map_err(|err| {
            BatchWriteError::InvalidItem(format!("binary attribute is not base64: {err}"))
        })
}
