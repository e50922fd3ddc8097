use std::time::Duration;

use clap::{Parser, ValueEnum};
use store::{MAX_BATCH_WRITE_ITEMS, StoreConfig};

use crate::{DEFAULT_CONCURRENCY, IngestSettings};

/// What a successful upload answers with. Store failures never change the
/// status code in any mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResponseMode {
    /// Empty acknowledgement `{}`.
    Ack,
    /// One `{"RequestItems": ...}` entry per batch call.
    Echo,
    /// Per-batch outcome summary.
    Report,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    Dynamodb,
    Memory,
}

/// A table for the in-memory backend, given as `name:partition_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryTableSpec {
    pub table_name: String,
    pub partition_key: String,
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "ingestion",
    about = "Loads JSON records into a table store in bounded, concurrent batches"
)]
pub struct Config {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Maximum request body size, e.g. `512kb`, `20mb` or plain bytes.
    #[arg(
        long,
        env = "JSON_BODY_LIMIT",
        default_value = "20mb",
        value_parser = parse_body_limit
    )]
    pub json_body_limit: usize,

    #[arg(long, env = "AWS_DEFAULT_REGION", default_value = "eu-west-1")]
    pub region: String,

    /// Store endpoint override; empty uses the region's default endpoint.
    #[arg(long, env = "AWS_ENDPOINT", default_value = "http://localhost:4566")]
    pub endpoint: String,

    #[arg(
        long,
        env = "AWS_ACCESS_KEY_ID",
        default_value = "local",
        hide_env_values = true
    )]
    pub access_key_id: String,

    #[arg(
        long,
        env = "AWS_SECRET_ACCESS_KEY",
        default_value = "local",
        hide_env_values = true
    )]
    pub secret_access_key: String,

    #[arg(
        long,
        env = "UPLOAD_BATCH_SIZE",
        default_value_t = MAX_BATCH_WRITE_ITEMS,
        value_parser = parse_batch_size
    )]
    pub batch_size: usize,

    /// Maximum store calls in flight per upload.
    #[arg(
        long,
        env = "UPLOAD_CONCURRENCY",
        default_value_t = DEFAULT_CONCURRENCY,
        value_parser = parse_concurrency
    )]
    pub concurrency: usize,

    #[arg(long, env = "UPLOAD_RESPONSE_MODE", value_enum, default_value_t = ResponseMode::Ack)]
    pub response_mode: ResponseMode,

    /// Per store call timeout. Unset means a call may wait forever.
    #[arg(long, env = "STORE_CALL_TIMEOUT_MS")]
    pub store_call_timeout_ms: Option<u64>,

    #[arg(
        long = "store",
        env = "STORE_BACKEND",
        value_enum,
        default_value_t = StoreBackend::Dynamodb
    )]
    pub store_backend: StoreBackend,

    /// Tables for the memory backend, `name:partition_key`.
    #[arg(
        long = "memory-table",
        env = "MEMORY_TABLES",
        value_delimiter = ',',
        value_parser = parse_memory_table
    )]
    pub memory_tables: Vec<MemoryTableSpec>,

    #[arg(long, env = "HTTP_WORKERS")]
    pub worker_threads: Option<usize>,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn store_config(&self) -> StoreConfig {
        let endpoint = self.endpoint.trim();
        StoreConfig {
            region: self.region.clone(),
            endpoint: (!endpoint.is_empty()).then(|| endpoint.to_string()),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
        }
    }

    pub fn ingest_settings(&self) -> IngestSettings {
        IngestSettings {
            batch_size: self.batch_size,
            concurrency: self.concurrency,
            call_timeout: self
                .store_call_timeout_ms
                .filter(|value| *value > 0)
                .map(Duration::from_millis),
            echo_batches: self.response_mode == ResponseMode::Echo,
        }
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
            .filter(|workers| *workers > 0)
            .unwrap_or_else(default_http_workers)
    }
}

fn default_http_workers() -> usize {
    std::thread::available_parallelism()
        .map(|parallelism| parallelism.get().clamp(1, 32))
        .unwrap_or(4)
}

/// Parses sizes like `20mb`, `1.5kb`, `10 MB` or `4096`. Units are
/// 1024-based.
pub fn parse_body_limit(raw: &str) -> Result<usize, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    let split = normalized
        .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
        .unwrap_or(normalized.len());
    let (number, unit) = normalized.split_at(split);

    let multiplier: f64 = match unit.trim() {
        "" | "b" => 1.0,
        "kb" => 1024.0,
        "mb" => 1024.0 * 1024.0,
        "gb" => 1024.0 * 1024.0 * 1024.0,
        other => {
            return Err(format!(
                "unknown size unit '{other}' (expected b, kb, mb or gb)"
            ));
        }
    };
    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid size '{raw}'"))?;
    let bytes = (value * multiplier).floor();
    if bytes < 1.0 {
        return Err(format!("size '{raw}' must be at least one byte"));
    }
    Ok(bytes as usize)
}

fn parse_batch_size(raw: &str) -> Result<usize, String> {
    let value: usize = raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid batch size '{raw}'"))?;
    if !(1..=MAX_BATCH_WRITE_ITEMS).contains(&value) {
        return Err(format!(
            "batch size must be between 1 and {MAX_BATCH_WRITE_ITEMS}"
        ));
    }
    Ok(value)
}

fn parse_concurrency(raw: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(format!("concurrency must be a positive integer, got '{raw}'")),
    }
}

pub fn parse_memory_table(raw: &str) -> Result<MemoryTableSpec, String> {
    let (table_name, partition_key) = raw
        .trim()
        .split_once(':')
        .ok_or_else(|| format!("memory table '{raw}' must look like name:partition_key"))?;
    let (table_name, partition_key) = (table_name.trim(), partition_key.trim());
    if table_name.is_empty() || partition_key.is_empty() {
        return Err(format!("memory table '{raw}' must look like name:partition_key"));
    }
    Ok(MemoryTableSpec {
        table_name: table_name.to_string(),
        partition_key: partition_key.to_string(),
    })
}
