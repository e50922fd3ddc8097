use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use ingestion::{IngestOutcome, IngestSettings, ingest_records, scheduler::BatchOutcome};
use schema::{AttributeValue, Item, ValidatedRequest, WriteRequest};
use store::{
    BatchWriteError, BatchWriteOutput, BatchWriter, InMemoryTableStore, MAX_BATCH_WRITE_ITEMS,
};

const TABLE_NAME: &str = "benchmark";
const PARTITION_KEY: &str = "pk";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BenchmarkProfile {
    Smoke,
    Standard,
    Large,
}

impl BenchmarkProfile {
    fn fixture_size(self) -> usize {
        match self {
            Self::Smoke => 1_001,
            Self::Standard => 10_000,
            Self::Large => 50_000,
        }
    }

    fn default_iterations(self) -> usize {
        match self {
            Self::Smoke => 3,
            Self::Standard => 5,
            Self::Large => 2,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Smoke => "smoke",
            Self::Standard => "standard",
            Self::Large => "large",
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "benchmark-smoke", about = "Wave scheduler throughput and bound checks")]
struct BenchmarkConfig {
    #[arg(long, value_enum, default_value_t = BenchmarkProfile::Smoke)]
    profile: BenchmarkProfile,

    #[arg(long)]
    iterations: Option<usize>,

    /// Simulated store latency per call.
    #[arg(long, env = "BENCH_STORE_LATENCY_MS", default_value_t = 2)]
    latency_ms: u64,

    #[arg(long, default_value_t = ingestion::DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Items the simulated store accepts per call; the rest come back
    /// unprocessed.
    #[arg(long)]
    max_items_per_call: Option<usize>,
}

#[derive(Debug, Clone, Default)]
struct BenchmarkSummary {
    iterations: usize,
    items_per_iteration: usize,
    batches_per_iteration: usize,
    waves_per_iteration: usize,
    expected_waves: usize,
    max_in_flight: usize,
    unprocessed_items: usize,
    failed_batches: usize,
    stored_items: usize,
    latencies_ms: Vec<f64>,
}

impl BenchmarkSummary {
    fn avg_latency_ms(&self) -> f64 {
        if self.latencies_ms.is_empty() {
            return 0.0;
        }
        self.latencies_ms.iter().sum::<f64>() / self.latencies_ms.len() as f64
    }

    fn items_per_second(&self) -> f64 {
        let avg = self.avg_latency_ms();
        if avg == 0.0 {
            return 0.0;
        }
        self.items_per_iteration as f64 / (avg / 1000.0)
    }
}

/// Store wrapper that sleeps per call and tracks peak concurrency.
struct LatencyWriter {
    inner: InMemoryTableStore,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl BatchWriter for LatencyWriter {
    async fn write_batch(
        &self,
        table_name: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<BatchWriteOutput, BatchWriteError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        let result = self.inner.write_batch(table_name, requests).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn main() {
    let config = BenchmarkConfig::parse();
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Benchmark failed: unable to build tokio runtime ({err}).");
            std::process::exit(1);
        }
    };

    let summary = runtime.block_on(run_benchmark(&config));
    print_summary(&config, &summary);

    let failures = evaluate_gates(&config, &summary);
    if failures.is_empty() {
        println!("Benchmark gates: PASS");
    } else {
        for failure in &failures {
            eprintln!("Benchmark gate failed: {failure}");
        }
        std::process::exit(1);
    }
}

async fn run_benchmark(config: &BenchmarkConfig) -> BenchmarkSummary {
    let fixture_size = config.profile.fixture_size();
    let iterations = config
        .iterations
        .filter(|value| *value > 0)
        .unwrap_or_else(|| config.profile.default_iterations());
    let concurrency = config.concurrency.max(1);
    let batches = fixture_size.div_ceil(MAX_BATCH_WRITE_ITEMS);

    let mut inner = InMemoryTableStore::new().with_table(TABLE_NAME, PARTITION_KEY);
    if let Some(max_items) = config.max_items_per_call {
        inner = inner.with_max_items_per_call(max_items);
    }
    let writer = Arc::new(LatencyWriter {
        inner,
        latency: Duration::from_millis(config.latency_ms),
        in_flight: AtomicUsize::new(0),
        max_in_flight: AtomicUsize::new(0),
    });
    let settings = IngestSettings {
        concurrency,
        ..IngestSettings::default()
    };

    let mut summary = BenchmarkSummary {
        iterations,
        items_per_iteration: fixture_size,
        batches_per_iteration: batches,
        expected_waves: batches.div_ceil(concurrency),
        ..BenchmarkSummary::default()
    };
    for iteration in 0..iterations {
        let request = ValidatedRequest {
            items: seed_fixture(iteration, fixture_size),
            table_name: TABLE_NAME.to_string(),
            partition_key_name: PARTITION_KEY.to_string(),
        };
        let started = Instant::now();
        let outcome = ingest_records(writer.as_ref(), request, &settings).await;
        summary
            .latencies_ms
            .push(started.elapsed().as_secs_f64() * 1000.0);
        accumulate(&mut summary, &outcome);
    }
    summary.max_in_flight = writer.max_in_flight.load(Ordering::SeqCst);
    summary.stored_items = writer.inner.table_len(TABLE_NAME).unwrap_or(0);
    summary
}

fn accumulate(summary: &mut BenchmarkSummary, outcome: &IngestOutcome) {
    summary.waves_per_iteration = summary.waves_per_iteration.max(outcome.waves);
    for result in &outcome.results {
        match &result.outcome {
            BatchOutcome::Succeeded => {}
            BatchOutcome::UnprocessedItems(count) => summary.unprocessed_items += count,
            BatchOutcome::Failed(_) => summary.failed_batches += 1,
        }
    }
}

fn seed_fixture(iteration: usize, count: usize) -> Vec<Item> {
    (0..count)
        .map(|i| {
            let mut item = Item::new();
            item.insert(
                PARTITION_KEY.to_string(),
                AttributeValue::S(format!("item-{iteration}-{i}")),
            );
            item.insert("seq".to_string(), AttributeValue::N(i.to_string()));
            item.insert(
                "payload".to_string(),
                AttributeValue::S(format!("benchmark payload {i}")),
            );
            item
        })
        .collect()
}

fn evaluate_gates(config: &BenchmarkConfig, summary: &BenchmarkSummary) -> Vec<String> {
    let mut failures = Vec::new();
    let concurrency = config.concurrency.max(1);
    if summary.max_in_flight > concurrency {
        failures.push(format!(
            "max in-flight calls {} exceeded concurrency {concurrency}",
            summary.max_in_flight
        ));
    }
    if summary.waves_per_iteration != summary.expected_waves {
        failures.push(format!(
            "waves per iteration {} != expected {}",
            summary.waves_per_iteration, summary.expected_waves
        ));
    }
    if summary.failed_batches > 0 {
        failures.push(format!("{} batch calls failed", summary.failed_batches));
    }
    let expected_stored =
        summary.iterations * summary.items_per_iteration - summary.unprocessed_items;
    if summary.stored_items != expected_stored {
        failures.push(format!(
            "stored items {} != expected {expected_stored}",
            summary.stored_items
        ));
    }
    failures
}

fn print_summary(config: &BenchmarkConfig, summary: &BenchmarkSummary) {
    println!("Benchmark profile: {}", config.profile.as_str());
    println!("Items per iteration: {}", summary.items_per_iteration);
    println!("Iterations: {}", summary.iterations);
    println!("Simulated store latency (ms): {}", config.latency_ms);
    println!("Concurrency: {}", config.concurrency.max(1));
    println!("Batches per iteration: {}", summary.batches_per_iteration);
    println!(
        "Waves per iteration: {} (expected {})",
        summary.waves_per_iteration, summary.expected_waves
    );
    println!("Max in-flight calls: {}", summary.max_in_flight);
    println!("Avg upload latency (ms): {:.4}", summary.avg_latency_ms());
    println!("Throughput (items/s): {:.1}", summary.items_per_second());
    println!("Unprocessed items: {}", summary.unprocessed_items);
    println!("Failed batches: {}", summary.failed_batches);
    println!("Stored items: {}", summary.stored_items);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(profile: BenchmarkProfile) -> BenchmarkConfig {
        BenchmarkConfig {
            profile,
            iterations: Some(1),
            latency_ms: 0,
            concurrency: 4,
            max_items_per_call: None,
        }
    }

    #[test]
    fn profile_parses_from_cli() {
        let parsed =
            BenchmarkConfig::try_parse_from(["benchmark-smoke", "--profile", "large"]).unwrap();
        assert_eq!(parsed.profile, BenchmarkProfile::Large);
        assert_eq!(parsed.concurrency, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn smoke_profile_passes_its_gates() {
        let config = config(BenchmarkProfile::Smoke);
        let summary = run_benchmark(&config).await;

        assert_eq!(summary.batches_per_iteration, 41);
        assert_eq!(summary.expected_waves, 11);
        assert_eq!(summary.stored_items, 1_001);
        assert!(evaluate_gates(&config, &summary).is_empty());
    }

    #[tokio::test]
    async fn throttled_store_reports_unprocessed_items() {
        let config = BenchmarkConfig {
            max_items_per_call: Some(20),
            ..config(BenchmarkProfile::Smoke)
        };
        let summary = run_benchmark(&config).await;

        // 40 full batches lose 5 items each; the last batch of 1 fits.
        assert_eq!(summary.unprocessed_items, 200);
        assert_eq!(summary.stored_items, 801);
        assert!(evaluate_gates(&config, &summary).is_empty());
    }
}
