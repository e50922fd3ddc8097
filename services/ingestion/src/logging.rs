use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt,
};

use crate::ServiceError;

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Installs the global subscriber. `RUST_LOG` filters (default `info`) and
/// `RUST_LOG_FORMAT=json` switches to one JSON object per line.
pub fn init_logging() -> Result<(), ServiceError> {
    tracing_subscriber::registry()
        .with(stdout())
        .try_init()
        .map_err(|err| ServiceError::Logging(err.to_string()))
}

fn stdout<S>() -> BoxedLayer<S>
where
    S: Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json_format_requested(std::env::var("RUST_LOG_FORMAT").ok().as_deref()) {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .json()
            .with_filter(filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_filter(filter)
            .boxed()
    }
}

fn json_format_requested(value: Option<&str>) -> bool {
    value.is_some_and(|value| value.trim().eq_ignore_ascii_case("json"))
}
