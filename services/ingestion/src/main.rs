use clap::Parser;
use ingestion::{config::Config, logging::init_logging, transport::serve_http};
use tracing::error;

fn main() {
    let config = Config::parse();
    if let Err(err) = init_logging() {
        eprintln!("ingestion failed: {err}");
        std::process::exit(1);
    }

    if let Err(err) = serve_http(config) {
        error!(error = %err, "ingestion service stopped");
        std::process::exit(1);
    }
}
