//! Thin entry point for the Operational Cutover Scripts (spec §4.J).

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signalfire_core::cutover::{self, Cli};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let code = cutover::run(cli).await;
    std::process::exit(code);
}
