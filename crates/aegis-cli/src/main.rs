//! aegis-explain - diagnostic CLI wrapper over `aegis-common`.
//!
//! Thin, colorized shell around the library, the `annactl`-equivalent
//! for this pipeline: never contains pipeline logic itself, only wires
//! fixture incidents and device-state flags into the same
//! `ExplanationOrchestrator`/`BenchmarkRunner`/`CapabilityGate` the host
//! app embeds.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "aegis-explain")]
#[command(author = "Aegis Explain Team")]
#[command(version = env!("AEGIS_VERSION"))]
#[command(about = "Diagnostic CLI for the on-device explanation pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a fixture incident through the explanation pipeline
    Explain(commands::explain::ExplainArgs),
    /// Run the fixture suite through BenchmarkRunner and report health
    Benchmark(commands::benchmark::BenchmarkArgs),
    /// Evaluate the capability gate for a given device profile
    Gate(commands::gate::GateArgs),
    /// Inspect or verify the on-device model artifact
    Model(commands::model::ModelArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "aegis_cli=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Explain(args) => commands::explain::run(args).await,
        Commands::Benchmark(args) => commands::benchmark::run(args).await,
        Commands::Gate(args) => commands::gate::run(args),
        Commands::Model(args) => commands::model::run(args),
    }
}
