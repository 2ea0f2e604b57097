//! Backup/restore benchmark driver

mod config;

use anyhow::Context;
use br_core::logging::{self, LoggingConfig};
use br_core::report::format_elapsed;
use br_core::{
    ReportSink, ReportWriter, SshExecutor, TestPhaseSequencer, TestRun, TestRunOrchestrator,
};
use clap::Parser;
use config::{Args, BenchConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("\n❌ ERROR: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(LoggingConfig::new(args.log_file.clone(), true, args.verbose))
        .context("Failed to initialize logging")?;

    let config = BenchConfig::from_args(args)?;
    let executor = Arc::new(SshExecutor::new(config.endpoint));
    executor
        .probe()
        .await
        .with_context(|| format!("Failed to connect to {}", executor.endpoint().destination()))?;

    let writer = ReportWriter::create(&config.output).context("Failed to create report files")?;
    let sequencer = TestPhaseSequencer::new(
        executor.clone(),
        config.commands,
        config.delays,
        config.sampler,
    );
    let mut orchestrator = TestRunOrchestrator::new(sequencer, writer);

    println!(
        "\n=== Benchmarking {} configuration(s) on {} ===",
        config.configurations.len(),
        executor.endpoint().host
    );
    let result = orchestrator.run(&config.configurations).await;
    executor.close().await;

    let locations = orchestrator.sink().locations();
    let run = result.with_context(|| {
        format!(
            "Benchmark aborted; partial results kept in {}",
            display_paths(&locations)
        )
    })?;

    print_summary(&run);
    println!("\n✓ Complete → {}", display_paths(&locations));
    Ok(())
}

fn print_summary(run: &TestRun) {
    println!("\n=== Results ===");
    for record in &run.records {
        let backup = record
            .backup
            .as_ref()
            .map_or_else(|| "n/a".to_string(), |b| format_elapsed(b.elapsed_seconds));
        let restore = record
            .restore
            .as_ref()
            .map_or_else(|| "n/a".to_string(), |r| format_elapsed(r.elapsed_seconds));
        println!(
            "  {:<8} {:>12}  backup {:>8}  restore {:>8}  {}",
            record.target_size,
            record.database_size,
            backup,
            restore,
            record.status()
        );
    }
}

fn display_paths(paths: &[std::path::PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
