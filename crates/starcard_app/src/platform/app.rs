use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use engine_logging::{engine_error, engine_info, engine_warn, RunLogger};
use starcard_engine::{DirectorySink, HarvestSettings, HarvestSummary, Harvester};
use tokio_util::sync::CancellationToken;

use super::config::AppConfig;
use super::logging;
use super::progress::LoggingProgressSink;

/// Runs one harvest to completion. Any error makes the process exit non-zero.
pub fn run_app() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    logging::initialize(config.log_to, config.log_level());

    let logger = RunLogger::for_new_run();
    let settings = config.harvest_settings()?;
    engine_info!(
        logger,
        "Starting harvest endpoint={} output_dir={} max_concurrency={}",
        settings.search_endpoint,
        config.output_dir.display(),
        settings.coordinator.max_concurrency
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")?;

    match runtime.block_on(harvest(&config, settings, logger.clone())) {
        Ok(summary) => {
            println!(
                "Stored {} of {} repositories in {} ({} failed, {} duplicates, {} image bytes)",
                summary.stored,
                summary.candidates,
                summary.sink.location.display(),
                summary.failed,
                summary.duplicates,
                summary.sink.image_bytes
            );
            Ok(())
        }
        Err(err) => {
            engine_error!(logger, "Harvest failed: {:#}", err);
            Err(err)
        }
    }
}

async fn harvest(
    config: &AppConfig,
    settings: HarvestSettings,
    logger: RunLogger,
) -> anyhow::Result<HarvestSummary> {
    let cancel = CancellationToken::new();
    spawn_interrupt_watcher(cancel.clone(), logger.scoped("signal"));

    let sink = Arc::new(DirectorySink::new(
        config.output_dir.clone(),
        logger.scoped("sink"),
    ));
    let progress = Arc::new(LoggingProgressSink::new(logger.scoped("progress")));
    let harvester = Harvester::new(settings, sink, progress, logger)?;

    let generated_utc = Utc::now().to_rfc3339();
    Ok(harvester.run(&cancel, &generated_utc).await?)
}

/// First Ctrl-C cancels the run; stored records are left untouched.
fn spawn_interrupt_watcher(cancel: CancellationToken, logger: RunLogger) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                engine_warn!(logger, "Interrupted, cancelling run");
                cancel.cancel();
            }
            Err(err) => engine_warn!(logger, "Cannot listen for Ctrl-C: {}", err),
        }
    });
}
