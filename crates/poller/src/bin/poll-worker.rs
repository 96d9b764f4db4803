//! Poll worker: polls every configured publisher's feed.
//!
//! Enqueues page 1 of each publisher, then runs the dispatcher. With
//! `--once` (or `POLL_INTERVAL_SECS=0`) the queue is drained and the
//! process exits; otherwise every publisher is re-enqueued each interval
//! until SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::Notify;
use tracing::{info, warn};

use feedpoll_core::config::{load_dotenv, Config, NotifyConfig};
use feedpoll_notify::TemplateRenderer;
use feedpoll_poller::{
    Fetcher, HttpFeedSource, MemoryIngestor, MemoryPublisherStore, PollJob, PublisherContactHook,
    PublisherPoll, PublisherStore,
};
use feedpoll_queue::{Dispatcher, JobQueue, MemoryQueue, RetryPolicy};

// ── CLI ─────────────────────────────────────────────────────────────

/// Fetches publisher feeds and follows pagination.
#[derive(Parser, Debug)]
#[command(name = "poll-worker", version, about)]
struct Cli {
    /// Path to a JSON array of publishers.
    #[arg(long, env = "FEEDPOLL_PUBLISHERS", default_value = "config/publishers.json")]
    publishers: PathBuf,

    /// Drain the queue once and exit.
    #[arg(long)]
    once: bool,

    /// Worker pool size (overrides WORKER_CONCURRENCY).
    #[arg(long)]
    workers: Option<usize>,
}

type PollDispatcher = Dispatcher<PublisherPoll>;

/// Enqueue page 1 for every known publisher.
async fn schedule_all(dispatcher: &PollDispatcher, store: &dyn PublisherStore) -> anyhow::Result<usize> {
    let publishers = store.all().await?;
    for publisher in &publishers {
        dispatcher.enqueue(PollJob::for_publisher(publisher)).await?;
    }
    info!(publishers = publishers.len(), "poll jobs scheduled");
    Ok(publishers.len())
}

/// Failure email templates, with any configured overrides applied.
async fn load_templates(config: &NotifyConfig) -> anyhow::Result<TemplateRenderer> {
    let body = match &config.body_template_path {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading body template {}", path.display()))?,
        ),
        None => None,
    };
    let renderer = TemplateRenderer::from_overrides(config.subject_template.clone(), body)
        .context("invalid notification template")?;
    Ok(renderer)
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to register SIGTERM handler, waiting for ctrl_c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary();

    let store = Arc::new(MemoryPublisherStore::from_json_file(&cli.publishers).await?);
    let source = Arc::new(HttpFeedSource::new(&config.http)?);
    let ingestor = Arc::new(MemoryIngestor::new());

    let handler = Arc::new(PublisherPoll::new(
        Fetcher::new(store.clone(), source),
        ingestor.clone(),
    ));
    let hook = Arc::new(
        PublisherContactHook::from_smtp(store.clone(), config.smtp())
            .with_renderer(load_templates(&config.notify).await?),
    );
    let queue: Arc<dyn JobQueue<PollJob>> = Arc::new(MemoryQueue::new());

    let workers = cli
        .workers
        .unwrap_or(config.worker.concurrency as usize);
    let dispatcher = Arc::new(
        Dispatcher::new(handler, queue, hook, RetryPolicy::from_config(&config.retry))
            .with_workers(workers)
            .with_idle_poll(Duration::from_millis(config.worker.idle_poll_ms)),
    );

    schedule_all(&dispatcher, store.as_ref()).await?;

    if cli.once || config.worker.poll_interval_secs == 0 {
        let summary = dispatcher.run_until_idle().await?;
        info!(
            attempts = summary.attempts,
            succeeded = summary.succeeded,
            retried = summary.retried,
            exhausted = summary.exhausted,
            pages_followed = summary.scheduled,
            events = ingestor.event_count().await,
            "poll-worker finished"
        );
        return Ok(());
    }

    let shutdown = Arc::new(Notify::new());
    let runner = {
        let dispatcher = dispatcher.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { dispatcher.run(shutdown).await })
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(config.worker.poll_interval_secs));
    // Skip the immediate first tick (publishers were just scheduled).
    ticker.tick().await;

    let signal = shutdown_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = schedule_all(&dispatcher, store.as_ref()).await {
                    warn!(error = %e, "failed to schedule poll jobs");
                }
            }
            _ = &mut signal => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    shutdown.notify_one();
    let summary = runner.await??;
    info!(
        attempts = summary.attempts,
        succeeded = summary.succeeded,
        exhausted = summary.exhausted,
        events = ingestor.event_count().await,
        "poll-worker exited cleanly"
    );
    Ok(())
}
