//! lexi-server – entry point.
//!
//! `lexi-server serve` (the default) runs the HTTP API:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Open the task backend (in-memory, or SQLite in queue mode).
//! 4. Build the Axum router and start the HTTP server with graceful shutdown.
//! 5. Give in-flight in-process translations a grace period to finish.
//!
//! `lexi-server worker` consumes the durable translation queue.

mod config;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lexi_core::{GenAiGenerator, GoogleTts, QueueWorker, TextGenerator};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

use crate::config::{Config, TaskBackendKind};
use crate::state::{AppState, TaskServices};

/// LexiCounsel legal document assistant.
#[derive(Debug, Parser)]
#[command(name = "lexi-server", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,
    /// Run translation jobs from the durable queue until interrupted.
    Worker,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let _log_guard = init_tracing(&cfg)?;
    info!(version = env!("CARGO_PKG_VERSION"), "lexi-server starting");

    let generator: Arc<dyn TextGenerator> = Arc::new(GenAiGenerator::new(cfg.llm_model.clone()));
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cfg, generator).await,
        Command::Worker => work(cfg, generator).await,
    }
}

/// Install the global subscriber. The returned guard flushes the log file
/// and must live until exit.
fn init_tracing(cfg: &Config) -> anyhow::Result<Option<WorkerGuard>> {
    // Build the log-level filter, warning loudly if the configured value is
    // not a valid tracing filter expression.
    let env_filter = match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
        Ok(f) => f,
        Err(e) => {
            eprintln!(
                "WARN: LEXI_LOG='{}' is not a valid tracing filter ({}); \
                 falling back to 'info'",
                cfg.log_level, e
            );
            tracing_subscriber::EnvFilter::new("info")
        }
    };

    let (writer, guard) = match &cfg.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).with_context(|| format!("creating log directory {}", dir.display()))?;
            let (file, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "lexi-server.log"));
            (BoxMakeWriter::new(std::io::stdout.and(file)), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
    Ok(guard)
}

async fn serve(cfg: Config, generator: Arc<dyn TextGenerator>) -> anyhow::Result<()> {
    // ── 3. Task backend and shared state ───────────────────────────────────────
    let services = TaskServices::open(&cfg, cfg.task_backend, Arc::clone(&generator)).await?;
    let synthesizer = Arc::new(GoogleTts::new(reqwest::Client::new(), cfg.tts_language.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let embedded_worker = match services.worker(&cfg) {
        Some(worker) if cfg.embedded_worker => {
            info!(worker_id = worker.worker_id(), "starting embedded queue worker");
            Some(tokio::spawn(worker.run(shutdown_rx)))
        }
        _ => None,
    };

    let grace = cfg.shutdown_grace;
    let bind_address = cfg.bind_address.clone();
    let state = Arc::new(AppState::new(cfg, &services, generator, synthesizer));

    // ── 4. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = bind_address
        .parse()
        .with_context(|| format!("invalid bind address '{bind_address}'"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    // ── 5. Drain background work ───────────────────────────────────────────────
    if let Some(scheduler) = &state.in_process {
        let unfinished = scheduler.drain(grace).await;
        if unfinished > 0 {
            warn!(unfinished, "translation tasks still running at shutdown; they stay 'processing'");
        }
    }
    let _ = shutdown_tx.send(true);
    if let Some(handle) = embedded_worker {
        if let Err(e) = handle.await {
            warn!(error = %e, "embedded queue worker ended abnormally");
        }
    }

    info!("lexi-server stopped");
    Ok(())
}

async fn work(cfg: Config, generator: Arc<dyn TextGenerator>) -> anyhow::Result<()> {
    if cfg.task_backend != TaskBackendKind::Queue {
        warn!("LEXI_TASK_BACKEND is not 'queue'; the worker reads the queue database regardless");
    }
    let services = TaskServices::open(&cfg, TaskBackendKind::Queue, generator).await?;
    let worker: QueueWorker = services
        .worker(&cfg)
        .context("queue backend opened without a database")?;
    info!(worker_id = worker.worker_id(), database_url = %cfg.database_url, "queue worker starting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(worker.run(shutdown_rx));
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
    handle.await.context("queue worker panicked")?;

    info!("queue worker stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
