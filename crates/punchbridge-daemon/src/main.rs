//! `punchbridge` agent
//!
//! Long-running local agent: polls ESSL/ZKTeco biometric terminals for
//! attendance punches over TCP, persists them de-duplicated in SQLite, and
//! serves the API-key-gated drain endpoints for the upstream cloud server.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use punchbridge_daemon::poller::PollScheduler;
use punchbridge_daemon::server::{self, AppState};
use punchbridge_daemon::storage::Database;

#[derive(Parser, Debug)]
#[command(name = "punchbridge-daemon")]
#[command(version, about = "punchbridge agent - biometric attendance bridge")]
struct Args {
    /// Database file path
    #[arg(long, env = "PUNCHBRIDGE_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Bind address override; otherwise 0.0.0.0 with the apiPort setting
    #[arg(long, env = "PUNCHBRIDGE_BIND")]
    bind: Option<SocketAddr>,

    /// Log level filter for the agent (e.g. "info", "debug", "warn").
    #[arg(long, default_value = "info", env = "PUNCHBRIDGE_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "PUNCHBRIDGE_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_filter = format!("punchbridge_daemon={}", args.log_level);
    punchbridge_core::tracing_init::init_tracing(&log_filter, args.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting punchbridge-daemon"
    );

    let db_path = match &args.db_path {
        Some(path) => path.clone(),
        None => default_db_path()?,
    };
    info!(path = %db_path.display(), "Opening store");
    let db = Database::open(&db_path).await?;

    let settings = db.settings().await?;
    let scheduler = PollScheduler::new(db.clone(), settings.poll_interval);
    scheduler.start().await;

    let addr = args
        .bind
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], settings.api_port)));
    let app = server::build_router(AppState { db });
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Drain HTTP surface ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The timer stops here; an in-flight sweep finishes on its own task.
    scheduler.stop().await;
    info!("Agent stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    let sigterm_future = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        () = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
        }
    }
}

/// Default database path: ~/.punchbridge/agent.db
fn default_db_path() -> anyhow::Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".punchbridge").join("agent.db"))
}
