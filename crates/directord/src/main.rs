//! IPVS administration daemon binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use director_api::AdminService;
use directord::config::{self, Config};
use directord::metrics::Metrics;
use directord::routes::create_router;
use directord::state::AppState;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "directord", about = "IPVS administration daemon")]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("load configuration")?;

    setup_logging(&config)?;
    info!("--== HELLO ==--");

    director_proto::registry::init();

    let metrics = config
        .bool(config::METRICS_ENABLE)
        .context("read metrics/enable")?
        .then(Metrics::new);

    let shutdown = CancellationToken::new();
    let service = AdminService::new(director_ipvs::platform_admin(), shutdown.clone());
    let state = Arc::new(AppState::new(service, metrics));
    let router = create_router(state);

    let addr = config.endpoint().context("read server/endpoint")?;
    let grace = config
        .duration(config::SERVER_GRACEFUL_SHUTDOWN)
        .context("read server/graceful-shutdown")?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(addr = %addr, "admin API listening");

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            wait_for_stop_signal().await;
            info!("caught application stop signal");
            shutdown.cancel();
        }
    });

    let serve = {
        let shutdown = shutdown.clone();
        async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        }
    };
    tokio::select! {
        result = serve => result.context("serve admin API")?,
        () = async {
            shutdown.cancelled().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(grace = ?grace, "graceful-shutdown window elapsed, aborting");
        }
    }

    info!("--== BYE ==--");
    Ok(())
}

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let level = config
        .string(config::LOGGER_LEVEL)
        .context("read logger/level")?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_lowercase()));

    let span_events = if config.bool(config::TRACE_ENABLE).unwrap_or(false) {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .init();
    Ok(())
}

#[cfg(unix)]
async fn wait_for_stop_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_stop_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
