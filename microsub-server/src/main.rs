use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod config;
mod http;
mod tls;

use microsub_core::{EndpointHandler, Registry, Router, SyncReport};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1:8443")]
    bind: SocketAddr,

    #[arg(long, default_value = "certs/server.crt")]
    cert: PathBuf,

    #[arg(long, default_value = "certs/server.key")]
    key: PathBuf,

    /// Also require client certificates signed by this CA
    #[arg(long)]
    client_ca: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    no_tls: bool,

    /// Path to configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&args.log_level)?,
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cfg = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "Loading config");
            config::load_config(path)?
        }
        None => {
            warn!("No config file given, starting without adapters or tokens");
            config::Config::default()
        }
    };

    let mut registry = Registry::new();
    for adapter in config::create_adapters(&cfg)? {
        registry.register(adapter);
    }
    if registry.is_empty() {
        warn!("No adapters configured, every dispatch will be empty or not_implemented");
    }

    let tokens = config::token_table(&cfg);
    if tokens.is_empty() {
        warn!("No access tokens configured, every request will be rejected");
    }

    let router = Arc::new(Router::new(registry));
    spawn_refresh(router.clone(), cfg.refresh_interval_secs);

    let app = http::app(http::AppState {
        endpoint: Arc::new(EndpointHandler::new(router)),
        tokens: Arc::new(tokens),
    });

    info!("Starting microsub server on {}", args.bind);

    if args.no_tls {
        info!("TLS disabled (development mode)");
        axum::Server::bind(&args.bind)
            .serve(app.into_make_service())
            .await?;
    } else {
        let client_ca = args.client_ca.as_deref();
        info!(client_auth = client_ca.is_some(), "TLS enabled");
        let config = tls::make_server_config(&args.cert, &args.key, client_ca)?;

        axum_server::bind_rustls(args.bind, RustlsConfig::from_config(config))
            .serve(app.into_make_service())
            .await?;
    }

    Ok(())
}

/// Refresh every adapter once at startup, then every `interval_secs` unless
/// that is zero.
fn spawn_refresh(router: Arc<Router>, interval_secs: u64) {
    tokio::spawn(async move {
        if interval_secs == 0 {
            log_report(&router.sync_all().await);
            return;
        }

        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            log_report(&router.sync_all().await);
        }
    });
}

fn log_report(report: &SyncReport) {
    for (adapter, error) in &report.errors {
        warn!(adapter = %adapter, error = %error, "Adapter sync failed");
    }
    info!(synced = report.synced, failed = report.errors.len(), "Sync complete");
}
