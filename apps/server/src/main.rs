//! sourcemill HTTP server — exposes the ingestion pipeline as one endpoint.
//!
//! `POST /api/ingest` accepts a multipart submission (file parts, a
//! newline-delimited URL list, a page budget, a source→team map) and
//! responds with the full `IngestionResult` as JSON.

mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use sourcemill_pipeline::Pipeline;
use sourcemill_shared::{AppConfig, PipelineConfig, load_config, load_config_from};

/// sourcemill ingestion server.
#[derive(Parser)]
#[command(
    name = "sourcemill-server",
    version,
    about = "Serve the sourcemill knowledge-ingestion pipeline over HTTP."
)]
struct Cli {
    /// Bind address (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides config).
    #[arg(long)]
    port: Option<u16>,

    /// Path to an alternate config file.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text")]
    log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Shared handler state: one pipeline reused across requests, so the
/// worker pool and fetch limiter are process-wide.
#[derive(Clone)]
pub(crate) struct AppState {
    pub pipeline: Arc<Pipeline>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    let host = cli.host.clone().unwrap_or_else(|| config.server.host.clone());
    let port = cli.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| eyre!("invalid bind address {host}:{port}: {e}"))?;

    let state = AppState {
        pipeline: Arc::new(Pipeline::new(PipelineConfig::from(&config))),
    };

    let app = build_router(state, &config);

    info!(%addr, "starting sourcemill server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Assemble the router with routes, body limit, and middleware layers.
fn build_router(state: AppState, config: &AppConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/ingest", post(routes::ingest))
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Initialize tracing from CLI flags; `RUST_LOG` wins when set.
fn init_tracing(cli: &Cli) {
    use tracing_subscriber::EnvFilter;

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    match cli.log_format {
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt().json().with_env_filter(filter).init();
        }
    }
}
