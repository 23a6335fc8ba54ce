use anyhow::{Context, Result};
use clap::Parser;
use meetscribe::{create_router, AppState, Config};
use tracing::info;

/// Audio transcription forwarder service
#[derive(Debug, Parser)]
#[command(name = "meetscribe", version)]
struct Cli {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/meetscribe")]
    config: String,

    /// Override the configured bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the configured port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut cfg = Config::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config))?;

    if let Some(bind) = cli.bind {
        cfg.service.http.bind = bind;
    }
    if let Some(port) = cli.port {
        cfg.service.http.port = port;
    }

    info!("{} starting", cfg.service.name);
    info!(
        "forwarding audio to {} (model: {})",
        cfg.upstream.url, cfg.upstream.model
    );

    let state = AppState::new(cfg.upstream.clone())?;
    let router = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .context("HTTP server error")?;

    Ok(())
}
