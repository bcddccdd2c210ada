use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mcp_oauth_gateway::config::Config;
use mcp_oauth_gateway::registry::Registry;
use mcp_oauth_gateway::state::AppState;
use mcp_oauth_gateway::{build_router, http_client};

#[derive(Parser, Debug)]
#[command(name = "mcpgw")]
#[command(about = "auth-translating reverse proxy for MCP tool servers")]
struct Args {
    /// Path to the gateway's TOML configuration file
    #[arg(short, long, env = "MCPGW_CONFIG", default_value = "mcpgw.toml")]
    config: PathBuf,

    /// Port to bind to, overriding the config file's server.port
    #[arg(short, long, env = "MCPGW_PORT")]
    port: Option<u16>,

    /// Rate limit: requests per second per IP on `/mcp/*`
    #[arg(long, env = "MCPGW_RATE_LIMIT_PER_SECOND", default_value = "10")]
    rate_limit_per_second: u64,

    /// Rate limit: burst size (max requests before limiting kicks in)
    #[arg(long, env = "MCPGW_RATE_LIMIT_BURST", default_value = "100")]
    rate_limit_burst: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mcpgw=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("loading configuration from {}", args.config.display());
    let mut config = Config::load(&args.config)?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let registry = Registry::build(config)?;
    tracing::info!("registered {} downstream(s)", registry.downstream_count());

    let bind_addr = format!("{}:{}", registry.server.host, registry.server.port);
    let public_url = registry.server.public_url.clone();

    let app_state = AppState {
        registry: Arc::new(registry),
        http_client: http_client::build(),
    };

    let app = build_router(app_state, args.rate_limit_per_second, args.rate_limit_burst);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("gateway listening on {bind_addr}, public url {public_url}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
