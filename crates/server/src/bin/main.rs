//! Binary entry point for chronicle-server.

use anyhow::Context;
use axum::http::HeaderName;
use chronicle_auth::{AuthenticationGate, MemoryRegistry};
use chronicle_server::{Cli, router};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let registry = MemoryRegistry::from_json_file(&cli.clients)
        .with_context(|| format!("failed to load clients from {}", cli.clients.display()))?;
    tracing::info!(clients = registry.len(), "client registry loaded");

    let header = HeaderName::try_from(cli.client_header.as_str())
        .with_context(|| format!("invalid client header name: {}", cli.client_header))?;
    let gate = AuthenticationGate::new(registry).with_client_header(header);

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen))?;
    tracing::info!(addr = %cli.listen, "listening");
    axum::serve(listener, router(gate, cli.body_limit)).await?;
    Ok(())
}
