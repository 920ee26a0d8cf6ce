//! Chronicle front end.
//!
//! Serves the signed-client endpoints behind [`chronicle_auth::AuthLayer`].
//! Ledger storage lives elsewhere; the publish endpoint here acknowledges
//! what the authenticated client sent.

use axum::{
    Json, Router,
    body::Bytes,
    routing::{get, post},
};
use chronicle_auth::{AuthLayer, Authenticated, AuthenticationGate, ClientRegistry};
use chrono::{SecondsFormat, Utc};
use clap::Parser;
use serde::Serialize;
use std::{net::SocketAddr, path::PathBuf};

/// Chronicle server: signed-request gate in front of the ledger API.
#[derive(Parser, Debug)]
#[command(name = "chronicle-server", version, about)]
pub struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// JSON file with the registered clients:
    /// `[{"public_id": "...", "public_key": "<base64url ed25519 key>"}]`
    #[arg(long, value_name = "PATH")]
    pub clients: PathBuf,

    /// Header carrying the client identifier.
    #[arg(long, default_value = chronicle_auth::CLIENT_IDENTIFIER_HEADER)]
    pub client_header: String,

    /// Largest request body accepted for signature verification, in bytes.
    #[arg(long, default_value_t = chronicle_auth::auth::DEFAULT_BODY_LIMIT)]
    pub body_limit: usize,
}

#[derive(Serialize)]
struct Receipt {
    version: &'static str,
    datetime: String,
    status: &'static str,
    client: String,
    bytes: usize,
}

async fn publish(client: Authenticated, body: Bytes) -> Json<Receipt> {
    tracing::info!(client_id = %client.client_id, bytes = body.len(), "publish accepted");
    Json(Receipt {
        version: env!("CARGO_PKG_VERSION"),
        datetime: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        status: "OK",
        client: client.client_id,
        bytes: body.len(),
    })
}

async fn health() -> &'static str {
    "ok"
}

/// Build the application router. Everything under `/chronicle` that writes
/// requires a signed request.
pub fn router<R>(gate: AuthenticationGate<R>, body_limit: usize) -> Router
where
    R: ClientRegistry,
{
    let protected = Router::new()
        .route("/chronicle/publish", post(publish))
        .layer(AuthLayer::new(gate).with_body_limit(body_limit));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
}
