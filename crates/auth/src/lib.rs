//! # chronicle-auth
//!
//! Client-signature authentication for the Chronicle ledger service, as
//! [tower](https://docs.rs/tower) middleware for [axum](https://docs.rs/axum).
//!
//! A request is admitted only if it names a registered client in
//! `Chronicle-Client-Key-ID` and carries a valid `Body-Signature-Ed25519`
//! signature from that client's key. Everything else is refused with a 403.
//!
//! ```rust,ignore
//! use chronicle_auth::{AuthLayer, AuthenticationGate, Authenticated, MemoryRegistry};
//!
//! async fn publish(client: Authenticated, body: String) -> String {
//!     format!("accepted {} bytes from {}", body.len(), client.client_id)
//! }
//!
//! let registry = MemoryRegistry::from_json_file("clients.json".as_ref())?;
//! let app = axum::Router::new()
//!     .route("/chronicle/publish", axum::routing::post(publish))
//!     .layer(AuthLayer::new(AuthenticationGate::new(registry)));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

pub use axum;

pub mod auth;
pub mod registry;
pub mod rejection;
pub mod resolver;
pub mod verify;

pub use auth::{
    AuthLayer, AuthService, Authenticator,
    gate::{
        AuthError, Authenticated, AuthenticationGate, AuthenticationOutcome,
        CLIENT_IDENTIFIER_HEADER,
    },
};
pub use registry::{ClientRegistry, MemoryRegistry, RegisteredClient, RegistryError};
pub use rejection::{Rejection, error_response};
pub use resolver::{ClientKeyResolver, ResolveError};
pub use verify::{
    Ed25519BodyVerifier, SIGNATURE_HEADER, SignatureVerifier, SigningPublicKey, VerificationError,
};
