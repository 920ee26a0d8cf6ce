//! Authentication middleware.
//!
//! Provides a tower middleware that validates requests using an
//! [`Authenticator`] and forwards them to the inner service. Validation runs
//! in two steps: [`Authenticator::identify`] looks only at the request head,
//! then the body is buffered and [`Authenticator::verify`] checks the full
//! request. On success the authenticator's claims are inserted into the
//! request's HTTP extensions. On failure the request never reaches the inner
//! service and the caller gets a [`Rejection`] envelope.
//!
//! # Example
//!
//! ```rust,ignore
//! use chronicle_auth::{AuthLayer, AuthenticationGate, Authenticated, MemoryRegistry};
//!
//! async fn publish(client: Authenticated, body: String) -> String {
//!     format!("{} wrote {} bytes", client.client_id, body.len())
//! }
//!
//! let gate = AuthenticationGate::new(MemoryRegistry::from_clients(clients)?);
//! let app = axum::Router::new()
//!     .route("/publish", axum::routing::post(publish))
//!     .layer(AuthLayer::new(gate).with_body_limit(64 * 1024));
//! ```

pub mod gate;

use crate::{rejection::Rejection, verify::VerificationError};
use axum::{
    body::{Body, Bytes},
    response::IntoResponse,
};
use futures::{FutureExt, future::BoxFuture};
use gate::AuthError;
use http::{Request, Response, request::Parts};
use std::{
    panic::AssertUnwindSafe,
    task::{Context, Poll},
};

/// Default cap on buffered request bodies (2 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Trait for validating incoming requests.
///
/// `identify` sees only the request head and runs before the body is read,
/// so header problems are reported even when the body is unusable. `verify`
/// then gets the request with its body buffered, so signature schemes can
/// cover the exact bytes. On success, `Claims` is inserted into
/// `http::Extensions`.
pub trait Authenticator: Clone + Send + Sync + 'static {
    /// What `identify` hands over to `verify` (e.g. a resolved key).
    type Identity: Send + 'static;

    /// The claims type produced on successful authentication.
    type Claims: Clone + Send + Sync + 'static;

    /// The error type returned on authentication failure.
    type Error: Into<Rejection> + Send;

    /// Check the request head and work out who the caller claims to be.
    fn identify(
        &self,
        parts: &Parts,
    ) -> impl Future<Output = Result<Self::Identity, Self::Error>> + Send;

    /// Check the buffered request against the identity and return claims.
    fn verify(
        &self,
        identity: Self::Identity,
        request: &Request<Bytes>,
    ) -> Result<Self::Claims, Self::Error>;
}

/// Tower [`Layer`](tower::Layer) that applies [`AuthService`].
#[derive(Clone)]
pub struct AuthLayer<A> {
    authenticator: A,
    body_limit: usize,
}

impl<A> AuthLayer<A> {
    pub fn new(authenticator: A) -> Self {
        Self {
            authenticator,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Maximum body size buffered for verification. Larger bodies are
    /// rejected.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }
}

impl<A, S> tower::Layer<S> for AuthLayer<A>
where
    A: Clone,
{
    type Service = AuthService<A, S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            authenticator: self.authenticator.clone(),
            body_limit: self.body_limit,
            inner,
        }
    }
}

/// Tower service that authenticates requests before forwarding them.
#[derive(Clone)]
pub struct AuthService<A, S> {
    authenticator: A,
    body_limit: usize,
    inner: S,
}

impl<A, S> tower::Service<Request<Body>> for AuthService<A, S>
where
    A: Authenticator,
    S: tower::Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let authenticator = self.authenticator.clone();
        let body_limit = self.body_limit;
        let mut inner = self.inner.clone();
        // swap to ensure poll_ready state is preserved
        std::mem::swap(&mut self.inner, &mut inner);

        Box::pin(async move {
            let (parts, body) = req.into_parts();

            let identified = AssertUnwindSafe(authenticator.identify(&parts))
                .catch_unwind()
                .await;
            let identity = match identified {
                Ok(Ok(identity)) => identity,
                Ok(Err(err)) => return Ok(reject(err)),
                Err(_) => return Ok(panicked()),
            };

            let bytes = match axum::body::to_bytes(body, body_limit).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::debug!(error = %err, "failed to buffer request body");
                    return Ok(reject(AuthError::from(VerificationError::UnreadableBody)));
                }
            };
            let request = Request::from_parts(parts, bytes);

            let verified = std::panic::catch_unwind(AssertUnwindSafe(|| {
                authenticator.verify(identity, &request)
            }));
            match verified {
                Ok(Ok(claims)) => {
                    let (mut parts, bytes) = request.into_parts();
                    parts.extensions.insert(claims);
                    inner.call(Request::from_parts(parts, Body::from(bytes))).await
                }
                Ok(Err(err)) => Ok(reject(err)),
                Err(_) => Ok(panicked()),
            }
        })
    }
}

fn reject(err: impl Into<Rejection>) -> Response<Body> {
    let rejection = err.into();
    tracing::debug!(
        status = %rejection.status,
        message = %rejection.message,
        "request rejected"
    );
    rejection.into_response()
}

fn panicked() -> Response<Body> {
    tracing::error!("authenticator panicked, rejecting request");
    reject(AuthError::UnknownClient)
}
