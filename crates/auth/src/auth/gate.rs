//! Client signature authentication.
//!
//! Reads the claimed client identifier(s) from `Chronicle-Client-Key-ID`,
//! resolves the first registered one to its public key, and verifies the
//! request signature against it.
//!
//! ```rust,ignore
//! use chronicle_auth::{AuthLayer, AuthenticationGate, MemoryRegistry};
//!
//! let registry = MemoryRegistry::from_json_file("clients.json".as_ref())?;
//! let app = axum::Router::new()
//!     .route("/publish", axum::routing::post(publish))
//!     .layer(AuthLayer::new(AuthenticationGate::new(registry)));
//! ```

use crate::{
    auth::Authenticator,
    registry::ClientRegistry,
    rejection::Rejection,
    resolver::{ClientKeyResolver, ResolveError},
    verify::{Ed25519BodyVerifier, SignatureVerifier, SigningPublicKey, VerificationError},
};
use axum::{
    body::Bytes,
    extract::FromRequestParts,
    response::{IntoResponse, Response},
};
use http::{HeaderMap, HeaderName, Request, request::Parts};
use thiserror::Error;

/// Header naming the registered client whose key signed the request.
pub const CLIENT_IDENTIFIER_HEADER: &str = "Chronicle-Client-Key-ID";

/// Trust attribute attached to requests that passed the gate.
///
/// Only [`AuthenticationGate`] produces it, and only after a successful
/// signature check. Handlers can take it as an extractor; it rejects with
/// 403 when absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Authenticated {
    /// The identifier whose key verified the request.
    pub client_id: String,
}

/// Why the gate refused a request. Every variant is a 403.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No client header provided")]
    MissingClientHeader,

    #[error("Invalid client")]
    UnknownClient,

    /// Registry failure or unusable key material. The detail is logged, the
    /// caller only sees "Invalid client".
    #[error("Invalid client")]
    Resolve(#[source] ResolveError),

    #[error(transparent)]
    Verification(#[from] VerificationError),
}

pub type AuthenticationOutcome = Result<Authenticated, AuthError>;

impl From<AuthError> for Rejection {
    fn from(err: AuthError) -> Self {
        Rejection::forbidden(err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        Rejection::from(self).into_response()
    }
}

/// Authenticator that checks client request signatures.
#[derive(Clone, Debug)]
pub struct AuthenticationGate<R, V = Ed25519BodyVerifier> {
    resolver: ClientKeyResolver<R>,
    verifier: V,
    client_header: HeaderName,
}

impl<R> AuthenticationGate<R>
where
    R: ClientRegistry,
{
    /// Gate backed by `registry`, verifying Ed25519 body signatures.
    pub fn new(registry: R) -> Self {
        Self {
            resolver: ClientKeyResolver::new(registry),
            verifier: Ed25519BodyVerifier::new(),
            client_header: HeaderName::from_static("chronicle-client-key-id"),
        }
    }
}

impl<R, V> AuthenticationGate<R, V> {
    /// Swap the signature scheme.
    pub fn with_verifier<W>(self, verifier: W) -> AuthenticationGate<R, W> {
        AuthenticationGate {
            resolver: self.resolver,
            verifier,
            client_header: self.client_header,
        }
    }

    /// Read client identifiers from a different header.
    pub fn with_client_header(mut self, header: HeaderName) -> Self {
        self.client_header = header;
        self
    }

    pub fn client_header(&self) -> &HeaderName {
        &self.client_header
    }
}

impl<R, V> AuthenticationGate<R, V>
where
    R: ClientRegistry,
    V: SignatureVerifier,
{
    /// Run the whole decision on an already buffered request.
    pub async fn authenticate(&self, request: &Request<Bytes>) -> AuthenticationOutcome {
        let identity = self.resolve_key(request.headers()).await?;
        self.verify(identity, request)
    }

    /// Resolve the first candidate identifier that maps to a registered key.
    ///
    /// Candidates are tried in header order and the search stops at the first
    /// hit; later candidates are never looked at, even if they would resolve
    /// to a different key.
    async fn resolve_key(
        &self,
        headers: &HeaderMap,
    ) -> Result<(String, SigningPublicKey), AuthError> {
        let mut candidates = headers.get_all(&self.client_header).iter().peekable();
        if candidates.peek().is_none() {
            return Err(AuthError::MissingClientHeader);
        }

        for value in candidates {
            let Ok(client_id) = value.to_str() else {
                tracing::debug!("skipping client identifier that is not visible ASCII");
                continue;
            };
            match self.resolver.resolve(client_id).await {
                Ok(key) => return Ok((client_id.to_owned(), key)),
                Err(ResolveError::ClientNotFound) => continue,
                Err(err) => {
                    tracing::warn!(client_id, error = %err, "client key resolution failed");
                    return Err(AuthError::Resolve(err));
                }
            }
        }
        Err(AuthError::UnknownClient)
    }
}

impl<R, V> Authenticator for AuthenticationGate<R, V>
where
    R: ClientRegistry,
    V: SignatureVerifier,
{
    type Identity = (String, SigningPublicKey);
    type Claims = Authenticated;
    type Error = AuthError;

    async fn identify(&self, parts: &Parts) -> Result<Self::Identity, AuthError> {
        self.resolve_key(&parts.headers).await
    }

    fn verify(
        &self,
        (client_id, key): Self::Identity,
        request: &Request<Bytes>,
    ) -> AuthenticationOutcome {
        self.verifier.verify(request, &key)?;
        tracing::debug!(client_id = %client_id, "request signature verified");
        Ok(Authenticated { client_id })
    }
}

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Authenticated>()
            .cloned()
            .ok_or_else(|| AuthError::UnknownClient.into())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        auth::{
            Authenticator,
            gate::{AuthError, Authenticated, AuthenticationGate, CLIENT_IDENTIFIER_HEADER},
        },
        registry::{ClientRegistry, MemoryRegistry, RegisteredClient, RegistryError},
        resolver::ResolveError,
        verify::{
            BASE64URL, SIGNATURE_HEADER, SignatureVerifier, SigningPublicKey, VerificationError,
        },
    };
    use axum::body::Bytes;
    use base64::Engine;
    use ed25519_dalek::{Signer, SigningKey};
    use http::{HeaderName, Request};
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    const BODY: &[u8] = br#"{"entry":"hello"}"#;

    fn key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn registered(id: &str, seed: u8) -> RegisteredClient {
        RegisteredClient {
            public_id: id.into(),
            public_key: BASE64URL.encode(key(seed).verifying_key().as_bytes()),
        }
    }

    fn gate() -> AuthenticationGate<MemoryRegistry> {
        let registry =
            MemoryRegistry::from_clients([registered("alice", 1), registered("bob", 2)]).unwrap();
        AuthenticationGate::new(registry)
    }

    fn signed(client_ids: &[&str], signer: u8) -> Request<Bytes> {
        let signature = BASE64URL.encode(key(signer).sign(BODY).to_bytes());
        let mut builder = Request::post("/publish").header(SIGNATURE_HEADER, signature);
        for id in client_ids {
            builder = builder.header(CLIENT_IDENTIFIER_HEADER, *id);
        }
        builder.body(Bytes::from_static(BODY)).unwrap()
    }

    #[tokio::test]
    async fn missing_client_header() {
        let err = gate().authenticate(&signed(&[], 1)).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingClientHeader));
        assert_eq!(err.to_string(), "No client header provided");
    }

    #[tokio::test]
    async fn unregistered_client() {
        let err = gate()
            .authenticate(&signed(&["mallory"], 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnknownClient));
        assert_eq!(err.to_string(), "Invalid client");
    }

    #[tokio::test]
    async fn wrong_signature_reports_verifier_message() {
        let err = gate()
            .authenticate(&signed(&["alice"], 2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::Verification(VerificationError::InvalidSignature)
        ));
        assert_eq!(
            err.to_string(),
            "No valid signature given for this HTTP request"
        );
    }

    #[tokio::test]
    async fn valid_signature_authenticates() {
        let outcome = gate().authenticate(&signed(&["alice"], 1)).await.unwrap();
        assert_eq!(
            outcome,
            Authenticated {
                client_id: "alice".into()
            }
        );
    }

    #[tokio::test]
    async fn skips_unregistered_candidate() {
        let outcome = gate()
            .authenticate(&signed(&["mallory", "bob"], 2))
            .await
            .unwrap();
        assert_eq!(outcome.client_id, "bob");
    }

    #[tokio::test]
    async fn first_resolvable_candidate_wins() {
        // signed by bob, but alice is listed first and resolves
        let err = gate()
            .authenticate(&signed(&["alice", "bob"], 2))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Verification(_)));

        let outcome = gate()
            .authenticate(&signed(&["alice", "bob"], 1))
            .await
            .unwrap();
        assert_eq!(outcome.client_id, "alice");
    }

    #[tokio::test]
    async fn same_request_twice_same_outcome() {
        let gate = gate();
        let request = signed(&["alice"], 1);
        let first = gate.authenticate(&request).await.unwrap();
        let second = gate.authenticate(&request).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn non_ascii_candidate_is_skipped() {
        let signature = BASE64URL.encode(key(2).sign(BODY).to_bytes());
        let request = Request::post("/publish")
            .header(SIGNATURE_HEADER, signature)
            .header(
                CLIENT_IDENTIFIER_HEADER,
                http::HeaderValue::from_bytes(b"caf\xe9").unwrap(),
            )
            .header(CLIENT_IDENTIFIER_HEADER, "bob")
            .body(Bytes::from_static(BODY))
            .unwrap();
        assert_eq!(
            gate().authenticate(&request).await.unwrap().client_id,
            "bob"
        );
    }

    #[tokio::test]
    async fn custom_client_header() {
        let gate = gate().with_client_header(HeaderName::from_static("x-client"));
        assert_eq!(gate.client_header(), "x-client");
        let signature = BASE64URL.encode(key(1).sign(BODY).to_bytes());
        let request = Request::post("/publish")
            .header(SIGNATURE_HEADER, signature)
            .header("x-client", "alice")
            .body(Bytes::from_static(BODY))
            .unwrap();
        assert!(gate.authenticate(&request).await.is_ok());
    }

    #[tokio::test]
    async fn identify_runs_on_the_head_alone() {
        let (parts, ()) = Request::post("/publish")
            .header(CLIENT_IDENTIFIER_HEADER, "mallory")
            .header(CLIENT_IDENTIFIER_HEADER, "bob")
            .body(())
            .unwrap()
            .into_parts();
        let (client_id, key) = Authenticator::identify(&gate(), &parts).await.unwrap();
        assert_eq!(client_id, "bob");
        assert_eq!(key, SigningPublicKey::from(self::key(2).verifying_key()));

        let (parts, ()) = Request::post("/publish").body(()).unwrap().into_parts();
        assert!(matches!(
            Authenticator::identify(&gate(), &parts).await,
            Err(AuthError::MissingClientHeader)
        ));
    }

    #[tokio::test]
    async fn invalid_stored_key_fails_closed() {
        let registry = MemoryRegistry::from_clients([
            RegisteredClient {
                public_id: "broken".into(),
                public_key: "AAAA".into(),
            },
            registered("alice", 1),
        ])
        .unwrap();
        let err = AuthenticationGate::new(registry)
            .authenticate(&signed(&["broken", "alice"], 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::Resolve(ResolveError::InvalidKey { .. })
        ));
        assert_eq!(err.to_string(), "Invalid client");
    }

    #[derive(Clone)]
    struct DownRegistry;

    impl ClientRegistry for DownRegistry {
        async fn find_by_public_id(
            &self,
            _public_id: &str,
        ) -> Result<Option<RegisteredClient>, RegistryError> {
            Err(RegistryError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn registry_failure_fails_closed() {
        let err = AuthenticationGate::new(DownRegistry)
            .authenticate(&signed(&["alice"], 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::Resolve(ResolveError::Registry(_))
        ));
        assert_eq!(err.to_string(), "Invalid client");
    }

    #[derive(Clone, Default)]
    struct CountingVerifier {
        calls: Arc<AtomicUsize>,
    }

    impl SignatureVerifier for CountingVerifier {
        fn verify(
            &self,
            _request: &Request<Bytes>,
            _key: &SigningPublicKey,
        ) -> Result<(), VerificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(VerificationError::Other("envelope expired".into()))
        }
    }

    #[tokio::test]
    async fn custom_verifier_message_is_forwarded() {
        let verifier = CountingVerifier::default();
        let gate = gate().with_verifier(verifier.clone());
        let err = gate
            .authenticate(&signed(&["mallory", "alice", "bob"], 1))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "envelope expired");
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn verifier_not_called_without_resolved_key() {
        let verifier = CountingVerifier::default();
        let gate = gate().with_verifier(verifier.clone());
        assert!(gate.authenticate(&signed(&["mallory"], 1)).await.is_err());
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }
}
