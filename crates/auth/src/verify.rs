//! Request signature verification.
//!
//! The gate treats verification as an opaque capability: given a request and
//! a public key, either accept or fail with a message. [`Ed25519BodyVerifier`]
//! is the default scheme, checking detached Ed25519 signatures over the body.

use axum::body::Bytes;
use base64::{
    Engine, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use ed25519_dalek::{PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH, Signature, VerifyingKey};
use http::{HeaderName, Request};
use thiserror::Error;

/// Header carrying base64url Ed25519 signatures over the request body.
pub const SIGNATURE_HEADER: &str = "Body-Signature-Ed25519";

/// Base64url, padding optional on decode.
pub const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors decoding stored key material.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("public key is not valid base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("public key must be 32 bytes, got {0}")]
    Length(usize),

    #[error("invalid Ed25519 public key: {0}")]
    Invalid(#[from] ed25519_dalek::SignatureError),
}

/// Decoded verifying key of a registered client.
///
/// Built fresh for each request and dropped with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SigningPublicKey(VerifyingKey);

impl SigningPublicKey {
    /// Decode base64url key material as stored in the registry.
    pub fn decode(encoded: &str) -> Result<Self, KeyError> {
        let bytes = BASE64URL.decode(encoded.trim())?;
        let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| KeyError::Length(b.len()))?;
        Ok(Self(VerifyingKey::from_bytes(&bytes)?))
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.0
    }
}

impl From<VerifyingKey> for SigningPublicKey {
    fn from(key: VerifyingKey) -> Self {
        Self(key)
    }
}

/// Why a request failed verification. The display text is returned to the
/// caller as the rejection message.
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("No signed request header (Body-Signature-Ed25519) found.")]
    MissingSignature,

    #[error("Signature header is not a valid base64url Ed25519 signature")]
    MalformedSignature,

    #[error("No valid signature given for this HTTP request")]
    InvalidSignature,

    #[error("Request body could not be read")]
    UnreadableBody,

    #[error("{0}")]
    Other(String),
}

/// Verifies a buffered request against a client's public key.
pub trait SignatureVerifier: Clone + Send + Sync + 'static {
    fn verify(
        &self,
        request: &Request<Bytes>,
        key: &SigningPublicKey,
    ) -> Result<(), VerificationError>;
}

/// Detached Ed25519 signatures over the exact request body.
///
/// Every value of the signature header is tried; one valid signature is
/// enough. Verification is stateless, so replaying a request yields the same
/// outcome.
#[derive(Clone, Debug)]
pub struct Ed25519BodyVerifier {
    header: HeaderName,
}

impl Default for Ed25519BodyVerifier {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static("body-signature-ed25519"),
        }
    }
}

impl Ed25519BodyVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read signatures from a different header.
    pub fn with_header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }
}

impl SignatureVerifier for Ed25519BodyVerifier {
    fn verify(
        &self,
        request: &Request<Bytes>,
        key: &SigningPublicKey,
    ) -> Result<(), VerificationError> {
        let mut values = request.headers().get_all(&self.header).iter().peekable();
        if values.peek().is_none() {
            return Err(VerificationError::MissingSignature);
        }

        let body = request.body();
        for value in values {
            let signature = value
                .to_str()
                .ok()
                .and_then(|v| BASE64URL.decode(v.trim()).ok())
                .and_then(|b| <[u8; SIGNATURE_LENGTH]>::try_from(b).ok())
                .map(|b| Signature::from_bytes(&b))
                .ok_or(VerificationError::MalformedSignature)?;

            if key.0.verify_strict(body, &signature).is_ok() {
                return Ok(());
            }
        }
        Err(VerificationError::InvalidSignature)
    }
}
