//! Client identifier to public key resolution.

use crate::{
    registry::{ClientRegistry, RegistryError},
    verify::{KeyError, SigningPublicKey},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    /// No registered client has this identifier. Recoverable: the gate moves
    /// on to the next candidate.
    #[error("Client not found")]
    ClientNotFound,

    /// The client exists but its stored key material is unusable.
    #[error("client {client_id} has invalid key material: {source}")]
    InvalidKey {
        client_id: String,
        #[source]
        source: KeyError,
    },

    #[error("registry lookup failed: {0}")]
    Registry(#[from] RegistryError),
}

/// Resolves caller-supplied client identifiers to decoded public keys.
#[derive(Clone, Debug)]
pub struct ClientKeyResolver<R> {
    registry: R,
}

impl<R> ClientKeyResolver<R>
where
    R: ClientRegistry,
{
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    /// Look up `client_id` and decode its key. The identifier is passed to
    /// the registry as-is.
    pub async fn resolve(&self, client_id: &str) -> Result<SigningPublicKey, ResolveError> {
        let client = self
            .registry
            .find_by_public_id(client_id)
            .await?
            .ok_or(ResolveError::ClientNotFound)?;

        SigningPublicKey::decode(&client.public_key).map_err(|source| ResolveError::InvalidKey {
            client_id: client.public_id,
            source,
        })
    }
}
