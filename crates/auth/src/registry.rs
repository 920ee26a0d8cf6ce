//! Registered client lookup.
//!
//! The gate only ever reads from the registry. Registration and revocation
//! happen elsewhere; this module defines the narrow lookup contract plus an
//! in-memory implementation that can be loaded from a JSON file.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, sync::Arc};
use thiserror::Error;

/// A client allowed to sign requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClient {
    /// Public identifier the client sends in the identifier header.
    #[serde(alias = "publicid")]
    pub public_id: String,
    /// Base64url-encoded Ed25519 verifying key.
    #[serde(alias = "publickey")]
    pub public_key: String,
}

/// Errors from the registry backend itself.
///
/// A missing client is not an error; lookups return `Ok(None)` for that.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate client id: {0}")]
    Duplicate(String),

    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Lookup of registered clients by public identifier.
///
/// Implement this over whatever store holds the clients (SQL, key-value,
/// a remote service). `Ok(None)` means no client has that identifier.
pub trait ClientRegistry: Clone + Send + Sync + 'static {
    fn find_by_public_id(
        &self,
        public_id: &str,
    ) -> impl Future<Output = Result<Option<RegisteredClient>, RegistryError>> + Send;
}

/// Immutable in-memory registry.
#[derive(Clone, Debug, Default)]
pub struct MemoryRegistry {
    clients: Arc<HashMap<String, RegisteredClient>>,
}

impl MemoryRegistry {
    /// Build a registry from a list of clients. Public ids must be unique.
    pub fn from_clients(
        clients: impl IntoIterator<Item = RegisteredClient>,
    ) -> Result<Self, RegistryError> {
        let mut map = HashMap::new();
        for client in clients {
            if map.contains_key(&client.public_id) {
                return Err(RegistryError::Duplicate(client.public_id));
            }
            map.insert(client.public_id.clone(), client);
        }
        Ok(Self {
            clients: Arc::new(map),
        })
    }

    /// Load a JSON array of [`RegisteredClient`] records.
    pub fn from_json_file(path: &Path) -> Result<Self, RegistryError> {
        let data = std::fs::read_to_string(path)?;
        let clients: Vec<RegisteredClient> = serde_json::from_str(&data)?;
        Self::from_clients(clients)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl ClientRegistry for MemoryRegistry {
    async fn find_by_public_id(
        &self,
        public_id: &str,
    ) -> Result<Option<RegisteredClient>, RegistryError> {
        Ok(self.clients.get(public_id).cloned())
    }
}
