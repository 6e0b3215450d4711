//! Error types shared by the credential store, the connection controller,
//! the flattener and the catalog service.

use serde::{ser::Serializer, Serialize};
use thiserror::Error;

use crate::credential_store::{ConnectionState, CredentialId};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Credential '{title}' is already registered for this source")]
    DuplicateCredential { title: String },

    #[error("Credential not found: {0}")]
    CredentialNotFound(CredentialId),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Invalid state transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: CredentialId,
        from: ConnectionState,
        to: ConnectionState,
    },

    #[error("Connection to {id} timed out after {timeout_ms} ms (attempt {attempts})")]
    ConnectionTimeout {
        id: CredentialId,
        timeout_ms: u64,
        attempts: u32,
    },

    #[error("Authentication failed for {id} (attempt {attempts}): {reason}")]
    ConnectionAuthFailure {
        id: CredentialId,
        reason: String,
        attempts: u32,
    },

    #[error("Network failure for {id} (attempt {attempts}): {reason}")]
    ConnectionNetworkFailure {
        id: CredentialId,
        reason: String,
        attempts: u32,
    },

    #[error("Connection to {id} was cancelled by a disconnect")]
    ConnectionCancelled { id: CredentialId },

    #[error("Drive tree of {id} exceeds the maximum traversal depth of {max_depth}")]
    TraversalDepthExceeded { id: CredentialId, max_depth: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CatalogError {
    /// Connection failures leave the credential in `Failed`; the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::ConnectionTimeout { .. }
                | CatalogError::ConnectionAuthFailure { .. }
                | CatalogError::ConnectionNetworkFailure { .. }
        )
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(error: serde_json::Error) -> Self {
        CatalogError::Serialization(error.to_string())
    }
}

/// Presentation layers receive errors as plain messages.
impl Serialize for CatalogError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

pub type CatalogResult<T, E = CatalogError> = Result<T, E>;
