// drivecat Credential Store
// In-memory registry of drive source credentials and their connection state

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{CatalogError, CatalogResult};

/// Characters of a secret shown before and after the ellipsis.
pub const MASK_VISIBLE_CHARS: usize = 4;

/// Secrets this short are fully starred out.
const MASK_FULL_THRESHOLD: usize = 8;

// ============ Identifiers & State ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(Uuid);

impl CredentialId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CredentialId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

impl ConnectionState {
    /// Whether `self -> to` is an edge of the connection state machine.
    ///
    /// `Connected -> Connected` is the only self-loop (a repeated connect
    /// request); `Connected -> Connecting` is an explicit refresh. Nothing
    /// reaches `Connected` without passing `Connecting`.
    pub fn can_transition_to(self, to: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, to),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Failed)
                | (Connected, Disconnected)
                | (Failed, Disconnected)
                | (Failed, Connecting)
                | (Connected, Connected)
                | (Connected, Connecting)
        )
    }

    /// A fetch is in flight or a snapshot is live; connect requests are no-ops.
    pub fn is_active(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

// ============ Credential ============

/// Registration payload supplied by the caller.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub title: String,
    /// Token identifying and authorizing the source.
    pub secret: SecretString,
}

impl NewCredential {
    pub fn new(title: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            secret: SecretString::from(secret.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Credential {
    pub id: CredentialId,
    pub title: String,
    secret: SecretString,
    pub state: ConnectionState,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub retry_count: u32,
}

impl Credential {
    fn new(title: String, secret: SecretString) -> Self {
        Self {
            id: CredentialId::new(),
            title,
            secret,
            state: ConnectionState::Disconnected,
            created_at: Utc::now(),
            last_used: None,
            retry_count: 0,
        }
    }

    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    pub fn masked_secret(&self) -> String {
        mask_secret(self.secret.expose_secret())
    }

    fn same_source(&self, title: &str, secret: &SecretString) -> bool {
        self.title == title && self.secret.expose_secret() == secret.expose_secret()
    }

    pub fn summary(&self) -> CredentialSummary {
        CredentialSummary {
            id: self.id,
            title: self.title.clone(),
            masked_secret: self.masked_secret(),
            state: self.state,
            created_at: self.created_at,
            last_used: self.last_used,
            retry_count: self.retry_count,
        }
    }
}

/// Read-only view of a credential; the only shape that leaves the crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub id: CredentialId,
    pub title: String,
    pub masked_secret: String,
    pub state: ConnectionState,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub retry_count: u32,
}

/// Render a secret for display: `abcd…wxyz`, or all stars when short.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= MASK_FULL_THRESHOLD {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..MASK_VISIBLE_CHARS].iter().collect();
    let tail: String = chars[chars.len() - MASK_VISIBLE_CHARS..].iter().collect();
    format!("{}…{}", head, tail)
}

// ============ Credential Store ============

/// Ordered set of credentials. Registration order is the merge order of the catalog.
#[derive(Debug, Default)]
pub struct CredentialStore {
    credentials: Vec<Credential>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a credential in `Disconnected` state.
    pub fn register(&mut self, new: NewCredential) -> CatalogResult<CredentialSummary> {
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(CatalogError::InvalidCredential("title must not be empty".to_string()));
        }
        if new.secret.expose_secret().trim().is_empty() {
            return Err(CatalogError::InvalidCredential("secret must not be empty".to_string()));
        }
        if self.credentials.iter().any(|c| c.same_source(&title, &new.secret)) {
            return Err(CatalogError::DuplicateCredential { title });
        }

        let credential = Credential::new(title, new.secret);
        let summary = credential.summary();
        info!("Registered credential {} ({})", summary.title, summary.masked_secret);
        self.credentials.push(credential);
        Ok(summary)
    }

    pub fn list(&self) -> Vec<CredentialSummary> {
        self.credentials.iter().map(Credential::summary).collect()
    }

    pub fn ids(&self) -> Vec<CredentialId> {
        self.credentials.iter().map(|c| c.id).collect()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn get(&self, id: CredentialId) -> CatalogResult<&Credential> {
        self.credentials
            .iter()
            .find(|c| c.id == id)
            .ok_or(CatalogError::CredentialNotFound(id))
    }

    fn get_mut(&mut self, id: CredentialId) -> CatalogResult<&mut Credential> {
        self.credentials
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(CatalogError::CredentialNotFound(id))
    }

    pub fn state(&self, id: CredentialId) -> CatalogResult<ConnectionState> {
        self.get(id).map(|c| c.state)
    }

    /// Move a credential along one edge of the state machine.
    pub fn update_state(&mut self, id: CredentialId, to: ConnectionState) -> CatalogResult<ConnectionState> {
        let credential = self.get_mut(id)?;
        let from = credential.state;
        if !from.can_transition_to(to) {
            return Err(CatalogError::InvalidTransition { id, from, to });
        }
        credential.state = to;
        Ok(to)
    }

    /// Bump the failure counter and return the new attempt count.
    pub fn record_failure(&mut self, id: CredentialId) -> CatalogResult<u32> {
        let credential = self.get_mut(id)?;
        credential.retry_count = credential.retry_count.saturating_add(1);
        Ok(credential.retry_count)
    }

    pub fn record_success(&mut self, id: CredentialId) -> CatalogResult<()> {
        let credential = self.get_mut(id)?;
        credential.retry_count = 0;
        credential.last_used = Some(Utc::now());
        Ok(())
    }

    /// Change the display title; the duplicate rule applies to the new pair.
    pub fn rename(&mut self, id: CredentialId, title: &str) -> CatalogResult<CredentialSummary> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(CatalogError::InvalidCredential("title must not be empty".to_string()));
        }
        let secret = self.get(id)?.secret.clone();
        if self
            .credentials
            .iter()
            .any(|c| c.id != id && c.same_source(&title, &secret))
        {
            return Err(CatalogError::DuplicateCredential { title });
        }
        let credential = self.get_mut(id)?;
        credential.title = title;
        Ok(credential.summary())
    }

    /// Drop the entry. Callers must have disconnected it first.
    pub(crate) fn delete(&mut self, id: CredentialId) -> CatalogResult<Credential> {
        let index = self
            .credentials
            .iter()
            .position(|c| c.id == id)
            .ok_or(CatalogError::CredentialNotFound(id))?;
        let removed = self.credentials.remove(index);
        info!("Deleted credential {}", removed.title);
        Ok(removed)
    }
}
