//! Drive Source Gateways
//!
//! A gateway turns one credential into the raw drive tree of its source.
//! The connection controller only talks to the `DriveGateway` trait, so any
//! drive-style backend can be plugged in.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │        DriveGateway Trait            │
//! │     fetch_tree, disconnect           │
//! └──────────────────────────────────────┘
//!                   │
//!          ┌────────┴────────┐
//!          ▼                 ▼
//!     ┌─────────┐      ┌───────────┐
//!     │ Dooray  │      │  (others) │
//!     └─────────┘      └───────────┘
//! ```

pub mod dooray;
pub mod types;

pub use dooray::DoorayGateway;
pub use types::*;

use async_trait::async_trait;

/// Unified drive source trait
#[async_trait]
pub trait DriveGateway: Send + Sync {
    /// Short name of the backend, used in logs
    fn name(&self) -> &str;

    /// Fetch the complete drive tree visible to `credential`.
    ///
    /// The controller bounds this call with its own timeout; implementations
    /// may still report `GatewayError::Timeout` for transport-level timeouts.
    async fn fetch_tree(&self, credential: &GatewayCredential) -> Result<DriveTree, GatewayError>;

    /// Tell the source the credential is no longer in use. Best-effort.
    async fn disconnect(&self, _credential: &GatewayCredential) -> Result<(), GatewayError> {
        Ok(())
    }
}
