// drivecat - Unified file catalog over connected drive sources
// Credential lifecycle, drive tree flattening and a favorite-aware catalog

pub mod catalog;
pub mod catalog_service;
pub mod config;
pub mod controller;
pub mod credential_store;
pub mod error;
pub mod flatten;
pub mod gateway;
pub mod local_files;
pub mod recency;
pub mod record;
pub mod view_state;

pub use catalog::{FileCatalog, RecordFilter, SourceIssue, SourceTree, SubstringFilter, Tab, TabView};
pub use catalog_service::CatalogService;
pub use config::{load_config, load_config_from, validate_config, CatalogConfig, SourceEntry};
pub use controller::{ConnectionController, DisconnectAllReport, Snapshot, SourceSnapshot};
pub use credential_store::{
    mask_secret, ConnectionState, CredentialId, CredentialStore, CredentialSummary, NewCredential,
};
pub use error::{CatalogError, CatalogResult};
pub use flatten::{flatten_tree, DEFAULT_MAX_DEPTH};
pub use gateway::{DoorayGateway, DriveGateway, DriveTree, GatewayError};
pub use recency::{Modified, RecencyKey};
pub use record::{FileKind, FileRecord, SourceRef};
pub use view_state::{NodeKey, ViewContext};
