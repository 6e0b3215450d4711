// drivecat Configuration Module
// Catalog settings stored as JSON under the user config directory

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CatalogError, CatalogResult};
use crate::flatten::DEFAULT_MAX_DEPTH;
use crate::gateway::dooray::DOORAY_API_BASE;

/// Connect timeout bounds in milliseconds
const MIN_CONNECT_TIMEOUT_MS: u64 = 1_000;
const MAX_CONNECT_TIMEOUT_MS: u64 = 300_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;

const MAX_TRAVERSAL_DEPTH: usize = 256;
const DEFAULT_TAB_LIMIT: usize = 8;
const MAX_TAB_LIMIT: usize = 500;

/// A source registered at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub title: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Upper bound for one drive tree fetch
    pub connect_timeout_ms: u64,
    /// Deepest folder level flattened (a folder directly under a drive is 1)
    pub max_traversal_depth: usize,
    /// Items shown per tab on the home view
    pub tab_limit: usize,
    pub dooray_base_url: String,
    /// Directories scanned for locally known files
    pub local_roots: Vec<PathBuf>,
    pub sources: Vec<SourceEntry>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            max_traversal_depth: DEFAULT_MAX_DEPTH,
            tab_limit: DEFAULT_TAB_LIMIT,
            dooray_base_url: DOORAY_API_BASE.to_string(),
            local_roots: Vec::new(),
            sources: Vec::new(),
        }
    }
}

impl CatalogConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Clamp values into their supported ranges.
pub fn validate_config(config: &mut CatalogConfig) {
    if config.connect_timeout_ms == 0 {
        config.connect_timeout_ms = DEFAULT_CONNECT_TIMEOUT_MS;
    }
    config.connect_timeout_ms = config
        .connect_timeout_ms
        .clamp(MIN_CONNECT_TIMEOUT_MS, MAX_CONNECT_TIMEOUT_MS);

    config.max_traversal_depth = config.max_traversal_depth.clamp(1, MAX_TRAVERSAL_DEPTH);

    if config.tab_limit == 0 {
        config.tab_limit = DEFAULT_TAB_LIMIT;
    } else if config.tab_limit > MAX_TAB_LIMIT {
        config.tab_limit = MAX_TAB_LIMIT;
    }

    let base = config.dooray_base_url.trim().trim_end_matches('/');
    config.dooray_base_url = if base.is_empty() {
        DOORAY_API_BASE.to_string()
    } else {
        base.to_string()
    };

    config
        .sources
        .retain(|s| !s.title.trim().is_empty() && !s.token.trim().is_empty());
}

/// Default location: `<config dir>/drivecat/config.json`
pub fn default_config_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")));
    config_dir.join("drivecat").join("config.json")
}

/// Load the configuration at `path`. A missing file yields defaults;
/// an unreadable or unparsable one is an error.
pub fn load_config_from(path: &Path) -> CatalogResult<CatalogConfig> {
    if !path.exists() {
        return Ok(CatalogConfig::default());
    }
    let content = fs::read_to_string(path)?;
    let mut config: CatalogConfig = serde_json::from_str(&content)
        .map_err(|e| CatalogError::Config(format!("{}: {}", path.display(), e)))?;
    validate_config(&mut config);
    Ok(config)
}

/// Load the configuration from the default location, falling back to
/// defaults on any error.
pub fn load_config() -> CatalogConfig {
    let path = default_config_path();
    match load_config_from(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Failed to load config: {}", e);
            CatalogConfig::default()
        }
    }
}

pub fn save_config_to(path: &Path, config: &CatalogConfig) -> CatalogResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;
    tracing::info!("Config saved to {:?}", path);
    Ok(())
}
