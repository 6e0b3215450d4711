//! Catalog Service - the coordinating context for one owner
//!
//! Owns the connection controller, the locally known files and the favorite
//! overlay. The presentation layer talks to this type only: credential CRUD,
//! the connect family, tab listings, favorites and search.
//!
//! Catalog reads rebuild a `FileCatalog` from the current snapshots; they
//! never fail and report unavailable sources as issues instead.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::catalog::{FileCatalog, RecordFilter, SourceIssue, SubstringFilter, Tab, TabView};
use crate::config::CatalogConfig;
use crate::controller::{ConnectionController, DisconnectAllReport};
use crate::credential_store::{ConnectionState, CredentialId, CredentialSummary, NewCredential};
use crate::error::CatalogResult;
use crate::gateway::DriveGateway;
use crate::local_files::scan_directory;
use crate::record::FileRecord;
use crate::view_state::ViewContext;

pub struct CatalogService {
    controller: ConnectionController,
    local_files: RwLock<Vec<FileRecord>>,
    /// Favorite overlay keyed by file id; never sent to any source
    favorites: RwLock<HashSet<String>>,
    filter: Box<dyn RecordFilter>,
    tab_limit: usize,
    scan_depth: usize,
}

impl CatalogService {
    pub fn new(owner: impl Into<String>, gateway: Arc<dyn DriveGateway>, config: &CatalogConfig) -> Self {
        let controller = ConnectionController::new(owner, gateway)
            .with_connect_timeout(config.connect_timeout())
            .with_max_depth(config.max_traversal_depth);
        Self {
            controller,
            local_files: RwLock::new(Vec::new()),
            favorites: RwLock::new(HashSet::new()),
            filter: Box::new(SubstringFilter),
            tab_limit: config.tab_limit,
            scan_depth: config.max_traversal_depth,
        }
    }

    /// Replace the default substring search.
    pub fn with_filter(mut self, filter: impl RecordFilter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    pub fn owner(&self) -> &str {
        self.controller.owner()
    }

    pub fn controller(&self) -> &ConnectionController {
        &self.controller
    }

    // ============ Credentials ============

    pub async fn register(&self, new: NewCredential) -> CatalogResult<CredentialSummary> {
        self.controller.register(new).await
    }

    pub async fn credentials(&self) -> Vec<CredentialSummary> {
        self.controller.list().await
    }

    pub async fn credential(&self, id: CredentialId) -> CatalogResult<CredentialSummary> {
        self.controller.get(id).await
    }

    pub async fn rename(&self, id: CredentialId, title: &str) -> CatalogResult<CredentialSummary> {
        self.controller.rename(id, title).await
    }

    pub async fn remove(&self, id: CredentialId) -> CatalogResult<CredentialSummary> {
        self.controller.remove(id).await
    }

    pub async fn connect(&self, id: CredentialId) -> CatalogResult<ConnectionState> {
        self.controller.connect(id).await
    }

    pub async fn refresh(&self, id: CredentialId) -> CatalogResult<ConnectionState> {
        self.controller.refresh(id).await
    }

    pub async fn disconnect(&self, id: CredentialId) -> CatalogResult<ConnectionState> {
        self.controller.disconnect(id).await
    }

    pub async fn disconnect_all(&self) -> DisconnectAllReport {
        self.controller.disconnect_all().await
    }

    pub async fn connect_all(&self) -> Vec<(CredentialId, CatalogResult<ConnectionState>)> {
        self.controller.connect_all().await
    }

    // ============ Local Files ============

    pub async fn set_local_files(&self, files: Vec<FileRecord>) {
        info!("[{}] Local files set: {}", self.owner(), files.len());
        *self.local_files.write().await = files;
    }

    /// Scan `root` and append its files to the local list.
    pub async fn add_local_root(&self, root: &Path) -> CatalogResult<usize> {
        let found = scan_directory(root, self.scan_depth)?;
        let count = found.len();
        self.local_files.write().await.extend(found);
        info!("[{}] Added {} local files from {}", self.owner(), count, root.display());
        Ok(count)
    }

    pub async fn local_files(&self) -> Vec<FileRecord> {
        self.local_files.read().await.clone()
    }

    // ============ Catalog ============

    /// Current merged catalog with the favorite overlay applied.
    pub async fn catalog(&self) -> FileCatalog {
        let local = self.local_files.read().await.clone();
        let sources = self.controller.sources().await;
        let favorites = self.favorites.read().await;
        FileCatalog::from_sources(local, &sources).with_favorites(&favorites)
    }

    /// Listing of one tab; file tabs are capped at the configured limit.
    pub async fn list(&self, tab: Tab) -> TabView {
        self.capped(self.catalog().await.by_tab(tab))
    }

    fn capped(&self, view: TabView) -> TabView {
        match view {
            TabView::Files(mut files) => {
                files.truncate(self.tab_limit);
                TabView::Files(files)
            }
            drives => drives,
        }
    }

    /// Flip the favorite overlay of a known file; `None` if the id is unknown.
    pub async fn toggle_favorite(&self, id: &str) -> Option<bool> {
        if !self.catalog().await.contains(id) {
            warn!("[{}] Favorite toggle for unknown file {}", self.owner(), id);
            return None;
        }
        let mut favorites = self.favorites.write().await;
        let now_favorite = if favorites.remove(id) {
            false
        } else {
            favorites.insert(id.to_string());
            true
        };
        info!("[{}] File {} favorite = {}", self.owner(), id, now_favorite);
        Some(now_favorite)
    }

    pub async fn search(&self, query: &str) -> Vec<FileRecord> {
        self.catalog()
            .await
            .search(query, self.filter.as_ref())
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn issues(&self) -> Vec<SourceIssue> {
        self.catalog().await.issues().to_vec()
    }

    /// Reconcile `ctx` with the current catalog and list its active tab.
    pub async fn view(&self, ctx: ViewContext) -> (ViewContext, TabView) {
        let catalog = self.catalog().await;
        let ctx = ctx.reconcile(&catalog);
        let view = self.capped(catalog.by_tab(ctx.active_tab));
        (ctx, view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{deep_tree, remote_file, two_drive_tree, Script, ScriptedGateway};
    use crate::gateway::{Drive, DriveTree, Folder, GatewayError};
    use crate::recency::Modified;
    use crate::record::{FileKind, SourceRef};

    fn config() -> CatalogConfig {
        CatalogConfig {
            connect_timeout_ms: 100,
            ..CatalogConfig::default()
        }
    }

    fn service(gateway: &Arc<ScriptedGateway>) -> CatalogService {
        CatalogService::new("owner-1", gateway.clone() as Arc<dyn DriveGateway>, &config())
    }

    fn local(id: &str) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            name: format!("{}.txt", id),
            file_type: "Document".to_string(),
            kind: FileKind::Document,
            modified_by: "me".to_string(),
            modified: Modified::Label("5 hours ago".to_string()),
            favorite: false,
            source: SourceRef::Local,
        }
    }

    async fn registered(service: &CatalogService, title: &str) -> CredentialId {
        service
            .register(NewCredential::new(title, format!("{}-token-0123456789", title)))
            .await
            .unwrap()
            .id
    }

    fn files(view: TabView) -> Vec<FileRecord> {
        match view {
            TabView::Files(files) => files,
            TabView::Drives(_) => panic!("expected a file view"),
        }
    }

    #[tokio::test]
    async fn test_disconnect_all_keeps_local_files() {
        let gateway = Arc::new(ScriptedGateway::new());
        let service = service(&gateway);
        service.set_local_files(vec![local("l1"), local("l2")]).await;
        let a = registered(&service, "a").await;
        let b = registered(&service, "b").await;
        registered(&service, "idle").await;
        gateway.push(a, Script::Tree(two_drive_tree("a")));
        gateway.push(b, Script::Fail(GatewayError::Network("down".to_string())));
        service.connect_all().await;
        assert_eq!(service.catalog().await.len(), 6);

        let report = service.disconnect_all().await;
        assert_eq!(report.disconnected.len(), 3);
        assert!(report.cancelled_in_flight.is_empty());

        assert!(service
            .credentials()
            .await
            .iter()
            .all(|c| c.state == ConnectionState::Disconnected));
        let catalog = service.catalog().await;
        assert_eq!(catalog.records(), &[local("l1"), local("l2")]);
        assert!(catalog.trees().is_empty());
        assert!(catalog.issues().is_empty());
    }

    #[tokio::test]
    async fn test_depth_overflow_isolated_to_one_source() {
        let gateway = Arc::new(ScriptedGateway::new());
        let service = service(&gateway);
        let d = registered(&service, "d").await;
        let e = registered(&service, "e").await;
        gateway.push(d, Script::Tree(deep_tree("d", 70)));
        gateway.push(e, Script::Tree(two_drive_tree("e")));

        for (_, outcome) in service.connect_all().await {
            assert_eq!(outcome.unwrap(), ConnectionState::Connected);
        }

        let catalog = service.catalog().await;
        assert!(catalog.get("d-bottom").is_none());
        assert_eq!(catalog.len(), 4);
        assert!(catalog.records().iter().all(|r| r.source == SourceRef::Credential(e)));

        let issues: Vec<SourceIssue> = service.issues().await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].credential_id, d);
        assert!(issues[0].message.contains("64"));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_files() {
        let gateway = Arc::new(ScriptedGateway::new());
        let service = service(&gateway);
        let c = registered(&service, "c").await;
        gateway.push(c, Script::Tree(two_drive_tree("s1")));
        gateway.push(c, Script::Hang);

        service.connect(c).await.unwrap();
        let before = service.catalog().await.records().to_vec();
        assert!(service.refresh(c).await.is_err());

        let credential = service.credential(c).await.unwrap();
        assert_eq!(credential.state, ConnectionState::Failed);
        assert_eq!(credential.retry_count, 1);
        let catalog = service.catalog().await;
        assert_eq!(catalog.records(), before.as_slice());
        assert_eq!(catalog.issues().len(), 1);

        service.disconnect(c).await.unwrap();
        assert!(service.catalog().await.is_empty());
    }

    #[tokio::test]
    async fn test_list_caps_file_tabs() {
        let gateway = Arc::new(ScriptedGateway::new());
        let service = service(&gateway);
        service
            .set_local_files((0..12).map(|i| local(&format!("l{}", i))).collect())
            .await;

        let recent = files(service.list(Tab::Recent).await);
        assert_eq!(recent.len(), 8);
        assert_eq!(recent[0].id, "l0");
        assert!(files(service.list(Tab::Favorites).await).is_empty());
        assert!(matches!(service.list(Tab::Drive).await, TabView::Drives(trees) if trees.is_empty()));
    }

    #[tokio::test]
    async fn test_toggle_favorite_overlay() {
        let gateway = Arc::new(ScriptedGateway::new());
        let service = service(&gateway);
        let c = registered(&service, "c").await;
        gateway.push(c, Script::Tree(two_drive_tree("c")));
        service.connect(c).await.unwrap();
        service.set_local_files(vec![local("l1")]).await;
        let before = service.catalog().await.records().to_vec();

        assert_eq!(service.toggle_favorite("c-d2-file1").await, Some(true));
        let favorites = files(service.list(Tab::Favorites).await);
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, "c-d2-file1");
        // The snapshot held by the controller is untouched
        let snapshot = service.controller().snapshot(c).await.unwrap();
        assert!(snapshot.files().unwrap().iter().all(|r| !r.favorite));

        assert_eq!(service.toggle_favorite("c-d2-file1").await, Some(false));
        assert_eq!(service.catalog().await.records(), before.as_slice());

        assert_eq!(service.toggle_favorite("nope").await, None);
        assert_eq!(service.catalog().await.records(), before.as_slice());
    }

    struct ModifierFilter;

    impl RecordFilter for ModifierFilter {
        fn matches(&self, record: &FileRecord, query: &str) -> bool {
            record.modified_by == query
        }
    }

    #[tokio::test]
    async fn test_search_with_custom_filter() {
        let gateway = Arc::new(ScriptedGateway::new());
        let service = service(&gateway).with_filter(ModifierFilter);
        let c = registered(&service, "c").await;
        let mut other = remote_file("theirs", "1 day ago");
        other.modified_by = Some("park".to_string());
        gateway.push(
            c,
            Script::Tree(DriveTree {
                drives: vec![Drive::new("d", "Team").with_folder(
                    Folder::new("a", "A")
                        .with_file(remote_file("mine", "2 hours ago"))
                        .with_file(other),
                )],
            }),
        );
        service.connect(c).await.unwrap();
        service.set_local_files(vec![local("l1")]).await;

        let hits = service.search("park").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "theirs");
        assert_eq!(service.search("").await.len(), 3);
    }

    #[tokio::test]
    async fn test_view_reconciles_context() {
        let gateway = Arc::new(ScriptedGateway::new());
        let service = service(&gateway);
        service.set_local_files(vec![local("l1")]).await;

        let ctx = ViewContext::new().select_file("l1");
        let (ctx, view) = service.view(ctx).await;
        assert_eq!(ctx.selected.as_deref(), Some("l1"));
        assert_eq!(files(view).len(), 1);

        service.set_local_files(Vec::new()).await;
        let (ctx, _) = service.view(ctx).await;
        assert!(ctx.selected.is_none());
        assert!(!ctx.preview_open);
    }

    #[tokio::test]
    async fn test_add_local_root() {
        let gateway = Arc::new(ScriptedGateway::new());
        let service = service(&gateway);
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.md"), b"# notes").unwrap();

        assert_eq!(service.add_local_root(dir.path()).await.unwrap(), 1);
        let records = service.local_files().await;
        assert_eq!(records[0].id, "local:notes.md");
        assert!(service.add_local_root(&dir.path().join("missing")).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_drops_contribution() {
        let gateway = Arc::new(ScriptedGateway::new());
        let service = service(&gateway);
        let c = registered(&service, "c").await;
        gateway.push(c, Script::Tree(two_drive_tree("c")));
        service.connect(c).await.unwrap();
        assert_eq!(service.catalog().await.len(), 4);

        service.remove(c).await.unwrap();
        assert!(service.catalog().await.is_empty());
        assert!(service.credentials().await.is_empty());
    }
}
