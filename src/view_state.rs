//! View context passed in and out of catalog operations.
//!
//! Holds which file is selected, whether the preview drawer is open, the
//! active tab and the expanded drive-tree nodes. Every operation consumes the
//! context and returns the updated one; nothing here is shared or global.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::catalog::{FileCatalog, Tab};
use crate::credential_store::CredentialId;
use crate::gateway::{Folder, TreeNode};

/// A node of one credential's drive tree. Node ids are only unique per source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    pub credential_id: CredentialId,
    pub node_id: String,
}

impl NodeKey {
    pub fn new(credential_id: CredentialId, node_id: impl Into<String>) -> Self {
        Self {
            credential_id,
            node_id: node_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewContext {
    pub selected: Option<String>,
    pub preview_open: bool,
    pub active_tab: Tab,
    /// Expand/collapse side table; the trees themselves are never touched
    pub expanded: HashSet<NodeKey>,
}

impl ViewContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a file and open its preview.
    pub fn select_file(mut self, id: impl Into<String>) -> Self {
        self.selected = Some(id.into());
        self.preview_open = true;
        self
    }

    /// Close the preview; the selection is dropped with it.
    pub fn close_preview(mut self) -> Self {
        self.preview_open = false;
        self.selected = None;
        self
    }

    pub fn switch_tab(mut self, tab: Tab) -> Self {
        if self.active_tab != tab {
            self.active_tab = tab;
            self.preview_open = false;
            self.selected = None;
        }
        self
    }

    pub fn toggle_expanded(mut self, key: NodeKey) -> Self {
        if !self.expanded.remove(&key) {
            self.expanded.insert(key);
        }
        self
    }

    pub fn is_expanded(&self, key: &NodeKey) -> bool {
        self.expanded.contains(key)
    }

    /// Drop a selection whose record left the catalog and expanded nodes
    /// that no longer exist in any live tree.
    pub fn reconcile(mut self, catalog: &FileCatalog) -> Self {
        if let Some(id) = &self.selected {
            if !catalog.contains(id) {
                self.selected = None;
                self.preview_open = false;
            }
        }

        let mut live = HashSet::new();
        for source in catalog.trees() {
            for drive in &source.tree.drives {
                live.insert(NodeKey::new(source.credential_id, drive.id.clone()));
                for folder in &drive.folders {
                    collect_folder_keys(source.credential_id, folder, &mut live);
                }
            }
        }
        self.expanded.retain(|key| live.contains(key));
        self
    }
}

fn collect_folder_keys(credential_id: CredentialId, folder: &Folder, out: &mut HashSet<NodeKey>) {
    out.insert(NodeKey::new(credential_id, folder.id.clone()));
    for child in &folder.children {
        if let TreeNode::Folder(sub) = child {
            collect_folder_keys(credential_id, sub, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Snapshot, SourceSnapshot};
    use crate::credential_store::{ConnectionState, CredentialSummary};
    use crate::gateway::testing::two_drive_tree;
    use crate::record::FileRecord;
    use chrono::Utc;
    use std::sync::Arc;

    fn catalog_for(id: CredentialId) -> FileCatalog {
        let sources = vec![SourceSnapshot {
            credential: CredentialSummary {
                id,
                title: "work".to_string(),
                masked_secret: "****".to_string(),
                state: ConnectionState::Connected,
                created_at: Utc::now(),
                last_used: None,
                retry_count: 0,
            },
            snapshot: Some(Arc::new(Snapshot::new(id, two_drive_tree("w"), 64))),
        }];
        FileCatalog::from_sources(Vec::<FileRecord>::new(), &sources)
    }

    #[test]
    fn test_select_and_close() {
        let ctx = ViewContext::new().select_file("f1");
        assert_eq!(ctx.selected.as_deref(), Some("f1"));
        assert!(ctx.preview_open);

        let ctx = ctx.close_preview();
        assert!(ctx.selected.is_none());
        assert!(!ctx.preview_open);
    }

    #[test]
    fn test_switch_tab_closes_preview() {
        let ctx = ViewContext::new().select_file("f1").switch_tab(Tab::Recent);
        assert!(ctx.preview_open);
        let ctx = ctx.switch_tab(Tab::Drive);
        assert_eq!(ctx.active_tab, Tab::Drive);
        assert!(!ctx.preview_open);
    }

    #[test]
    fn test_toggle_expanded_is_self_inverse() {
        let key = NodeKey::new(CredentialId::new(), "folder-a");
        let ctx = ViewContext::new().toggle_expanded(key.clone());
        assert!(ctx.is_expanded(&key));
        let ctx = ctx.toggle_expanded(key.clone());
        assert!(!ctx.is_expanded(&key));
    }

    #[test]
    fn test_same_node_id_in_two_sources_is_distinct() {
        let a = NodeKey::new(CredentialId::new(), "root-1");
        let b = NodeKey::new(CredentialId::new(), "root-1");
        let ctx = ViewContext::new().toggle_expanded(a.clone());
        assert!(ctx.is_expanded(&a));
        assert!(!ctx.is_expanded(&b));
    }

    #[test]
    fn test_reconcile_drops_stale_state() {
        let id = CredentialId::new();
        let catalog = catalog_for(id);

        let ctx = ViewContext::new()
            .select_file("w-d1-file1")
            .toggle_expanded(NodeKey::new(id, "w-d1-b"))
            .toggle_expanded(NodeKey::new(id, "w-d1-trash"))
            .toggle_expanded(NodeKey::new(CredentialId::new(), "w-d1-b"))
            .reconcile(&catalog);
        assert_eq!(ctx.selected.as_deref(), Some("w-d1-file1"));
        assert_eq!(ctx.expanded.len(), 1);

        let ctx = ctx.reconcile(&FileCatalog::default());
        assert!(ctx.selected.is_none());
        assert!(ctx.expanded.is_empty());
    }
}
