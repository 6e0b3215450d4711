//! File Catalog
//!
//! A derived view over local files and the snapshot of every connected
//! source. It is rebuilt on demand and never written back anywhere; the
//! favorite flag is applied as an overlay when the view is built.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::controller::SourceSnapshot;
use crate::credential_store::{ConnectionState, CredentialId};
use crate::error::CatalogError;
use crate::gateway::DriveTree;
use crate::record::FileRecord;

// ============ Tabs & Views ============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Recent,
    Favorites,
    Drive,
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tab::Recent => write!(f, "recent"),
            Tab::Favorites => write!(f, "favorites"),
            Tab::Drive => write!(f, "drive"),
        }
    }
}

impl FromStr for Tab {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recent" => Ok(Tab::Recent),
            "favorites" | "favourites" => Ok(Tab::Favorites),
            "drive" | "drives" => Ok(Tab::Drive),
            other => Err(CatalogError::Config(format!("unknown tab '{}'", other))),
        }
    }
}

/// Live tree of one credential with reserved containers hidden.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceTree {
    pub credential_id: CredentialId,
    pub title: String,
    pub tree: DriveTree,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "view", content = "items")]
pub enum TabView {
    Files(Vec<FileRecord>),
    Drives(Vec<SourceTree>),
}

/// Why a source contributes nothing, or only stale data, to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceIssue {
    pub credential_id: CredentialId,
    pub title: String,
    pub message: String,
}

// ============ Search ============

/// Pluggable match predicate used by `FileCatalog::search`.
pub trait RecordFilter: Send + Sync {
    fn matches(&self, record: &FileRecord, query: &str) -> bool;
}

/// Case-insensitive substring match over name, type and modifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringFilter;

impl RecordFilter for SubstringFilter {
    fn matches(&self, record: &FileRecord, query: &str) -> bool {
        let needle = query.to_lowercase();
        [&record.name, &record.file_type, &record.modified_by]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

// ============ Catalog ============

#[derive(Debug, Clone, Default)]
pub struct FileCatalog {
    records: Vec<FileRecord>,
    /// file id -> position in `records`
    index: HashMap<String, usize>,
    trees: Vec<SourceTree>,
    issues: Vec<SourceIssue>,
}

impl FileCatalog {
    /// Merge local files and any number of source sequences, deduplicated by
    /// id. A later record replaces an earlier one at the earlier position.
    pub fn merge<I, S>(local: Vec<FileRecord>, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: IntoIterator<Item = FileRecord>,
    {
        let mut catalog = Self::default();
        catalog.extend(local);
        for source in sources {
            catalog.extend(source);
        }
        catalog
    }

    /// Build the catalog from local files and the controller's sources.
    ///
    /// Every source holding a snapshot contributes it, including a Failed one
    /// whose last refresh did not go through. A tree that could not be
    /// flattened is reported as an issue and contributes nothing.
    pub fn from_sources(local: Vec<FileRecord>, sources: &[SourceSnapshot]) -> Self {
        let mut catalog = Self::default();
        catalog.extend(local);

        for source in sources {
            let credential = &source.credential;
            let issue = |message: String| SourceIssue {
                credential_id: credential.id,
                title: credential.title.clone(),
                message,
            };

            let Some(snapshot) = &source.snapshot else {
                if credential.state == ConnectionState::Failed {
                    catalog.issues.push(issue(format!(
                        "connection failed after {} attempt(s)",
                        credential.retry_count
                    )));
                }
                continue;
            };

            if credential.state == ConnectionState::Failed {
                catalog.issues.push(issue(format!(
                    "connection failed after {} attempt(s); showing data from {}",
                    credential.retry_count,
                    snapshot.fetched_at.format("%Y-%m-%d %H:%M")
                )));
            }

            match snapshot.files() {
                Ok(files) => catalog.extend(files.iter().cloned()),
                Err(e) => catalog.issues.push(issue(e.to_string())),
            }

            catalog.trees.push(SourceTree {
                credential_id: credential.id,
                title: credential.title.clone(),
                tree: snapshot.visible_tree().clone(),
            });
        }
        catalog
    }

    fn extend<S: IntoIterator<Item = FileRecord>>(&mut self, records: S) {
        for record in records {
            match self.index.get(&record.id) {
                Some(&pos) => self.records[pos] = record,
                None => {
                    self.index.insert(record.id.clone(), self.records.len());
                    self.records.push(record);
                }
            }
        }
    }

    /// Apply the favorite overlay: a record is a favorite iff its id is in the set.
    pub fn with_favorites(mut self, favorites: &HashSet<String>) -> Self {
        for record in &mut self.records {
            record.favorite = favorites.contains(&record.id);
        }
        self
    }

    /// Flip the favorite flag of one record; `None` if the id is unknown.
    pub fn toggle_favorite(&mut self, id: &str) -> Option<bool> {
        let pos = *self.index.get(id)?;
        let record = &mut self.records[pos];
        record.favorite = !record.favorite;
        Some(record.favorite)
    }

    pub fn get(&self, id: &str) -> Option<&FileRecord> {
        self.index.get(id).map(|&pos| &self.records[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in merge order
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn issues(&self) -> &[SourceIssue] {
        &self.issues
    }

    pub fn trees(&self) -> &[SourceTree] {
        &self.trees
    }

    /// Most recent first. Ties keep merge order.
    pub fn recent_order(&self) -> Vec<&FileRecord> {
        let mut ordered: Vec<&FileRecord> = self.records.iter().collect();
        ordered.sort_by_key(|r| r.modified.recency_key());
        ordered
    }

    pub fn favorites_view(&self) -> Vec<&FileRecord> {
        self.recent_order().into_iter().filter(|r| r.favorite).collect()
    }

    /// Records matching `query` in recency order. An empty query matches all.
    pub fn search(&self, query: &str, filter: &dyn RecordFilter) -> Vec<&FileRecord> {
        let query = query.trim();
        self.recent_order()
            .into_iter()
            .filter(|r| query.is_empty() || filter.matches(r, query))
            .collect()
    }

    pub fn by_tab(&self, tab: Tab) -> TabView {
        match tab {
            Tab::Recent => TabView::Files(self.recent_order().into_iter().cloned().collect()),
            Tab::Favorites => TabView::Files(self.favorites_view().into_iter().cloned().collect()),
            Tab::Drive => TabView::Drives(self.trees.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential_store::CredentialSummary;
    use crate::controller::Snapshot;
    use crate::gateway::testing::{deep_tree, two_drive_tree};
    use crate::gateway::TreeNode;
    use crate::recency::Modified;
    use crate::record::{FileKind, SourceRef};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn record(id: &str, name: &str, modified: Modified, source: SourceRef) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            name: name.to_string(),
            file_type: "Document".to_string(),
            kind: FileKind::Document,
            modified_by: "kim".to_string(),
            modified,
            favorite: false,
            source,
        }
    }

    fn label(id: &str, text: &str) -> FileRecord {
        record(id, &format!("{}.docx", id), Modified::Label(text.to_string()), SourceRef::Local)
    }

    fn ids(records: &[&FileRecord]) -> Vec<String> {
        records.iter().map(|r| r.id.clone()).collect()
    }

    fn summary(id: CredentialId, title: &str, state: ConnectionState) -> CredentialSummary {
        CredentialSummary {
            id,
            title: title.to_string(),
            masked_secret: "****".to_string(),
            state,
            created_at: Utc::now(),
            last_used: None,
            retry_count: if state == ConnectionState::Failed { 1 } else { 0 },
        }
    }

    #[test]
    fn test_merge_last_wins_in_place() {
        let owner = CredentialId::new();
        let local = vec![label("a", "1 day ago"), label("b", "2 days ago")];
        let mut replacement = label("a", "2 hours ago");
        replacement.source = SourceRef::Credential(owner);
        let catalog = FileCatalog::merge(local, vec![vec![replacement, label("c", "1 week ago")]]);

        let merged: Vec<&FileRecord> = catalog.records().iter().collect();
        assert_eq!(ids(&merged), vec!["a", "b", "c"]);
        assert_eq!(catalog.get("a").unwrap().source, SourceRef::Credential(owner));
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_toggle_favorite_is_self_inverse() {
        let mut catalog = FileCatalog::merge(vec![label("a", "1 day ago")], Vec::<Vec<FileRecord>>::new());
        let before = catalog.records().to_vec();

        assert_eq!(catalog.toggle_favorite("a"), Some(true));
        assert_eq!(catalog.favorites_view().len(), 1);
        assert_eq!(catalog.toggle_favorite("a"), Some(false));
        assert_eq!(catalog.records(), before.as_slice());

        assert_eq!(catalog.toggle_favorite("missing"), None);
        assert_eq!(catalog.records(), before.as_slice());
    }

    #[test]
    fn test_recent_order_mixed() {
        let at = |d: u32| Modified::At(Utc.with_ymd_and_hms(2024, 5, d, 0, 0, 0).unwrap());
        let catalog = FileCatalog::merge(
            vec![
                label("week", "1 week ago"),
                label("odd", "sometime"),
                record("old", "old.pdf", at(1), SourceRef::Local),
                label("hours", "2 hours ago"),
                label("day", "1일 전"),
                record("new", "new.pdf", at(3), SourceRef::Local),
            ],
            Vec::<Vec<FileRecord>>::new(),
        );
        assert_eq!(
            ids(&catalog.recent_order()),
            vec!["new", "old", "hours", "day", "week", "odd"]
        );
    }

    #[test]
    fn test_favorites_overlay() {
        let catalog = FileCatalog::merge(
            vec![label("a", "1 week ago"), label("b", "2 hours ago"), label("c", "1 day ago")],
            Vec::<Vec<FileRecord>>::new(),
        );
        let favorites: HashSet<String> = ["a".to_string(), "b".to_string(), "gone".to_string()].into();
        let catalog = catalog.with_favorites(&favorites);
        assert_eq!(ids(&catalog.favorites_view()), vec!["b", "a"]);
    }

    #[test]
    fn test_search() {
        let mut report = label("r", "1 day ago");
        report.name = "Quarterly Report.xlsx".to_string();
        report.file_type = "Spreadsheet".to_string();
        let mut memo = label("m", "2 hours ago");
        memo.modified_by = "Lee".to_string();
        let catalog = FileCatalog::merge(vec![report, memo], Vec::<Vec<FileRecord>>::new());

        assert_eq!(ids(&catalog.search("report", &SubstringFilter)), vec!["r"]);
        assert_eq!(ids(&catalog.search("SPREAD", &SubstringFilter)), vec!["r"]);
        assert_eq!(ids(&catalog.search("lee", &SubstringFilter)), vec!["m"]);
        assert_eq!(ids(&catalog.search("  ", &SubstringFilter)), vec!["m", "r"]);
        assert!(catalog.search("nothing", &SubstringFilter).is_empty());
    }

    #[test]
    fn test_from_sources_reports_issues_and_hides_reserved() {
        let good = CredentialId::new();
        let stale = CredentialId::new();
        let broken = CredentialId::new();
        let gone = CredentialId::new();

        let sources = vec![
            SourceSnapshot {
                credential: summary(good, "good", ConnectionState::Connected),
                snapshot: Some(Arc::new(Snapshot::new(good, two_drive_tree("g"), 64))),
            },
            SourceSnapshot {
                credential: summary(stale, "stale", ConnectionState::Failed),
                snapshot: Some(Arc::new(Snapshot::new(stale, two_drive_tree("s"), 64))),
            },
            SourceSnapshot {
                credential: summary(broken, "broken", ConnectionState::Connected),
                snapshot: Some(Arc::new(Snapshot::new(broken, two_drive_tree("b"), 1))),
            },
            SourceSnapshot {
                credential: summary(gone, "gone", ConnectionState::Failed),
                snapshot: None,
            },
        ];
        let catalog = FileCatalog::from_sources(vec![label("local", "1 day ago")], &sources);

        assert_eq!(catalog.len(), 9);
        assert!(catalog.get("b-d1-file1").is_none());
        assert!(catalog.get("g-d1-hidden").is_none());

        let titles: Vec<&str> = catalog.issues().iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["stale", "broken", "gone"]);

        match catalog.by_tab(Tab::Drive) {
            TabView::Drives(trees) => {
                assert_eq!(trees.len(), 3);
                assert!(trees.iter().all(|t| t.tree.drives.iter().all(|d| d.name != "trash")));
                assert!(trees[0].tree.drives[0].folders.iter().all(|f| f.name == "A"));
            }
            other => panic!("unexpected view {:?}", other),
        }
    }

    #[test]
    fn test_drive_tab_cut_at_depth_limit() {
        let deep = CredentialId::new();
        let sources = vec![SourceSnapshot {
            credential: summary(deep, "deep", ConnectionState::Connected),
            snapshot: Some(Arc::new(Snapshot::new(deep, deep_tree("d", 70), 64))),
        }];
        let catalog = FileCatalog::from_sources(Vec::new(), &sources);
        assert!(catalog.is_empty());
        assert_eq!(catalog.issues().len(), 1);

        let trees = catalog.trees();
        assert_eq!(trees.len(), 1);
        let mut folder = &trees[0].tree.drives[0].folders[0];
        let mut levels = 1;
        while let Some(TreeNode::Folder(sub)) = folder.children.first() {
            folder = sub;
            levels += 1;
        }
        assert_eq!(levels, 64);
        assert_eq!(folder.id, "d-f64");
        assert!(folder.children.is_empty());
    }

    #[test]
    fn test_tab_parsing() {
        assert_eq!("Recent".parse::<Tab>().unwrap(), Tab::Recent);
        assert_eq!("drives".parse::<Tab>().unwrap(), Tab::Drive);
        assert!("settings".parse::<Tab>().is_err());
    }
}
