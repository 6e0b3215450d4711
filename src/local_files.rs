//! Local file discovery
//!
//! Walks a directory and turns its regular files into catalog records owned
//! by the local source.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{CatalogError, CatalogResult};
use crate::recency::Modified;
use crate::record::{FileKind, FileRecord, SourceRef};

/// Owner label of every local record
pub const LOCAL_OWNER: &str = "me";

/// Stop after this many files per root
const MAX_LOCAL_FILES: usize = 20_000;

/// Scan `root` for regular files, at most `max_depth` directory levels deep.
///
/// Record ids are `local:<path relative to root>` with `/` separators.
/// Hidden entries are skipped, symlinks are not followed.
pub fn scan_directory(root: &Path, max_depth: usize) -> CatalogResult<Vec<FileRecord>> {
    if !root.is_dir() {
        return Err(CatalogError::Config(format!("{} is not a directory", root.display())));
    }

    let mut records = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name().to_string_lossy().as_ref()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if records.len() >= MAX_LOCAL_FILES {
            warn!("Stopping scan of {} at {} files", root.display(), MAX_LOCAL_FILES);
            break;
        }

        let relative = match entry.path().strip_prefix(root) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let name = entry.file_name().to_string_lossy().to_string();
        let kind = FileKind::classify(&name, None);
        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(|t| Modified::At(DateTime::<Utc>::from(t)))
            .unwrap_or_else(|| Modified::Label(String::new()));

        records.push(FileRecord {
            id: format!("local:{}", relative),
            name,
            file_type: kind.label().to_string(),
            kind,
            modified_by: LOCAL_OWNER.to_string(),
            modified,
            favorite: false,
            source: SourceRef::Local,
        });
    }

    debug!("Found {} local files under {}", records.len(), root.display());
    Ok(records)
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}
