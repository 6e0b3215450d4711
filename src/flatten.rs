//! Tree Flattener
//!
//! Depth-first linearization of one credential's drive tree into file
//! records: drives in order, then each drive's folders, and within a folder
//! its subfolders (recursively) before its own files. Reserved containers are
//! skipped together with everything below them.
//!
//! The input is trusted to be acyclic only up to `max_depth`: a folder nested
//! deeper than that aborts the whole tree with `TraversalDepthExceeded`.

use crate::credential_store::CredentialId;
use crate::error::{CatalogError, CatalogResult};
use crate::gateway::{is_reserved_name, DriveTree, Folder, RemoteFile};
use crate::record::{FileRecord, SourceRef};

pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Label used when a source does not say who last touched a file
const UNKNOWN_MODIFIER: &str = "unknown";

pub fn flatten_tree(tree: &DriveTree, owner: CredentialId, max_depth: usize) -> CatalogResult<Vec<FileRecord>> {
    let mut out = Vec::new();
    for drive in tree.drives.iter().filter(|d| !is_reserved_name(&d.name)) {
        for folder in drive.folders.iter().filter(|f| !is_reserved_name(&f.name)) {
            walk(folder, 1, owner, max_depth, &mut out)?;
        }
    }
    Ok(out)
}

fn walk(
    folder: &Folder,
    depth: usize,
    owner: CredentialId,
    max_depth: usize,
    out: &mut Vec<FileRecord>,
) -> CatalogResult<()> {
    if depth > max_depth {
        return Err(CatalogError::TraversalDepthExceeded { id: owner, max_depth });
    }
    for sub in folder.subfolders().filter(|f| !is_reserved_name(&f.name)) {
        walk(sub, depth + 1, owner, max_depth, out)?;
    }
    out.extend(folder.files().map(|file| to_record(file, owner)));
    Ok(())
}

fn to_record(file: &RemoteFile, owner: CredentialId) -> FileRecord {
    let kind = file.kind();
    FileRecord {
        id: file.id.clone(),
        name: file.name.clone(),
        file_type: kind.label().to_string(),
        kind,
        modified_by: file
            .modified_by
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_MODIFIER.to_string()),
        modified: file.modified.clone(),
        favorite: false,
        source: SourceRef::Credential(owner),
    }
}
