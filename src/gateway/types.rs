//! Shared types for drive source gateways
//!
//! The tree a gateway returns is an explicit recursive-ownership structure:
//! a drive owns its top-level folders, a folder owns its children, and there
//! are no back-references. Folder children form a closed `Folder`/`File`
//! variant pair so a single traversal covers every node shape.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::credential_store::{Credential, CredentialId};
use crate::record::FileKind;
use crate::recency::Modified;

/// Container names that are structural and never shown to users
pub const RESERVED_CONTAINER_NAMES: &[&str] = &["root", "trash"];

pub fn is_reserved_name(name: &str) -> bool {
    RESERVED_CONTAINER_NAMES.contains(&name)
}

/// What a gateway needs to reach one source.
#[derive(Debug, Clone)]
pub struct GatewayCredential {
    pub id: CredentialId,
    pub title: String,
    pub secret: SecretString,
}

impl From<&Credential> for GatewayCredential {
    fn from(credential: &Credential) -> Self {
        Self {
            id: credential.id,
            title: credential.title.clone(),
            secret: credential.secret().clone(),
        }
    }
}

/// Everything one credential can see: a forest of drives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveTree {
    pub drives: Vec<Drive>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drive {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub folders: Vec<Folder>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum TreeNode {
    Folder(Folder),
    File(RemoteFile),
}

/// A file as reported by the source, before it is tagged with its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub mime_type: Option<String>,
    pub modified_by: Option<String>,
    pub modified: Modified,
}

impl RemoteFile {
    pub fn kind(&self) -> FileKind {
        FileKind::classify(&self.name, self.mime_type.as_deref())
    }
}

impl Drive {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            folders: Vec::new(),
        }
    }

    pub fn with_folder(mut self, folder: Folder) -> Self {
        self.folders.push(folder);
        self
    }
}

impl Folder {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn with_folder(mut self, folder: Folder) -> Self {
        self.children.push(TreeNode::Folder(folder));
        self
    }

    pub fn with_file(mut self, file: RemoteFile) -> Self {
        self.children.push(TreeNode::File(file));
        self
    }

    pub fn subfolders(&self) -> impl Iterator<Item = &Folder> {
        self.children.iter().filter_map(|node| match node {
            TreeNode::Folder(folder) => Some(folder),
            TreeNode::File(_) => None,
        })
    }

    pub fn files(&self) -> impl Iterator<Item = &RemoteFile> {
        self.children.iter().filter_map(|node| match node {
            TreeNode::File(file) => Some(file),
            TreeNode::Folder(_) => None,
        })
    }
}

impl DriveTree {
    /// Copy of the tree with reserved drives and folders removed at every
    /// level and folders below `max_depth` cut off.
    ///
    /// A folder directly under a drive is at depth 1.
    pub fn without_reserved(&self, max_depth: usize) -> DriveTree {
        fn prune(folder: &Folder, depth: usize, max_depth: usize) -> Folder {
            Folder {
                id: folder.id.clone(),
                name: folder.name.clone(),
                children: folder
                    .children
                    .iter()
                    .filter_map(|node| match node {
                        TreeNode::Folder(f) if is_reserved_name(&f.name) || depth >= max_depth => None,
                        TreeNode::Folder(f) => Some(TreeNode::Folder(prune(f, depth + 1, max_depth))),
                        TreeNode::File(file) => Some(TreeNode::File(file.clone())),
                    })
                    .collect(),
            }
        }

        DriveTree {
            drives: self
                .drives
                .iter()
                .filter(|d| !is_reserved_name(&d.name))
                .map(|d| Drive {
                    id: d.id.clone(),
                    name: d.name.clone(),
                    folders: d
                        .folders
                        .iter()
                        .filter(|f| !is_reserved_name(&f.name) && max_depth > 0)
                        .map(|f| prune(f, 1, max_depth))
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Gateway failure modes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout")]
    Timeout,
}
