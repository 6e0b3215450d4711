//! Dooray Drive Gateway
//!
//! Implements `DriveGateway` for the Dooray drive API. The full tree is
//! assembled with one request for the drive list, then per folder level one
//! request for the subfolders and one for the files.

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    DriveGateway, Drive, DriveTree, Folder, GatewayCredential, GatewayError, RemoteFile, TreeNode,
};
use crate::recency::Modified;

/// Public cloud endpoint
pub const DOORAY_API_BASE: &str = "https://api.dooray.com";

/// Per-request transport timeout; the controller applies its own overall bound.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Envelope every Dooray endpoint answers with
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DoorayDrive {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    project: Option<DoorayProject>,
}

#[derive(Debug, Deserialize)]
struct DoorayProject {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DoorayEntry {
    id: String,
    name: String,
    #[serde(rename = "type", default)]
    entry_type: String,
    #[serde(default)]
    has_folders: bool,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    last_updater: Option<serde_json::Value>,
    #[serde(default)]
    creator: Option<serde_json::Value>,
}

impl DoorayDrive {
    fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.project.as_ref().and_then(|p| p.code.clone()))
            .unwrap_or_else(|| self.id.clone())
    }
}

impl DoorayEntry {
    fn is_file(&self) -> bool {
        self.entry_type == "file"
    }

    fn into_remote_file(self) -> RemoteFile {
        let modified_by = self
            .last_updater
            .as_ref()
            .or(self.creator.as_ref())
            .and_then(member_name);
        RemoteFile {
            modified: self
                .updated_at
                .as_deref()
                .map(Modified::parse)
                .unwrap_or_else(|| Modified::Label(String::new())),
            id: self.id,
            name: self.name,
            mime_type: self.mime_type,
            modified_by,
        }
    }
}

/// Pull a human-readable name out of a Dooray member reference.
fn member_name(value: &serde_json::Value) -> Option<String> {
    let candidates = [
        value.pointer("/member/name"),
        value.pointer("/name"),
        value.pointer("/member/organizationMemberId"),
        value.pointer("/emailUser/emailAddress"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().map(str::to_string))
}

/// Dooray drive gateway
pub struct DoorayGateway {
    client: reqwest::Client,
    base_url: String,
    /// Recursion stops below this many folder levels
    max_depth: usize,
}

impl DoorayGateway {
    pub fn new(base_url: impl Into<String>, max_depth: usize) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_depth,
        })
    }

    fn auth_header(credential: &GatewayCredential) -> Result<HeaderValue, GatewayError> {
        HeaderValue::from_str(&format!("dooray-api {}", credential.secret.expose_secret()))
            .map_err(|_| GatewayError::Auth("token contains invalid characters".to_string()))
    }

    fn drives_url(&self) -> String {
        format!("{}/drive/v1/drives?type=private", self.base_url)
    }

    fn folders_url(&self, drive_id: &str, parent_id: Option<&str>) -> String {
        let mut url = format!(
            "{}/drive/v1/drives/{}/files?type=folder",
            self.base_url,
            urlencoding::encode(drive_id)
        );
        if let Some(parent) = parent_id {
            url.push_str(&format!("&parentId={}", urlencoding::encode(parent)));
        }
        url
    }

    fn files_url(&self, drive_id: &str, parent_id: &str) -> String {
        format!(
            "{}/drive/v1/drives/{}/files?parentId={}",
            self.base_url,
            urlencoding::encode(drive_id),
            urlencoding::encode(parent_id)
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        credential: &GatewayCredential,
        url: &str,
    ) -> Result<Vec<T>, GatewayError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, Self::auth_header(credential)?)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_status(status, &text));
        }

        let body: ApiResponse<Vec<T>> = response
            .json()
            .await
            .map_err(|e| GatewayError::Network(format!("Malformed response: {}", e)))?;
        Ok(body.result.unwrap_or_default())
    }

    /// Folders below `parent_id` (or the drive top level) with their content.
    fn fetch_folders<'a>(
        &'a self,
        credential: &'a GatewayCredential,
        drive_id: &'a str,
        parent_id: Option<&'a str>,
        depth: usize,
    ) -> BoxFuture<'a, Result<Vec<Folder>, GatewayError>> {
        async move {
            let entries: Vec<DoorayEntry> = self
                .get_json(credential, &self.folders_url(drive_id, parent_id))
                .await?;

            let mut folders = Vec::with_capacity(entries.len());
            for entry in entries {
                let mut folder = Folder::new(entry.id.clone(), entry.name.clone());

                if entry.has_folders {
                    if depth <= self.max_depth {
                        let subfolders = self
                            .fetch_folders(credential, drive_id, Some(&entry.id), depth + 1)
                            .await?;
                        folder.children.extend(subfolders.into_iter().map(TreeNode::Folder));
                    } else {
                        warn!(
                            "Stopping descent into {} of drive {}: deeper than {} levels",
                            entry.name, drive_id, self.max_depth
                        );
                    }
                }

                let files: Vec<DoorayEntry> = self
                    .get_json(credential, &self.files_url(drive_id, &entry.id))
                    .await?;
                folder.children.extend(
                    files
                        .into_iter()
                        .filter(DoorayEntry::is_file)
                        .map(|f| TreeNode::File(f.into_remote_file())),
                );

                folders.push(folder);
            }
            Ok(folders)
        }
        .boxed()
    }
}

/// Map a non-success HTTP status to a gateway error
fn map_status(status: StatusCode, body: &str) -> GatewayError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GatewayError::Auth(format!("HTTP {}", status.as_u16()))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => GatewayError::Timeout,
        _ => {
            let snippet: String = body.chars().take(200).collect();
            GatewayError::Network(format!("HTTP {}: {}", status.as_u16(), snippet))
        }
    }
}

#[async_trait]
impl DriveGateway for DoorayGateway {
    fn name(&self) -> &str {
        "dooray"
    }

    async fn fetch_tree(&self, credential: &GatewayCredential) -> Result<DriveTree, GatewayError> {
        let drives: Vec<DoorayDrive> = self.get_json(credential, &self.drives_url()).await?;
        info!("Dooray returned {} drives for {}", drives.len(), credential.title);

        let mut tree = DriveTree::default();
        for drive in drives {
            let folders = self.fetch_folders(credential, &drive.id, None, 1).await?;
            let mut node = Drive::new(drive.id.clone(), drive.display_name());
            node.folders = folders;
            tree.drives.push(node);
        }
        Ok(tree)
    }
}
