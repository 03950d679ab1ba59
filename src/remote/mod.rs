mod client;

pub use client::{DEFAULT_API_URL, DEFAULT_READ_TIMEOUT, DriveClient};

use serde::Deserialize;

use crate::error::RemoteError;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

/// Snapshot of one entry of the remote tree, fetched once per traversal step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteNode {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    /// Byte size, 0 for directories.
    pub size: u64,
    /// Hex md5 of the content; absent for directories and native documents.
    pub md5: Option<String>,
}

impl RemoteNode {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// Wire shape of a file resource as returned by the API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: String,
    // int64 values are serialized as strings
    size: Option<String>,
    md5_checksum: Option<String>,
}

impl DriveFile {
    fn into_node(self) -> Result<RemoteNode, RemoteError> {
        let kind = if self.mime_type == FOLDER_MIME_TYPE {
            NodeKind::Directory
        } else {
            NodeKind::File
        };
        let size = match self.size.as_deref() {
            Some(raw) => raw.parse::<u64>().map_err(|err| {
                RemoteError::Decode(format!("size {:?} of {}: {}", raw, self.id, err))
            })?,
            None => 0,
        };
        Ok(RemoteNode {
            id: self.id,
            name: self.name,
            kind,
            size,
            md5: self.md5_checksum.filter(|s| !s.is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

/// One page of a directory listing.
#[derive(Debug)]
pub struct ListPage {
    pub nodes: Vec<RemoteNode>,
    /// `None` once the last page has been served.
    pub next_page_token: Option<String>,
}

impl FileList {
    fn into_page(self) -> Result<ListPage, RemoteError> {
        Ok(ListPage {
            nodes: self
                .files
                .into_iter()
                .map(DriveFile::into_node)
                .collect::<Result<Vec<_>, _>>()?,
            next_page_token: self.next_page_token.filter(|t| !t.is_empty()),
        })
    }
}
