use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, header};
use tracing::debug;

use super::{DriveFile, FileList, ListPage, RemoteNode};
use crate::error::RemoteError;

pub const DEFAULT_API_URL: &str = "https://www.googleapis.com/drive/v3";

const NODE_FIELDS: &str = "id,name,size,mimeType,md5Checksum";
const PAGE_SIZE: &str = "1000";

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Authenticated handle on the remote store: listing, metadata and ranged reads.
///
/// Cloning is cheap, the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct DriveClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl DriveClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, RemoteError> {
        Self::with_read_timeout(base_url, token, DEFAULT_READ_TIMEOUT)
    }

    /// A read that stays idle longer than `read_timeout` fails, so a stalled
    /// media stream ends up on the retry path instead of hanging.
    pub fn with_read_timeout(
        base_url: impl Into<String>,
        token: Option<String>,
        read_timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(read_timeout)
            .build()?;
        Ok(Self::with_client(http, base_url, token))
    }

    pub fn with_client(http: Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        DriveClient {
            http,
            base_url,
            token,
        }
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self.http.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn metadata(&self, node_id: &str) -> Result<RemoteNode, RemoteError> {
        let response = self
            .get(&format!("{}/files/{}", self.base_url, node_id))
            .query(&[("fields", NODE_FIELDS), ("supportsAllDrives", "true")])
            .send()
            .await?;
        let file: DriveFile = check(response)
            .await?
            .json()
            .await
            .map_err(|err| RemoteError::Decode(err.to_string()))?;
        file.into_node()
    }

    /// Fetches one page of the children of `dir_id`.
    pub async fn list_page(
        &self,
        dir_id: &str,
        page_token: Option<&str>,
    ) -> Result<ListPage, RemoteError> {
        let q = format!("'{}' in parents and trashed = false", dir_id);
        let fields = format!("nextPageToken,files({})", NODE_FIELDS);
        let mut request = self.get(&format!("{}/files", self.base_url)).query(&[
            ("q", q.as_str()),
            ("fields", fields.as_str()),
            ("orderBy", "folder"),
            ("pageSize", PAGE_SIZE),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        let list: FileList = check(request.send().await?)
            .await?
            .json()
            .await
            .map_err(|err| RemoteError::Decode(err.to_string()))?;
        list.into_page()
    }

    /// Concatenates every page of the listing, in the order the server returns them.
    pub async fn list_children(&self, dir_id: &str) -> Result<Vec<RemoteNode>, RemoteError> {
        let mut children = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.list_page(dir_id, page_token.as_deref()).await?;
            debug!(
                dir = dir_id,
                entries = page.nodes.len(),
                more = page.next_page_token.is_some(),
                "listed page"
            );
            children.extend(page.nodes);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(children),
            }
        }
    }

    /// Opens the media stream for bytes `[start, size)` of a file.
    ///
    /// A `start` of 0 requests the whole file without a `Range` header.
    pub async fn open_range(
        &self,
        file_id: &str,
        start: u64,
        size: u64,
        acknowledge_abuse: bool,
    ) -> Result<Response, RemoteError> {
        let mut request = self
            .get(&format!("{}/files/{}", self.base_url, file_id))
            .query(&[("alt", "media"), ("supportsAllDrives", "true")]);
        if acknowledge_abuse {
            request = request.query(&[("acknowledgeAbuse", "true")]);
        }
        if start > 0 {
            let range = if size > start {
                format!("bytes={}-{}", start, size - 1)
            } else {
                format!("bytes={}-", start)
            };
            request = request.header(header::RANGE, range);
        }
        check(request.send().await?).await
    }
}

async fn check(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::from_status(status.as_u16(), &body))
}
