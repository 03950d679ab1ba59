//! In-process mock of the Drive endpoints the downloader talks to.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::config::TransferConfig;
use crate::remote::{DriveClient, FOLDER_MIME_TYPE};

pub const TEST_TOKEN: &str = "test-token";

pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Deterministic, non-repeating-looking content of `len` bytes.
pub fn content(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// Config with millisecond delays and no progress bars.
pub fn fast_config(concurrency: usize) -> TransferConfig {
    TransferConfig {
        concurrency,
        request_retry_delay: Duration::from_millis(10),
        backoff_unit: Duration::from_millis(5),
        silent: true,
        ..TransferConfig::default()
    }
}

#[derive(Debug, Clone)]
pub enum Fault {
    /// Answer the media request with this status and body.
    Status(u16, &'static str),
    /// Send `after` bytes of the requested range, then drop the connection.
    Abort { after: usize },
    /// Send `after` bytes of the requested range, then go silent.
    Stall { after: usize },
}

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    name: String,
    content: Option<Vec<u8>>,
    with_md5: bool,
}

#[derive(Debug, Clone)]
pub struct MediaRequest {
    pub id: String,
    pub range: Option<String>,
    pub acknowledge_abuse: bool,
    pub authorization: Option<String>,
}

#[derive(Default)]
pub struct MockDrive {
    entries: HashMap<String, Entry>,
    children: HashMap<String, Vec<String>>,
    faults: HashMap<String, VecDeque<Fault>>,
    page_size: usize,
    ignore_range: bool,
    media_delay: Duration,
}

impl MockDrive {
    pub fn new() -> Self {
        MockDrive {
            page_size: 1000,
            ..MockDrive::default()
        }
    }

    fn insert(mut self, entry: Entry, parent: Option<&str>) -> Self {
        if let Some(parent) = parent {
            self.children
                .entry(parent.to_string())
                .or_default()
                .push(entry.id.clone());
        }
        self.entries.insert(entry.id.clone(), entry);
        self
    }

    pub fn dir(self, id: &str, name: &str, parent: Option<&str>) -> Self {
        let entry = Entry {
            id: id.to_string(),
            name: name.to_string(),
            content: None,
            with_md5: false,
        };
        self.insert(entry, parent)
    }

    pub fn file(self, id: &str, name: &str, parent: Option<&str>, data: &[u8]) -> Self {
        let entry = Entry {
            id: id.to_string(),
            name: name.to_string(),
            content: Some(data.to_vec()),
            with_md5: true,
        };
        self.insert(entry, parent)
    }

    pub fn file_without_md5(self, id: &str, name: &str, parent: Option<&str>, data: &[u8]) -> Self {
        let entry = Entry {
            id: id.to_string(),
            name: name.to_string(),
            content: Some(data.to_vec()),
            with_md5: false,
        };
        self.insert(entry, parent)
    }

    /// Lists an existing node under one more parent.
    pub fn link(mut self, id: &str, parent: &str) -> Self {
        self.children
            .entry(parent.to_string())
            .or_default()
            .push(id.to_string());
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    pub fn ignore_range(mut self) -> Self {
        self.ignore_range = true;
        self
    }

    pub fn media_delay(mut self, delay: Duration) -> Self {
        self.media_delay = delay;
        self
    }

    /// Queues a fault for the next media request of `id`.
    pub fn fault(mut self, id: &str, fault: Fault) -> Self {
        self.faults.entry(id.to_string()).or_default().push_back(fault);
        self
    }

    pub async fn serve(self) -> MockServer {
        let state = Arc::new(MockState {
            faults: Mutex::new(self.faults.clone()),
            drive: self,
            media_log: Mutex::new(Vec::new()),
            list_log: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        });
        let app = Router::new()
            .route("/files", get(list))
            .route("/files/{id}", get(get_file))
            .with_state(Arc::clone(&state));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        MockServer {
            url: format!("http://{}", addr),
            state,
        }
    }
}

struct MockState {
    drive: MockDrive,
    faults: Mutex<HashMap<String, VecDeque<Fault>>>,
    media_log: Mutex<Vec<MediaRequest>>,
    list_log: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

pub struct MockServer {
    pub url: String,
    state: Arc<MockState>,
}

impl MockServer {
    pub fn client(&self) -> DriveClient {
        DriveClient::new(self.url.clone(), Some(TEST_TOKEN.to_string())).unwrap()
    }

    pub fn client_with_read_timeout(&self, read_timeout: Duration) -> DriveClient {
        DriveClient::with_read_timeout(self.url.clone(), Some(TEST_TOKEN.to_string()), read_timeout)
            .unwrap()
    }

    pub fn media_requests(&self) -> Vec<MediaRequest> {
        self.state.media_log.lock().unwrap().clone()
    }

    pub fn media_requests_for(&self, id: &str) -> Vec<MediaRequest> {
        self.media_requests()
            .into_iter()
            .filter(|r| r.id == id)
            .collect()
    }

    /// Directory ids in the order their listing pages were requested.
    pub fn list_requests(&self) -> Vec<String> {
        self.state.list_log.lock().unwrap().clone()
    }

    /// Highest number of media requests served at the same time.
    pub fn max_active(&self) -> usize {
        self.state.max_active.load(Ordering::SeqCst)
    }
}

fn node_json(entry: &Entry) -> Value {
    match &entry.content {
        None => json!({"id": entry.id, "name": entry.name, "mimeType": FOLDER_MIME_TYPE}),
        Some(data) => {
            let mut value = json!({
                "id": entry.id,
                "name": entry.name,
                "mimeType": "application/octet-stream",
                "size": data.len().to_string(),
            });
            if entry.with_md5 {
                value["md5Checksum"] = json!(md5_hex(data));
            }
            value
        }
    }
}

fn not_found(id: &str) -> Response {
    let body = json!({"error": {"code": 404, "message": format!("File not found: {}", id)}});
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

async fn list(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let q = params.get("q").cloned().unwrap_or_default();
    let parent = q.split('\'').nth(1).unwrap_or_default().to_string();
    state.list_log.lock().unwrap().push(parent.clone());

    let ids = state
        .drive
        .children
        .get(&parent)
        .cloned()
        .unwrap_or_default();
    let start: usize = params
        .get("pageToken")
        .and_then(|t| t.parse().ok())
        .unwrap_or(0);
    let end = (start + state.drive.page_size).min(ids.len());
    let files: Vec<Value> = ids[start.min(end)..end]
        .iter()
        .filter_map(|id| state.drive.entries.get(id))
        .map(node_json)
        .collect();

    let mut body = json!({ "files": files });
    if end < ids.len() {
        body["nextPageToken"] = json!(end.to_string());
    }
    Json(body).into_response()
}

struct ActiveGuard<'a>(&'a MockState);

impl<'a> ActiveGuard<'a> {
    fn enter(state: &'a MockState) -> Self {
        let now = state.active.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_active.fetch_max(now, Ordering::SeqCst);
        ActiveGuard(state)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn get_file(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let Some(entry) = state.drive.entries.get(&id) else {
        return not_found(&id);
    };
    if params.get("alt").map(String::as_str) != Some("media") {
        return Json(node_json(entry)).into_response();
    }

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    state.media_log.lock().unwrap().push(MediaRequest {
        id: id.clone(),
        range: range.clone(),
        acknowledge_abuse: params.get("acknowledgeAbuse").map(String::as_str) == Some("true"),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    });

    let _active = ActiveGuard::enter(&state);
    if !state.drive.media_delay.is_zero() {
        tokio::time::sleep(state.drive.media_delay).await;
    }

    let Some(data) = &entry.content else {
        return (StatusCode::BAD_REQUEST, "directories have no media").into_response();
    };
    let total = data.len();
    let (status, start, end) = match range.as_deref().filter(|_| !state.drive.ignore_range) {
        Some(range) => match parse_range(range, total) {
            Some((start, end)) => (StatusCode::PARTIAL_CONTENT, start, end),
            None => return StatusCode::RANGE_NOT_SATISFIABLE.into_response(),
        },
        None => (StatusCode::OK, 0, total),
    };

    let fault = state
        .faults
        .lock()
        .unwrap()
        .get_mut(&id)
        .and_then(|queue| queue.pop_front());
    let mut builder = Response::builder().status(status);
    if status == StatusCode::PARTIAL_CONTENT {
        builder = builder.header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", start, end - 1, total),
        );
    }
    let body = match fault {
        Some(Fault::Status(code, message)) => {
            let status = StatusCode::from_u16(code).unwrap();
            return (status, message).into_response();
        }
        Some(Fault::Abort { after }) => {
            let cut = (start + after).min(end);
            let items: Vec<Result<Bytes, std::io::Error>> = vec![
                Ok(Bytes::copy_from_slice(&data[start..cut])),
                Err(std::io::Error::other("connection reset by mock")),
            ];
            Body::from_stream(futures::stream::iter(items).then(|item| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                item
            }))
        }
        Some(Fault::Stall { after }) => {
            let cut = (start + after).min(end);
            let sent = futures::stream::iter([Ok::<_, std::io::Error>(Bytes::copy_from_slice(
                &data[start..cut],
            ))]);
            Body::from_stream(sent.chain(futures::stream::pending()))
        }
        None => Body::from(data[start..end].to_vec()),
    };
    builder.body(body).unwrap()
}

/// Parses `bytes=a-b` or `bytes=a-` into a half-open `[a, b + 1)` range.
fn parse_range(range: &str, total: usize) -> Option<(usize, usize)> {
    let bounds = range.strip_prefix("bytes=")?;
    let (start, end) = bounds.split_once('-')?;
    let start: usize = start.parse().ok()?;
    let end: usize = if end.is_empty() {
        total
    } else {
        end.parse::<usize>().ok()? + 1
    };
    let end = end.min(total);
    (start < end).then_some((start, end))
}
