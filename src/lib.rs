//! Resumable, concurrency-bounded mirroring of remote file trees to local disk.

pub mod config;
pub mod downloader;
pub mod error;
pub mod link;
pub mod logging;
pub mod remote;
pub mod utils;

#[cfg(test)]
mod testutils;

pub use config::TransferConfig;
pub use downloader::{Downloader, RunSummary};
pub use error::{DownloadError, RemoteError, TransferError};
pub use remote::{DriveClient, NodeKind, RemoteNode};
