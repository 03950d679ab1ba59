mod context;
mod progress;
mod transfer;
mod verify;
mod walker;

pub use progress::{ProgressAggregator, ProgressHandle, RunSummary};
pub use verify::{LocalState, file_md5, verify};

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use indicatif::MultiProgress;
use tracing::{info, warn};

use crate::config::TransferConfig;
use crate::error::DownloadError;
use crate::remote::DriveClient;
use crate::utils::sanitize::sanitize_file_name;
use context::RunContext;
use walker::TreeWalker;

/// Mirrors remote files and directory trees to local disk.
pub struct Downloader {
    client: DriveClient,
    config: TransferConfig,
    bars: MultiProgress,
}

impl Downloader {
    pub fn new(client: DriveClient) -> Self {
        Self::with_config(client, TransferConfig::default())
    }

    pub fn with_config(client: DriveClient, mut config: TransferConfig) -> Self {
        config.concurrency = config.concurrency.max(1);
        Downloader {
            client,
            config,
            bars: MultiProgress::new(),
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn set_concurrency(&mut self, count: usize) {
        if count == 0 {
            warn!("concurrency of 0 would never start a transfer, using 1");
        }
        self.config.concurrency = count.max(1);
        info!(concurrency = self.config.concurrency, "using concurrency");
    }

    pub fn set_abusive_download_acknowledgment(&mut self, acknowledge: bool) {
        self.config.acknowledge_abuse = acknowledge;
    }

    pub fn set_silent(&mut self, silent: bool) {
        self.config.silent = silent;
    }

    /// Draws progress on `bars`, e.g. the set the log writer suspends around.
    pub fn set_progress_bars(&mut self, bars: MultiProgress) {
        self.bars = bars;
    }

    /// Downloads the node `root_id` into `dest_dir`, under `output_name` if given.
    ///
    /// Returns once every dispatched transfer has finished. Only failing to
    /// resolve the root or to create the destination is an error; per-file
    /// failures are logged and counted in the summary.
    pub async fn download(
        &self,
        root_id: &str,
        dest_dir: &Path,
        output_name: Option<&str>,
    ) -> Result<RunSummary, DownloadError> {
        let started = Instant::now();
        let root = self
            .client
            .metadata(root_id)
            .await
            .map_err(DownloadError::RootLookup)?;
        info!(id = %root.id, name = %root.name, kind = ?root.kind, "resolved root");

        let name = sanitize_file_name(
            output_name.filter(|n| !n.is_empty()).unwrap_or(root.name.as_str()),
            &root.id,
        );
        let ctx = Arc::new(RunContext::new(
            self.client.clone(),
            self.config.clone(),
            self.bars.clone(),
        ));

        if root.is_dir() {
            let local_root = dest_dir.join(&name);
            create_dir(&local_root).await?;
            let children = self
                .client
                .list_children(&root.id)
                .await
                .map_err(DownloadError::RootLookup)?;
            if children.is_empty() {
                info!(name = %root.name, "directory is empty, nothing to download");
                return Ok(ctx.progress.summary(started.elapsed()));
            }
            TreeWalker::new(Arc::clone(&ctx))
                .walk(&root.id, children, &local_root)
                .await;
        } else {
            create_dir(dest_dir).await?;
            ctx.dispatch(root, dest_dir.join(&name)).await;
        }

        ctx.join().await;
        let summary = ctx.progress.summary(started.elapsed());
        info!(%summary, "download finished");
        Ok(summary)
    }
}

async fn create_dir(path: &Path) -> Result<(), DownloadError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| DownloadError::CreateDestination {
            path: path.to_path_buf(),
            source,
        })
}
