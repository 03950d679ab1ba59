use std::path::PathBuf;
use std::sync::Arc;

use indicatif::MultiProgress;
use tracing::error;

use super::progress::ProgressAggregator;
use super::transfer;
use crate::config::TransferConfig;
use crate::remote::{DriveClient, RemoteNode};
use crate::utils::limited_spawner::LimitedSpawner;

/// State shared by the walker and every transfer of one `download` call.
pub struct RunContext {
    pub client: DriveClient,
    pub config: TransferConfig,
    pub progress: Arc<ProgressAggregator>,
    spawner: LimitedSpawner,
}

impl RunContext {
    /// Progress bars are drawn on `bars` unless the config is silent.
    pub fn new(client: DriveClient, config: TransferConfig, bars: MultiProgress) -> Self {
        let progress = Arc::new(ProgressAggregator::new((!config.silent).then_some(bars)));
        let spawner = LimitedSpawner::new(config.concurrency);
        RunContext {
            client,
            config,
            progress,
            spawner,
        }
    }

    /// Hands one file to the transfer pool.
    ///
    /// Waits only for a free admission slot, never for the transfer itself.
    pub async fn dispatch(self: &Arc<Self>, node: RemoteNode, target: PathBuf) {
        let ctx = Arc::clone(self);
        let id = node.id.clone();
        let spawned = self
            .spawner
            .spawn(async move { transfer::run(&ctx, node, target).await })
            .await;
        if let Err(err) = spawned {
            error!(id = %id, error = %err, "cannot schedule transfer");
            self.progress.record_failed();
        }
    }

    /// Blocks until every dispatched transfer has finished.
    pub async fn join(&self) {
        self.spawner.join().await;
    }
}
