use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::StatusCode;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{error, info, warn};

use super::context::RunContext;
use super::progress::ProgressHandle;
use super::verify::verify;
use crate::error::TransferError;
use crate::remote::RemoteNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Downloaded,
    AlreadyPresent,
}

/// Runs the whole lifetime of one file transfer, retries included.
///
/// Outcomes are recorded on the run's progress counters; failures are logged
/// here and never propagate to the caller.
pub async fn run(ctx: &RunContext, node: RemoteNode, target: PathBuf) -> bool {
    match download(ctx, &node, &target).await {
        Ok(Outcome::Downloaded) => {
            info!(id = %node.id, name = %node.name, "downloaded");
            ctx.progress.record_transferred();
            true
        }
        Ok(Outcome::AlreadyPresent) => {
            info!(id = %node.id, name = %node.name, "already downloaded");
            ctx.progress.record_skipped();
            true
        }
        Err(err) => {
            error!(id = %node.id, name = %node.name, error = %err, "download failed");
            ctx.progress.record_failed();
            false
        }
    }
}

async fn download(
    ctx: &RunContext,
    node: &RemoteNode,
    target: &Path,
) -> Result<Outcome, TransferError> {
    let local = verify(target, node.md5.as_deref()).await?;
    if local.complete {
        return Ok(Outcome::AlreadyPresent);
    }

    let mut offset = local.valid_bytes;
    if offset > 0 && offset >= node.size {
        if node.md5.is_none() && offset == node.size {
            // nothing to compare against, the length is all we can check
            return Ok(Outcome::AlreadyPresent);
        }
        return Err(TransferError::Diverged {
            path: target.to_path_buf(),
            local: offset,
            remote: node.size,
        });
    }
    if offset > 0 {
        info!(name = %node.name, offset, "resuming");
    }

    let progress = ctx.progress.new_handle(&node.name, node.size, offset);
    let max_attempts = ctx.config.max_attempts.max(1);
    let mut attempt = 1;
    // Retries skip verification: `offset` is either the verified length or the
    // position the file handle reported after this transfer's last write.
    loop {
        let err = match attempt_once(ctx, node, target, offset, &progress).await {
            Ok(()) => {
                progress.finish();
                return Ok(Outcome::Downloaded);
            }
            Err(err) => err,
        };
        let Some(delay) = retry_delay(ctx, &err, attempt) else {
            return Err(err);
        };
        if attempt >= max_attempts {
            return Err(TransferError::RetriesExhausted {
                attempts: attempt,
                source: Box::new(err),
            });
        }
        if let TransferError::Interrupted { offset: reached, .. } = &err {
            offset = *reached;
        }
        warn!(
            name = %node.name,
            attempt,
            offset,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// How long to wait before retrying `err`, or `None` when it is terminal.
fn retry_delay(ctx: &RunContext, err: &TransferError, attempt: u32) -> Option<Duration> {
    match err {
        TransferError::Remote(remote) if remote.is_retryable() => {
            Some(ctx.config.request_retry_delay)
        }
        TransferError::Interrupted { .. } => Some(ctx.config.backoff_unit * attempt),
        _ => None,
    }
}

/// One request/stream cycle starting at byte `offset`.
async fn attempt_once(
    ctx: &RunContext,
    node: &RemoteNode,
    target: &Path,
    offset: u64,
    progress: &ProgressHandle,
) -> Result<(), TransferError> {
    let local = |err| TransferError::local(target, err);

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(target)
        .await
        .map_err(local)?;
    file.seek(SeekFrom::Start(offset)).await.map_err(local)?;

    let response = ctx
        .client
        .open_range(&node.id, offset, node.size, ctx.config.acknowledge_abuse)
        .await?;

    if offset > 0 && response.status() != StatusCode::PARTIAL_CONTENT {
        warn!(
            name = %node.name,
            status = %response.status(),
            "range ignored, restarting from byte 0"
        );
        file.set_len(0).await.map_err(local)?;
        file.seek(SeekFrom::Start(0)).await.map_err(local)?;
        progress.reset_to(0);
    }

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                file.write_all(&bytes).await.map_err(local)?;
                progress.advance(bytes.len() as u64);
            }
            Err(err) => {
                file.flush().await.map_err(local)?;
                let reached = file.stream_position().await.map_err(local)?;
                return Err(TransferError::Interrupted {
                    offset: reached,
                    reason: err.to_string(),
                });
            }
        }
    }

    file.flush().await.map_err(local)?;
    let reached = file.stream_position().await.map_err(local)?;
    if reached < node.size {
        return Err(TransferError::Interrupted {
            offset: reached,
            reason: format!("connection closed with {} of {} bytes", reached, node.size),
        });
    }
    Ok(())
}
