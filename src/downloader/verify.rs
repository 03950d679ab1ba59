use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::TransferError;

const BUFFER_SIZE: usize = 1024 * 1024;

/// What is already on disk for one target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalState {
    /// The local file matches the remote checksum; nothing to transfer.
    pub complete: bool,
    /// Bytes present locally, used as the resume offset when not complete.
    pub valid_bytes: u64,
}

impl LocalState {
    pub const ABSENT: LocalState = LocalState {
        complete: false,
        valid_bytes: 0,
    };
}

/// Compares the file at `path` against the remote md5.
///
/// A mismatching or unverifiable file is treated as a partial download and
/// its length is returned as the resume point. A different file that happens
/// to share the name will be resumed over, not replaced.
pub async fn verify(path: &Path, remote_md5: Option<&str>) -> Result<LocalState, TransferError> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(LocalState::ABSENT),
        Err(err) => return Err(TransferError::local(path, err)),
    };
    if !metadata.is_file() {
        return Err(TransferError::local(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }
    let local_size = metadata.len();

    let Some(remote_md5) = remote_md5 else {
        return Ok(LocalState {
            complete: false,
            valid_bytes: local_size,
        });
    };

    let local_md5 = file_md5(path.to_path_buf())
        .await
        .map_err(|err| TransferError::local(path, err))?;
    debug!(path = %path.display(), local = %local_md5, remote = remote_md5, "compared checksums");

    Ok(LocalState {
        complete: local_md5.eq_ignore_ascii_case(remote_md5),
        valid_bytes: local_size,
    })
}

/// Hex md5 of a whole file, computed off the async workers.
pub async fn file_md5(path: PathBuf) -> io::Result<String> {
    tokio::task::spawn_blocking(move || {
        let mut file = File::open(&path)?;
        let mut buffer = vec![0; BUFFER_SIZE];
        let mut ctx = md5::Context::new();
        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            ctx.consume(&buffer[..n]);
        }
        Ok(format!("{:x}", ctx.compute()))
    })
    .await
    .map_err(io::Error::other)?
}
