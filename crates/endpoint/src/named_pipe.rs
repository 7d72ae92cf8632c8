//! NamedPipe - FIFO created for the substitution marker
//!
//! The FIFO node is owned by this value and unlinked on drop.

use std::io;
use std::path::{Path, PathBuf};

use nix::sys::stat::Mode;
use tokio::io::AsyncReadExt;
use tokio::net::unix::pipe;
use tracing::{debug, warn};

use crate::EndpointError;

/// Reader side of a FIFO
#[derive(Debug)]
pub struct NamedPipe {
    path: PathBuf,
    receiver: Option<pipe::Receiver>,
}

impl NamedPipe {
    /// Create a uniquely named FIFO in `dir`
    pub fn create(dir: &Path) -> Result<Self, EndpointError> {
        let named_pipe_error = |source| EndpointError::NamedPipe {
            path: dir.to_path_buf(),
            source,
        };

        let fifo = tempfile::Builder::new()
            .prefix("sockwrap-")
            .suffix(".fifo")
            .make_in(dir, |path| {
                nix::unistd::mkfifo(path, Mode::S_IRUSR | Mode::S_IWUSR).map_err(io::Error::from)
            })
            .map_err(named_pipe_error)?;
        // unlinking is ours, on drop and in teardown
        let ((), path) = fifo.keep().map_err(|e| named_pipe_error(e.error))?;

        debug!(path = %path.display(), "Named pipe created");
        Ok(Self {
            path,
            receiver: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the writer to open the FIFO
    ///
    /// Opening a FIFO for reading blocks until a writer shows up, so the open
    /// runs on the blocking pool. `release_pending` unblocks it.
    pub async fn accept(&mut self) -> Result<(), EndpointError> {
        if self.receiver.is_some() {
            return Ok(());
        }

        let path = self.path.clone();
        let file = tokio::task::spawn_blocking(move || std::fs::File::open(path))
            .await
            .map_err(io::Error::other)
            .and_then(|opened| opened)
            .map_err(|source| EndpointError::NamedPipe {
                path: self.path.clone(),
                source,
            })?;

        let receiver = pipe::Receiver::from_file(file).map_err(|source| {
            EndpointError::NamedPipe {
                path: self.path.clone(),
                source,
            }
        })?;
        self.receiver = Some(receiver);
        debug!(path = %self.path.display(), "Named pipe writer connected");
        Ok(())
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.receiver.as_mut() {
            Some(receiver) => receiver.read(buf).await,
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "named pipe has no writer yet",
            )),
        }
    }
}

impl Drop for NamedPipe {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove named pipe");
            }
        }
    }
}

/// Unblock a reader parked in `NamedPipe::accept`
///
/// Opens the FIFO for writing without blocking and closes it at once; the
/// pending open then completes and the reader sees end-of-data. Returns
/// `false` when nobody was waiting.
pub fn release_pending(path: &Path) -> bool {
    match pipe::OpenOptions::new().open_sender(path) {
        Ok(sender) => {
            drop(sender);
            debug!(path = %path.display(), "Released pending named pipe open");
            true
        }
        Err(_) => false,
    }
}
