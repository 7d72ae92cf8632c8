//! # Endpoint
//!
//! Uniform handle over the byte channels a pipeline is built from.
//!
//! Each `Endpoint` owns exactly one OS handle:
//! - `Socket`: loopback TCP boundary
//! - `Pipe`: one end of an anonymous pipe
//! - `NamedPipe`: reader side of a FIFO
//! - `Standard`: an inherited standard stream
//!
//! Movers use `read` / `write_all` / `finish`; the launcher turns an endpoint
//! into a child's standard handle with `into_stdio`. Closing consumes the
//! endpoint, so no handle is closed twice.

mod error;
mod named_pipe;
mod pipe;
mod socket;
mod standard;

pub use error::EndpointError;
pub use named_pipe::{release_pending, NamedPipe};
pub use pipe::Pipe;
pub use socket::Socket;
pub use standard::Standard;

use std::io;
use std::path::Path;
use std::process::Stdio;

use contracts::{EndpointKind, StandardStream};
use tracing::debug;

/// A byte channel end owned by one stage
#[derive(Debug)]
pub enum Endpoint {
    Socket(Socket),
    Pipe(Pipe),
    NamedPipe(NamedPipe),
    Standard(Standard),
}

impl Endpoint {
    pub fn kind(&self) -> EndpointKind {
        match self {
            Self::Socket(_) => EndpointKind::Socket,
            Self::Pipe(_) => EndpointKind::Pipe,
            Self::NamedPipe(_) => EndpointKind::NamedPipe,
            Self::Standard(_) => EndpointKind::StandardStream,
        }
    }

    pub fn standard(stream: StandardStream) -> Self {
        Self::Standard(Standard::new(stream))
    }

    /// Path of the FIFO behind a named-pipe endpoint
    pub fn named_pipe_path(&self) -> Option<&Path> {
        match self {
            Self::NamedPipe(fifo) => Some(fifo.path()),
            _ => None,
        }
    }

    /// Prepare the endpoint for use by a mover
    pub fn into_async(self) -> Result<Self, EndpointError> {
        match self {
            Self::Pipe(pipe) => Ok(Self::Pipe(pipe.into_async()?)),
            other => Ok(other),
        }
    }

    /// Convert into a child's standard handle
    ///
    /// The parent's copy of the handle is gone once the returned `Stdio` is
    /// dropped, which happens when the spawning `Command` is dropped.
    pub fn into_stdio(self) -> Result<Stdio, EndpointError> {
        match self {
            Self::Pipe(pipe) => pipe.into_stdio(),
            Self::Standard(standard) => Ok(standard.into_stdio()),
            Self::Socket(_) => Err(EndpointError::unsupported("into_stdio", EndpointKind::Socket)),
            Self::NamedPipe(_) => Err(EndpointError::unsupported(
                "into_stdio",
                EndpointKind::NamedPipe,
            )),
        }
    }

    /// Named-pipe handshake: wait for the writer; a no-op for other kinds
    pub async fn accept(&mut self) -> Result<(), EndpointError> {
        match self {
            Self::NamedPipe(fifo) => fifo.accept().await,
            _ => Ok(()),
        }
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Socket(socket) => socket.read(buf).await,
            Self::Pipe(pipe) => pipe.read(buf).await,
            Self::NamedPipe(fifo) => fifo.read(buf).await,
            Self::Standard(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "standard streams are not read by movers",
            )),
        }
    }

    pub async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::Socket(socket) => socket.write_all(buf).await,
            Self::Pipe(pipe) => pipe.write_all(buf).await,
            Self::Standard(standard) => standard.write_all(buf).await,
            Self::NamedPipe(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "named pipes are read-only endpoints",
            )),
        }
    }

    /// Writer-side end of data
    ///
    /// Sockets are half-closed and handed back so the peer can drain; they
    /// are fully closed later with `close`. Pipes and streams are flushed and
    /// closed here.
    pub async fn finish(self) -> (Option<Self>, io::Result<()>) {
        match self {
            Self::Socket(mut socket) => {
                let result = socket.half_close().await;
                (Some(Self::Socket(socket)), result)
            }
            Self::Pipe(mut pipe) => (None, pipe.flush().await),
            Self::Standard(mut standard) => (None, standard.flush().await),
            Self::NamedPipe(_) => (None, Ok(())),
        }
    }

    /// Reader-side end of data
    ///
    /// Sockets stay open until teardown; anything else is closed now.
    pub fn retire(self) -> Option<Self> {
        match self {
            Self::Socket(socket) => Some(Self::Socket(socket)),
            other => {
                debug!(kind = ?other.kind(), "Endpoint closed");
                None
            }
        }
    }

    /// Close the endpoint
    pub async fn close(self) -> io::Result<()> {
        match self {
            Self::Socket(socket) => socket.close().await,
            Self::Pipe(mut pipe) => pipe.flush().await,
            Self::Standard(mut standard) => standard.flush().await,
            Self::NamedPipe(_) => Ok(()),
        }
    }
}

impl From<Pipe> for Endpoint {
    fn from(pipe: Pipe) -> Self {
        Self::Pipe(pipe)
    }
}

impl From<Socket> for Endpoint {
    fn from(socket: Socket) -> Self {
        Self::Socket(socket)
    }
}

impl From<NamedPipe> for Endpoint {
    fn from(fifo: NamedPipe) -> Self {
        Self::NamedPipe(fifo)
    }
}
