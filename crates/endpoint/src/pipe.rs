//! Anonymous pipe ends
//!
//! Pipes are allocated with blocking ends so they can be handed to a child
//! as-is. The end kept by a mover is registered with the reactor first.

use std::io;
use std::os::fd::OwnedFd;
use std::process::Stdio;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::pipe;

use crate::EndpointError;

/// One end of an anonymous pipe
#[derive(Debug)]
pub enum Pipe {
    /// Read end destined for a child's stdin
    ChildReader(io::PipeReader),
    /// Write end destined for a child's stdout
    ChildWriter(io::PipeWriter),
    /// Read end driven by a mover
    Receiver(pipe::Receiver),
    /// Write end driven by a mover
    Sender(pipe::Sender),
}

impl Pipe {
    /// Allocate a pipe, returning `(read end, write end)`
    pub fn pair() -> Result<(Pipe, Pipe), EndpointError> {
        let (reader, writer) = io::pipe().map_err(EndpointError::Pipe)?;
        Ok((Pipe::ChildReader(reader), Pipe::ChildWriter(writer)))
    }

    /// Register a child-side end with the reactor so a mover can drive it
    pub fn into_async(self) -> Result<Pipe, EndpointError> {
        match self {
            Pipe::ChildReader(reader) => Ok(Pipe::Receiver(pipe::Receiver::from_owned_fd(
                OwnedFd::from(reader),
            )?)),
            Pipe::ChildWriter(writer) => Ok(Pipe::Sender(pipe::Sender::from_owned_fd(
                OwnedFd::from(writer),
            )?)),
            other => Ok(other),
        }
    }

    pub(crate) fn into_stdio(self) -> Result<Stdio, EndpointError> {
        match self {
            Pipe::ChildReader(reader) => Ok(Stdio::from(reader)),
            Pipe::ChildWriter(writer) => Ok(Stdio::from(writer)),
            Pipe::Receiver(receiver) => Ok(Stdio::from(receiver.into_blocking_fd()?)),
            Pipe::Sender(sender) => Ok(Stdio::from(sender.into_blocking_fd()?)),
        }
    }

    pub(crate) async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Pipe::Receiver(receiver) => receiver.read(buf).await,
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "pipe end is not readable by a mover",
            )),
        }
    }

    pub(crate) async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Pipe::Sender(sender) => sender.write_all(buf).await,
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "pipe end is not writable by a mover",
            )),
        }
    }

    pub(crate) async fn flush(&mut self) -> io::Result<()> {
        match self {
            Pipe::Sender(sender) => sender.flush().await,
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_async_pair_round_trip() {
        let (reader, writer) = Pipe::pair().unwrap();
        let mut reader = reader.into_async().unwrap();
        let mut writer = writer.into_async().unwrap();

        writer.write_all(b"hello").await.unwrap();
        drop(writer);

        let mut buf = [0u8; 16];
        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_child_end_is_not_mover_readable() {
        let (mut reader, _writer) = Pipe::pair().unwrap();
        let mut buf = [0u8; 4];
        let err = reader.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
