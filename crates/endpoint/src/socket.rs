//! Loopback TCP boundary sockets

use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::EndpointError;

/// Socket connected to `127.0.0.1:port`
#[derive(Debug)]
pub struct Socket {
    port: u16,
    stream: TcpStream,
    write_closed: bool,
}

impl Socket {
    /// Connect to a loopback port
    pub async fn connect(port: u16) -> Result<Self, EndpointError> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| EndpointError::Connect { port, source })?;
        stream.set_nodelay(true)?;

        debug!(port, "Socket connected");
        Ok(Self {
            port,
            stream,
            write_closed: false,
        })
    }

    pub(crate) async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).await
    }

    /// Send the whole buffer; a send that makes no progress is a short write
    pub(crate) async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.write_all(buf).await
    }

    /// Signal end-of-data to the peer, keeping the read side open
    pub(crate) async fn half_close(&mut self) -> io::Result<()> {
        if self.write_closed {
            return Ok(());
        }
        self.write_closed = true;
        match self.stream.shutdown().await {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }

    pub(crate) async fn close(mut self) -> io::Result<()> {
        let result = self.half_close().await;
        debug!(port = self.port, "Socket closed");
        result
    }
}
