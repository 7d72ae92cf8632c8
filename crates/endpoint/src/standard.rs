//! Standard streams of the wrapper process

use std::io;
use std::process::Stdio;

use contracts::StandardStream;
use tokio::io::{AsyncWriteExt, Stderr, Stdout};

/// Inherited standard stream
#[derive(Debug)]
pub enum Standard {
    Input,
    Output(Stdout),
    Error(Stderr),
}

impl Standard {
    pub fn new(stream: StandardStream) -> Self {
        match stream {
            StandardStream::Input => Self::Input,
            StandardStream::Output => Self::Output(tokio::io::stdout()),
            StandardStream::Error => Self::Error(tokio::io::stderr()),
        }
    }

    pub(crate) fn into_stdio(self) -> Stdio {
        match self {
            Self::Input | Self::Output(_) => Stdio::inherit(),
            // the child's stdout goes to our stderr
            Self::Error(_) => Stdio::from(io::stderr()),
        }
    }

    pub(crate) async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::Output(out) => out.write_all(buf).await,
            Self::Error(err) => err.write_all(buf).await,
            Self::Input => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "standard input is not writable",
            )),
        }
    }

    pub(crate) async fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Output(out) => out.flush().await,
            Self::Error(err) => err.flush().await,
            Self::Input => Ok(()),
        }
    }
}
