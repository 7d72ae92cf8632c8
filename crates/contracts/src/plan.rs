//! PipelinePlan - Pipeline Compiler output
//!
//! Resource-free description of the stages and the links between them.

use serde::{Deserialize, Serialize};

/// Index into `PipelinePlan::links`
pub type LinkId = usize;

/// Standard stream of the wrapper process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardStream {
    Input,
    Output,
    Error,
}

/// Endpoint kind, as seen by a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    Socket,
    Pipe,
    NamedPipe,
    StandardStream,
}

/// A planned channel between stages, or a pipeline boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum LinkKind {
    /// Loopback TCP socket connected to `127.0.0.1:port`
    Socket { port: u16 },
    /// Anonymous pipe
    Pipe,
    /// FIFO whose path replaces the marker in stage 0
    NamedPipe,
    /// Inherited standard stream
    Standard { stream: StandardStream },
}

impl LinkKind {
    pub fn endpoint_kind(&self) -> EndpointKind {
        match self {
            Self::Socket { .. } => EndpointKind::Socket,
            Self::Pipe => EndpointKind::Pipe,
            Self::NamedPipe => EndpointKind::NamedPipe,
            Self::Standard { .. } => EndpointKind::StandardStream,
        }
    }

    /// Boundary links have a single user; internal links have a reader and a writer
    pub fn is_boundary(&self) -> bool {
        matches!(self, Self::Socket { .. } | Self::Standard { .. })
    }
}

/// Why a mover stage exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoverRole {
    /// Input socket -> pipe feeding the first command
    InputSocket,
    /// Named pipe written by the first command -> its downstream
    NamedPipe,
    /// Pipe from the last command -> output socket
    OutputSocket,
}

/// Stage kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Mover,
    Process,
}

/// Stage body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StageBody {
    Mover {
        role: MoverRole,
    },
    Process {
        /// Command text from the template, marker still in place
        command: String,
        /// Named pipe this command writes through its arguments
        #[serde(skip_serializing_if = "Option::is_none")]
        named_pipe: Option<LinkId>,
    },
}

/// One planned stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStage {
    /// Ordinal (0 = source of the pipeline)
    pub index: usize,
    pub body: StageBody,
    pub input: LinkId,
    pub output: LinkId,
}

impl PlannedStage {
    pub fn kind(&self) -> StageKind {
        match self.body {
            StageBody::Mover { .. } => StageKind::Mover,
            StageBody::Process { .. } => StageKind::Process,
        }
    }

    /// Links this stage writes (stdout plus an optional named pipe)
    fn written_links(&self) -> impl Iterator<Item = LinkId> + '_ {
        let named = match self.body {
            StageBody::Process { named_pipe, .. } => named_pipe,
            StageBody::Mover { .. } => None,
        };
        std::iter::once(self.output).chain(named)
    }
}

/// Compiled, resource-free pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelinePlan {
    pub stages: Vec<PlannedStage>,
    pub links: Vec<LinkKind>,
}

impl PipelinePlan {
    pub fn process_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.kind() == StageKind::Process)
            .count()
    }

    pub fn mover_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.kind() == StageKind::Mover)
            .count()
    }

    /// Stages reading `link`
    pub fn readers(&self, link: LinkId) -> Vec<usize> {
        self.stages
            .iter()
            .filter(|s| s.input == link)
            .map(|s| s.index)
            .collect()
    }

    /// Stages writing `link`
    pub fn writers(&self, link: LinkId) -> Vec<usize> {
        self.stages
            .iter()
            .filter(|s| s.written_links().any(|l| l == link))
            .map(|s| s.index)
            .collect()
    }

    /// Links that break the single reader / single writer rule
    ///
    /// Internal links need exactly one reader and one writer; boundary links
    /// are used by exactly one stage. `Standard(Error)` may be shared since the
    /// wrapper's own error stream is never read by a stage.
    pub fn dangling_links(&self) -> Vec<LinkId> {
        self.links
            .iter()
            .enumerate()
            .filter(|(id, kind)| {
                let readers = self.readers(*id).len();
                let writers = self.writers(*id).len();
                match kind {
                    LinkKind::Standard {
                        stream: StandardStream::Error,
                    } => readers != 0,
                    kind if kind.is_boundary() => readers + writers != 1,
                    _ => readers != 1 || writers != 1,
                }
            })
            .map(|(id, _)| id)
            .collect()
    }
}
