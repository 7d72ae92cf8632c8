//! Materialization: PipelinePlan -> live stages
//!
//! Connects the boundary sockets, allocates the pipes, creates the FIFO and
//! substitutes its path for the marker. On error every endpoint allocated so
//! far is dropped (the FIFO unlinks itself) and nothing is returned.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use contracts::{LinkId, LinkKind, MoverRole, PipelinePlan, StageBody, StageKind};
use endpoint::{Endpoint, NamedPipe, Pipe, Socket};
use tracing::{debug, info};

use crate::template;
use crate::CompileError;

/// Mover stage with its endpoints ready for async use
#[derive(Debug)]
pub struct MoverStage {
    pub index: usize,
    pub role: MoverRole,
    pub input: Endpoint,
    pub output: Endpoint,
}

/// Process stage with its final argument vector
#[derive(Debug)]
pub struct ProcessStage {
    pub index: usize,
    /// Command text after marker substitution
    pub command: String,
    pub argv: Vec<String>,
    pub stdin: Endpoint,
    pub stdout: Endpoint,
}

#[derive(Debug)]
pub enum Stage {
    Mover(MoverStage),
    Process(ProcessStage),
}

impl Stage {
    pub fn index(&self) -> usize {
        match self {
            Self::Mover(mover) => mover.index,
            Self::Process(process) => process.index,
        }
    }

    pub fn kind(&self) -> StageKind {
        match self {
            Self::Mover(_) => StageKind::Mover,
            Self::Process(_) => StageKind::Process,
        }
    }
}

/// Ready-to-run pipeline
#[derive(Debug)]
pub struct CompiledPipeline {
    pub plan: PipelinePlan,
    pub stages: Vec<Stage>,
    /// FIFO path substituted for the marker, if any
    pub named_pipe: Option<PathBuf>,
}

impl CompiledPipeline {
    pub fn process_count(&self) -> usize {
        self.plan.process_count()
    }

    pub fn mover_count(&self) -> usize {
        self.plan.mover_count()
    }
}

/// Materialize a plan, creating the FIFO in the system temporary directory
pub async fn materialize(
    plan: PipelinePlan,
    marker: &str,
) -> Result<CompiledPipeline, CompileError> {
    materialize_in(plan, marker, &std::env::temp_dir()).await
}

/// Materialize a plan, creating the FIFO in `fifo_dir`
pub async fn materialize_in(
    plan: PipelinePlan,
    marker: &str,
    fifo_dir: &Path,
) -> Result<CompiledPipeline, CompileError> {
    let mut readers: HashMap<LinkId, Endpoint> = HashMap::new();
    let mut writers: HashMap<LinkId, Endpoint> = HashMap::new();
    let mut named_pipe = None;

    for (link, kind) in plan.links.iter().enumerate() {
        let link_readers = plan.readers(link);
        let owner = link_readers
            .first()
            .or(plan.writers(link).first())
            .copied()
            .unwrap_or_default();

        match *kind {
            LinkKind::Socket { port } => {
                let socket = Socket::connect(port)
                    .await
                    .map_err(CompileError::endpoint(owner))?;
                let side = if link_readers.is_empty() {
                    &mut writers
                } else {
                    &mut readers
                };
                side.insert(link, socket.into());
            }
            LinkKind::Pipe => {
                let (reader, writer) = Pipe::pair().map_err(CompileError::endpoint(owner))?;
                readers.insert(link, reader.into());
                writers.insert(link, writer.into());
            }
            LinkKind::NamedPipe => {
                let fifo = NamedPipe::create(fifo_dir).map_err(CompileError::endpoint(owner))?;
                named_pipe = Some(fifo.path().to_path_buf());
                readers.insert(link, fifo.into());
            }
            LinkKind::Standard { stream } => {
                let side = if link_readers.is_empty() {
                    &mut writers
                } else {
                    &mut readers
                };
                side.insert(link, Endpoint::standard(stream));
            }
        }
    }

    let substitute = named_pipe
        .as_deref()
        .map(|path| path.to_string_lossy().into_owned());

    let mut stages = Vec::with_capacity(plan.stages.len());
    for planned in &plan.stages {
        let index = planned.index;
        let input = take(&mut readers, planned.input, index)?;
        let output = take(&mut writers, planned.output, index)?;

        let stage = match &planned.body {
            StageBody::Mover { role } => Stage::Mover(MoverStage {
                index,
                role: *role,
                input: input.into_async().map_err(CompileError::endpoint(index))?,
                output: output.into_async().map_err(CompileError::endpoint(index))?,
            }),
            StageBody::Process {
                command,
                named_pipe: fifo,
            } => {
                let mut argv = template::tokenize(command)?;
                let command = match (fifo, &substitute) {
                    (Some(_), Some(path)) => {
                        for arg in &mut argv {
                            *arg = arg.replace(marker, path);
                        }
                        command.replace(marker, path)
                    }
                    _ => command.clone(),
                };
                debug!(stage = index, command = %command, "Process stage prepared");
                Stage::Process(ProcessStage {
                    index,
                    command,
                    argv,
                    stdin: input,
                    stdout: output,
                })
            }
        };
        stages.push(stage);
    }

    info!(
        stages = stages.len(),
        processes = plan.process_count(),
        movers = plan.mover_count(),
        named_pipe = ?named_pipe,
        "Pipeline compiled"
    );
    Ok(CompiledPipeline {
        plan,
        stages,
        named_pipe,
    })
}

fn take(
    side: &mut HashMap<LinkId, Endpoint>,
    link: LinkId,
    stage: usize,
) -> Result<Endpoint, CompileError> {
    side.remove(&link).ok_or_else(|| CompileError::Plan {
        message: format!("stage {stage} has no endpoint for link {link}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compile_plan, PlanRequest};
    use contracts::EndpointKind;
    use tokio::net::TcpListener;

    fn plan(template: &str, input: Option<u16>, output: Option<u16>) -> PipelinePlan {
        compile_plan(&PlanRequest {
            template,
            input_port: input,
            output_port: output,
            marker: "#PIPE#",
            max_stages: 16,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_materialize_standard_streams() {
        let compiled = materialize(plan("cat | tr a b", None, None), "#PIPE#")
            .await
            .unwrap();

        assert_eq!(compiled.stages.len(), 2);
        let Stage::Process(first) = &compiled.stages[0] else {
            panic!("expected a process stage");
        };
        assert_eq!(first.argv, vec!["cat"]);
        assert_eq!(first.stdin.kind(), EndpointKind::StandardStream);
        assert_eq!(first.stdout.kind(), EndpointKind::Pipe);

        let Stage::Process(second) = &compiled.stages[1] else {
            panic!("expected a process stage");
        };
        assert_eq!(second.argv, vec!["tr", "a", "b"]);
        assert_eq!(second.stdout.kind(), EndpointKind::StandardStream);
        assert!(compiled.named_pipe.is_none());
    }

    #[tokio::test]
    async fn test_materialize_connects_sockets() {
        let input = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let output = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let in_port = input.local_addr().unwrap().port();
        let out_port = output.local_addr().unwrap().port();

        let compiled = materialize(plan("cat", Some(in_port), Some(out_port)), "#PIPE#")
            .await
            .unwrap();

        let kinds: Vec<_> = compiled.stages.iter().map(Stage::kind).collect();
        assert_eq!(
            kinds,
            vec![StageKind::Mover, StageKind::Process, StageKind::Mover]
        );
        let Stage::Mover(first) = &compiled.stages[0] else {
            panic!("expected the input mover");
        };
        assert_eq!(first.role, MoverRole::InputSocket);
        assert_eq!(first.input.kind(), EndpointKind::Socket);
        assert_eq!(first.output.kind(), EndpointKind::Pipe);

        let Stage::Mover(last) = &compiled.stages[2] else {
            panic!("expected the output mover");
        };
        assert_eq!(last.output.kind(), EndpointKind::Socket);

        assert!(input.accept().await.is_ok());
        assert!(output.accept().await.is_ok());
    }

    #[tokio::test]
    async fn test_endpoints_match_planned_links() {
        let input = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = input.local_addr().unwrap().port();
        let dir = tempfile::tempdir().unwrap();
        let plan = plan("sh -c 'cat > #PIPE#' | cat | cat", Some(port), None);
        let expected: Vec<_> = plan
            .stages
            .iter()
            .map(|stage| {
                (
                    plan.links[stage.input].endpoint_kind(),
                    plan.links[stage.output].endpoint_kind(),
                )
            })
            .collect();

        let compiled = materialize_in(plan, "#PIPE#", dir.path()).await.unwrap();
        let actual: Vec<_> = compiled
            .stages
            .iter()
            .map(|stage| match stage {
                Stage::Mover(mover) => (mover.input.kind(), mover.output.kind()),
                Stage::Process(process) => (process.stdin.kind(), process.stdout.kind()),
            })
            .collect();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_marker_substituted_with_fifo_path() {
        let dir = tempfile::tempdir().unwrap();
        let compiled = materialize_in(
            plan("sh -c 'cat > #PIPE#' | cat", None, None),
            "#PIPE#",
            dir.path(),
        )
        .await
        .unwrap();

        let fifo = compiled.named_pipe.clone().unwrap();
        assert!(fifo.starts_with(dir.path()));
        assert!(fifo.exists());

        let Stage::Process(source) = &compiled.stages[0] else {
            panic!("expected a process stage");
        };
        assert_eq!(source.argv[2], format!("cat > {}", fifo.display()));
        assert!(!source.command.contains("#PIPE#"));
        assert_eq!(source.stdout.kind(), EndpointKind::StandardStream);

        let Stage::Mover(mover) = &compiled.stages[1] else {
            panic!("expected the named pipe mover");
        };
        assert_eq!(mover.input.named_pipe_path(), Some(fifo.as_path()));

        drop(compiled);
        assert!(!fifo.exists());
    }

    #[tokio::test]
    async fn test_failed_materialize_releases_everything() {
        let refused = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = refused.local_addr().unwrap().port();
        drop(refused);

        let dir = tempfile::tempdir().unwrap();
        let err = materialize_in(plan("dec -o #PIPE#", None, Some(port)), "#PIPE#", dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, CompileError::Endpoint { stage: 2, .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
