//! Pure planning: template + ports -> PipelinePlan
//!
//! No resource is touched here, which keeps the stage layout testable and
//! printable by `sockwrap plan`.

use contracts::{
    LinkId, LinkKind, MoverRole, PipelinePlan, PlannedStage, RuntimeSettings, StageBody,
    StandardStream,
};
use tracing::debug;

use crate::template;
use crate::CompileError;

/// What to compile
#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub template: &'a str,
    pub input_port: Option<u16>,
    pub output_port: Option<u16>,
    pub marker: &'a str,
    pub max_stages: usize,
}

impl<'a> PlanRequest<'a> {
    pub fn new(template: &'a str, settings: &'a RuntimeSettings) -> Self {
        Self {
            template,
            input_port: None,
            output_port: None,
            marker: &settings.marker,
            max_stages: settings.limits.max_stages,
        }
    }

    pub fn with_ports(mut self, input_port: Option<u16>, output_port: Option<u16>) -> Self {
        self.input_port = input_port;
        self.output_port = output_port;
        self
    }
}

#[derive(Default)]
struct PlanBuilder {
    plan: PipelinePlan,
}

impl PlanBuilder {
    fn link(&mut self, kind: LinkKind) -> LinkId {
        self.plan.links.push(kind);
        self.plan.links.len() - 1
    }

    fn stage(&mut self, body: StageBody, input: LinkId, output: LinkId) {
        let index = self.plan.stages.len();
        self.plan.stages.push(PlannedStage {
            index,
            body,
            input,
            output,
        });
    }

    fn mover(&mut self, role: MoverRole, input: LinkId, output: LinkId) {
        self.stage(StageBody::Mover { role }, input, output);
    }
}

/// Compile a template into a stage layout
///
/// Stage order is `[input mover] proc0 [named-pipe mover] proc1 .. procN-1
/// [output mover]`.
pub fn compile_plan(request: &PlanRequest<'_>) -> Result<PipelinePlan, CompileError> {
    let commands = template::split(request.template, request.marker, request.max_stages)?;
    let last = commands.len() - 1;
    let mut builder = PlanBuilder::default();

    let mut upstream = match request.input_port {
        Some(port) => {
            let socket = builder.link(LinkKind::Socket { port });
            let pipe = builder.link(LinkKind::Pipe);
            builder.mover(MoverRole::InputSocket, socket, pipe);
            pipe
        }
        None => builder.link(LinkKind::Standard {
            stream: StandardStream::Input,
        }),
    };

    for (position, command) in commands.into_iter().enumerate() {
        template::tokenize(&command)?;

        let produced = if position < last || request.output_port.is_some() {
            builder.link(LinkKind::Pipe)
        } else {
            builder.link(LinkKind::Standard {
                stream: StandardStream::Output,
            })
        };

        if position == 0 && command.contains(request.marker) {
            // data leaves through the FIFO; stdout is diverted to our stderr
            let fifo = builder.link(LinkKind::NamedPipe);
            let diverted = builder.link(LinkKind::Standard {
                stream: StandardStream::Error,
            });
            builder.stage(
                StageBody::Process {
                    command,
                    named_pipe: Some(fifo),
                },
                upstream,
                diverted,
            );
            builder.mover(MoverRole::NamedPipe, fifo, produced);
        } else {
            builder.stage(
                StageBody::Process {
                    command,
                    named_pipe: None,
                },
                upstream,
                produced,
            );
        }
        upstream = produced;
    }

    if let Some(port) = request.output_port {
        let socket = builder.link(LinkKind::Socket { port });
        builder.mover(MoverRole::OutputSocket, upstream, socket);
    }

    let plan = builder.plan;
    let dangling = plan.dangling_links();
    if !dangling.is_empty() {
        return Err(CompileError::Plan {
            message: format!("links {dangling:?} do not have exactly one reader and writer"),
        });
    }

    debug!(
        stages = plan.stages.len(),
        processes = plan.process_count(),
        movers = plan.mover_count(),
        "Pipeline planned"
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::StageKind;

    fn request(template: &str) -> PlanRequest<'_> {
        PlanRequest {
            template,
            input_port: None,
            output_port: None,
            marker: "#PIPE#",
            max_stages: 16,
        }
    }

    fn kinds(plan: &PipelinePlan) -> Vec<StageKind> {
        plan.stages.iter().map(PlannedStage::kind).collect()
    }

    #[test]
    fn test_single_command_on_standard_streams() {
        let plan = compile_plan(&request("cat")).unwrap();

        assert_eq!(kinds(&plan), vec![StageKind::Process]);
        assert_eq!(
            plan.links,
            vec![
                LinkKind::Standard {
                    stream: StandardStream::Input
                },
                LinkKind::Standard {
                    stream: StandardStream::Output
                },
            ]
        );
        assert!(plan.dangling_links().is_empty());
    }

    #[test]
    fn test_socket_boundaries_add_movers() {
        let plan = compile_plan(&request("flac -d | lame - -").with_ports(Some(7000), Some(7001)))
            .unwrap();

        assert_eq!(
            kinds(&plan),
            vec![
                StageKind::Mover,
                StageKind::Process,
                StageKind::Process,
                StageKind::Mover,
            ]
        );
        assert_eq!(plan.links[plan.stages[0].input], LinkKind::Socket { port: 7000 });
        assert_eq!(plan.links[plan.stages[3].output], LinkKind::Socket { port: 7001 });
        assert_eq!(plan.process_count(), 2);
        assert_eq!(plan.mover_count(), 2);
        assert!(plan.dangling_links().is_empty());
    }

    #[test]
    fn test_stage_count_formula() {
        // processes + input mover + output mover + named-pipe mover
        let plan = compile_plan(
            &request("dec -o #PIPE# | filter | enc").with_ports(Some(1), Some(2)),
        )
        .unwrap();
        assert_eq!(plan.stages.len(), 3 + 1 + 1 + 1);

        let plan = compile_plan(&request("a | b | c")).unwrap();
        assert_eq!(plan.stages.len(), 3);

        let plan = compile_plan(&request("a").with_ports(None, Some(9))).unwrap();
        assert_eq!(plan.stages.len(), 2);
    }

    #[test]
    fn test_named_pipe_layout() {
        let plan = compile_plan(&request("dec -o #PIPE# | cat")).unwrap();

        assert_eq!(
            kinds(&plan),
            vec![StageKind::Process, StageKind::Mover, StageKind::Process]
        );

        let source = &plan.stages[0];
        let StageBody::Process {
            named_pipe: Some(fifo),
            ..
        } = source.body
        else {
            panic!("stage 0 should write the named pipe");
        };
        assert_eq!(plan.links[fifo], LinkKind::NamedPipe);
        assert_eq!(
            plan.links[source.output],
            LinkKind::Standard {
                stream: StandardStream::Error
            }
        );

        let mover = &plan.stages[1];
        assert_eq!(
            mover.body,
            StageBody::Mover {
                role: MoverRole::NamedPipe
            }
        );
        assert_eq!(mover.input, fifo);
        assert_eq!(mover.output, plan.stages[2].input);
        assert!(plan.dangling_links().is_empty());
    }

    #[test]
    fn test_named_pipe_with_single_command_writes_stdout() {
        let plan = compile_plan(&request("dec -o #PIPE#")).unwrap();
        let mover = &plan.stages[1];
        assert_eq!(
            plan.links[mover.output],
            LinkKind::Standard {
                stream: StandardStream::Output
            }
        );
    }

    #[test]
    fn test_indices_are_ordinal() {
        let plan = compile_plan(&request("a | b").with_ports(Some(1), None)).unwrap();
        for (position, stage) in plan.stages.iter().enumerate() {
            assert_eq!(stage.index, position);
        }
    }

    #[test]
    fn test_template_errors_propagate() {
        assert!(matches!(
            compile_plan(&request("")),
            Err(CompileError::Template { .. })
        ));
        assert!(matches!(
            compile_plan(&request("cat | tee #PIPE#")),
            Err(CompileError::Template { .. })
        ));
    }

    #[test]
    fn test_plan_serializes() {
        let plan = compile_plan(&request("cat").with_ports(Some(5000), None)).unwrap();
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["links"][0]["kind"], "socket");
        assert_eq!(json["links"][0]["port"], 5000);
        assert_eq!(json["stages"][1]["body"]["command"], "cat");
    }
}
