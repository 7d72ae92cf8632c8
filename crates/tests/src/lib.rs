//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约测试（配置 -> 计划）
//! - 端到端测试：回环套接字 -> 子进程管道 -> 回环套接字

#[cfg(test)]
mod contract_tests {
    use compiler::{compile_plan, PlanRequest};
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{LinkKind, StageKind};

    #[test]
    fn test_settings_drive_plan() {
        let settings = ConfigLoader::load_from_str(
            "marker = \"@FIFO@\"\n[limits]\nmax_stages = 2",
            ConfigFormat::Toml,
        )
        .unwrap();

        let plan = compile_plan(
            &PlanRequest::new("dec --out @FIFO@ | enc", &settings).with_ports(Some(9000), None),
        )
        .unwrap();
        let kinds: Vec<_> = plan.stages.iter().map(|stage| stage.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                StageKind::Mover,
                StageKind::Process,
                StageKind::Mover,
                StageKind::Process
            ]
        );
        assert!(plan.links.contains(&LinkKind::NamedPipe));
        assert!(plan.dangling_links().is_empty());

        assert!(compile_plan(&PlanRequest::new("a | b | c", &settings)).is_err());
    }

    #[test]
    fn test_stage_count() {
        let settings = contracts::RuntimeSettings::default();
        let cases = [
            ("cat", None, None, 1),
            ("cat | cat", Some(1), None, 3),
            ("cat | cat | cat", Some(1), Some(2), 5),
            ("sh -c 'cat > #PIPE#' | cat", Some(1), Some(2), 5),
        ];

        for (template, input, output, stages) in cases {
            let plan =
                compile_plan(&PlanRequest::new(template, &settings).with_ports(input, output))
                    .unwrap();
            assert_eq!(plan.stages.len(), stages, "template: {template}");
        }
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::path::Path;
    use std::time::Duration;

    use compiler::{compile_plan, materialize_in, CompiledPipeline, PlanRequest};
    use contracts::{CompletionReason, RuntimeSettings};
    use supervisor::SupervisorReport;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Loopback listeners standing in for the producer and the consumer
    struct Boundary {
        input: TcpListener,
        output: TcpListener,
    }

    impl Boundary {
        async fn bind() -> Self {
            Self {
                input: TcpListener::bind("127.0.0.1:0").await.unwrap(),
                output: TcpListener::bind("127.0.0.1:0").await.unwrap(),
            }
        }

        fn ports(&self) -> (Option<u16>, Option<u16>) {
            (
                Some(self.input.local_addr().unwrap().port()),
                Some(self.output.local_addr().unwrap().port()),
            )
        }
    }

    fn settings() -> RuntimeSettings {
        let mut settings = RuntimeSettings::default();
        settings.teardown.grace_ms = 500;
        settings.teardown.fast_grace_ms = 100;
        settings
    }

    async fn compile(
        template: &str,
        boundary: &Boundary,
        settings: &RuntimeSettings,
        dir: &Path,
    ) -> CompiledPipeline {
        let (input, output) = boundary.ports();
        let plan =
            compile_plan(&PlanRequest::new(template, settings).with_ports(input, output)).unwrap();
        materialize_in(plan, &settings.marker, dir).await.unwrap()
    }

    fn spawn_run(
        pipeline: CompiledPipeline,
        settings: RuntimeSettings,
    ) -> JoinHandle<SupervisorReport> {
        tokio::spawn(async move { supervisor::run(pipeline, &settings).await })
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 253) as u8).collect()
    }

    /// Send `data` through `template` and return what reached the output socket
    async fn pass_through(
        template: &str,
        data: Vec<u8>,
        settings: RuntimeSettings,
    ) -> (Vec<u8>, SupervisorReport) {
        let dir = tempfile::tempdir().unwrap();
        let boundary = Boundary::bind().await;
        let pipeline = compile(template, &boundary, &settings, dir.path()).await;
        let run = spawn_run(pipeline, settings);

        let (mut producer, _) = boundary.input.accept().await.unwrap();
        let (mut consumer, _) = boundary.output.accept().await.unwrap();

        let writer = tokio::spawn(async move {
            producer.write_all(&data).await.unwrap();
            producer.shutdown().await.unwrap();
            producer
        });

        let mut received = Vec::new();
        tokio::time::timeout(Duration::from_secs(10), consumer.read_to_end(&mut received))
            .await
            .expect("output not closed in time")
            .unwrap();
        let _producer = writer.await.unwrap();

        let report = tokio::time::timeout(Duration::from_secs(10), run)
            .await
            .expect("pipeline did not finish")
            .unwrap();
        assert_eq!(
            std::fs::read_dir(dir.path()).unwrap().count(),
            0,
            "named pipe left behind"
        );
        (received, report)
    }

    #[tokio::test]
    async fn test_passthrough_below_buffer_size() {
        let data = payload(100);
        let (received, report) = pass_through("cat", data.clone(), settings()).await;

        assert_eq!(received, data);
        assert_eq!(report.reason, CompletionReason::SourceExhausted { stage: 0 });
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.movers[0].bytes, 100);
        assert_eq!(report.teardown.processes_killed, 0);
    }

    #[tokio::test]
    async fn test_passthrough_above_buffer_size() {
        let mut settings = settings();
        settings.limits.buffer_size = 4096;
        let data = payload(1024 * 1024 + 13);

        let (received, report) = pass_through("cat | cat", data.clone(), settings).await;

        assert_eq!(received.len(), data.len());
        assert_eq!(received, data);
        assert_eq!(report.exit_code(), 0);
        for mover in &report.movers {
            assert_eq!(mover.bytes, data.len() as u64);
        }
    }

    #[tokio::test]
    async fn test_multi_stage_transform() {
        let (received, report) = pass_through(
            "sed s/pipe/PIPE/g | tr a-z A-Z | cat",
            b"a pipe of pipes\n".to_vec(),
            settings(),
        )
        .await;

        assert_eq!(received, b"A PIPE OF PIPES\n");
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.completions.len(), 5);
    }

    #[tokio::test]
    async fn test_named_pipe_carries_data() {
        let (received, report) = pass_through(
            "sh -c 'cat > #PIPE#' | tr a-z A-Z",
            b"hello named pipe".to_vec(),
            settings(),
        )
        .await;

        assert_eq!(received, b"HELLO NAMED PIPE");
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.movers.len(), 3);
    }

    #[tokio::test]
    async fn test_custom_marker() {
        let mut settings = settings();
        settings.marker = "@FIFO@".to_string();

        let (received, _report) = pass_through(
            "sh -c 'tr a-z A-Z > @FIFO@' | cat",
            b"custom marker".to_vec(),
            settings,
        )
        .await;

        assert_eq!(received, b"CUSTOM MARKER");
    }

    #[tokio::test]
    async fn test_early_exit_ends_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings();
        let boundary = Boundary::bind().await;
        let pipeline = compile("head -c 5", &boundary, &settings, dir.path()).await;
        let run = spawn_run(pipeline, settings);

        let (mut producer, _) = boundary.input.accept().await.unwrap();
        let (mut consumer, _) = boundary.output.accept().await.unwrap();

        // producer stays open; the pipeline must still end
        producer.write_all(b"hello world").await.unwrap();

        let mut received = Vec::new();
        consumer.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"hello");

        let report = tokio::time::timeout(Duration::from_secs(10), run)
            .await
            .expect("pipeline did not finish")
            .unwrap();
        match report.reason {
            CompletionReason::StageEnded { stage } => assert_ne!(stage, 0),
            other => panic!("unexpected reason: {other:?}"),
        }
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.teardown.movers_aborted, 1);
    }

    #[tokio::test]
    async fn test_failing_stage() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings();
        let boundary = Boundary::bind().await;
        let pipeline = compile("cat | sh -c 'exit 4'", &boundary, &settings, dir.path()).await;
        let run = spawn_run(pipeline, settings);

        let (_producer, _) = boundary.input.accept().await.unwrap();
        let (mut consumer, _) = boundary.output.accept().await.unwrap();

        let mut received = Vec::new();
        consumer.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());

        let report = tokio::time::timeout(Duration::from_secs(10), run)
            .await
            .expect("pipeline did not finish")
            .unwrap();
        assert!(matches!(
            report.reason,
            CompletionReason::StageFailed { stage: 2, .. }
        ));
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.teardown.processes_killed, 1);
    }

    #[tokio::test]
    async fn test_silent_producer_stalls() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings();
        settings.watchdog.enabled = true;
        settings.watchdog.check_interval_ms = 50;
        settings.watchdog.stall_checks = 3;
        let boundary = Boundary::bind().await;
        let pipeline = compile("cat", &boundary, &settings, dir.path()).await;
        let run = spawn_run(pipeline, settings);

        let (_producer, _) = boundary.input.accept().await.unwrap();
        let (_consumer, _) = boundary.output.accept().await.unwrap();

        let report = tokio::time::timeout(Duration::from_secs(10), run)
            .await
            .expect("pipeline did not finish")
            .unwrap();
        assert_eq!(report.reason, CompletionReason::Stalled { idle_ms: 150 });
        assert_eq!(report.exit_code(), 3);
        assert_eq!(report.teardown.processes_killed, 1);
    }
}
