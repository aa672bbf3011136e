//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置文件到运行的完整链路
//! - Controller ↔ Reader 协议 e2e 测试（模拟设备 + 真实文件输出）
//! - 故障路径与通道清空

#[cfg(test)]
mod support {
    use std::path::{Path, PathBuf};
    use std::time::{Duration, Instant};

    use std::future::Future;

    use acquisition::{Controller, TickOutcome};
    use contracts::{
        AcquisitionConfig, AcquisitionError, ControllerSettings, DeviceDriver, DeviceSession,
        SampleBatch, SinkKind, SinkOpener, SinkSettings, Waveform,
    };
    use device::SimulatedDevice;
    use sinks::{ConfiguredSinks, CSV_HEADER};

    pub const OUTPUT_FILE: &str = "Output_Data.csv";

    /// Counter waveform, unthrottled: reading k of a run has value k
    pub fn counter_device() -> SimulatedDevice {
        SimulatedDevice::new(Waveform::Counter {
            start: 0.0,
            step: 1.0,
        })
        .with_realtime(false)
    }

    pub fn file_sinks(dir: &Path) -> ConfiguredSinks {
        ConfiguredSinks::new(SinkSettings {
            kind: SinkKind::File,
            directory: dir.to_path_buf(),
            file_name: OUTPUT_FILE.to_string(),
        })
    }

    pub fn controller_settings(read_timeout_ms: u64) -> ControllerSettings {
        ControllerSettings {
            read_timeout_ms,
            ack_timeout_ms: Some(5_000),
            ..Default::default()
        }
    }

    pub fn controller<D: DeviceDriver>(
        device: D,
        dir: &Path,
        read_timeout_ms: u64,
    ) -> Controller<D, ConfiguredSinks> {
        controller_with(device, dir, controller_settings(read_timeout_ms))
    }

    pub fn controller_with<D: DeviceDriver>(
        device: D,
        dir: &Path,
        settings: ControllerSettings,
    ) -> Controller<D, ConfiguredSinks> {
        Controller::new(device, file_sinks(dir), settings, OUTPUT_FILE)
    }

    /// Driver whose read parks the calling thread, like a vendor C call,
    /// and ignores the timeout it is given
    #[derive(Debug, Clone)]
    pub struct BlockingDevice {
        pub delay: Duration,
    }

    pub struct BlockingSession {
        delay: Duration,
        sequence: u64,
    }

    impl DeviceDriver for BlockingDevice {
        type Session = BlockingSession;

        fn configure(
            &self,
            _config: &AcquisitionConfig,
        ) -> impl Future<Output = Result<Self::Session, AcquisitionError>> + Send {
            let session = BlockingSession {
                delay: self.delay,
                sequence: 0,
            };
            async move { Ok(session) }
        }
    }

    impl DeviceSession for BlockingSession {
        async fn read_batch(
            &mut self,
            count: usize,
            _timeout: Duration,
        ) -> Result<SampleBatch, AcquisitionError> {
            std::thread::sleep(self.delay);
            let start = self.sequence * count as u64;
            let readings = (start..start + count as u64).map(|v| v as f64).collect();
            let batch = SampleBatch::new(self.sequence, readings);
            self.sequence += 1;
            Ok(batch)
        }

        async fn teardown(&mut self) -> Result<(), AcquisitionError> {
            Ok(())
        }
    }

    /// Tick until at least `min` samples were displayed or a fault surfaces
    pub async fn tick_until<D: DeviceDriver, O: SinkOpener>(
        controller: &mut Controller<D, O>,
        display: &mut Vec<f64>,
        min: usize,
    ) -> TickOutcome {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let outcome = controller.tick(display);
            match outcome {
                TickOutcome::Faulted(_) | TickOutcome::Idle => return outcome,
                TickOutcome::Streaming { .. } if display.len() >= min => return outcome,
                TickOutcome::Streaming { .. } => {}
            }
            assert!(Instant::now() < deadline, "timed out waiting for samples");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Values in a CSV artifact, header skipped
    pub fn read_artifact(path: &Path) -> Vec<f64> {
        let content = std::fs::read_to_string(path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        lines.map(|line| line.parse().unwrap()).collect()
    }

    pub fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE)
    }
}

#[cfg(test)]
mod protocol_tests {
    use acquisition::{ReaderState, RunOutcome, TickOutcome};
    use contracts::{AcquisitionConfig, FaultInjection, FaultKind, InjectedFault};

    use crate::support::*;

    /// Start then immediately stop: one Ack, no fault, nothing left running
    #[tokio::test]
    async fn test_start_then_immediate_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(counter_device(), dir.path(), 1_000);

        controller.start(AcquisitionConfig::default()).unwrap();
        let summary = controller.stop().await.unwrap().unwrap();

        assert_eq!(summary.outcome, RunOutcome::Acknowledged);
        assert!(!summary.context_alive);
        assert!(summary.channels_clean);
        assert_eq!(summary.drained.ack, 0);
        assert_eq!(summary.drained.fault, 0);
        assert!(!controller.is_running());

        let report = summary.report.unwrap();
        assert_eq!(report.final_state, ReaderState::Terminated);
        assert!(!report.history.contains(&ReaderState::Faulted));
    }

    /// Every reading produced before the Ack reaches the controller, in order
    #[tokio::test]
    async fn test_readings_arrive_in_order_before_ack() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(counter_device(), dir.path(), 1_000);
        let config = AcquisitionConfig::default();
        let batch = config.samples_per_read as u64;

        controller.start(config).unwrap();
        let mut display = Vec::new();
        let outcome = tick_until(&mut controller, &mut display, 300).await;
        assert!(matches!(outcome, TickOutcome::Streaming { .. }));

        let summary = controller.stop().await.unwrap().unwrap();
        assert!(summary.outcome.is_acknowledged());
        let report = summary.report.unwrap();

        let mut received = display.clone();
        received.extend_from_slice(&summary.residual_samples);
        assert_eq!(received.len() as u64, report.iterations * batch);
        assert_eq!(report.samples, report.iterations * batch);
        for (index, value) in received.iter().enumerate() {
            assert_eq!(*value, index as f64);
        }
        assert_eq!(summary.samples_displayed, display.len() as u64);
    }

    /// A second Stop is discarded: one Ack, no error
    #[tokio::test]
    async fn test_stop_twice() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(counter_device(), dir.path(), 1_000);
        controller.start(AcquisitionConfig::default()).unwrap();

        assert!(controller.request_stop().unwrap());
        assert!(!controller.request_stop().unwrap());
        let summary = controller.stop().await.unwrap().unwrap();
        assert!(summary.outcome.is_acknowledged());
        assert_eq!(summary.drained.ack, 0);
        assert_eq!(summary.drained.command, 0);

        // stopping again after the run ended is a no-op
        assert!(controller.stop().await.unwrap().is_none());
    }

    /// Read timeout: Faulted, fault relayed, channels drained
    #[tokio::test]
    async fn test_read_timeout_faults_run() {
        let dir = tempfile::tempdir().unwrap();
        let device = counter_device().with_fault(FaultInjection {
            after_batches: 3,
            kind: InjectedFault::ReadTimeout,
        });
        let mut controller = controller(device, dir.path(), 100);
        controller.start(AcquisitionConfig::default()).unwrap();

        let mut display = Vec::new();
        let outcome = tick_until(&mut controller, &mut display, usize::MAX).await;
        let TickOutcome::Faulted(fault) = outcome else {
            panic!("expected fault, got {outcome:?}");
        };
        assert_eq!(fault.kind, FaultKind::Timeout);

        let summary = controller.stop().await.unwrap().unwrap();
        assert_eq!(summary.outcome, RunOutcome::Faulted(fault));
        assert!(!summary.context_alive);
        assert!(summary.channels_clean);

        let report = summary.report.unwrap();
        assert_eq!(report.iterations, 3);
        assert_eq!(
            report.history,
            vec![
                ReaderState::Idle,
                ReaderState::Configuring,
                ReaderState::Running,
                ReaderState::Faulted,
                ReaderState::Terminated,
            ]
        );
        // nothing produced before the fault was lost
        assert_eq!(display.len() + summary.residual_samples.len(), 90);
    }

    /// Fault raised while the controller is waiting for the Ack replaces it
    #[tokio::test]
    async fn test_fault_during_stop_handshake() {
        let dir = tempfile::tempdir().unwrap();
        let device = counter_device().with_fault(FaultInjection {
            after_batches: 0,
            kind: InjectedFault::ReadTimeout,
        });
        let mut controller = controller(device, dir.path(), 200);
        controller.start(AcquisitionConfig::default()).unwrap();

        // Stop is only polled after a completed read, so the timeout wins
        let summary = controller.stop().await.unwrap().unwrap();
        let fault = summary.outcome.fault().cloned().unwrap();
        assert_eq!(fault.kind, FaultKind::Timeout);
        assert!(!summary.context_alive);
        assert!(summary.channels_clean);
        assert_eq!(summary.report.unwrap().iterations, 0);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let dir = tempfile::tempdir().unwrap();
        let device = counter_device().with_fault(FaultInjection {
            after_batches: 2,
            kind: InjectedFault::Panic,
        });
        let mut controller = controller(device, dir.path(), 1_000);
        controller.start(AcquisitionConfig::default()).unwrap();

        let mut display = Vec::new();
        let outcome = tick_until(&mut controller, &mut display, usize::MAX).await;
        assert!(matches!(outcome, TickOutcome::Faulted(ref f) if f.kind == FaultKind::Panic));

        let summary = controller.stop().await.unwrap().unwrap();
        assert!(summary.report.is_none());
        assert!(!summary.context_alive);
        assert!(summary.channels_clean);

        // the controller is usable again
        controller.start(AcquisitionConfig::default()).unwrap();
        assert!(controller.stop().await.unwrap().unwrap().outcome.is_acknowledged());
    }

    #[tokio::test]
    async fn test_configure_failure_is_config_fault() {
        let dir = tempfile::tempdir().unwrap();
        let device = counter_device().with_fault(FaultInjection {
            after_batches: 0,
            kind: InjectedFault::ConfigureFailure,
        });
        let mut controller = controller(device, dir.path(), 1_000);
        controller.start(AcquisitionConfig::default()).unwrap();

        let summary = controller.stop().await.unwrap().unwrap();
        let fault = summary.outcome.fault().cloned().unwrap();
        assert_eq!(fault.kind, FaultKind::Config);
        let report = summary.report.unwrap();
        assert_eq!(report.iterations, 0);
        assert!(report.history.contains(&ReaderState::Faulted));
    }

    /// Second run gets fresh channels and sees nothing from the first
    #[tokio::test]
    async fn test_second_run_has_fresh_channels() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(counter_device(), dir.path(), 1_000);

        let first = controller.start(AcquisitionConfig::default()).unwrap();
        let mut display = Vec::new();
        tick_until(&mut controller, &mut display, 60).await;
        let first_summary = controller.stop().await.unwrap().unwrap();
        assert!(first_summary.outcome.is_acknowledged());

        let second = controller.start(AcquisitionConfig::default()).unwrap();
        assert_ne!(first, second);

        let mut display = Vec::new();
        tick_until(&mut controller, &mut display, 1).await;
        // counter restarts: no reading carried over from the first run
        assert_eq!(display[0], 0.0);

        let summary = controller.stop().await.unwrap().unwrap();
        assert_eq!(summary.run_id, second);
        assert!(summary.outcome.is_acknowledged());
        assert_eq!(summary.drained.ack, 0);
        assert_eq!(summary.drained.command, 0);
        assert_eq!(summary.drained.fault, 0);
    }
}

#[cfg(test)]
mod handshake_tests {
    use std::time::{Duration, Instant};

    use acquisition::RunOutcome;
    use contracts::{AcquisitionConfig, ControllerSettings, FaultKind};

    use crate::support::*;

    fn settings(read_ms: u64, ack_ms: u64, join_ms: u64) -> ControllerSettings {
        ControllerSettings {
            read_timeout_ms: read_ms,
            ack_timeout_ms: Some(ack_ms),
            join_timeout_ms: join_ms,
            ..Default::default()
        }
    }

    /// A reader stuck in a blocking read: stop returns within the ack and join bounds
    #[tokio::test]
    async fn test_stop_is_bounded_when_reader_is_stuck() {
        let dir = tempfile::tempdir().unwrap();
        let device = BlockingDevice {
            delay: Duration::from_millis(1_500),
        };
        let mut controller = controller_with(device, dir.path(), settings(100, 200, 100));
        controller.start(AcquisitionConfig::default()).unwrap();

        let started = Instant::now();
        let summary = controller.stop().await.unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_millis(1_000));

        let fault = summary.outcome.fault().unwrap();
        assert_eq!(fault.kind, FaultKind::ChannelProtocol);
        assert!(fault.message.contains("no acknowledgement within 200 ms"));
        assert!(summary.context_alive);
        assert!(summary.report.is_none());
        assert!(!controller.is_running());
    }

    /// The read outlives its timeout after the ack wait expired: the relayed
    /// timeout replaces the controller's protocol fault
    #[tokio::test]
    async fn test_late_read_timeout_replaces_protocol_fault() {
        let dir = tempfile::tempdir().unwrap();
        let device = BlockingDevice {
            delay: Duration::from_millis(300),
        };
        let mut controller = controller_with(device, dir.path(), settings(100, 150, 5_000));
        controller.start(AcquisitionConfig::default()).unwrap();

        let summary = controller.stop().await.unwrap().unwrap();
        let fault = summary.outcome.fault().unwrap();
        assert_eq!(fault.kind, FaultKind::Timeout);
        assert!(!summary.context_alive);
        assert!(summary.channels_clean);
        assert_eq!(summary.drained.fault, 0);

        let report = summary.report.unwrap();
        assert_eq!(report.iterations, 0);
        assert!(summary.residual_samples.is_empty());
    }

    /// Ack sent after the ack wait expired: the run still counts as acknowledged
    #[tokio::test]
    async fn test_ack_after_wait_expired_is_acknowledged() {
        let dir = tempfile::tempdir().unwrap();
        let device = BlockingDevice {
            delay: Duration::from_millis(300),
        };
        let mut controller = controller_with(device, dir.path(), settings(2_000, 150, 5_000));
        controller.start(AcquisitionConfig::default()).unwrap();

        let summary = controller.stop().await.unwrap().unwrap();
        assert_eq!(summary.outcome, RunOutcome::Acknowledged);
        assert!(!summary.context_alive);
        assert!(summary.channels_clean);
        assert_eq!(summary.drained.ack, 0);

        let report = summary.report.unwrap();
        assert_eq!(report.iterations, 1);
        assert_eq!(summary.residual_samples.len(), 30);
        assert_eq!(read_artifact(&output_path(dir.path())).len(), 30);
    }
}

#[cfg(test)]
mod artifact_tests {
    use acquisition::TickOutcome;
    use contracts::{AcquisitionConfig, FaultInjection, InjectedFault};
    use device::ReplayDevice;

    use crate::support::*;

    fn bench_config() -> AcquisitionConfig {
        AcquisitionConfig {
            sample_rate: 60.0,
            samples_per_read: 30,
            ..Default::default()
        }
    }

    /// Artifact holds iterations x 30 values matching the data channel
    #[tokio::test]
    async fn test_artifact_matches_data_channel() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(counter_device(), dir.path(), 1_000);
        controller.start(bench_config()).unwrap();

        let mut display = Vec::new();
        tick_until(&mut controller, &mut display, 150).await;
        let summary = controller.stop().await.unwrap().unwrap();
        let report = summary.report.unwrap();

        let mut received = display;
        received.extend_from_slice(&summary.residual_samples);

        let artifact = read_artifact(&output_path(dir.path()));
        assert_eq!(artifact.len() as u64, report.iterations * 30);
        assert_eq!(artifact, received);
    }

    /// Batches are on disk while the run is still active
    #[tokio::test]
    async fn test_artifact_is_flushed_per_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(counter_device(), dir.path(), 1_000);
        controller.start(bench_config()).unwrap();

        // 90 forwarded readings mean at least the first two batches were written
        let mut display = Vec::new();
        tick_until(&mut controller, &mut display, 90).await;
        let content = std::fs::read_to_string(output_path(dir.path())).unwrap();
        let on_disk: Vec<f64> = content
            .lines()
            .skip(1)
            .take(60)
            .map(|line| line.parse().unwrap())
            .collect();
        assert_eq!(on_disk, (0..60).map(f64::from).collect::<Vec<_>>());
        assert!(controller.is_running());

        let summary = controller.stop().await.unwrap().unwrap();
        assert!(summary.outcome.is_acknowledged());
    }

    /// Fixed iteration count: the device fails after five batches
    #[tokio::test]
    async fn test_artifact_after_fixed_iterations() {
        let dir = tempfile::tempdir().unwrap();
        let device = counter_device().with_fault(FaultInjection {
            after_batches: 5,
            kind: InjectedFault::DeviceError,
        });
        let mut controller = controller(device, dir.path(), 1_000);
        controller.start(bench_config()).unwrap();

        let mut display = Vec::new();
        let outcome = tick_until(&mut controller, &mut display, usize::MAX).await;
        assert!(matches!(outcome, TickOutcome::Faulted(_)));
        let summary = controller.stop().await.unwrap().unwrap();
        assert_eq!(summary.report.unwrap().iterations, 5);

        let artifact = read_artifact(&output_path(dir.path()));
        assert_eq!(artifact.len(), 150);
        assert_eq!(artifact, (0..150).map(f64::from).collect::<Vec<_>>());
    }

    /// A recorded artifact replays as the same sample sequence
    #[tokio::test]
    async fn test_replay_reproduces_recorded_run() {
        let record_dir = tempfile::tempdir().unwrap();
        let device = counter_device().with_fault(FaultInjection {
            after_batches: 4,
            kind: InjectedFault::DeviceError,
        });
        let mut recorder = controller(device, record_dir.path(), 1_000);
        recorder.start(bench_config()).unwrap();
        let outcome = tick_until(&mut recorder, &mut Vec::new(), usize::MAX).await;
        assert!(matches!(outcome, TickOutcome::Faulted(_)));
        recorder.stop().await.unwrap();
        let recorded = read_artifact(&output_path(record_dir.path()));
        assert_eq!(recorded.len(), 120);

        let replay_dir = tempfile::tempdir().unwrap();
        let replay = ReplayDevice::new(output_path(record_dir.path()))
            .with_loop(false)
            .with_realtime(false);
        let mut player = controller(replay, replay_dir.path(), 1_000);
        player.start(bench_config()).unwrap();

        let mut display = Vec::new();
        let outcome = tick_until(&mut player, &mut display, usize::MAX).await;
        // non-looped replay ends with an exhausted-device fault
        assert!(matches!(outcome, TickOutcome::Faulted(_)));
        let summary = player.stop().await.unwrap().unwrap();

        let mut replayed = display;
        replayed.extend_from_slice(&summary.residual_samples);
        assert_eq!(replayed, recorded);
        assert_eq!(read_artifact(&output_path(replay_dir.path())), recorded);
    }
}

#[cfg(test)]
mod config_tests {
    use acquisition::Controller;
    use config_loader::{ConfigFormat, ConfigLoader};
    use device::ConfiguredDevice;
    use sinks::ConfiguredSinks;

    use crate::support::*;

    /// Settings file drives a complete run
    #[tokio::test]
    async fn test_run_from_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let content = format!(
            r#"
[acquisition]
sample_rate = 1000.0
samples_per_read = 10
device_name = "Dev1"
channel = 2

[device]
realtime = false
waveform = {{ type = "constant", value = 1.25 }}

[sink]
directory = "{}"
file_name = "bench.csv"

[controller]
read_timeout_ms = 500
"#,
            dir.path().display().to_string().replace('\\', "/")
        );
        let settings = ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap();

        let device = ConfiguredDevice::from_settings(&settings.device).unwrap();
        let mut controller = Controller::new(
            device,
            ConfiguredSinks::new(settings.sink.clone()),
            settings.controller.clone(),
            settings.sink.file_name.clone(),
        );
        controller.start(settings.acquisition.clone()).unwrap();

        let mut display = Vec::new();
        tick_until(&mut controller, &mut display, 20).await;
        let summary = controller.stop().await.unwrap().unwrap();
        assert!(summary.outcome.is_acknowledged());
        assert!(display.iter().all(|v| *v == 1.25));

        let artifact = read_artifact(&settings.sink.output_path());
        assert!(!artifact.is_empty());
        assert!(artifact.iter().all(|v| *v == 1.25));
    }
}
