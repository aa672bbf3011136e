//! Controller - consumer and supervisor of reader runs
//!
//! Allocates fresh channels for every run, launches the reader under the
//! fault relay, feeds the display from the data channel on each tick and runs
//! the stop handshake. After `stop` returns, no reader context is alive and no
//! channel of the finished run holds a message.

use std::sync::Arc;

use contracts::{
    AcquisitionConfig, AcquisitionError, ControlToken, ControllerSettings, DeviceDriver,
    FaultPayload, RunId, SampleDisplay, SinkOpener,
};
use observability::{
    record_fault, record_residual_drained, record_run_finished, record_run_started,
    record_samples_displayed,
};
use tracing::{debug, error, info, instrument, warn};

use crate::channel::{
    ControlChannels, ControllerEndpoints, ACK_CHANNEL, COMMAND_CHANNEL, DATA_CHANNEL,
    FAULT_CHANNEL,
};
use crate::reader::{ReaderLoop, RunReport};
use crate::relay::ReaderProcess;

/// Controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Running,
}

/// Result of one display tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No active run
    Idle,
    /// Samples forwarded to the display this tick
    Streaming { samples: usize },
    /// The reader faulted; the caller should stop the run
    Faulted(FaultPayload),
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Acknowledged,
    Faulted(FaultPayload),
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acknowledged => "acknowledged",
            Self::Faulted(_) => "faulted",
        }
    }

    pub fn fault(&self) -> Option<&FaultPayload> {
        match self {
            Self::Acknowledged => None,
            Self::Faulted(fault) => Some(fault),
        }
    }

    pub fn is_acknowledged(&self) -> bool {
        matches!(self, Self::Acknowledged)
    }
}

/// Messages discarded per channel while stopping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainCounts {
    pub data: usize,
    pub command: usize,
    pub ack: usize,
    pub fault: usize,
}

/// Everything known about a run once it is stopped
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: RunId,
    pub outcome: RunOutcome,
    /// `None` when the reader panicked
    pub report: Option<RunReport>,
    /// Samples handed to the display over the run
    pub samples_displayed: u64,
    /// Readings still queued on the data channel at stop, in order
    pub residual_samples: Vec<f64>,
    pub drained: DrainCounts,
    /// All four channels were empty after the drain
    pub channels_clean: bool,
    /// Reader context still running after join (always false on success)
    pub context_alive: bool,
}

struct ActiveRun {
    run_id: RunId,
    endpoints: ControllerEndpoints,
    process: ReaderProcess,
    stop_sent: bool,
    surfaced_fault: Option<FaultPayload>,
    samples_displayed: u64,
}

enum Handshake {
    Acked,
    Fault(FaultPayload),
    /// Protocol failure detected by the controller itself
    Synthesized(FaultPayload),
}

enum AckWait {
    Token(ControlToken),
    Fault(FaultPayload),
    Exited,
}

/// Starts, feeds and stops reader runs, one at a time
pub struct Controller<D: DeviceDriver, O: SinkOpener> {
    driver: Arc<D>,
    opener: Arc<O>,
    settings: ControllerSettings,
    sink_identifier: String,
    next_run_id: RunId,
    active: Option<ActiveRun>,
}

impl<D: DeviceDriver, O: SinkOpener> Controller<D, O> {
    pub fn new(
        driver: D,
        opener: O,
        settings: ControllerSettings,
        sink_identifier: impl Into<String>,
    ) -> Self {
        Self {
            driver: Arc::new(driver),
            opener: Arc::new(opener),
            settings,
            sink_identifier: sink_identifier.into(),
            next_run_id: 1,
            active: None,
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn state(&self) -> ControllerState {
        if self.active.is_some() {
            ControllerState::Running
        } else {
            ControllerState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn current_run_id(&self) -> Option<RunId> {
        self.active.as_ref().map(|run| run.run_id)
    }

    /// Launch a run with `config`
    ///
    /// # Errors
    /// - `AcquisitionError::Config` if `config` is invalid; nothing is started
    /// - `AcquisitionError::Runtime` if a run is already active or the reader
    ///   context cannot be created
    #[instrument(
        name = "controller_start",
        skip(self, config),
        fields(channel = %config.physical_channel())
    )]
    pub fn start(&mut self, config: AcquisitionConfig) -> Result<RunId, AcquisitionError> {
        config.validate()?;
        if let Some(run) = &self.active {
            return Err(AcquisitionError::runtime(format!(
                "run {} is still active",
                run.run_id
            )));
        }

        let run_id = self.next_run_id;
        self.next_run_id += 1;

        let channel = config.physical_channel();
        let channels = ControlChannels::allocate();
        let reader = ReaderLoop::new(
            run_id,
            config,
            Arc::clone(&self.driver),
            Arc::clone(&self.opener),
            self.sink_identifier.clone(),
            channels.reader,
        )
        .with_read_timeout(self.settings.read_timeout());

        let process = ReaderProcess::spawn(
            reader,
            channels.controller.command.clone(),
            channels.fault_tx,
            channels.fault_rx,
        )?;

        record_run_started(run_id);
        info!(run_id, channel = %channel, sink = %self.sink_identifier, "Run started");

        self.active = Some(ActiveRun {
            run_id,
            endpoints: channels.controller,
            process,
            stop_sent: false,
            surfaced_fault: None,
            samples_displayed: 0,
        });
        Ok(run_id)
    }

    /// Forward newly received samples to `display` and check for a fault
    ///
    /// Never blocks. Once a fault has been surfaced the display receives no
    /// more samples from this run.
    pub fn tick<S: SampleDisplay + ?Sized>(&mut self, display: &mut S) -> TickOutcome {
        let Some(run) = self.active.as_mut() else {
            return TickOutcome::Idle;
        };
        if let Some(fault) = &run.surfaced_fault {
            return TickOutcome::Faulted(fault.clone());
        }

        let mut samples = Vec::new();
        let received = match self.settings.max_samples_per_tick {
            0 => run.endpoints.data.drain_into(&mut samples),
            max => run.endpoints.data.drain_up_to(&mut samples, max),
        };
        if received > 0 {
            display.push_samples(&samples);
            record_samples_displayed(received);
            run.samples_displayed += received as u64;
        }

        if let Some(fault) = run.process.last_fault().cloned() {
            error!(
                run_id = run.run_id,
                kind = %fault.kind,
                message = %fault.message,
                "Reader fault surfaced"
            );
            record_fault(fault.kind);
            display.show_fault(&fault);
            run.surfaced_fault = Some(fault.clone());
            return TickOutcome::Faulted(fault);
        }

        TickOutcome::Streaming { samples: received }
    }

    /// Send Stop to the current run
    ///
    /// Returns `Ok(false)` when there is no run or Stop was already sent; the
    /// second request is discarded.
    pub fn request_stop(&mut self) -> Result<bool, AcquisitionError> {
        let Some(run) = self.active.as_mut() else {
            return Ok(false);
        };
        if run.stop_sent {
            debug!(run_id = run.run_id, "Stop already sent, request discarded");
            return Ok(false);
        }
        run.endpoints.command.send(ControlToken::Stop)?;
        run.stop_sent = true;
        debug!(run_id = run.run_id, "Stop sent");
        Ok(true)
    }

    /// Shut the current run down and return to idle
    ///
    /// Without a fault: send Stop (once) and wait, bounded by the ack timeout,
    /// for Ack or Fault. With a fault: no Ack is expected. Either way the
    /// reader context is terminated and joined, then every channel is drained.
    ///
    /// Returns `Ok(None)` when no run is active.
    #[instrument(name = "controller_stop", skip(self), fields(run_id = ?self.current_run_id()))]
    pub async fn stop(&mut self) -> Result<Option<RunSummary>, AcquisitionError> {
        let Some(mut run) = self.active.take() else {
            debug!("Stop requested with no active run");
            return Ok(None);
        };
        let run_id = run.run_id;

        let known_fault = run
            .surfaced_fault
            .clone()
            .or_else(|| run.process.last_fault().cloned());
        let handshake = match known_fault {
            Some(fault) => {
                info!(run_id, kind = %fault.kind, "Stopping faulted run");
                Handshake::Fault(fault)
            }
            None => self.handshake(&mut run).await,
        };

        run.process.terminate();
        let report = match run.process.join(self.settings.join_timeout()).await {
            Ok(report) => report,
            Err(e) => {
                error!(run_id, error = %e, "Reader join failed");
                None
            }
        };

        let outcome = match handshake {
            Handshake::Acked => RunOutcome::Acknowledged,
            Handshake::Fault(fault) => RunOutcome::Faulted(fault),
            Handshake::Synthesized(synthetic) => self.reconcile(&mut run, synthetic),
        };

        let mut residual_samples = Vec::new();
        let drained = DrainCounts {
            data: run.endpoints.data.drain_into(&mut residual_samples),
            command: run.endpoints.command_residual.drain(),
            ack: run.endpoints.ack.drain(),
            fault: run.process.drain_faults(),
        };
        record_residual_drained(DATA_CHANNEL, drained.data);
        record_residual_drained(COMMAND_CHANNEL, drained.command);
        record_residual_drained(ACK_CHANNEL, drained.ack);
        record_residual_drained(FAULT_CHANNEL, drained.fault);

        let channels_clean = run.endpoints.all_empty() && run.process.fault_channel_empty();
        let context_alive = run.process.is_alive();

        if let RunOutcome::Faulted(fault) = &outcome {
            if run.surfaced_fault.is_none() {
                record_fault(fault.kind);
            }
        }
        record_run_finished(outcome.as_str());

        info!(
            run_id,
            outcome = outcome.as_str(),
            residual_samples = residual_samples.len(),
            channels_clean,
            "Run stopped"
        );

        Ok(Some(RunSummary {
            run_id,
            outcome,
            report,
            samples_displayed: run.samples_displayed,
            residual_samples,
            drained,
            channels_clean,
            context_alive,
        }))
    }

    /// Settle a failed handshake once the reader has been joined
    ///
    /// A fault relayed late wins over the controller-side one. Otherwise an Ack
    /// that arrived after the wait expired means the reader did finish cleanly.
    fn reconcile(&self, run: &mut ActiveRun, synthetic: FaultPayload) -> RunOutcome {
        let run_id = run.run_id;
        if let Some(relayed) = run.process.last_fault().cloned() {
            warn!(
                run_id,
                kind = %relayed.kind,
                "Relayed fault replaces controller-side protocol fault"
            );
            return RunOutcome::Faulted(relayed);
        }
        if !run.process.is_alive() {
            if let Ok(Some(ControlToken::Ack)) = run.endpoints.ack.try_receive() {
                warn!(run_id, "Ack arrived after the ack timeout, run acknowledged");
                return RunOutcome::Acknowledged;
            }
        }
        RunOutcome::Faulted(synthetic)
    }

    async fn handshake(&self, run: &mut ActiveRun) -> Handshake {
        let run_id = run.run_id;

        if !run.stop_sent {
            if let Err(e) = run.endpoints.command.send(ControlToken::Stop) {
                error!(run_id, error = %e, "Stop could not be sent");
                return Handshake::Synthesized(FaultPayload::from_error(run_id, &e));
            }
            run.stop_sent = true;
        }

        let ack_timeout = self.settings.ack_timeout();
        let ack = &run.endpoints.ack;
        let process = &mut run.process;

        let wait = async move {
            let token = tokio::select! {
                biased;
                token = ack.recv() => token,
                fault = process.wait_fault() => {
                    return fault.map_or(AckWait::Exited, AckWait::Fault);
                }
            };
            match token {
                Ok(token) => AckWait::Token(token),
                // Ack sender is gone; a panicking reader relays its fault after that
                Err(_) => process
                    .wait_fault()
                    .await
                    .map_or(AckWait::Exited, AckWait::Fault),
            }
        };

        let protocol_error = match tokio::time::timeout(ack_timeout, wait).await {
            Ok(AckWait::Token(ControlToken::Ack)) => {
                debug!(run_id, "Ack received");
                return Handshake::Acked;
            }
            Ok(AckWait::Fault(fault)) => {
                info!(run_id, kind = %fault.kind, "Fault received instead of Ack");
                return Handshake::Fault(fault);
            }
            Ok(AckWait::Token(ControlToken::Stop)) => {
                AcquisitionError::protocol(ACK_CHANNEL, "stop token received on the ack channel")
            }
            Ok(AckWait::Exited) => AcquisitionError::protocol(
                ACK_CHANNEL,
                "reader exited without acknowledgement or fault",
            ),
            Err(_) => AcquisitionError::protocol(
                ACK_CHANNEL,
                format!(
                    "no acknowledgement within {} ms",
                    ack_timeout.as_millis()
                ),
            ),
        };

        error!(run_id, error = %protocol_error, "Stop handshake failed");
        Handshake::Synthesized(FaultPayload::from_error(run_id, &protocol_error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SinkKind, SinkSettings, Waveform};
    use device::SimulatedDevice;
    use sinks::ConfiguredSinks;

    fn controller(device: SimulatedDevice) -> Controller<SimulatedDevice, ConfiguredSinks> {
        let opener = ConfiguredSinks::new(SinkSettings {
            kind: SinkKind::Log,
            ..Default::default()
        });
        Controller::new(device, opener, ControllerSettings::default(), "controller")
    }

    fn unthrottled() -> SimulatedDevice {
        SimulatedDevice::new(Waveform::Counter {
            start: 0.0,
            step: 1.0,
        })
        .with_realtime(false)
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let mut controller = controller(unthrottled());
        assert_eq!(controller.state(), ControllerState::Idle);
        assert!(controller.stop().await.unwrap().is_none());
        assert!(!controller.request_stop().unwrap());
        assert_eq!(controller.tick(&mut ()), TickOutcome::Idle);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_start() {
        let mut controller = controller(unthrottled());
        let config = AcquisitionConfig {
            sample_rate: -1.0,
            ..Default::default()
        };
        let err = controller.start(config).unwrap_err();
        assert!(matches!(err, AcquisitionError::Config { .. }));
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn test_second_start_while_running_is_refused() {
        let mut controller = controller(unthrottled());
        controller.start(AcquisitionConfig::default()).unwrap();
        assert!(controller.start(AcquisitionConfig::default()).is_err());

        let summary = controller.stop().await.unwrap().unwrap();
        assert!(summary.outcome.is_acknowledged());
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn test_request_stop_is_idempotent() {
        let mut controller = controller(unthrottled());
        controller.start(AcquisitionConfig::default()).unwrap();

        assert!(controller.request_stop().unwrap());
        assert!(!controller.request_stop().unwrap());

        let summary = controller.stop().await.unwrap().unwrap();
        assert!(summary.outcome.is_acknowledged());
        assert!(summary.channels_clean);
        assert!(!summary.context_alive);
    }

    #[tokio::test]
    async fn test_run_ids_increase() {
        let mut controller = controller(unthrottled());
        let first = controller.start(AcquisitionConfig::default()).unwrap();
        controller.stop().await.unwrap();
        let second = controller.start(AcquisitionConfig::default()).unwrap();
        controller.stop().await.unwrap();
        assert_eq!(second, first + 1);
    }

    #[tokio::test]
    async fn test_reader_exit_without_ack_is_protocol_fault() {
        use crate::channel::ReaderEndpoints;
        use contracts::FaultKind;

        let mut controller = controller(unthrottled());

        // The controller watches one set of channels while the reader runs on
        // another, so its ack sender is gone and no fault is ever relayed.
        let watched = ControlChannels::allocate();
        let ReaderEndpoints {
            data: _data,
            command: _command,
            ack,
        } = watched.reader;
        drop(ack);

        let detached = ControlChannels::allocate();
        detached.controller.command.send(ControlToken::Stop).unwrap();
        let reader = ReaderLoop::new(
            9,
            AcquisitionConfig::default(),
            Arc::clone(&controller.driver),
            Arc::clone(&controller.opener),
            "detached",
            detached.reader,
        );
        let process = ReaderProcess::spawn(
            reader,
            detached.controller.command.clone(),
            watched.fault_tx,
            watched.fault_rx,
        )
        .unwrap();

        controller.active = Some(ActiveRun {
            run_id: 9,
            endpoints: watched.controller,
            process,
            stop_sent: true,
            surfaced_fault: None,
            samples_displayed: 0,
        });

        let summary = controller.stop().await.unwrap().unwrap();
        let fault = summary.outcome.fault().unwrap();
        assert_eq!(fault.kind, FaultKind::ChannelProtocol);
        assert!(fault.message.contains("exited without acknowledgement"));
        assert!(!summary.context_alive);
        assert!(summary.channels_clean);
    }
}
