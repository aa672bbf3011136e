//! Simulated analog input device
//!
//! Generates a deterministic waveform at the configured sample rate.
//! Used for testing and development without acquisition hardware.

use std::f64::consts::TAU;
use std::future::Future;
use std::time::Duration;

use contracts::{
    AcquisitionConfig, AcquisitionError, DeviceDriver, DeviceSession, DeviceSettings,
    FaultInjection, InjectedFault, SampleBatch, Waveform,
};
use tracing::{debug, info, instrument, warn};

use crate::pacing::Pacer;

/// Simulated device driver
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    waveform: Waveform,
    realtime: bool,
    fault: Option<FaultInjection>,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new(Waveform::default())
    }
}

impl SimulatedDevice {
    /// Create a realtime-paced device producing `waveform`
    pub fn new(waveform: Waveform) -> Self {
        Self {
            waveform,
            realtime: true,
            fault: None,
        }
    }

    /// Build from the `[device]` settings section
    pub fn from_settings(settings: &DeviceSettings) -> Self {
        Self {
            waveform: settings.waveform,
            realtime: settings.realtime,
            fault: settings.fault,
        }
    }

    /// Pace reads at the nominal rate (`false` returns batches immediately)
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Inject a failure
    pub fn with_fault(mut self, fault: FaultInjection) -> Self {
        self.fault = Some(fault);
        self
    }

    fn open_session(
        &self,
        config: &AcquisitionConfig,
    ) -> Result<SimulatedSession, AcquisitionError> {
        config.validate()?;

        if let Some(FaultInjection {
            kind: InjectedFault::ConfigureFailure,
            ..
        }) = self.fault
        {
            warn!(channel = %config.physical_channel(), "Injected configure failure");
            return Err(AcquisitionError::config(
                "device_name",
                format!(
                    "device '{}' rejected the task configuration",
                    config.device_name
                ),
            ));
        }

        info!(
            channel = %config.physical_channel(),
            sample_rate = config.sample_rate,
            samples_per_read = config.samples_per_read,
            clock = %config.sample_clock_source,
            terminal = %config.terminal_configuration,
            realtime = self.realtime,
            "Simulated device configured"
        );

        let period = self.realtime.then(|| config.batch_period());
        Ok(SimulatedSession {
            config: config.clone(),
            waveform: self.waveform,
            fault: self.fault,
            pacer: Pacer::new(period),
            sequence: 0,
            sample_index: 0,
            torn_down: false,
        })
    }
}

impl DeviceDriver for SimulatedDevice {
    type Session = SimulatedSession;

    fn configure(
        &self,
        config: &AcquisitionConfig,
    ) -> impl Future<Output = Result<Self::Session, AcquisitionError>> + Send {
        let result = self.open_session(config);
        async move { result }
    }
}

/// Configured simulated acquisition task
#[derive(Debug)]
pub struct SimulatedSession {
    config: AcquisitionConfig,
    waveform: Waveform,
    fault: Option<FaultInjection>,
    pacer: Pacer,
    sequence: u64,
    sample_index: u64,
    torn_down: bool,
}

impl SimulatedSession {
    /// Batches delivered so far
    pub fn batches_read(&self) -> u64 {
        self.sequence
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    fn sample(&self, index: u64) -> f64 {
        let t = index as f64 / self.config.sample_rate;
        match self.waveform {
            Waveform::Sine {
                frequency_hz,
                amplitude,
                offset,
            } => self.clip(offset + amplitude * (TAU * frequency_hz * t).sin()),
            Waveform::Constant { value } => self.clip(value),
            Waveform::Counter { start, step } => start + step * index as f64,
        }
    }

    fn clip(&self, value: f64) -> f64 {
        value.clamp(self.config.min_voltage, self.config.max_voltage)
    }

    fn pending_fault(&self) -> Option<InjectedFault> {
        self.fault
            .filter(|f| f.kind != InjectedFault::ConfigureFailure)
            .filter(|f| self.sequence >= f.after_batches)
            .map(|f| f.kind)
    }
}

impl DeviceSession for SimulatedSession {
    #[instrument(
        name = "simulated_read_batch",
        skip(self),
        fields(sequence = self.sequence)
    )]
    async fn read_batch(
        &mut self,
        count: usize,
        timeout: Duration,
    ) -> Result<SampleBatch, AcquisitionError> {
        if self.torn_down {
            return Err(AcquisitionError::device("read on a torn-down task"));
        }

        match self.pending_fault() {
            Some(InjectedFault::ReadTimeout) => {
                warn!(sequence = self.sequence, "Injected read stall");
                tokio::time::sleep(timeout).await;
                return Err(AcquisitionError::Timeout {
                    waited_ms: timeout.as_millis() as u64,
                });
            }
            Some(InjectedFault::DeviceError) => {
                warn!(sequence = self.sequence, "Injected device error");
                return Err(AcquisitionError::device(format!(
                    "{}: simulated hardware fault after {} batches",
                    self.config.physical_channel(),
                    self.sequence
                )));
            }
            Some(InjectedFault::Panic) => {
                panic!(
                    "simulated driver panic after {} batches on {}",
                    self.sequence,
                    self.config.physical_channel()
                );
            }
            Some(InjectedFault::ConfigureFailure) | None => {}
        }

        self.pacer.wait_within(timeout).await?;

        let readings = (self.sample_index..self.sample_index + count as u64)
            .map(|i| self.sample(i))
            .collect();
        let batch = SampleBatch::new(self.sequence, readings);

        self.sample_index += count as u64;
        self.sequence += 1;
        Ok(batch)
    }

    async fn teardown(&mut self) -> Result<(), AcquisitionError> {
        if !self.torn_down {
            self.torn_down = true;
            debug!(
                channel = %self.config.physical_channel(),
                batches = self.sequence,
                "Simulated task cleared"
            );
        }
        Ok(())
    }
}
