//! ReaderLoop - the producer side of a run
//!
//! Owns the device session and the sink for the whole run. Each iteration
//! reads one batch under a bounded timeout, forwards it reading by reading to
//! the data channel, appends and flushes it to the sink and polls the command
//! channel without blocking.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{
    AcquisitionConfig, AcquisitionError, ControlToken, DeviceDriver, DeviceSession, RunId,
    SampleSink, SinkOpener,
};
use observability::{record_batch_acquired, ReaderMetricsAggregator, StatsSummary};
use tracing::{debug, error, info, instrument, warn};

use crate::channel::{ReaderEndpoints, COMMAND_CHANNEL};
use crate::state::{ReaderState, StateTracker};

/// Default bound on a single device read
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Progress is logged every this many batches
const PROGRESS_INTERVAL: u64 = 100;

/// What a run did, returned when the reader context is joined
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    /// Iterations completed (read, forwarded and written)
    pub iterations: u64,
    /// Readings forwarded to the data channel
    pub samples: u64,
    pub read_latency_ms: StatsSummary,
    pub values: StatsSummary,
    pub final_state: ReaderState,
    pub history: Vec<ReaderState>,
    /// Extra command tokens discarded while draining
    pub residual_commands: usize,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<_> = self.history.iter().map(|s| s.as_str()).collect();
        writeln!(f, "Run {}: {}", self.run_id, self.final_state)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Samples: {}", self.samples)?;
        writeln!(f, "  Read latency (ms): {}", self.read_latency_ms)?;
        writeln!(f, "  Values (V): {}", self.values)?;
        write!(f, "  States: {}", path.join(" -> "))
    }
}

/// Error that ended a run, with the report up to that point
#[derive(Debug)]
pub struct ReaderFault {
    pub error: AcquisitionError,
    pub report: RunReport,
}

/// Acquire/forward/log/poll cycle for one run
pub struct ReaderLoop<D: DeviceDriver, O: SinkOpener> {
    run_id: RunId,
    config: AcquisitionConfig,
    driver: Arc<D>,
    opener: Arc<O>,
    sink_identifier: String,
    read_timeout: Duration,
    endpoints: ReaderEndpoints,
    state: StateTracker,
    metrics: ReaderMetricsAggregator,
    iterations: u64,
    samples_forwarded: u64,
    residual_commands: usize,
}

impl<D: DeviceDriver, O: SinkOpener> ReaderLoop<D, O> {
    pub fn new(
        run_id: RunId,
        config: AcquisitionConfig,
        driver: Arc<D>,
        opener: Arc<O>,
        sink_identifier: impl Into<String>,
        endpoints: ReaderEndpoints,
    ) -> Self {
        Self {
            run_id,
            config,
            driver,
            opener,
            sink_identifier: sink_identifier.into(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            endpoints,
            state: StateTracker::new(run_id),
            metrics: ReaderMetricsAggregator::new(),
            iterations: 0,
            samples_forwarded: 0,
            residual_commands: 0,
        }
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn state(&self) -> ReaderState {
        self.state.current()
    }

    /// Drive the run to `Terminated`
    ///
    /// # Errors
    /// Returns the error that moved the run to `Faulted`. No Ack has been sent
    /// in that case, and the session and sink have been released best-effort.
    #[instrument(
        name = "reader_run",
        skip(self),
        fields(run_id = self.run_id, channel = %self.config.physical_channel())
    )]
    pub async fn run(mut self) -> Result<RunReport, ReaderFault> {
        match self.execute().await {
            Ok(()) => Ok(self.report()),
            Err(error) => Err(ReaderFault {
                error,
                report: self.report(),
            }),
        }
    }

    async fn execute(&mut self) -> Result<(), AcquisitionError> {
        if let Err(e) = self.state.advance(ReaderState::Configuring) {
            return self.fail(e, None, None).await;
        }

        let mut sink = match self.opener.open(&self.sink_identifier) {
            Ok(sink) => sink,
            Err(e) => return self.fail(e, None, None).await,
        };
        let mut session = match self.driver.configure(&self.config).await {
            Ok(session) => session,
            Err(e) => return self.fail(e, None, Some(&mut sink)).await,
        };

        if let Err(e) = self.state.advance(ReaderState::Running) {
            return self.fail(e, Some(&mut session), Some(&mut sink)).await;
        }
        info!(
            run_id = self.run_id,
            sink = sink.name(),
            samples_per_read = self.config.samples_per_read,
            read_timeout_ms = self.read_timeout.as_millis() as u64,
            "Acquisition running"
        );

        if let Err(e) = self.acquire(&mut session, &mut sink).await {
            return self.fail(e, Some(&mut session), Some(&mut sink)).await;
        }

        if let Err(e) = self.state.advance(ReaderState::Draining) {
            return self.fail(e, Some(&mut session), Some(&mut sink)).await;
        }
        if let Err(e) = self.drain(&mut session, &mut sink).await {
            return self.fail(e, Some(&mut session), Some(&mut sink)).await;
        }
        self.state.advance(ReaderState::Terminated)?;

        info!(
            run_id = self.run_id,
            iterations = self.iterations,
            samples = self.samples_forwarded,
            "Acquisition stopped"
        );
        Ok(())
    }

    async fn acquire(
        &mut self,
        session: &mut D::Session,
        sink: &mut O::Sink,
    ) -> Result<(), AcquisitionError> {
        let count = self.config.samples_per_read;

        loop {
            let started = Instant::now();
            let read = session.read_batch(count, self.read_timeout);
            let batch = match tokio::time::timeout(self.read_timeout, read).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(AcquisitionError::Timeout {
                        waited_ms: self.read_timeout.as_millis() as u64,
                    })
                }
            };
            // A driver that blocks the thread cannot be cancelled; its late batch is still fatal
            let elapsed = started.elapsed();
            if elapsed > self.read_timeout {
                warn!(
                    run_id = self.run_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Read returned after its timeout"
                );
                return Err(AcquisitionError::Timeout {
                    waited_ms: elapsed.as_millis() as u64,
                });
            }
            if batch.len() != count {
                return Err(AcquisitionError::device(format!(
                    "short read: expected {count} samples, got {}",
                    batch.len()
                )));
            }

            let latency_ms = elapsed.as_secs_f64() * 1000.0;
            record_batch_acquired(&batch, latency_ms);
            self.metrics.update(&batch, latency_ms);

            for reading in batch.iter() {
                self.endpoints.data.send(reading)?;
            }
            self.samples_forwarded += batch.len() as u64;

            sink.write(&batch).await?;
            sink.flush().await?;
            self.iterations += 1;

            if self.iterations % PROGRESS_INTERVAL == 0 {
                debug!(
                    run_id = self.run_id,
                    iterations = self.iterations,
                    samples = self.samples_forwarded,
                    "Acquisition progress"
                );
            }

            match self.endpoints.command.try_receive() {
                Ok(None) => {}
                Ok(Some(ControlToken::Stop)) => {
                    debug!(run_id = self.run_id, iterations = self.iterations, "Stop received");
                    return Ok(());
                }
                Ok(Some(ControlToken::Ack)) => {
                    return Err(AcquisitionError::protocol(
                        COMMAND_CHANNEL,
                        "ack token received on the command channel",
                    ));
                }
                Err(_) => {
                    warn!(run_id = self.run_id, "Command channel closed, stopping");
                    return Ok(());
                }
            }
        }
    }

    async fn drain(
        &mut self,
        session: &mut D::Session,
        sink: &mut O::Sink,
    ) -> Result<(), AcquisitionError> {
        let teardown = session.teardown().await;
        let close = sink.close().await;
        teardown?;
        close?;

        self.residual_commands = self.endpoints.command.drain();
        if self.residual_commands > 0 {
            debug!(
                run_id = self.run_id,
                discarded = self.residual_commands,
                "Discarded residual command tokens"
            );
        }

        self.endpoints.ack.send(ControlToken::Ack)?;
        debug!(run_id = self.run_id, "Ack sent");
        Ok(())
    }

    async fn fail(
        &mut self,
        error: AcquisitionError,
        session: Option<&mut D::Session>,
        sink: Option<&mut O::Sink>,
    ) -> Result<(), AcquisitionError> {
        if let Err(e) = self.state.advance(ReaderState::Faulted) {
            warn!(run_id = self.run_id, error = %e, "Unexpected state on fault");
        }
        error!(
            run_id = self.run_id,
            kind = %error.kind(),
            error = %error,
            "Reader faulted"
        );

        if let Some(session) = session {
            if let Err(e) = session.teardown().await {
                warn!(run_id = self.run_id, error = %e, "Device teardown failed during cleanup");
            }
        }
        if let Some(sink) = sink {
            if let Err(e) = sink.close().await {
                warn!(
                    run_id = self.run_id,
                    sink = sink.name(),
                    error = %e,
                    "Sink close failed during cleanup"
                );
            }
        }

        if let Err(e) = self.state.advance(ReaderState::Terminated) {
            warn!(run_id = self.run_id, error = %e, "Unexpected state after fault cleanup");
        }
        Err(error)
    }

    fn report(&self) -> RunReport {
        let summary = self.metrics.summary();
        RunReport {
            run_id: self.run_id,
            iterations: self.iterations,
            samples: self.samples_forwarded,
            read_latency_ms: summary.read_latency_ms,
            values: summary.values,
            final_state: self.state.current(),
            history: self.state.history().to_vec(),
            residual_commands: self.residual_commands,
        }
    }
}
