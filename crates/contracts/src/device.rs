//! Device driver seam
//!
//! `DeviceDriver::configure` creates an acquisition task bound to one physical
//! channel. The returned session is owned by the reader context for the whole
//! run and torn down exactly once on every exit path.

use std::future::Future;
use std::time::Duration;

use crate::{AcquisitionConfig, AcquisitionError, SampleBatch};

/// Driver able to create acquisition sessions
pub trait DeviceDriver: Send + Sync + 'static {
    type Session: DeviceSession + 'static;

    /// Configure the channel, clock, and buffer for one run
    fn configure(
        &self,
        config: &AcquisitionConfig,
    ) -> impl Future<Output = Result<Self::Session, AcquisitionError>> + Send;
}

/// Configured acquisition task
#[trait_variant::make(DeviceSession: Send)]
pub trait LocalDeviceSession {
    /// Block until `count` samples are available and return them in order
    ///
    /// The driver must give up after `timeout`; a read that cannot complete
    /// in time is fatal for the run and is never retried.
    ///
    /// # Errors
    /// - `AcquisitionError::Timeout` when `timeout` elapses first
    /// - Driver failures map to `AcquisitionError::Device`.
    async fn read_batch(
        &mut self,
        count: usize,
        timeout: Duration,
    ) -> Result<SampleBatch, AcquisitionError>;

    /// Release the hardware task. Idempotent.
    async fn teardown(&mut self) -> Result<(), AcquisitionError>;
}
