//! SampleSink trait - persistent output of acquired batches
//!
//! A sink is opened by the reader during configuration, written and flushed
//! once per batch, and closed during drain or fault cleanup.

use crate::{AcquisitionError, SampleBatch};

/// Data output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(SampleSink: Send)]
pub trait LocalSampleSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Append one batch
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, batch: &SampleBatch) -> Result<(), AcquisitionError>;

    /// Push buffered lines to durable storage; called after every `write`
    async fn flush(&mut self) -> Result<(), AcquisitionError>;

    /// Close sink. Calling it twice must be harmless.
    async fn close(&mut self) -> Result<(), AcquisitionError>;
}

/// Factory for sinks, invoked once per run inside the reader context
pub trait SinkOpener: Send + Sync + 'static {
    type Sink: SampleSink + 'static;

    /// Open (and truncate) the sink named by `identifier`
    fn open(&self, identifier: &str) -> Result<Self::Sink, AcquisitionError>;
}
