//! LogSink - logs batch summary via tracing

use contracts::{AcquisitionError, SampleBatch, SampleSink};
use tracing::{info, instrument};

/// Sink that logs batch summaries for debugging
pub struct LogSink {
    name: String,
    batches: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            batches: 0,
        }
    }

    fn log_batch_summary(&self, batch: &SampleBatch) {
        let (min, max) = batch.bounds().unwrap_or((f64::NAN, f64::NAN));

        info!(
            sink = %self.name,
            sequence = batch.sequence,
            samples = batch.len(),
            min = min,
            max = max,
            "SampleBatch received"
        );
    }
}

impl SampleSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, batch),
        fields(sink = %self.name, sequence = batch.sequence)
    )]
    async fn write(&mut self, batch: &SampleBatch) -> Result<(), AcquisitionError> {
        self.log_batch_summary(batch);
        self.batches += 1;
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), AcquisitionError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), AcquisitionError> {
        info!(sink = %self.name, batches = self.batches, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_sink_write() {
        let mut sink = LogSink::new("test_log");
        let result = sink.write(&SampleBatch::new(0, vec![0.1, 0.2])).await;
        assert!(result.is_ok());
        assert!(sink.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
