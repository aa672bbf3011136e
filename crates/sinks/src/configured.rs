//! Sink selection from `SinkSettings`

use contracts::{AcquisitionError, SampleBatch, SampleSink, SinkKind, SinkOpener, SinkSettings};
use tracing::instrument;

use crate::{CsvFileSink, LogSink};

/// Opener that builds the sink kind named in the settings
///
/// For file sinks the identifier is a file name resolved against the
/// configured directory.
#[derive(Debug, Clone)]
pub struct ConfiguredSinks {
    settings: SinkSettings,
}

impl ConfiguredSinks {
    pub fn new(settings: SinkSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SinkSettings {
        &self.settings
    }
}

impl SinkOpener for ConfiguredSinks {
    type Sink = AnySink;

    #[instrument(name = "sink_open", skip(self), fields(kind = ?self.settings.kind))]
    fn open(&self, identifier: &str) -> Result<Self::Sink, AcquisitionError> {
        match self.settings.kind {
            SinkKind::File => {
                let path = self.settings.directory.join(identifier);
                CsvFileSink::create(&path)
                    .map(AnySink::File)
                    .map_err(|e| {
                        AcquisitionError::sink(
                            identifier,
                            format!("failed to open {}: {e}", path.display()),
                        )
                    })
            }
            SinkKind::Log => Ok(AnySink::Log(LogSink::new(identifier))),
        }
    }
}

/// Sink selected at runtime
pub enum AnySink {
    File(CsvFileSink),
    Log(LogSink),
}

impl SampleSink for AnySink {
    fn name(&self) -> &str {
        match self {
            Self::File(sink) => sink.name(),
            Self::Log(sink) => sink.name(),
        }
    }

    async fn write(&mut self, batch: &SampleBatch) -> Result<(), AcquisitionError> {
        match self {
            Self::File(sink) => sink.write(batch).await,
            Self::Log(sink) => sink.write(batch).await,
        }
    }

    async fn flush(&mut self) -> Result<(), AcquisitionError> {
        match self {
            Self::File(sink) => sink.flush().await,
            Self::Log(sink) => sink.flush().await,
        }
    }

    async fn close(&mut self) -> Result<(), AcquisitionError> {
        match self {
            Self::File(sink) => sink.close().await,
            Self::Log(sink) => sink.close().await,
        }
    }
}
