//! CsvFileSink - appends one reading per line to a text artifact

use contracts::{AcquisitionError, SampleBatch, SampleSink};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, instrument};

/// Header line written when the artifact is created
pub const CSV_HEADER: &str = "# Voltage (V)";

/// Sink that writes readings to a CSV file
pub struct CsvFileSink {
    name: String,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    lines_written: u64,
}

impl CsvFileSink {
    /// Create (or truncate) the artifact at `path` and write the header
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "{CSV_HEADER}")?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        debug!(sink = %name, path = %path.display(), "CsvFileSink opened");

        Ok(Self {
            name,
            path,
            writer: Some(writer),
            lines_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Samples written so far (header excluded)
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    fn append(&mut self, batch: &SampleBatch) -> std::io::Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "sink already closed")
        })?;
        for value in batch.iter() {
            writeln!(writer, "{value}")?;
        }
        self.lines_written += batch.len() as u64;
        Ok(())
    }

    fn persist_batch(&mut self, batch: &SampleBatch) -> Result<(), AcquisitionError> {
        self.append(batch).map_err(|e| {
            error!(sink = %self.name, sequence = batch.sequence, error = %e, "Write failed");
            AcquisitionError::sink(&self.name, e.to_string())
        })
    }
}

impl SampleSink for CsvFileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, batch),
        fields(sink = %self.name, sequence = batch.sequence)
    )]
    async fn write(&mut self, batch: &SampleBatch) -> Result<(), AcquisitionError> {
        self.persist_batch(batch)
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), AcquisitionError> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .map_err(|e| AcquisitionError::sink(&self.name, e.to_string()))?;
        }
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), AcquisitionError> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(|e| AcquisitionError::sink(&self.name, e.to_string()))?;
            debug!(sink = %self.name, lines = self.lines_written, "CsvFileSink closed");
        }
        Ok(())
    }
}
