//! Replay Device - 从录制文件回放采样数据
//!
//! 读取 CSV sink 写出的文件 (`#` 开头的行为注释)，
//! 按批次回放，可选按标称采样率节拍输出。

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use contracts::{AcquisitionConfig, AcquisitionError, DeviceDriver, DeviceSession, SampleBatch};
use tracing::{debug, info, instrument};

use crate::pacing::Pacer;

/// 读取录制文件中的全部样本
pub fn load_artifact(path: &Path) -> Result<Vec<f64>, AcquisitionError> {
    let content = fs::read_to_string(path).map_err(|e| {
        AcquisitionError::device(format!("failed to read replay file {}: {e}", path.display()))
    })?;

    let mut samples = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let value: f64 = line.parse().map_err(|_| {
            AcquisitionError::device(format!(
                "{}:{}: invalid sample '{line}'",
                path.display(),
                line_no + 1
            ))
        })?;
        samples.push(value);
    }
    Ok(samples)
}

/// Replay 设备驱动
#[derive(Debug, Clone)]
pub struct ReplayDevice {
    path: PathBuf,
    looped: bool,
    realtime: bool,
}

impl ReplayDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            looped: true,
            realtime: true,
        }
    }

    /// 到达末尾后是否从头循环
    pub fn with_loop(mut self, looped: bool) -> Self {
        self.looped = looped;
        self
    }

    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    #[instrument(
        name = "replay_configure",
        skip(self, config),
        fields(path = %self.path.display())
    )]
    fn open_session(
        &self,
        config: &AcquisitionConfig,
    ) -> Result<ReplaySession, AcquisitionError> {
        config.validate()?;

        let samples = load_artifact(&self.path)?;
        if samples.is_empty() {
            return Err(AcquisitionError::device(format!(
                "replay file {} contains no samples",
                self.path.display()
            )));
        }

        info!(
            channel = %config.physical_channel(),
            samples = samples.len(),
            looped = self.looped,
            "Replay device configured"
        );

        let period = self.realtime.then(|| config.batch_period());
        Ok(ReplaySession {
            samples: samples.into(),
            cursor: 0,
            looped: self.looped,
            pacer: Pacer::new(period),
            sequence: 0,
            torn_down: false,
        })
    }
}

impl DeviceDriver for ReplayDevice {
    type Session = ReplaySession;

    fn configure(
        &self,
        config: &AcquisitionConfig,
    ) -> impl Future<Output = Result<Self::Session, AcquisitionError>> + Send {
        let result = self.open_session(config);
        async move { result }
    }
}

/// Replay 会话
#[derive(Debug)]
pub struct ReplaySession {
    samples: Arc<[f64]>,
    cursor: usize,
    looped: bool,
    pacer: Pacer,
    sequence: u64,
    torn_down: bool,
}

impl DeviceSession for ReplaySession {
    async fn read_batch(
        &mut self,
        count: usize,
        timeout: Duration,
    ) -> Result<SampleBatch, AcquisitionError> {
        if self.torn_down {
            return Err(AcquisitionError::device("read on a torn-down task"));
        }
        if !self.looped && self.samples.len() - self.cursor < count {
            return Err(AcquisitionError::device(format!(
                "replay exhausted after {} batches ({} samples left, {count} requested)",
                self.sequence,
                self.samples.len() - self.cursor
            )));
        }

        self.pacer.wait_within(timeout).await?;

        let readings = if self.looped {
            let len = self.samples.len();
            let readings = (0..count)
                .map(|i| self.samples[(self.cursor + i) % len])
                .collect();
            self.cursor = (self.cursor + count) % len;
            readings
        } else {
            let readings = self.samples[self.cursor..self.cursor + count].to_vec();
            self.cursor += count;
            readings
        };

        let batch = SampleBatch::new(self.sequence, readings);
        self.sequence += 1;
        Ok(batch)
    }

    async fn teardown(&mut self) -> Result<(), AcquisitionError> {
        if !self.torn_down {
            self.torn_down = true;
            debug!(batches = self.sequence, "Replay session closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn write_artifact(dir: &Path, values: &[f64]) -> PathBuf {
        let path = dir.join("Output_Data.csv");
        let mut content = String::from("# Voltage (V)\n");
        for v in values {
            content.push_str(&format!("{v}\n"));
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_artifact_skips_header() {
        let dir = tempdir().unwrap();
        let path = write_artifact(dir.path(), &[0.5, -0.5]);
        assert_eq!(load_artifact(&path).unwrap(), vec![0.5, -0.5]);
    }

    #[test]
    fn test_load_artifact_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "1.0\nnot-a-number\n").unwrap();
        let err = load_artifact(&path).unwrap_err();
        assert!(err.to_string().contains(":2:"));
    }

    #[tokio::test]
    async fn test_replay_loops() {
        let dir = tempdir().unwrap();
        let path = write_artifact(dir.path(), &[1.0, 2.0, 3.0]);
        let device = ReplayDevice::new(path).with_realtime(false);
        let mut session = device.configure(&AcquisitionConfig::default()).await.unwrap();

        let batch = session.read_batch(5, TIMEOUT).await.unwrap();
        assert_eq!(batch.readings, vec![1.0, 2.0, 3.0, 1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_replay_without_loop_exhausts() {
        let dir = tempdir().unwrap();
        let path = write_artifact(dir.path(), &[1.0, 2.0, 3.0, 4.0]);
        let device = ReplayDevice::new(path).with_loop(false).with_realtime(false);
        let mut session = device.configure(&AcquisitionConfig::default()).await.unwrap();

        assert_eq!(session.read_batch(2, TIMEOUT).await.unwrap().readings, vec![1.0, 2.0]);
        assert_eq!(session.read_batch(2, TIMEOUT).await.unwrap().readings, vec![3.0, 4.0]);
        let err = session.read_batch(2, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, AcquisitionError::Device { .. }));
    }

    #[tokio::test]
    async fn test_empty_artifact_fails_configure() {
        let dir = tempdir().unwrap();
        let path = write_artifact(dir.path(), &[]);
        let err = ReplayDevice::new(path)
            .configure(&AcquisitionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::Device { .. }));
    }
}
