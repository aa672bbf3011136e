//! Driver selection from `DeviceSettings`

use std::future::Future;
use std::time::Duration;

use contracts::{
    AcquisitionConfig, AcquisitionError, DeviceDriver, DeviceKind, DeviceSession, DeviceSettings,
    SampleBatch,
};

use crate::{ReplayDevice, ReplaySession, SimulatedDevice, SimulatedSession};

/// Driver chosen by the `[device]` section
#[derive(Debug, Clone)]
pub enum ConfiguredDevice {
    Simulated(SimulatedDevice),
    Replay(ReplayDevice),
}

impl ConfiguredDevice {
    /// # Errors
    /// Returns `AcquisitionError::Config` when `kind = replay` has no path.
    pub fn from_settings(settings: &DeviceSettings) -> Result<Self, AcquisitionError> {
        match settings.kind {
            DeviceKind::Simulated => Ok(Self::Simulated(SimulatedDevice::from_settings(settings))),
            DeviceKind::Replay => {
                let path = settings.replay_path.clone().ok_or_else(|| {
                    AcquisitionError::config("device.replay_path", "replay device needs a path")
                })?;
                Ok(Self::Replay(
                    ReplayDevice::new(path)
                        .with_loop(settings.replay_loop)
                        .with_realtime(settings.realtime),
                ))
            }
        }
    }

    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Simulated(_) => DeviceKind::Simulated,
            Self::Replay(_) => DeviceKind::Replay,
        }
    }
}

impl DeviceDriver for ConfiguredDevice {
    type Session = AnySession;

    fn configure(
        &self,
        config: &AcquisitionConfig,
    ) -> impl Future<Output = Result<Self::Session, AcquisitionError>> + Send {
        let device = self.clone();
        let config = config.clone();
        async move {
            match device {
                ConfiguredDevice::Simulated(d) => {
                    d.configure(&config).await.map(AnySession::Simulated)
                }
                ConfiguredDevice::Replay(d) => d.configure(&config).await.map(AnySession::Replay),
            }
        }
    }
}

/// Session of whichever driver was configured
#[derive(Debug)]
pub enum AnySession {
    Simulated(SimulatedSession),
    Replay(ReplaySession),
}

impl DeviceSession for AnySession {
    async fn read_batch(
        &mut self,
        count: usize,
        timeout: Duration,
    ) -> Result<SampleBatch, AcquisitionError> {
        match self {
            Self::Simulated(s) => s.read_batch(count, timeout).await,
            Self::Replay(s) => s.read_batch(count, timeout).await,
        }
    }

    async fn teardown(&mut self) -> Result<(), AcquisitionError> {
        match self {
            Self::Simulated(s) => s.teardown().await,
            Self::Replay(s) => s.teardown().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Waveform;

    #[test]
    fn test_replay_without_path_is_config_error() {
        let settings = DeviceSettings {
            kind: DeviceKind::Replay,
            ..Default::default()
        };
        let err = ConfiguredDevice::from_settings(&settings).unwrap_err();
        assert!(matches!(err, AcquisitionError::Config { .. }));
    }

    #[tokio::test]
    async fn test_simulated_from_settings() {
        let settings = DeviceSettings {
            waveform: Waveform::Constant { value: 1.25 },
            realtime: false,
            ..Default::default()
        };
        let device = ConfiguredDevice::from_settings(&settings).unwrap();
        assert_eq!(device.kind(), DeviceKind::Simulated);

        let mut session = device.configure(&AcquisitionConfig::default()).await.unwrap();
        let batch = session.read_batch(4, Duration::from_secs(1)).await.unwrap();
        assert_eq!(batch.readings, vec![1.25; 4]);
        session.teardown().await.unwrap();
    }
}
