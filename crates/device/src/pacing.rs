//! Batch pacing at the nominal sample rate

use std::time::Duration;

use contracts::AcquisitionError;
use tokio::time::{sleep_until, Instant};

/// Deadline-based pacer; drift does not accumulate across batches
#[derive(Debug)]
pub(crate) struct Pacer {
    period: Option<Duration>,
    next: Option<Instant>,
}

impl Pacer {
    /// `period = None` disables pacing
    pub(crate) fn new(period: Option<Duration>) -> Self {
        Self { period, next: None }
    }

    /// Wait until the current batch would have been filled by the hardware
    ///
    /// Gives up after `timeout` when the batch deadline lies beyond it. The
    /// schedule is left untouched in that case.
    pub(crate) async fn wait_within(&mut self, timeout: Duration) -> Result<(), AcquisitionError> {
        let Some(period) = self.period else {
            return Ok(());
        };
        let now = Instant::now();
        let deadline = self.next.unwrap_or(now).checked_add(period);
        let limit = now.checked_add(timeout);

        match (deadline, limit) {
            (Some(deadline), Some(limit)) if deadline <= limit => {
                sleep_until(deadline).await;
                self.next = Some(deadline);
                Ok(())
            }
            (Some(deadline), None) => {
                sleep_until(deadline).await;
                self.next = Some(deadline);
                Ok(())
            }
            (_, Some(limit)) => {
                sleep_until(limit).await;
                Err(AcquisitionError::Timeout {
                    waited_ms: timeout.as_millis() as u64,
                })
            }
            (None, None) => Err(AcquisitionError::Timeout {
                waited_ms: timeout.as_millis() as u64,
            }),
        }
    }
}
