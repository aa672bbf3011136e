//! ReaderProcess - fault-relay wrapper around one reader run
//!
//! Runs the `ReaderLoop` on a dedicated OS thread with its own current-thread
//! tokio runtime. Anything that ends the run abnormally, a returned error or a
//! panic, is converted to a `FaultPayload` and sent on the fault channel. The
//! controller never shares memory with the reader; only the four channels and
//! the join handle cross the boundary.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contracts::{AcquisitionError, ControlToken, DeviceDriver, FaultPayload, RunId, SinkOpener};
use tracing::{debug, error, instrument, warn};

use crate::channel::{Inbox, Outbox};
use crate::reader::{ReaderLoop, RunReport};

/// How often `join` checks whether the reader thread has finished
const JOIN_POLL: Duration = Duration::from_millis(5);

/// Handle on a reader running in its own execution context
pub struct ReaderProcess {
    run_id: RunId,
    handle: Option<JoinHandle<Option<RunReport>>>,
    command: Outbox<ControlToken>,
    fault: Inbox<FaultPayload>,
    cached_fault: Option<FaultPayload>,
}

impl ReaderProcess {
    /// Launch `reader` on a new thread
    ///
    /// `fault_tx` moves into the reader context; `fault_rx` and a clone of the
    /// command sender stay with the handle.
    ///
    /// # Errors
    /// Returns `AcquisitionError::Runtime` if the thread cannot be spawned.
    #[instrument(name = "reader_spawn", skip_all, fields(run_id = reader.run_id()))]
    pub fn spawn<D: DeviceDriver, O: SinkOpener>(
        reader: ReaderLoop<D, O>,
        command: Outbox<ControlToken>,
        fault_tx: Outbox<FaultPayload>,
        fault_rx: Inbox<FaultPayload>,
    ) -> Result<Self, AcquisitionError> {
        let run_id = reader.run_id();

        let handle = thread::Builder::new()
            .name(format!("acq-reader-{run_id}"))
            .spawn(move || relay(run_id, reader, fault_tx))
            .map_err(|e| {
                AcquisitionError::runtime(format!("failed to spawn reader thread: {e}"))
            })?;

        debug!(run_id, "Reader context started");

        Ok(Self {
            run_id,
            handle: Some(handle),
            command,
            fault: fault_rx,
            cached_fault: None,
        })
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// True while the reader thread has not finished
    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Non-blocking check for a relayed fault; cached once delivered
    pub fn last_fault(&mut self) -> Option<&FaultPayload> {
        if self.cached_fault.is_none() {
            if let Ok(Some(fault)) = self.fault.try_receive() {
                self.cached_fault = Some(fault);
            }
        }
        self.cached_fault.as_ref()
    }

    /// Wait for a relayed fault
    ///
    /// Resolves to `None` once the reader context exits without one.
    pub async fn wait_fault(&mut self) -> Option<FaultPayload> {
        if self.cached_fault.is_none() {
            if let Ok(fault) = self.fault.recv().await {
                self.cached_fault = Some(fault);
            }
        }
        self.cached_fault.clone()
    }

    /// Discard faults still queued beyond the cached one
    pub fn drain_faults(&self) -> usize {
        self.fault.drain()
    }

    pub fn fault_channel_empty(&self) -> bool {
        self.fault.is_empty()
    }

    /// Close the command channel; a running reader stops after its current iteration
    pub fn terminate(&self) -> bool {
        let closed = self.command.close();
        if closed {
            debug!(run_id = self.run_id, "Command channel closed");
        }
        closed
    }

    /// Wait, at most `bound`, for the reader context to exit
    ///
    /// Returns the run report, or `None` if the reader panicked before producing one.
    ///
    /// # Errors
    /// `AcquisitionError::Timeout` when the thread is still running after
    /// `bound`. The handle is kept, so `is_alive` stays true and a later call
    /// may try again.
    #[instrument(name = "reader_join", skip(self), fields(run_id = self.run_id))]
    pub async fn join(&mut self, bound: Duration) -> Result<Option<RunReport>, AcquisitionError> {
        let Some(handle) = self.handle.as_ref() else {
            return Ok(None);
        };

        let finished = tokio::time::timeout(bound, async {
            while !handle.is_finished() {
                tokio::time::sleep(JOIN_POLL).await;
            }
        })
        .await;
        if finished.is_err() {
            warn!(
                run_id = self.run_id,
                bound_ms = bound.as_millis() as u64,
                "Reader context still running after join bound"
            );
            return Err(AcquisitionError::Timeout {
                waited_ms: bound.as_millis() as u64,
            });
        }

        let Some(handle) = self.handle.take() else {
            return Ok(None);
        };
        let report = handle.join().map_err(|_| {
            AcquisitionError::runtime("reader thread panicked outside the fault relay")
        })?;

        // A fault sent just before exit is picked up here
        self.last_fault();
        debug!(run_id = self.run_id, "Reader context joined");
        Ok(report)
    }
}

impl Drop for ReaderProcess {
    fn drop(&mut self) {
        if self.handle.is_some() {
            warn!(run_id = self.run_id, "ReaderProcess dropped before join, detaching reader");
            self.command.close();
        }
    }
}

/// Body of the reader thread
fn relay<D: DeviceDriver, O: SinkOpener>(
    run_id: RunId,
    reader: ReaderLoop<D, O>,
    fault_tx: Outbox<FaultPayload>,
) -> Option<RunReport> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| {
                let error =
                    AcquisitionError::runtime(format!("failed to build reader runtime: {e}"));
                (FaultPayload::from_error(run_id, &error), None::<RunReport>)
            })?;

        runtime.block_on(reader.run()).map_err(|fault| {
            (
                FaultPayload::from_error(run_id, &fault.error),
                Some(fault.report),
            )
        })
    }));

    let (payload, report) = match outcome {
        Ok(Ok(report)) => return Some(report),
        Ok(Err((payload, report))) => (payload, report),
        Err(panic) => (FaultPayload::panic(run_id, panic.as_ref()), None),
    };

    error!(run_id, kind = %payload.kind, message = %payload.message, "Relaying reader fault");
    if let Err(e) = fault_tx.send(payload) {
        error!(run_id, error = %e, "Fault could not be relayed");
    }
    report
}
