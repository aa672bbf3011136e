//! Control channels between the controller and one reader run
//!
//! Four unidirectional conduits, allocated fresh for every run:
//! - `data`: reader -> controller, one reading per message, FIFO
//! - `command`: controller -> reader, a single Stop
//! - `ack`: reader -> controller, a single Ack after cleanup
//! - `fault`: relay -> controller, at most one payload
//!
//! Sends never block. Full or closed channels surface as errors.

use std::time::Duration;

use async_channel::{bounded, unbounded, Receiver, Sender, TryRecvError, TrySendError};
use contracts::{AcquisitionError, ControlToken, FaultPayload, Reading};

pub const DATA_CHANNEL: &str = "data";
pub const COMMAND_CHANNEL: &str = "command";
pub const ACK_CHANNEL: &str = "ack";
pub const FAULT_CHANNEL: &str = "fault";

/// Sending half of a named channel
#[derive(Debug)]
pub struct Outbox<T> {
    name: &'static str,
    tx: Sender<T>,
}

impl<T> Clone for Outbox<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
        }
    }
}

impl<T> Outbox<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Non-blocking send
    pub fn send(&self, item: T) -> Result<(), AcquisitionError> {
        self.tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => {
                AcquisitionError::protocol(self.name, "channel full, token already pending")
            }
            TrySendError::Closed(_) => AcquisitionError::channel_closed(self.name),
        })
    }

    /// Close the channel for every endpoint. Returns `false` if already closed.
    pub fn close(&self) -> bool {
        self.tx.close()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Messages queued and not yet received
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

/// Receiving half of a named channel
#[derive(Debug)]
pub struct Inbox<T> {
    name: &'static str,
    rx: Receiver<T>,
}

impl<T> Inbox<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Non-blocking receive; `Ok(None)` when empty
    ///
    /// # Errors
    /// `ChannelClosed` once the channel is closed and empty.
    pub fn try_receive(&self) -> Result<Option<T>, AcquisitionError> {
        match self.rx.try_recv() {
            Ok(item) => Ok(Some(item)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Closed) => Err(AcquisitionError::channel_closed(self.name)),
        }
    }

    /// Wait for the next message
    pub async fn recv(&self) -> Result<T, AcquisitionError> {
        self.rx
            .recv()
            .await
            .map_err(|_| AcquisitionError::channel_closed(self.name))
    }

    /// Wait for the next message, at most `timeout`
    pub async fn receive(&self, timeout: Duration) -> Result<T, AcquisitionError> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result,
            Err(_) => Err(AcquisitionError::Timeout {
                waited_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Move every queued message into `out`, returns how many were moved
    pub fn drain_into(&self, out: &mut Vec<T>) -> usize {
        let before = out.len();
        while let Ok(item) = self.rx.try_recv() {
            out.push(item);
        }
        out.len() - before
    }

    /// Move at most `max` queued messages into `out`
    pub fn drain_up_to(&self, out: &mut Vec<T>, max: usize) -> usize {
        let before = out.len();
        while out.len() - before < max {
            match self.rx.try_recv() {
                Ok(item) => out.push(item),
                Err(_) => break,
            }
        }
        out.len() - before
    }

    /// Discard every queued message, returns how many were discarded
    pub fn drain(&self) -> usize {
        let mut count = 0;
        while self.rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

fn pair<T>(name: &'static str, capacity: Option<usize>) -> (Outbox<T>, Inbox<T>) {
    let (tx, rx) = match capacity {
        Some(cap) => bounded(cap),
        None => unbounded(),
    };
    (Outbox { name, tx }, Inbox { name, rx })
}

/// Endpoints kept by the controller
#[derive(Debug)]
pub struct ControllerEndpoints {
    pub data: Inbox<Reading>,
    pub command: Outbox<ControlToken>,
    /// Drain-only handle on the command channel, used after the reader is joined
    pub command_residual: Inbox<ControlToken>,
    pub ack: Inbox<ControlToken>,
}

impl ControllerEndpoints {
    /// True when none of the data, command or ack channels holds a message
    pub fn all_empty(&self) -> bool {
        self.data.is_empty() && self.command.is_empty() && self.ack.is_empty()
    }
}

/// Endpoints handed to the reader loop
#[derive(Debug)]
pub struct ReaderEndpoints {
    pub data: Outbox<Reading>,
    pub command: Inbox<ControlToken>,
    pub ack: Outbox<ControlToken>,
}

/// Fresh set of the four channels for one run
///
/// The fault channel is split off: its sender moves into the relay wrapper
/// and its receiver stays with the `ReaderProcess` handle.
#[derive(Debug)]
pub struct ControlChannels {
    pub controller: ControllerEndpoints,
    pub reader: ReaderEndpoints,
    pub fault_tx: Outbox<FaultPayload>,
    pub fault_rx: Inbox<FaultPayload>,
}

impl ControlChannels {
    pub fn allocate() -> Self {
        let (data_tx, data_rx) = pair(DATA_CHANNEL, None);
        let (command_tx, command_rx) = pair(COMMAND_CHANNEL, None);
        let (ack_tx, ack_rx) = pair(ACK_CHANNEL, Some(1));
        let (fault_tx, fault_rx) = pair(FAULT_CHANNEL, Some(1));

        let command_residual = Inbox {
            name: COMMAND_CHANNEL,
            rx: command_rx.rx.clone(),
        };

        Self {
            controller: ControllerEndpoints {
                data: data_rx,
                command: command_tx,
                command_residual,
                ack: ack_rx,
            },
            reader: ReaderEndpoints {
                data: data_tx,
                command: command_rx,
                ack: ack_tx,
            },
            fault_tx,
            fault_rx,
        }
    }
}
