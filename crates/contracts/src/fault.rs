//! FaultPayload - structured description of a reader failure
//!
//! Sent at most once per run on the fault channel. Must never be lost or
//! silently discarded by the controller.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;

use crate::{AcquisitionError, RunId};

/// Fault category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Configuration rejected before or during configure
    Config,
    /// Driver error during read or teardown
    Device,
    /// Read did not complete in time
    Timeout,
    /// Unexpected token, closed channel, or missing acknowledgement
    ChannelProtocol,
    /// Sink open, write, or close failure
    Sink,
    /// Panic inside the reader context
    Panic,
    /// Anything else raised by the reader runtime
    Runtime,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Device => "device",
            Self::Timeout => "timeout",
            Self::ChannelProtocol => "channel_protocol",
            Self::Sink => "sink",
            Self::Panic => "panic",
            Self::Runtime => "runtime",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fault reported by the reader context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultPayload {
    /// Run that produced the fault
    pub run_id: RunId,

    /// Category of the failure
    pub kind: FaultKind,

    /// Top-level message
    pub message: String,

    /// Source chain, outermost first, excluding `message`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl FaultPayload {
    pub fn new(run_id: RunId, kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            run_id,
            kind,
            message: message.into(),
            causes: Vec::new(),
        }
    }

    /// Build a payload from an error, walking its `source()` chain
    pub fn from_error(run_id: RunId, error: &AcquisitionError) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            run_id,
            kind: error.kind(),
            message: error.to_string(),
            causes,
        }
    }

    /// Build a payload from a caught panic value
    pub fn panic(run_id: RunId, panic: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = panic.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "reader panicked with a non-string payload".to_string()
        };
        Self::new(run_id, FaultKind::Panic, format!("reader panicked: {message}"))
    }

    /// Full human-readable description, causes included
    pub fn describe(&self) -> String {
        let mut out = format!("[run {}] {}: {}", self.run_id, self.kind, self.message);
        for cause in &self.causes {
            out.push_str("\n  caused by: ");
            out.push_str(cause);
        }
        out
    }
}

impl fmt::Display for FaultPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fault in run {}: {}", self.kind, self.run_id, self.message)
    }
}
