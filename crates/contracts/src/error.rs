//! Layered error definitions
//!
//! Categorized by source: config / device / channel / sink / runtime

use thiserror::Error;

use crate::FaultKind;

/// Unified error type
#[derive(Debug, Error)]
pub enum AcquisitionError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration rejected by validation or by the driver
    #[error("config error at '{field}': {message}")]
    Config { field: String, message: String },

    // ===== Device Errors =====
    /// Driver reported an error during configure, read, or teardown
    #[error("device error: {message}")]
    Device { message: String },

    /// A read did not complete within the configured timeout
    #[error("read timeout: waited {waited_ms}ms for samples")]
    Timeout { waited_ms: u64 },

    // ===== Channel Errors =====
    /// Unexpected token on a control channel
    #[error("protocol error on '{channel}' channel: {message}")]
    ChannelProtocol { channel: String, message: String },

    /// Peer endpoint is gone
    #[error("'{channel}' channel closed")]
    ChannelClosed { channel: String },

    // ===== Sink Errors =====
    /// Sink open, write, or close failed
    #[error("sink '{sink_name}' error: {message}")]
    Sink { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Runtime failure outside the acquisition protocol
    #[error("runtime error: {message}")]
    Runtime { message: String },
}

impl AcquisitionError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration error
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create device error
    pub fn device(message: impl Into<String>) -> Self {
        Self::Device {
            message: message.into(),
        }
    }

    /// Create channel protocol error
    pub fn protocol(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ChannelProtocol {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Create channel closed error
    pub fn channel_closed(channel: impl Into<String>) -> Self {
        Self::ChannelClosed {
            channel: channel.into(),
        }
    }

    /// Create sink error
    pub fn sink(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Sink {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create runtime error
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Fault category reported to the controller
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::ConfigParse { .. } | Self::Config { .. } => FaultKind::Config,
            Self::Device { .. } => FaultKind::Device,
            Self::Timeout { .. } => FaultKind::Timeout,
            Self::ChannelProtocol { .. } | Self::ChannelClosed { .. } => {
                FaultKind::ChannelProtocol
            }
            Self::Sink { .. } | Self::Io(_) => FaultKind::Sink,
            Self::Runtime { .. } => FaultKind::Runtime,
        }
    }
}
