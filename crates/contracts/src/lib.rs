//! # Contracts
//!
//! Frozen interface contracts shared by every acquisition crate.
//!
//! - Run configuration and the settings produced by the config loader
//! - Batch, token and fault types that travel over the control channels
//! - Traits for the external collaborators (device driver, sink, display)
//!
//! All business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Samples inside a batch are in acquisition order
//! - Batches are numbered from 0 within a run (`SampleBatch::sequence`)

mod batch;
mod config;
mod device;
mod display;
mod error;
mod fault;
mod settings;
mod sink;
mod token;

pub use batch::{Reading, SampleBatch};
pub use config::{AcquisitionConfig, PhysicalChannel, TerminalConfiguration};
pub use device::{DeviceDriver, DeviceSession, LocalDeviceSession};
pub use display::SampleDisplay;
pub use error::AcquisitionError;
pub use fault::{FaultKind, FaultPayload};
pub use settings::{
    ControllerSettings, DeviceKind, DeviceSettings, FaultInjection, InjectedFault, Settings,
    SinkKind, SinkSettings, Waveform,
};
pub use sink::{LocalSampleSink, SampleSink, SinkOpener};
pub use token::ControlToken;

/// Identifier of one run, assigned by the controller.
pub type RunId = u64;
