//! AcquisitionConfig - immutable description of one acquisition run
//!
//! Built once by the controller before launch and moved into the reader loop.
//! A new run requires a new instance; nothing mutates it after the reader starts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::AcquisitionError;

/// Single-channel analog input configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Sample clock source (e.g., "OnboardClock")
    #[serde(default = "default_clock_source")]
    pub sample_clock_source: String,

    /// Sample rate in Hz, must be > 0
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,

    /// Samples per read (batch size), must be > 0
    #[serde(default = "default_samples_per_read")]
    pub samples_per_read: usize,

    /// Device name (e.g., "PXI1Slot2")
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// Analog input channel index on the device
    #[serde(default)]
    pub channel: u32,

    /// Lower voltage bound, must be < `max_voltage`
    #[serde(default = "default_min_voltage")]
    pub min_voltage: f64,

    /// Upper voltage bound
    #[serde(default = "default_max_voltage")]
    pub max_voltage: f64,

    /// Input terminal configuration
    #[serde(default)]
    pub terminal_configuration: TerminalConfiguration,
}

fn default_clock_source() -> String {
    "OnboardClock".to_string()
}

fn default_sample_rate() -> f64 {
    60.0
}

fn default_samples_per_read() -> usize {
    30
}

fn default_device_name() -> String {
    "PXI1Slot2".to_string()
}

fn default_min_voltage() -> f64 {
    -5.0
}

fn default_max_voltage() -> f64 {
    5.0
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sample_clock_source: default_clock_source(),
            sample_rate: default_sample_rate(),
            samples_per_read: default_samples_per_read(),
            device_name: default_device_name(),
            channel: 0,
            min_voltage: default_min_voltage(),
            max_voltage: default_max_voltage(),
            terminal_configuration: TerminalConfiguration::default(),
        }
    }
}

/// Longest batch period accepted by `validate`
pub const MAX_BATCH_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

impl AcquisitionConfig {
    /// Physical channel addressed by this configuration
    pub fn physical_channel(&self) -> PhysicalChannel {
        PhysicalChannel {
            device: self.device_name.clone(),
            index: self.channel,
        }
    }

    /// Nominal time the hardware needs to fill one batch
    ///
    /// Saturates at `Duration::MAX` when the rate is too small to represent.
    pub fn batch_period(&self) -> Duration {
        Duration::try_from_secs_f64(self.samples_per_read as f64 / self.sample_rate)
            .unwrap_or(Duration::MAX)
    }

    /// Check the invariants every run relies on
    ///
    /// # Errors
    /// Returns `AcquisitionError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<(), AcquisitionError> {
        if self.sample_clock_source.trim().is_empty() {
            return Err(AcquisitionError::config(
                "sample_clock_source",
                "clock source must not be empty",
            ));
        }
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(AcquisitionError::config(
                "sample_rate",
                format!("sample_rate must be > 0, got {}", self.sample_rate),
            ));
        }
        if self.samples_per_read == 0 {
            return Err(AcquisitionError::config(
                "samples_per_read",
                "samples_per_read must be > 0",
            ));
        }
        if self.batch_period() > MAX_BATCH_PERIOD {
            return Err(AcquisitionError::config(
                "sample_rate",
                format!(
                    "sample_rate {} is too low for {} samples per read",
                    self.sample_rate, self.samples_per_read
                ),
            ));
        }
        if self.device_name.trim().is_empty() {
            return Err(AcquisitionError::config(
                "device_name",
                "device name must not be empty",
            ));
        }
        if !self.min_voltage.is_finite() || !self.max_voltage.is_finite() {
            return Err(AcquisitionError::config(
                "min_voltage",
                "voltage bounds must be finite",
            ));
        }
        if self.min_voltage >= self.max_voltage {
            return Err(AcquisitionError::config(
                "min_voltage",
                format!(
                    "min_voltage ({}) must be < max_voltage ({})",
                    self.min_voltage, self.max_voltage
                ),
            ));
        }
        Ok(())
    }
}

/// Device + analog input index, rendered as `"{device}/ai{index}"`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhysicalChannel {
    pub device: String,
    pub index: u32,
}

impl fmt::Display for PhysicalChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/ai{}", self.device, self.index)
    }
}

/// Input terminal configuration mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalConfiguration {
    /// Driver default for the channel
    #[default]
    Default,
    /// Referenced single-ended
    #[serde(alias = "referenced_single_ended")]
    Rse,
    /// Non-referenced single-ended
    #[serde(alias = "non_referenced_single_ended")]
    Nrse,
    /// Differential
    Differential,
    /// Pseudo-differential
    PseudoDifferential,
}

impl TerminalConfiguration {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Rse => "rse",
            Self::Nrse => "nrse",
            Self::Differential => "differential",
            Self::PseudoDifferential => "pseudo_differential",
        }
    }
}

impl fmt::Display for TerminalConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TerminalConfiguration {
    type Err = AcquisitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "default" => Ok(Self::Default),
            "rse" | "referenced_single_ended" => Ok(Self::Rse),
            "nrse" | "non_referenced_single_ended" => Ok(Self::Nrse),
            "diff" | "differential" => Ok(Self::Differential),
            "pseudo_diff" | "pseudo_differential" | "pseudodifferential" => {
                Ok(Self::PseudoDifferential)
            }
            other => Err(AcquisitionError::config(
                "terminal_configuration",
                format!("unknown terminal configuration '{other}'"),
            )),
        }
    }
}
