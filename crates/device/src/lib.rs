//! # Device
//!
//! 设备驱动实现（无硬件环境下的替身）。
//!
//! - `SimulatedDevice`: 按配置生成正弦/恒定/计数波形，支持故障注入
//! - `ReplayDevice`: 回放已录制的 CSV 文件
//! - `ConfiguredDevice`: 按 `DeviceSettings` 选择驱动

mod configured;
mod pacing;
mod replay;
mod simulated;

pub use configured::{AnySession, ConfiguredDevice};
pub use contracts::{DeviceDriver, DeviceSession};
pub use replay::{load_artifact, ReplayDevice, ReplaySession};
pub use simulated::{SimulatedDevice, SimulatedSession};
