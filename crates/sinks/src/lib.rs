//! # Sinks
//!
//! 采集数据输出模块。
//!
//! 负责：
//! - CSV 文件输出 (每行一个样本，按采集顺序)
//! - 日志输出 (批次摘要)
//! - 按配置选择 sink 的 `SinkOpener`

mod configured;
mod file;
mod log;

pub use configured::{AnySink, ConfiguredSinks};
pub use contracts::{SampleSink, SinkOpener};
pub use file::{CsvFileSink, CSV_HEADER};
pub use log::LogSink;
