//! # Acquisition
//!
//! 采集管道核心：读取循环、故障中继与控制器。
//!
//! 负责：
//! - 每次运行分配四条单向通道 (data / command / ack / fault)
//! - 在独立线程中运行 `ReaderLoop`，异常与 panic 经故障通道上报
//! - 控制器 tick 非阻塞消费数据，停止时执行 Stop/Ack 握手并清空通道

pub mod channel;
pub mod controller;
pub mod reader;
pub mod relay;
pub mod state;

pub use channel::{ControlChannels, ControllerEndpoints, Inbox, Outbox, ReaderEndpoints};
pub use controller::{
    Controller, ControllerState, DrainCounts, RunOutcome, RunSummary, TickOutcome,
};
pub use reader::{ReaderFault, ReaderLoop, RunReport, DEFAULT_READ_TIMEOUT};
pub use relay::ReaderProcess;
pub use state::{ReaderState, StateTracker};
