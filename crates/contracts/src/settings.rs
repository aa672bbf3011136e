//! Settings - Config Loader 输出
//!
//! 描述完整的应用配置：采集参数、设备、输出、控制器。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::AcquisitionConfig;

/// 完整的应用配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// 采集参数 (每次运行不可变)
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// 设备驱动配置
    #[serde(default)]
    pub device: DeviceSettings,

    /// 输出配置
    #[serde(default)]
    pub sink: SinkSettings,

    /// 控制器配置
    #[serde(default)]
    pub controller: ControllerSettings,
}

/// 设备类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// 模拟信号源
    #[default]
    Simulated,
    /// 回放已录制的 CSV 文件
    Replay,
}

/// 设备配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// 设备类型
    #[serde(default)]
    pub kind: DeviceKind,

    /// 模拟波形
    #[serde(default)]
    pub waveform: Waveform,

    /// 按标称采样率节拍输出 (false = 不限速)
    #[serde(default = "default_realtime")]
    pub realtime: bool,

    /// 回放文件路径 (kind = replay 时必填)
    #[serde(default)]
    pub replay_path: Option<PathBuf>,

    /// 回放到末尾后从头循环
    #[serde(default = "default_replay_loop")]
    pub replay_loop: bool,

    /// 故障注入 (可选)
    #[serde(default)]
    pub fault: Option<FaultInjection>,
}

fn default_realtime() -> bool {
    true
}

fn default_replay_loop() -> bool {
    true
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            kind: DeviceKind::default(),
            waveform: Waveform::default(),
            realtime: default_realtime(),
            replay_path: None,
            replay_loop: default_replay_loop(),
            fault: None,
        }
    }
}

/// 模拟波形
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Waveform {
    /// 正弦波
    Sine {
        /// 频率 (Hz)
        frequency_hz: f64,
        /// 幅值 (V)
        amplitude: f64,
        /// 直流偏置 (V)
        #[serde(default)]
        offset: f64,
    },
    /// 恒定电压
    Constant { value: f64 },
    /// 单调递增计数器，不受电压范围裁剪
    Counter {
        #[serde(default)]
        start: f64,
        #[serde(default = "default_counter_step")]
        step: f64,
    },
}

fn default_counter_step() -> f64 {
    1.0
}

impl Default for Waveform {
    fn default() -> Self {
        Self::Sine {
            frequency_hz: 1.0,
            amplitude: 2.0,
            offset: 0.0,
        }
    }
}

/// 故障注入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultInjection {
    /// 成功读取多少个批次后触发 (configure_failure 忽略此值)
    #[serde(default)]
    pub after_batches: u64,

    /// 故障类型
    pub kind: InjectedFault,
}

/// 注入的故障类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectedFault {
    /// configure 失败
    ConfigureFailure,
    /// 读取挂起直到超时
    ReadTimeout,
    /// 读取返回设备错误
    DeviceError,
    /// 读取时 panic
    Panic,
}

/// 输出类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// CSV 文件，每行一个样本
    #[default]
    File,
    /// 仅通过 tracing 输出批次摘要
    Log,
}

/// 输出配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkSettings {
    /// 输出类型
    #[serde(default)]
    pub kind: SinkKind,

    /// 输出目录
    #[serde(default = "default_sink_directory")]
    pub directory: PathBuf,

    /// 输出文件名，同时作为 sink 标识
    #[serde(default = "default_sink_file_name")]
    pub file_name: String,
}

fn default_sink_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_sink_file_name() -> String {
    "Output_Data.csv".to_string()
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            directory: default_sink_directory(),
            file_name: default_sink_file_name(),
        }
    }
}

impl SinkSettings {
    /// 输出文件完整路径
    pub fn output_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// 控制器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// 单次读取超时 (毫秒)，超时即故障，不重试
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// 等待 Ack 的超时 (毫秒)，缺省为 read_timeout_ms + 5000，须大于 read_timeout_ms
    #[serde(default)]
    pub ack_timeout_ms: Option<u64>,

    /// 握手结束后等待读取线程退出的上限 (毫秒)，超时则放弃 join
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,

    /// 显示刷新频率 (Hz)
    #[serde(default = "default_display_rate_hz")]
    pub display_rate_hz: f64,

    /// 每个 tick 最多送往显示的样本数 (0 = 不限)
    #[serde(default)]
    pub max_samples_per_tick: usize,
}

fn default_read_timeout_ms() -> u64 {
    10_000
}

fn default_join_timeout_ms() -> u64 {
    2_000
}

fn default_display_rate_hz() -> f64 {
    60.0
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            read_timeout_ms: default_read_timeout_ms(),
            ack_timeout_ms: None,
            join_timeout_ms: default_join_timeout_ms(),
            display_rate_hz: default_display_rate_hz(),
            max_samples_per_tick: 0,
        }
    }
}

impl ControllerSettings {
    /// Ack 等待相对于读取超时的额外余量
    pub const ACK_GRACE: Duration = Duration::from_secs(5);

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.read_timeout() + Self::ACK_GRACE)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// 显示刷新周期，无法表示时为 `None`
    pub fn display_period(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(1.0 / self.display_rate_hz).ok()
    }
}
