//! 采集管道指标收集模块
//!
//! 记录读取循环与控制器的运行指标，并提供内存中的聚合统计。

use contracts::{FaultKind, SampleBatch};
use metrics::{counter, gauge, histogram};

/// 记录一次批次读取
///
/// 读取循环每成功读取一个批次调用一次。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_batch_acquired;
///
/// let batch = session.read_batch(count, read_timeout).await?;
/// record_batch_acquired(&batch, started.elapsed().as_secs_f64() * 1000.0);
/// ```
pub fn record_batch_acquired(batch: &SampleBatch, latency_ms: f64) {
    counter!("daq_reader_batches_acquired_total").increment(1);
    counter!("daq_reader_samples_acquired_total").increment(batch.len() as u64);
    gauge!("daq_reader_last_batch_sequence").set(batch.sequence as f64);
    record_read_latency_ms(latency_ms);

    if let Some((min, max)) = batch.bounds() {
        gauge!("daq_reader_batch_min_volts").set(min);
        gauge!("daq_reader_batch_max_volts").set(max);
    }
}

/// 记录读取延迟
pub fn record_read_latency_ms(latency_ms: f64) {
    histogram!("daq_reader_read_latency_ms").record(latency_ms);
}

/// 记录运行启动
pub fn record_run_started(run_id: u64) {
    counter!("daq_reader_runs_started_total").increment(1);
    gauge!("daq_reader_current_run_id").set(run_id as f64);
    gauge!("daq_reader_run_active").set(1.0);
}

/// 记录运行结束 (outcome: "acknowledged" / "faulted")
pub fn record_run_finished(outcome: &str) {
    counter!(
        "daq_reader_runs_finished_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
    gauge!("daq_reader_run_active").set(0.0);
}

/// 记录故障
pub fn record_fault(kind: FaultKind) {
    counter!(
        "daq_reader_faults_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// 记录控制器在一次 tick 中送往显示的样本数
pub fn record_samples_displayed(count: usize) {
    if count > 0 {
        counter!("daq_reader_samples_displayed_total").increment(count as u64);
    }
}

/// 记录停止时清空的残留消息数
pub fn record_residual_drained(channel: &str, count: usize) {
    if count > 0 {
        counter!(
            "daq_reader_residual_drained_total",
            "channel" => channel.to_string()
        )
        .increment(count as u64);
    }
}

/// 读取指标聚合器
///
/// 在内存中聚合单次运行的批次指标，便于输出摘要。
#[derive(Debug, Clone, Default)]
pub struct ReaderMetricsAggregator {
    /// 批次数
    pub total_batches: u64,

    /// 样本总数
    pub total_samples: u64,

    /// 读取延迟统计 (毫秒)
    pub latency_stats: RunningStats,

    /// 样本值统计 (伏特)
    pub value_stats: RunningStats,
}

impl ReaderMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, batch: &SampleBatch, latency_ms: f64) {
        self.total_batches += 1;
        self.total_samples += batch.len() as u64;
        self.latency_stats.push(latency_ms);
        for value in batch.iter() {
            self.value_stats.push(value);
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> ReaderMetricsSummary {
        ReaderMetricsSummary {
            total_batches: self.total_batches,
            total_samples: self.total_samples,
            read_latency_ms: StatsSummary::from(&self.latency_stats),
            values: StatsSummary::from(&self.value_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct ReaderMetricsSummary {
    pub total_batches: u64,
    pub total_samples: u64,
    pub read_latency_ms: StatsSummary,
    pub values: StatsSummary,
}

impl std::fmt::Display for ReaderMetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Reader Metrics Summary ===")?;
        writeln!(f, "Batches acquired: {}", self.total_batches)?;
        writeln!(f, "Samples acquired: {}", self.total_samples)?;
        writeln!(f, "Read latency (ms): {}", self.read_latency_ms)?;
        writeln!(f, "Values (V): {}", self.values)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}
