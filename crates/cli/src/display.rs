//! Rolling strip-chart display
//!
//! Keeps the most recent samples in a fixed window, the way a scrolling graph
//! shows a fixed x-range, and reports the window through `tracing`.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use contracts::{FaultPayload, SampleDisplay};
use tracing::{error, info};

/// Samples shown at once
pub const DEFAULT_WINDOW: usize = 50;

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct StripChartDisplay {
    window: VecDeque<f64>,
    capacity: usize,
    total_samples: u64,
    fault: Option<FaultPayload>,
    last_report: Option<Instant>,
}

impl StripChartDisplay {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            total_samples: 0,
            fault: None,
            last_report: None,
        }
    }

    pub fn window(&self) -> impl Iterator<Item = f64> + '_ {
        self.window.iter().copied()
    }

    pub fn latest(&self) -> Option<f64> {
        self.window.back().copied()
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    pub fn fault(&self) -> Option<&FaultPayload> {
        self.fault.as_ref()
    }

    /// Min and max over the visible window
    pub fn range(&self) -> Option<(f64, f64)> {
        self.window.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    fn maybe_report(&mut self) {
        let now = Instant::now();
        if self
            .last_report
            .is_some_and(|last| now.duration_since(last) < REPORT_INTERVAL)
        {
            return;
        }
        self.last_report = Some(now);

        if let (Some(latest), Some((min, max))) = (self.latest(), self.range()) {
            info!(
                total = self.total_samples,
                latest = format!("{latest:.4}"),
                window_min = format!("{min:.4}"),
                window_max = format!("{max:.4}"),
                "Strip chart"
            );
        }
    }
}

impl Default for StripChartDisplay {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl SampleDisplay for StripChartDisplay {
    fn push_samples(&mut self, samples: &[f64]) {
        if self.fault.is_some() {
            return;
        }
        for &sample in samples {
            if self.window.len() == self.capacity {
                self.window.pop_front();
            }
            self.window.push_back(sample);
        }
        self.total_samples += samples.len() as u64;
        self.maybe_report();
    }

    fn show_fault(&mut self, fault: &FaultPayload) {
        error!(
            run_id = fault.run_id,
            kind = %fault.kind,
            "Acquisition fault: {}",
            fault.describe()
        );
        self.fault = Some(fault.clone());
    }

    fn reset(&mut self) {
        self.window.clear();
        self.total_samples = 0;
        self.fault = None;
        self.last_report = None;
    }
}
