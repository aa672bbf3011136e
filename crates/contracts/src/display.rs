//! Presentation seam driven by the controller tick

use crate::FaultPayload;

/// Consumer of drained samples and fault notices
pub trait SampleDisplay {
    /// Append samples in the order they were drained
    fn push_samples(&mut self, samples: &[f64]);

    /// Surface a fault to the operator
    fn show_fault(&mut self, fault: &FaultPayload);

    /// Clear state before a new run
    fn reset(&mut self) {}
}

/// Display that discards everything
impl SampleDisplay for () {
    fn push_samples(&mut self, _samples: &[f64]) {}

    fn show_fault(&mut self, _fault: &FaultPayload) {}
}

/// Collecting display, handy for headless callers
impl SampleDisplay for Vec<f64> {
    fn push_samples(&mut self, samples: &[f64]) {
        self.extend_from_slice(samples);
    }

    fn show_fault(&mut self, _fault: &FaultPayload) {}

    fn reset(&mut self) {
        self.clear();
    }
}
