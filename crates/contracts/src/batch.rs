//! SampleBatch - one acquisition cycle worth of readings

use serde::{Deserialize, Serialize};

/// A single voltage reading, one per data-channel message
pub type Reading = f64;

/// Ordered, fixed-length group of readings produced by one read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleBatch {
    /// Batch index within the run, starting at 0
    pub sequence: u64,

    /// Readings in acquisition order
    pub readings: Vec<Reading>,
}

impl SampleBatch {
    pub fn new(sequence: u64, readings: Vec<Reading>) -> Self {
        Self { sequence, readings }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Reading> + '_ {
        self.readings.iter().copied()
    }

    /// (min, max) of the batch, `None` when empty
    pub fn bounds(&self) -> Option<(Reading, Reading)> {
        self.iter().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}
