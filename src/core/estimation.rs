//! Static resource estimation per job type.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::util::serde::{ResourceVector, ACCELERATOR, COMPUTE, MEMORY};

/// Default requirements and expected runtime for a job type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEstimate {
    /// Units required per resource class.
    pub resources: ResourceVector,
    /// Expected runtime in seconds when the caller gives none.
    pub estimated_duration_secs: u64,
}

impl ResourceEstimate {
    /// Estimate with compute, memory and accelerator units.
    pub fn new(compute: u64, memory: u64, accelerator: u64, duration_secs: u64) -> Self {
        Self {
            resources: ResourceVector::new()
                .with(COMPUTE, compute)
                .with(MEMORY, memory)
                .with(ACCELERATOR, accelerator),
            estimated_duration_secs: duration_secs,
        }
    }
}

/// Lookup table from job type to [`ResourceEstimate`], with a fallback for
/// types not in the table.
#[derive(Debug, Clone)]
pub struct ResourceEstimator {
    table: HashMap<String, ResourceEstimate>,
    fallback: ResourceEstimate,
}

impl Default for ResourceEstimator {
    fn default() -> Self {
        let table = [
            ("video_analysis", ResourceEstimate::new(2, 2048, 1, 300)),
            ("model_training", ResourceEstimate::new(4, 8192, 2, 3600)),
            ("recommendation_batch", ResourceEstimate::new(2, 1024, 0, 600)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self {
            table,
            fallback: ResourceEstimate::new(1, 512, 0, 60),
        }
    }
}

impl ResourceEstimator {
    /// Replace or add the estimate for one type.
    #[must_use]
    pub fn with_override(mut self, job_type: impl Into<String>, estimate: ResourceEstimate) -> Self {
        self.table.insert(job_type.into(), estimate);
        self
    }

    /// Estimate for `job_type`, falling back to the minimal default.
    pub fn estimate(&self, job_type: &str) -> &ResourceEstimate {
        self.table.get(job_type).unwrap_or(&self.fallback)
    }

    /// Every explicit table entry.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ResourceEstimate)> {
        self.table.iter().map(|(k, v)| (k.as_str(), v))
    }
}
