//! Serializable value types shared across the scheduler.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique job identifier.
pub type JobId = uuid::Uuid;

/// Opaque job payload and processor result.
pub type Payload = serde_json::Value;

/// Resource class for CPU-style compute units.
pub const COMPUTE: &str = "compute";
/// Resource class for memory units (MiB).
pub const MEMORY: &str = "memory";
/// Resource class for accelerator (GPU) units.
pub const ACCELERATOR: &str = "accelerator";

/// Job priority levels. Ordering follows urgency: `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background work.
    Low,
    /// Default priority.
    #[default]
    Medium,
    /// Latency-sensitive work.
    High,
    /// Must run as soon as capacity allows.
    Critical,
}

impl Priority {
    /// Base scheduling weight of this priority.
    pub const fn weight(self) -> u64 {
        match self {
            Self::Low => 1,
            Self::Medium => 10,
            Self::High => 100,
            Self::Critical => 1000,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Units required or held per resource class.
///
/// Classes missing from the vector count as zero units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceVector(BTreeMap<String, u64>);

impl ResourceVector {
    /// Create an empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper setting the units for one class.
    #[must_use]
    pub fn with(mut self, class: impl Into<String>, units: u64) -> Self {
        self.set(class, units);
        self
    }

    /// Set the units for one class.
    pub fn set(&mut self, class: impl Into<String>, units: u64) {
        self.0.insert(class.into(), units);
    }

    /// Units for a class, zero when absent.
    pub fn get(&self, class: &str) -> u64 {
        self.0.get(class).copied().unwrap_or(0)
    }

    /// Iterate over `(class, units)` pairs in class-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// True when every class requires zero units.
    pub fn is_zero(&self) -> bool {
        self.0.values().all(|v| *v == 0)
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for ResourceVector {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<BTreeMap<String, u64>> for ResourceVector {
    fn from(map: BTreeMap<String, u64>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_and_weights() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        assert_eq!(Priority::Critical.weight(), 1000);
        assert_eq!(Priority::Low.weight(), 1);
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn priority_serializes_lowercase() {
        let json = serde_json::to_string(&Priority::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let parsed: Priority = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(parsed, Priority::Low);
    }

    #[test]
    fn resource_vector_missing_class_is_zero() {
        let v = ResourceVector::new().with(COMPUTE, 2).with(MEMORY, 1024);
        assert_eq!(v.get(COMPUTE), 2);
        assert_eq!(v.get(ACCELERATOR), 0);
        assert!(!v.is_zero());
        assert!(ResourceVector::new().with(ACCELERATOR, 0).is_zero());
    }

    #[test]
    fn resource_vector_serializes_as_map() {
        let v = ResourceVector::new().with(COMPUTE, 1);
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"{"compute":1}"#);
    }
}
