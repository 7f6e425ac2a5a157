//! Multi-class resource pool with all-or-nothing allocation.
//!
//! The pool is plain bookkeeping. Callers serialize access through the
//! scheduler state lock, so allocation and release pairs never observe each
//! other's intermediate state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;
use crate::util::serde::ResourceVector;

/// Capacity of one resource class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceClass {
    /// Configured capacity.
    pub total: u64,
    /// Units not currently reserved.
    pub available: u64,
}

impl ResourceClass {
    /// Units currently reserved.
    pub const fn in_use(&self) -> u64 {
        self.total - self.available
    }
}

/// Resource pool tracking `{total, available}` per named class.
#[derive(Debug, Clone, Default)]
pub struct ResourcePool {
    classes: BTreeMap<String, ResourceClass>,
}

impl ResourcePool {
    /// Create a pool with every class fully available.
    pub fn new(totals: &ResourceVector) -> Self {
        let classes = totals
            .iter()
            .map(|(class, total)| {
                (
                    class.to_string(),
                    ResourceClass {
                        total,
                        available: total,
                    },
                )
            })
            .collect();
        Self { classes }
    }

    /// Whether `required` fits the currently available units.
    ///
    /// A class the pool does not know has zero capacity.
    pub fn fits(&self, required: &ResourceVector) -> bool {
        required.iter().all(|(class, units)| {
            units == 0
                || self
                    .classes
                    .get(class)
                    .is_some_and(|c| c.available >= units)
        })
    }

    /// Whether `required` could ever fit, i.e. fits the totals of an idle pool.
    pub fn could_fit(&self, required: &ResourceVector) -> bool {
        required.iter().all(|(class, units)| {
            units == 0 || self.classes.get(class).is_some_and(|c| c.total >= units)
        })
    }

    /// Atomically reserve `required`. Returns `false` and changes nothing when
    /// any class lacks capacity.
    pub fn try_allocate(&mut self, required: &ResourceVector) -> bool {
        if !self.fits(required) {
            return false;
        }
        for (class, units) in required.iter() {
            if let Some(c) = self.classes.get_mut(class) {
                c.available -= units;
            }
        }
        true
    }

    /// Atomically return `held` to the pool.
    ///
    /// Rejected entirely, with no class changed, when any class would exceed
    /// its total. Releasing exactly a prior allocation always succeeds.
    pub fn release(&mut self, held: &ResourceVector) -> Result<(), SchedulerError> {
        for (class, units) in held.iter() {
            if units == 0 {
                continue;
            }
            let Some(c) = self.classes.get(class) else {
                return Err(SchedulerError::InvariantViolation(format!(
                    "release of {units} units to unknown class `{class}`"
                )));
            };
            if c.available + units > c.total {
                return Err(SchedulerError::InvariantViolation(format!(
                    "release of {units} `{class}` units exceeds total {} (available {})",
                    c.total, c.available
                )));
            }
        }
        for (class, units) in held.iter() {
            if let Some(c) = self.classes.get_mut(class) {
                c.available += units;
            }
        }
        Ok(())
    }

    /// Capacity of a class, if configured.
    pub fn class(&self, name: &str) -> Option<ResourceClass> {
        self.classes.get(name).copied()
    }

    /// Copy of every class's capacity.
    pub fn snapshot(&self) -> BTreeMap<String, ResourceClass> {
        self.classes.clone()
    }

    /// Fraction of each class in use: `(total - available) / total`.
    #[allow(clippy::cast_precision_loss)]
    pub fn utilization(&self) -> BTreeMap<String, f64> {
        self.classes
            .iter()
            .map(|(name, c)| {
                let used = if c.total == 0 {
                    0.0
                } else {
                    c.in_use() as f64 / c.total as f64
                };
                (name.clone(), used)
            })
            .collect()
    }

    /// Check `held_total + available == total` for every class, where
    /// `held_total` is the sum of outstanding allocations.
    pub fn verify_held(&self, held_total: &ResourceVector) -> Result<(), SchedulerError> {
        for (name, c) in &self.classes {
            let held = held_total.get(name);
            if c.available > c.total || held + c.available != c.total {
                return Err(SchedulerError::InvariantViolation(format!(
                    "class `{name}`: held {held} + available {} != total {}",
                    c.available, c.total
                )));
            }
        }
        Ok(())
    }
}
