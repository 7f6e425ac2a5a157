//! Configuration models for the resource pool, estimates and timeouts.

pub mod pool;

pub use pool::{PoolConfig, SchedulerConfig};
