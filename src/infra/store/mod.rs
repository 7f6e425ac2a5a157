//! Job record store backends.

pub mod memory;

pub use memory::InMemoryJobStore;
