//! Infrastructure adapters for queues and job record storage.

pub mod queue;
pub mod store;
pub use queue::InMemoryQueue;
pub use store::InMemoryJobStore;
