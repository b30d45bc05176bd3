//! Metric processors
mod in_memory;

pub use in_memory::InMemoryProcessor;
