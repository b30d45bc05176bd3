//! # Metrics SDK
//!
//! A minimal back-end for the metrics API. It delivers every measurement to a
//! [`Processor`](export::metrics::Processor) and runs the collection cycles
//! that invoke batch observable callbacks.
pub mod export;
pub mod metrics;
