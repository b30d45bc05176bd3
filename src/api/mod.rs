//! # Metrics API
//!
//! The API layer contains the types instrumented code interacts with
//! directly. It depends on nothing else in the crate, and everything an SDK
//! needs to plug in is described by the traits in [`metrics::sdk_api`].
pub mod attributes;
pub mod core;
pub mod metrics;
