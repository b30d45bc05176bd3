//! SDK Export
pub mod metrics;
