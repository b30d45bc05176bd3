//! Metrics API front-end.
//!
//! This crate lets independent parts of an application share one handle to a
//! metrics back-end. Instrumented code asks the [`global`] registry for the
//! current [`MeterProvider`], obtains a [`Meter`] from it and uses the meter to
//! create instruments:
//!
//! ```
//! use otel_metrics::{global, KeyValue};
//!
//! let meter = global::meter("my_service");
//!
//! let requests = meter.u64_counter("requests").with_unit("1").init();
//! requests.add(1, &[KeyValue::new("route", "/health")]);
//! ```
//!
//! Until a provider is registered, the global registry hands out a proxy that
//! behaves like a no-op. Handles obtained from the proxy start forwarding to
//! the real provider as soon as one is registered with
//! [`global::set_meter_provider`].
//!
//! Observable instruments are fed by batch callbacks, registered on the meter
//! together with the set of instruments they are allowed to report against:
//!
//! ```
//! use otel_metrics::{global, metrics::BatchObservableCallback};
//!
//! let meter = global::meter("my_service");
//! let memory = meter.u64_observable_gauge("process.memory").init();
//!
//! let observable = memory.clone();
//! let callback = BatchObservableCallback::new(move |observer| {
//!     observer.observe(&observable, 42, &[]);
//! });
//! meter.add_batch_observable_callback(&callback, &[&memory]);
//! ```
//!
//! The [`sdk`] module contains an accumulator-backed provider that delivers
//! measurements to a [`sdk::export::metrics::Processor`] and drives the
//! collection cycles that invoke batch callbacks.
//!
//! [`MeterProvider`]: crate::metrics::MeterProvider
//! [`Meter`]: crate::metrics::Meter
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]

pub mod api;
pub mod global;
pub mod sdk;

pub use api::{
    attributes,
    core::{Key, KeyValue, Unit, Value},
    metrics,
};
