//! # Global Metrics API
//!
//! The global slot holds at most one active [`MeterProvider`]. Code that only
//! records metrics asks it for meters and never needs to know whether a
//! provider was registered yet:
//!
//! ```
//! use otel_metrics::{global, KeyValue};
//!
//! let meter = global::meter("my-component");
//! let requests = meter.u64_counter("requests").init();
//! requests.add(1, &[KeyValue::new("route", "/")]);
//! ```
//!
//! An application registers its provider once with [`set_meter_provider`].
//! Meters and instruments created before that start forwarding to it.
//!
//! Problems found anywhere in the API are passed to [`handle_error`], unless
//! the SDK serving the meter has an error handler of its own; install a
//! handler with [`set_error_handler`] to receive them.
//!
//! [`MeterProvider`]: crate::metrics::MeterProvider
mod error_handler;
mod metrics;
mod proxy;

pub use error_handler::{handle_error, reset_error_handler, set_error_handler, ErrorHandler};
pub use metrics::{
    meter, meter_provider, meter_with_version, registered_version, set_meter_provider,
    unregister_meter_provider, GlobalMeterProvider,
};
pub use proxy::ProxyMeterProvider;
