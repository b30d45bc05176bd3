//! Metrics SDK API
//!
//! The traits an SDK implements to back the instruments handed out by a
//! [`Meter`](crate::metrics::Meter).
use crate::api::core::KeyValue;
use crate::api::metrics::{BatchObservableCallback, Descriptor, MetricsError, Number, Result};
use crate::global;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The interface an SDK implements to supply a `Meter` implementation.
pub trait MeterCore: fmt::Debug + Send + Sync {
    /// Create a new synchronous instrument implementation.
    fn new_sync_instrument(&self, descriptor: Descriptor) -> Result<Arc<dyn SyncInstrumentCore>>;

    /// Create a new asynchronous instrument implementation.
    fn new_async_instrument(&self, descriptor: Descriptor)
        -> Result<Arc<dyn AsyncInstrumentCore>>;

    /// Register a batch observable callback for `observables`. Registering an
    /// identical pair twice must not lead to a second invocation per cycle.
    fn register_callback(
        &self,
        callback: &BatchObservableCallback,
        observables: &[Arc<dyn AsyncInstrumentCore>],
    ) -> Result<()>;

    /// Remove the registration for exactly this callback and observable set.
    fn unregister_callback(
        &self,
        callback: &BatchObservableCallback,
        observables: &[Arc<dyn AsyncInstrumentCore>],
    ) -> Result<()>;

    /// Report a problem found while serving this meter. Defaults to the
    /// global handler.
    fn handle_error(&self, err: MetricsError) {
        global::handle_error(err)
    }
}

/// A common interface for synchronous and asynchronous instruments.
pub trait InstrumentCore: fmt::Debug + Send + Sync {
    /// Description of the instrument's descriptor
    fn descriptor(&self) -> &Descriptor;
}

/// The implementation-level interface to a generic synchronous instrument.
pub trait SyncInstrumentCore: InstrumentCore {
    /// Capture a single synchronous metric event. The value has already
    /// passed `range_test`.
    fn record_one(&self, number: Number, attributes: &[KeyValue]);

    /// Report a value that failed `range_test`. Defaults to the global
    /// handler.
    fn handle_error(&self, err: MetricsError) {
        global::handle_error(err)
    }

    /// Returns self as any
    fn as_any(&self) -> &dyn Any;
}

/// An implementation-level interface to an asynchronous instrument.
pub trait AsyncInstrumentCore: InstrumentCore {
    /// The instrument this one forwards to, if it is an indirection.
    ///
    /// SDKs follow this chain to find their own instrument when handed one
    /// created through a proxy.
    fn delegate(&self) -> Option<Arc<dyn AsyncInstrumentCore>> {
        None
    }

    /// Returns self as any
    fn as_any(&self) -> &dyn Any;
}

/// Follow `delegate` links until reaching the instrument that does the
/// actual work.
pub fn resolve_async(instrument: &Arc<dyn AsyncInstrumentCore>) -> Arc<dyn AsyncInstrumentCore> {
    let mut current = instrument.clone();
    while let Some(next) = current.delegate() {
        current = next;
    }
    current
}

/// Receives observations made inside a batch observable callback.
pub trait ObserverCore {
    /// Capture one observation. Values failing `range_test` are reported
    /// and dropped by the implementation.
    fn observe_one(
        &self,
        instrument: &Arc<dyn AsyncInstrumentCore>,
        number: Number,
        attributes: &[KeyValue],
    );
}
