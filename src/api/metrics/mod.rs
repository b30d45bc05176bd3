//! # Metrics API
//!
//! A [`Meter`] is obtained from a [`MeterProvider`] and is the factory for
//! every instrument. Synchronous instruments ([`Counter`], [`UpDownCounter`],
//! [`Histogram`]) are recorded to directly. Observable instruments
//! ([`ObservableCounter`], [`ObservableUpDownCounter`], [`ObservableGauge`])
//! only receive values from a [`BatchObservableCallback`] that was registered
//! for them with [`Meter::add_batch_observable_callback`].
//!
//! Nothing in this API fails on the hot path. Problems are reported to the
//! error handler of the SDK behind the meter, [`global::handle_error`] unless
//! it has its own, and the offending value, instrument or callback is
//! dropped.
//!
//! [`global::handle_error`]: crate::global::handle_error
use crate::api::core::{KeyValue, Unit};
use std::fmt;
use std::result;
use std::sync::{Arc, PoisonError, TryLockError};
use thiserror::Error;

mod async_instrument;
mod config;
mod counter;
mod descriptor;
mod histogram;
pub mod noop;
mod number;
mod observable;
pub mod registry;
pub mod sdk_api;
mod sync_instrument;
mod up_down_counter;

pub use async_instrument::{
    AsyncInstrumentBuilder, BatchObservableCallback, CallbackId, CallbackKey, InstrumentId,
    Observable, ObserverResult, TypedObservable,
};
pub use config::{InstrumentConfig, InstrumentOptions, InstrumentationLibrary, ValueType};
pub use counter::Counter;
pub use descriptor::Descriptor;
pub use histogram::Histogram;
pub use number::{MetricValue, Number, NumberKind};
pub use observable::{ObservableCounter, ObservableGauge, ObservableUpDownCounter};
pub use sync_instrument::{InstrumentBuilder, Measurement};
pub use up_down_counter::UpDownCounter;

/// A specialized `Result` type for metric operations.
pub type Result<T> = result::Result<T, MetricsError>;

/// Errors returned by the metrics API.
///
/// None of these are returned from recording or registration calls made by
/// instrumented code. They travel to the error handler of the SDK instead,
/// see [`sdk_api::MeterCore::handle_error`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MetricsError {
    /// A different provider already occupies the global slot.
    #[error("meter provider registration rejected: {0}")]
    RegistrationConflict(String),
    /// The same instrument name was requested with a different kind.
    #[error("instrument \"{name}\" already registered as {existing:?}, now requested as {requested:?}")]
    InstrumentKindConflict {
        /// instrument name
        name: String,
        /// kind of the instrument registered first
        existing: (InstrumentKind, NumberKind),
        /// kind of the newly requested instrument
        requested: (InstrumentKind, NumberKind),
    },
    /// A value outside the instrument's domain was dropped.
    #[error("invalid measurement for instrument \"{instrument}\": {reason}")]
    InvalidMeasurement {
        /// instrument name
        instrument: String,
        /// why the value was rejected
        reason: InvalidMeasurementReason,
    },
    /// A batch observable callback panicked during collection.
    #[error("batch observable callback {callback} failed: {message}")]
    CallbackInvocationFailure {
        /// identity of the failed callback
        callback: CallbackId,
        /// panic payload, when it was a string
        message: String,
    },
    /// A batch observable callback reported against an instrument it did not
    /// declare when it was registered.
    #[error("batch observable callback {callback} observed \"{instrument}\" which it is not registered for")]
    UnassociatedObserve {
        /// identity of the offending callback
        callback: CallbackId,
        /// instrument name
        instrument: String,
    },
    /// Explicit histogram boundaries were not usable.
    #[error("invalid bucket boundaries for instrument \"{instrument}\": {reason}")]
    InvalidBoundaries {
        /// instrument name
        instrument: String,
        /// what is wrong with them
        reason: String,
    },
    /// Other errors not covered by specific cases.
    #[error("metrics error: {0}")]
    Other(String),
}

impl MetricsError {
    /// The level diagnostics for this error are reported at.
    pub fn severity(&self) -> tracing::Level {
        match self {
            MetricsError::InvalidMeasurement { .. } => tracing::Level::DEBUG,
            MetricsError::Other(_) => tracing::Level::ERROR,
            _ => tracing::Level::WARN,
        }
    }
}

impl<T> From<TryLockError<T>> for MetricsError {
    fn from(err: TryLockError<T>) -> Self {
        MetricsError::Other(err.to_string())
    }
}

impl<T> From<PoisonError<T>> for MetricsError {
    fn from(err: PoisonError<T>) -> Self {
        MetricsError::Other(err.to_string())
    }
}

/// Why a measurement was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidMeasurementReason {
    /// NaN or an infinity
    NonFinite,
    /// negative value on a monotonic instrument
    Negative,
}

impl fmt::Display for InvalidMeasurementReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidMeasurementReason::NonFinite => f.write_str("value is not finite"),
            InvalidMeasurementReason::Negative => {
                f.write_str("negative value is out of range for this instrument")
            }
        }
    }
}

/// Check that `number` is acceptable for the instrument described by
/// `descriptor`.
pub fn range_test(number: Number, descriptor: &Descriptor) -> Result<()> {
    if !number.is_finite(descriptor.number_kind()) {
        return Err(MetricsError::InvalidMeasurement {
            instrument: descriptor.name().to_string(),
            reason: InvalidMeasurementReason::NonFinite,
        });
    }

    if descriptor.instrument_kind().is_monotonic() && number.is_negative(descriptor.number_kind())
    {
        return Err(MetricsError::InvalidMeasurement {
            instrument: descriptor.name().to_string(),
            reason: InvalidMeasurementReason::Negative,
        });
    }

    Ok(())
}

/// The kind of an instrument. It never changes after creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    /// Synchronous, monotonic sum.
    Counter,
    /// Synchronous, non-monotonic sum.
    UpDownCounter,
    /// Synchronous distribution of values.
    Histogram,
    /// Observed, monotonic sum.
    ObservableCounter,
    /// Observed, non-monotonic sum.
    ObservableUpDownCounter,
    /// Observed current value.
    ObservableGauge,
}

impl InstrumentKind {
    /// Whether values are pushed by the caller rather than pulled during
    /// collection.
    pub fn is_synchronous(&self) -> bool {
        matches!(
            self,
            InstrumentKind::Counter | InstrumentKind::UpDownCounter | InstrumentKind::Histogram
        )
    }

    /// Whether the instrument is observable.
    pub fn is_asynchronous(&self) -> bool {
        !self.is_synchronous()
    }

    /// Whether the instrument only accepts non-negative values.
    pub fn is_monotonic(&self) -> bool {
        matches!(
            self,
            InstrumentKind::Counter | InstrumentKind::ObservableCounter
        )
    }
}

/// Meter is the factory for instruments of one instrumentation library, and
/// the place batch observable callbacks are registered.
///
/// Meters are cheap to clone; clones share the same core.
#[derive(Debug, Clone)]
pub struct Meter {
    library: InstrumentationLibrary,
    core: Arc<dyn sdk_api::MeterCore>,
}

impl Meter {
    /// Create a new meter over an SDK-implemented core.
    pub fn new(library: InstrumentationLibrary, core: Arc<dyn sdk_api::MeterCore>) -> Self {
        Meter { library, core }
    }

    /// The library this meter instruments.
    pub fn library(&self) -> &InstrumentationLibrary {
        &self.library
    }

    /// The SDK-implemented core backing this meter.
    pub fn core(&self) -> &Arc<dyn sdk_api::MeterCore> {
        &self.core
    }

    /// Creates a monotonic `u64` counter.
    pub fn u64_counter<T: Into<String>>(&self, name: T) -> InstrumentBuilder<'_, Counter<u64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a monotonic `f64` counter.
    pub fn f64_counter<T: Into<String>>(&self, name: T) -> InstrumentBuilder<'_, Counter<f64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates an `i64` up down counter.
    pub fn i64_up_down_counter<T: Into<String>>(
        &self,
        name: T,
    ) -> InstrumentBuilder<'_, UpDownCounter<i64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates an `f64` up down counter.
    pub fn f64_up_down_counter<T: Into<String>>(
        &self,
        name: T,
    ) -> InstrumentBuilder<'_, UpDownCounter<f64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a `u64` histogram.
    pub fn u64_histogram<T: Into<String>>(
        &self,
        name: T,
    ) -> InstrumentBuilder<'_, Histogram<u64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates an `f64` histogram.
    pub fn f64_histogram<T: Into<String>>(
        &self,
        name: T,
    ) -> InstrumentBuilder<'_, Histogram<f64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a `u64` observable counter.
    pub fn u64_observable_counter<T: Into<String>>(
        &self,
        name: T,
    ) -> AsyncInstrumentBuilder<'_, ObservableCounter<u64>> {
        AsyncInstrumentBuilder::new(self, name.into())
    }

    /// Creates an `f64` observable counter.
    pub fn f64_observable_counter<T: Into<String>>(
        &self,
        name: T,
    ) -> AsyncInstrumentBuilder<'_, ObservableCounter<f64>> {
        AsyncInstrumentBuilder::new(self, name.into())
    }

    /// Creates an `i64` observable up down counter.
    pub fn i64_observable_up_down_counter<T: Into<String>>(
        &self,
        name: T,
    ) -> AsyncInstrumentBuilder<'_, ObservableUpDownCounter<i64>> {
        AsyncInstrumentBuilder::new(self, name.into())
    }

    /// Creates an `f64` observable up down counter.
    pub fn f64_observable_up_down_counter<T: Into<String>>(
        &self,
        name: T,
    ) -> AsyncInstrumentBuilder<'_, ObservableUpDownCounter<f64>> {
        AsyncInstrumentBuilder::new(self, name.into())
    }

    /// Creates a `u64` observable gauge.
    pub fn u64_observable_gauge<T: Into<String>>(
        &self,
        name: T,
    ) -> AsyncInstrumentBuilder<'_, ObservableGauge<u64>> {
        AsyncInstrumentBuilder::new(self, name.into())
    }

    /// Creates an `i64` observable gauge.
    pub fn i64_observable_gauge<T: Into<String>>(
        &self,
        name: T,
    ) -> AsyncInstrumentBuilder<'_, ObservableGauge<i64>> {
        AsyncInstrumentBuilder::new(self, name.into())
    }

    /// Creates an `f64` observable gauge.
    pub fn f64_observable_gauge<T: Into<String>>(
        &self,
        name: T,
    ) -> AsyncInstrumentBuilder<'_, ObservableGauge<f64>> {
        AsyncInstrumentBuilder::new(self, name.into())
    }

    /// Register `callback` to be invoked once per collection cycle, allowed
    /// to report values for `observables` only.
    ///
    /// Registering the same callback with the same set of observables again
    /// has no effect. The same callback registered with a different set is a
    /// separate registration.
    pub fn add_batch_observable_callback(
        &self,
        callback: &BatchObservableCallback,
        observables: &[&dyn Observable],
    ) {
        let observables = async_instrument::cores(observables);
        if let Err(err) = self.core.register_callback(callback, &observables) {
            self.core.handle_error(err);
        }
    }

    /// Remove the registration made with exactly this callback and set of
    /// observables. Unknown registrations are ignored.
    pub fn remove_batch_observable_callback(
        &self,
        callback: &BatchObservableCallback,
        observables: &[&dyn Observable],
    ) {
        let observables = async_instrument::cores(observables);
        if let Err(err) = self.core.unregister_callback(callback, &observables) {
            self.core.handle_error(err);
        }
    }

    /// Records a batch of synchronous measurements sharing one attribute set.
    pub fn record_batch<T: IntoIterator<Item = Measurement>>(
        &self,
        attributes: &[KeyValue],
        measurements: T,
    ) {
        for measurement in measurements {
            measurement.record(attributes);
        }
    }

    pub(crate) fn descriptor(
        &self,
        name: String,
        instrument_kind: InstrumentKind,
        number_kind: NumberKind,
    ) -> Descriptor {
        Descriptor::new(name, self.library.clone(), instrument_kind, number_kind)
    }

    pub(crate) fn handle_error(&self, err: MetricsError) {
        self.core.handle_error(err)
    }

    pub(crate) fn new_sync_instrument(
        &self,
        descriptor: Descriptor,
    ) -> Result<Arc<dyn sdk_api::SyncInstrumentCore>> {
        self.core.new_sync_instrument(descriptor)
    }

    pub(crate) fn new_async_instrument(
        &self,
        descriptor: Descriptor,
    ) -> Result<Arc<dyn sdk_api::AsyncInstrumentCore>> {
        self.core.new_async_instrument(descriptor)
    }
}

/// Provides access to named `Meter` instances.
pub trait MeterProvider: fmt::Debug {
    /// Returns a meter for `library`.
    ///
    /// Calls with equal libraries return meters that behave identically;
    /// implementations are free to share one core between them.
    fn meter_with_library(&self, library: InstrumentationLibrary) -> Meter;

    /// Returns a meter for the library `name`.
    fn meter(&self, name: &'static str) -> Meter {
        self.meter_with_library(InstrumentationLibrary::new(name, None, None))
    }

    /// Returns a meter for the library `name`, with an optional version and
    /// schema url.
    fn versioned_meter(
        &self,
        name: &'static str,
        version: Option<&'static str>,
        schema_url: Option<&'static str>,
    ) -> Meter {
        self.meter_with_library(InstrumentationLibrary::new(name, version, schema_url))
    }
}

pub(crate) fn apply_options(descriptor: &mut Descriptor, options: InstrumentOptions) {
    let InstrumentOptions {
        description,
        unit,
        value_type,
        boundaries,
    } = options;

    if let Some(description) = description {
        descriptor.set_description(description);
    }
    if let Some(unit) = unit {
        descriptor.set_unit(Unit::new(unit));
    }
    if let Some(value_type) = value_type {
        if !value_type.matches(descriptor.number_kind()) {
            tracing::debug!(
                instrument = descriptor.name(),
                ?value_type,
                number_kind = ?descriptor.number_kind(),
                "ignoring value type option that does not match the instrument"
            );
        }
    }
    if let Some(boundaries) = boundaries {
        if descriptor.instrument_kind() == &InstrumentKind::Histogram {
            descriptor.set_boundaries(boundaries);
        }
    }
}
