//! Observable instruments and batch callbacks
use crate::api::core::{KeyValue, Unit};
use crate::api::metrics::{
    apply_options, noop::NoopAsyncInstrument, sdk_api, Descriptor, InstrumentKind,
    InstrumentOptions, Meter, MetricValue, Result,
};
use std::fmt;
use std::marker;
use std::sync::Arc;

/// Stable identity of an instrument implementation, derived from the address
/// of its shared allocation. Valid for as long as a reference to the
/// instrument is held.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrumentId(usize);

impl InstrumentId {
    /// The identity of `instrument`.
    pub fn of(instrument: &Arc<dyn sdk_api::AsyncInstrumentCore>) -> Self {
        InstrumentId(Arc::as_ptr(instrument) as *const () as usize)
    }
}

/// Identity of a batch observable callback. Clones of a callback share it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallbackId(usize);

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:x}", self.0)
    }
}

type CallbackFn = dyn Fn(&ObserverResult<'_>) + Send + Sync;

/// A callback invoked once per collection cycle to report values for the
/// observable instruments it was registered with.
///
/// The callback may be invoked concurrently from several collections and
/// must be safe for that.
#[derive(Clone)]
pub struct BatchObservableCallback(Arc<CallbackFn>);

impl BatchObservableCallback {
    /// Wrap `callback`.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&ObserverResult<'_>) + Send + Sync + 'static,
    {
        BatchObservableCallback(Arc::new(callback))
    }

    /// The identity registrations of this callback are keyed by.
    pub fn id(&self) -> CallbackId {
        CallbackId(Arc::as_ptr(&self.0) as *const () as usize)
    }

    /// Invoke the callback.
    pub fn call(&self, observer: &ObserverResult<'_>) {
        (self.0)(observer)
    }
}

impl fmt::Debug for BatchObservableCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BatchObservableCallback")
            .field(&self.id())
            .finish()
    }
}

/// Key of a batch callback registration: the callback identity together with
/// the sorted, de-duplicated identities of its observables.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallbackKey {
    callback: CallbackId,
    observables: Vec<InstrumentId>,
}

impl CallbackKey {
    /// Derive the key of a registration.
    pub fn new(
        callback: &BatchObservableCallback,
        observables: &[Arc<dyn sdk_api::AsyncInstrumentCore>],
    ) -> Self {
        let mut ids: Vec<InstrumentId> = observables.iter().map(InstrumentId::of).collect();
        ids.sort();
        ids.dedup();

        CallbackKey {
            callback: callback.id(),
            observables: ids,
        }
    }

    /// The callback part of the key
    pub fn callback(&self) -> CallbackId {
        self.callback
    }

    /// The observable part of the key
    pub fn observables(&self) -> &[InstrumentId] {
        &self.observables
    }

    /// Whether `instrument` is one of the registered observables.
    pub fn contains(&self, instrument: InstrumentId) -> bool {
        self.observables.binary_search(&instrument).is_ok()
    }
}

/// An observable instrument, usable in a callback registration.
pub trait Observable: fmt::Debug {
    /// The sdk-implemented instrument backing this observable.
    fn instrument(&self) -> &Arc<dyn sdk_api::AsyncInstrumentCore>;
}

/// An observable instrument with a known value type.
pub trait TypedObservable: Observable {
    /// The values this instrument is observed with.
    type Value: MetricValue;
}

pub(crate) fn cores(observables: &[&dyn Observable]) -> Vec<Arc<dyn sdk_api::AsyncInstrumentCore>> {
    observables
        .iter()
        .map(|observable| observable.instrument().clone())
        .collect()
}

/// Handed to a batch observable callback to report observations.
pub struct ObserverResult<'a> {
    core: &'a dyn sdk_api::ObserverCore,
}

impl<'a> ObserverResult<'a> {
    /// Wrap an SDK observer.
    pub fn new(core: &'a dyn sdk_api::ObserverCore) -> Self {
        ObserverResult { core }
    }

    /// Report `value` for `observable`.
    ///
    /// Observations for instruments the callback was not registered with are
    /// dropped, as are values the instrument does not accept.
    pub fn observe<O: TypedObservable>(
        &self,
        observable: &O,
        value: O::Value,
        attributes: &[KeyValue],
    ) {
        self.core
            .observe_one(observable.instrument(), value.into(), attributes)
    }
}

impl fmt::Debug for ObserverResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverResult").finish()
    }
}

#[allow(unreachable_pub)]
pub(crate) mod private {
    use super::*;

    pub trait AsyncInstrumentHandle: Sized {
        type Value: MetricValue;
        const KIND: InstrumentKind;

        fn from_core(instrument: Arc<dyn sdk_api::AsyncInstrumentCore>) -> Self;
    }
}

/// Configures and creates an observable instrument.
#[derive(Debug)]
pub struct AsyncInstrumentBuilder<'a, I> {
    meter: &'a Meter,
    descriptor: Descriptor,
    _marker: marker::PhantomData<I>,
}

impl<'a, I: private::AsyncInstrumentHandle> AsyncInstrumentBuilder<'a, I> {
    pub(crate) fn new(meter: &'a Meter, name: String) -> Self {
        AsyncInstrumentBuilder {
            meter,
            descriptor: meter.descriptor(name, I::KIND, <I::Value as MetricValue>::KIND),
            _marker: marker::PhantomData,
        }
    }

    /// Set the description for this instrument
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.descriptor.set_description(description.into());
        self
    }

    /// Set the unit for this instrument
    pub fn with_unit<S: Into<std::borrow::Cow<'static, str>>>(mut self, unit: S) -> Self {
        self.descriptor.set_unit(Unit::new(unit));
        self
    }

    /// Apply every recognised option in `options`
    pub fn with_options(mut self, options: InstrumentOptions) -> Self {
        apply_options(&mut self.descriptor, options);
        self
    }

    /// Creates the instrument, returning an error when the SDK refuses it.
    pub fn try_init(self) -> Result<I> {
        self.meter
            .new_async_instrument(self.descriptor)
            .map(I::from_core)
    }

    /// Creates the instrument. If the SDK refuses it, the error is reported
    /// and a no-op instrument is returned instead.
    pub fn init(self) -> I {
        match self.meter.new_async_instrument(self.descriptor.clone()) {
            Ok(instrument) => I::from_core(instrument),
            Err(err) => {
                self.meter.handle_error(err);
                I::from_core(Arc::new(NoopAsyncInstrument::new(self.descriptor)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::metrics::noop::NoopAsyncInstrument;
    use crate::api::metrics::{InstrumentationLibrary, NumberKind};

    fn instrument(name: &str) -> Arc<dyn sdk_api::AsyncInstrumentCore> {
        Arc::new(NoopAsyncInstrument::new(Descriptor::new(
            name.to_string(),
            InstrumentationLibrary::new("test", None, None),
            InstrumentKind::ObservableGauge,
            NumberKind::F64,
        )))
    }

    #[test]
    fn callback_clones_share_identity() {
        let callback = BatchObservableCallback::new(|_| {});
        let other = BatchObservableCallback::new(|_| {});

        assert_eq!(callback.id(), callback.clone().id());
        assert_ne!(callback.id(), other.id());
    }

    #[test]
    fn key_ignores_observable_order_and_duplicates() {
        let callback = BatchObservableCallback::new(|_| {});
        let a = instrument("a");
        let b = instrument("b");

        let forward = CallbackKey::new(&callback, &[a.clone(), b.clone()]);
        let backward = CallbackKey::new(&callback, &[b.clone(), a.clone(), b.clone()]);
        assert_eq!(forward, backward);
        assert_eq!(forward.observables().len(), 2);
        assert!(forward.contains(InstrumentId::of(&a)));

        let only_a = CallbackKey::new(&callback, &[a.clone()]);
        assert_ne!(forward, only_a);
        assert!(!only_a.contains(InstrumentId::of(&b)));
    }
}
