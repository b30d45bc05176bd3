//! Metrics Registry API
//!
//! [`UniqueInstrumentMeterCore`] wraps an SDK core so that requesting an
//! instrument that already exists returns the existing one, and requesting an
//! existing name with a different kind is reported.
use crate::api::metrics::{
    sdk_api::{AsyncInstrumentCore, InstrumentCore, MeterCore, SyncInstrumentCore},
    BatchObservableCallback, Descriptor, InstrumentKind, InstrumentationLibrary, Meter,
    MeterProvider, MetricsError, NumberKind, Result,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Create a new `RegistryMeterProvider` from a `MeterCore`.
pub fn meter_provider(core: Arc<dyn MeterCore>) -> RegistryMeterProvider {
    RegistryMeterProvider(Arc::new(UniqueInstrumentMeterCore::wrap(core)))
}

/// A standard `MeterProvider` for wrapping a `MeterCore`. Every meter it
/// hands out shares the same de-duplicating core.
#[derive(Debug, Clone)]
pub struct RegistryMeterProvider(Arc<dyn MeterCore>);

impl MeterProvider for RegistryMeterProvider {
    fn meter_with_library(&self, library: InstrumentationLibrary) -> Meter {
        Meter::new(library, self.0.clone())
    }
}

#[derive(Debug)]
enum UniqueInstrument {
    Sync(Arc<dyn SyncInstrumentCore>),
    Async(Arc<dyn AsyncInstrumentCore>),
}

impl UniqueInstrument {
    fn descriptor(&self) -> &Descriptor {
        match self {
            UniqueInstrument::Sync(instrument) => instrument.descriptor(),
            UniqueInstrument::Async(instrument) => instrument.descriptor(),
        }
    }

    fn kind(&self) -> (InstrumentKind, NumberKind) {
        let descriptor = self.descriptor();
        (*descriptor.instrument_kind(), *descriptor.number_kind())
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct UniqueInstrumentKey {
    library: InstrumentationLibrary,
    name: String,
}

impl From<&Descriptor> for UniqueInstrumentKey {
    fn from(descriptor: &Descriptor) -> Self {
        UniqueInstrumentKey {
            library: descriptor.library().clone(),
            name: descriptor.name().to_string(),
        }
    }
}

/// Implements the `MeterCore` interface, adding uniqueness checking for
/// instrument descriptors.
///
/// Instruments are identified by library and name. A second request with the
/// same kind returns the first instrument. A request with a different kind is
/// reported as an `InstrumentKindConflict` to the wrapped core's error
/// handler and still receives a working instrument of the requested kind.
#[derive(Debug)]
pub struct UniqueInstrumentMeterCore {
    inner: Arc<dyn MeterCore>,
    state: Mutex<HashMap<UniqueInstrumentKey, Vec<UniqueInstrument>>>,
}

impl UniqueInstrumentMeterCore {
    /// Wrap `inner` with uniqueness checking.
    pub fn wrap(inner: Arc<dyn MeterCore>) -> Self {
        UniqueInstrumentMeterCore {
            inner,
            state: Mutex::new(HashMap::new()),
        }
    }

    fn check_uniqueness<T>(
        &self,
        descriptor: Descriptor,
        existing: impl Fn(&UniqueInstrument) -> Option<T>,
        create: impl FnOnce(Descriptor) -> Result<(T, UniqueInstrument)>,
    ) -> Result<T> {
        let (instrument, conflict) = {
            let mut state = self.state.lock()?;
            let requested = (*descriptor.instrument_kind(), *descriptor.number_kind());
            let instruments = state
                .entry(UniqueInstrumentKey::from(&descriptor))
                .or_default();

            if let Some(found) = instruments
                .iter()
                .filter(|instrument| instrument.kind() == requested)
                .find_map(|instrument| existing(instrument))
            {
                return Ok(found);
            }

            let conflict = instruments
                .first()
                .map(|first| MetricsError::InstrumentKindConflict {
                    name: descriptor.name().to_string(),
                    existing: first.kind(),
                    requested,
                });

            let (instrument, entry) = create(descriptor)?;
            instruments.push(entry);
            (instrument, conflict)
        };

        // reported outside the lock, the handler may create instruments
        if let Some(err) = conflict {
            self.inner.handle_error(err);
        }
        Ok(instrument)
    }
}

impl MeterCore for UniqueInstrumentMeterCore {
    fn new_sync_instrument(&self, descriptor: Descriptor) -> Result<Arc<dyn SyncInstrumentCore>> {
        self.check_uniqueness(
            descriptor,
            |instrument| match instrument {
                UniqueInstrument::Sync(sync) => Some(sync.clone()),
                UniqueInstrument::Async(_) => None,
            },
            |descriptor| {
                let instrument = self.inner.new_sync_instrument(descriptor)?;
                Ok((instrument.clone(), UniqueInstrument::Sync(instrument)))
            },
        )
    }

    fn new_async_instrument(
        &self,
        descriptor: Descriptor,
    ) -> Result<Arc<dyn AsyncInstrumentCore>> {
        self.check_uniqueness(
            descriptor,
            |instrument| match instrument {
                UniqueInstrument::Async(instrument) => Some(instrument.clone()),
                UniqueInstrument::Sync(_) => None,
            },
            |descriptor| {
                let instrument = self.inner.new_async_instrument(descriptor)?;
                Ok((instrument.clone(), UniqueInstrument::Async(instrument)))
            },
        )
    }

    fn register_callback(
        &self,
        callback: &BatchObservableCallback,
        observables: &[Arc<dyn AsyncInstrumentCore>],
    ) -> Result<()> {
        self.inner.register_callback(callback, observables)
    }

    fn unregister_callback(
        &self,
        callback: &BatchObservableCallback,
        observables: &[Arc<dyn AsyncInstrumentCore>],
    ) -> Result<()> {
        self.inner.unregister_callback(callback, observables)
    }

    fn handle_error(&self, err: MetricsError) {
        self.inner.handle_error(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::metrics::noop::NoopMeterCore;

    fn meter() -> Meter {
        meter_provider(Arc::new(NoopMeterCore)).meter("registry-test")
    }

    #[test]
    fn same_name_and_kind_returns_same_instrument() {
        let meter = meter();
        let first = meter.u64_counter("requests").init();
        let second = meter.u64_counter("requests").init();
        assert!(Arc::ptr_eq(first.instrument(), second.instrument()));

        let gauge = meter.f64_observable_gauge("memory").init();
        let again = meter.f64_observable_gauge("memory").init();
        assert!(Arc::ptr_eq(
            crate::metrics::Observable::instrument(&gauge),
            crate::metrics::Observable::instrument(&again)
        ));
    }

    #[test]
    fn conflicting_kind_returns_requested_kind() {
        let meter = meter();
        let counter = meter.u64_counter("conflict").init();
        let histogram = meter.f64_histogram("conflict").init();

        assert!(!Arc::ptr_eq(counter.instrument(), histogram.instrument()));
        assert_eq!(
            histogram.instrument().descriptor().instrument_kind(),
            &InstrumentKind::Histogram
        );

        let histogram_again = meter.f64_histogram("conflict").init();
        assert!(Arc::ptr_eq(
            histogram.instrument(),
            histogram_again.instrument()
        ));
    }

    #[test]
    fn libraries_do_not_share_instruments() {
        let provider = meter_provider(Arc::new(NoopMeterCore));
        let a = provider.meter("a").u64_counter("requests").init();
        let b = provider.meter("b").u64_counter("requests").init();
        assert!(!Arc::ptr_eq(a.instrument(), b.instrument()));
    }
}
