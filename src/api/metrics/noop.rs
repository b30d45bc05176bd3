//! # No-op Metrics Implementation
//!
//! Used where an instrument must be returned but nothing should be recorded,
//! e.g. when an SDK refuses to create one. It is also useful for testing
//! purposes as it is intended to have minimal resource utilization and
//! runtime impact.
use crate::api::{
    core::KeyValue,
    metrics::{
        sdk_api::{AsyncInstrumentCore, InstrumentCore, MeterCore, SyncInstrumentCore},
        BatchObservableCallback, Descriptor, InstrumentationLibrary, Meter, MeterProvider, Number,
        Result,
    },
};
use std::any::Any;
use std::sync::Arc;

/// A no-op instance of a `MeterProvider`
#[derive(Debug, Default)]
pub struct NoopMeterProvider;

impl NoopMeterProvider {
    /// Create a new no-op meter provider.
    pub fn new() -> Self {
        NoopMeterProvider
    }
}

impl MeterProvider for NoopMeterProvider {
    fn meter_with_library(&self, library: InstrumentationLibrary) -> Meter {
        Meter::new(library, Arc::new(NoopMeterCore))
    }
}

/// A no-op instance of a `Meter`
#[derive(Debug, Default)]
pub struct NoopMeterCore;

impl MeterCore for NoopMeterCore {
    fn new_sync_instrument(&self, descriptor: Descriptor) -> Result<Arc<dyn SyncInstrumentCore>> {
        Ok(Arc::new(NoopSyncInstrument::new(descriptor)))
    }

    fn new_async_instrument(
        &self,
        descriptor: Descriptor,
    ) -> Result<Arc<dyn AsyncInstrumentCore>> {
        Ok(Arc::new(NoopAsyncInstrument::new(descriptor)))
    }

    fn register_callback(
        &self,
        _callback: &BatchObservableCallback,
        _observables: &[Arc<dyn AsyncInstrumentCore>],
    ) -> Result<()> {
        // Ignored
        Ok(())
    }

    fn unregister_callback(
        &self,
        _callback: &BatchObservableCallback,
        _observables: &[Arc<dyn AsyncInstrumentCore>],
    ) -> Result<()> {
        Ok(())
    }
}

/// A no-op sync instrument
#[derive(Debug)]
pub struct NoopSyncInstrument {
    descriptor: Descriptor,
}

impl NoopSyncInstrument {
    /// Create a new no-op sync instrument
    pub fn new(descriptor: Descriptor) -> Self {
        NoopSyncInstrument { descriptor }
    }
}

impl InstrumentCore for NoopSyncInstrument {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }
}

impl SyncInstrumentCore for NoopSyncInstrument {
    fn record_one(&self, _number: Number, _attributes: &[KeyValue]) {
        // Ignored
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A no-op async instrument
#[derive(Debug)]
pub struct NoopAsyncInstrument {
    descriptor: Descriptor,
}

impl NoopAsyncInstrument {
    /// Create a new no-op async instrument
    pub fn new(descriptor: Descriptor) -> Self {
        NoopAsyncInstrument { descriptor }
    }
}

impl InstrumentCore for NoopAsyncInstrument {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }
}

impl AsyncInstrumentCore for NoopAsyncInstrument {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{BatchObservableCallback, InstrumentKind};

    #[test]
    fn noop_instruments_are_usable() {
        let meter = NoopMeterProvider::new().versioned_meter("noop", Some("1.0"), None);
        assert_eq!(meter.library().version(), Some("1.0"));

        let counter = meter.u64_counter("requests").init();
        counter.add(1, &[KeyValue::new("k", "v")]);
        assert_eq!(
            counter.instrument().descriptor().instrument_kind(),
            &InstrumentKind::Counter
        );

        let gauge = meter.f64_observable_gauge("temperature").init();
        let callback = BatchObservableCallback::new(|_| {});
        meter.add_batch_observable_callback(&callback, &[&gauge]);
        meter.remove_batch_observable_callback(&callback, &[&gauge]);
    }
}
