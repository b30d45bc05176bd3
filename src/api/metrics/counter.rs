use crate::api::core::KeyValue;
use crate::api::metrics::{
    sdk_api, sync_instrument::private::SyncInstrumentHandle, sync_instrument::SyncInstrument,
    InstrumentKind, Measurement, MetricValue,
};
use std::sync::Arc;

/// A metric that accumulates values. Only non-negative increments are
/// accepted; anything else is reported and dropped.
#[derive(Clone, Debug)]
pub struct Counter<T>(SyncInstrument<T>);

impl<T: MetricValue> Counter<T> {
    /// Increment this counter by a given value.
    pub fn add(&self, value: T, attributes: &[KeyValue]) {
        self.0.direct_record(value, attributes)
    }

    /// Creates a measurement for use with `Meter::record_batch`.
    pub fn measurement(&self, value: T) -> Measurement {
        self.0.measurement(value)
    }

    /// The sdk-implemented instrument backing this counter.
    pub fn instrument(&self) -> &Arc<dyn sdk_api::SyncInstrumentCore> {
        self.0.instrument()
    }
}

impl<T: MetricValue> SyncInstrumentHandle for Counter<T> {
    type Value = T;
    const KIND: InstrumentKind = InstrumentKind::Counter;

    fn from_core(instrument: Arc<dyn sdk_api::SyncInstrumentCore>) -> Self {
        Counter(SyncInstrument::new(instrument))
    }
}
