use crate::api::core::KeyValue;
use crate::api::metrics::{
    sdk_api, sync_instrument::private::SyncInstrumentHandle, sync_instrument::SyncInstrument,
    InstrumentKind, Measurement, MetricValue,
};
use std::sync::Arc;

/// A metric instrument that sums increments and decrements, e.g. the number
/// of requests in flight.
#[derive(Clone, Debug)]
pub struct UpDownCounter<T>(SyncInstrument<T>);

impl<T: MetricValue> UpDownCounter<T> {
    /// Add a value, which may be negative.
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

impl<T: MetricValue> SyncInstrumentHandle for UpDownCounter<T> {
    type Value = T;
    const KIND: InstrumentKind = InstrumentKind::UpDownCounter;

    fn from_core(instrument: Arc<dyn sdk_api::SyncInstrumentCore>) -> Self {
        UpDownCounter(SyncInstrument::new(instrument))
    }
}
