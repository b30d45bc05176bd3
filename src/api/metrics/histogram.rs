use crate::api::core::KeyValue;
use crate::api::metrics::{
    sdk_api, sync_instrument::private::SyncInstrumentHandle, sync_instrument::SyncInstrument,
    InstrumentKind, Measurement, MetricValue,
};
use std::sync::Arc;

/// An instrument that records a distribution of values. Any finite value is
/// accepted.
#[derive(Clone, Debug)]
pub struct Histogram<T>(SyncInstrument<T>);

impl<T: MetricValue> Histogram<T> {
    /// Record a value.
    pub fn record(&self, value: T, attributes: &[KeyValue]) {
        self.0.direct_record(value, attributes)
    }

    /// Creates a measurement for use with `Meter::record_batch`.
    pub fn measurement(&self, value: T) -> Measurement {
        self.0.measurement(value)
    }

    /// The sdk-implemented instrument backing this histogram.
    pub fn instrument(&self) -> &Arc<dyn sdk_api::SyncInstrumentCore> {
        self.0.instrument()
    }
}

impl<T: MetricValue> SyncInstrumentHandle for Histogram<T> {
    type Value = T;
    const KIND: InstrumentKind = InstrumentKind::Histogram;

    fn from_core(instrument: Arc<dyn sdk_api::SyncInstrumentCore>) -> Self {
        Histogram(SyncInstrument::new(instrument))
    }
}
