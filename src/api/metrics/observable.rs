use crate::api::metrics::{
    async_instrument::private::AsyncInstrumentHandle, sdk_api, InstrumentKind, MetricValue,
    Observable, TypedObservable,
};
use std::marker;
use std::sync::Arc;

/// An observable instrument reporting a monotonically increasing sum, such as
/// CPU time consumed.
#[derive(Clone, Debug)]
pub struct ObservableCounter<T> {
    instrument: Arc<dyn sdk_api::AsyncInstrumentCore>,
    _marker: marker::PhantomData<T>,
}

/// An observable instrument reporting a sum that goes up and down, such as
/// the size of a queue.
#[derive(Clone, Debug)]
pub struct ObservableUpDownCounter<T> {
    instrument: Arc<dyn sdk_api::AsyncInstrumentCore>,
    _marker: marker::PhantomData<T>,
}

/// An observable instrument reporting a current value, such as memory in use.
#[derive(Clone, Debug)]
pub struct ObservableGauge<T> {
    instrument: Arc<dyn sdk_api::AsyncInstrumentCore>,
    _marker: marker::PhantomData<T>,
}

impl<T: MetricValue> Observable for ObservableCounter<T> {
    fn instrument(&self) -> &Arc<dyn sdk_api::AsyncInstrumentCore> {
        &self.instrument
    }
}

impl<T: MetricValue> TypedObservable for ObservableCounter<T> {
    type Value = T;
}

impl<T: MetricValue> AsyncInstrumentHandle for ObservableCounter<T> {
    type Value = T;
    const KIND: InstrumentKind = InstrumentKind::ObservableCounter;

    fn from_core(instrument: Arc<dyn sdk_api::AsyncInstrumentCore>) -> Self {
        ObservableCounter {
            instrument,
            _marker: marker::PhantomData,
        }
    }
}

impl<T: MetricValue> Observable for ObservableUpDownCounter<T> {
    fn instrument(&self) -> &Arc<dyn sdk_api::AsyncInstrumentCore> {
        &self.instrument
    }
}

impl<T: MetricValue> TypedObservable for ObservableUpDownCounter<T> {
    type Value = T;
}

impl<T: MetricValue> AsyncInstrumentHandle for ObservableUpDownCounter<T> {
    type Value = T;
    const KIND: InstrumentKind = InstrumentKind::ObservableUpDownCounter;

    fn from_core(instrument: Arc<dyn sdk_api::AsyncInstrumentCore>) -> Self {
        ObservableUpDownCounter {
            instrument,
            _marker: marker::PhantomData,
        }
    }
}

impl<T: MetricValue> Observable for ObservableGauge<T> {
    fn instrument(&self) -> &Arc<dyn sdk_api::AsyncInstrumentCore> {
        &self.instrument
    }
}

impl<T: MetricValue> TypedObservable for ObservableGauge<T> {
    type Value = T;
}

impl<T: MetricValue> AsyncInstrumentHandle for ObservableGauge<T> {
    type Value = T;
    const KIND: InstrumentKind = InstrumentKind::ObservableGauge;

    fn from_core(instrument: Arc<dyn sdk_api::AsyncInstrumentCore>) -> Self {
        ObservableGauge {
            instrument,
            _marker: marker::PhantomData,
        }
    }
}
