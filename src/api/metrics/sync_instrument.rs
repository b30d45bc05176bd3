use crate::api::core::{KeyValue, Unit};
use crate::api::metrics::{
    apply_options, noop::NoopSyncInstrument, range_test, sdk_api, Descriptor, InstrumentKind,
    InstrumentOptions, Meter, MetricValue, MetricsError, Number, Result,
};
use std::marker;
use std::sync::Arc;

/// A single synchronous value, to be recorded with `Meter::record_batch`.
#[derive(Debug)]
pub struct Measurement {
    number: Number,
    instrument: Arc<dyn sdk_api::SyncInstrumentCore>,
}

impl Measurement {
    pub(crate) fn new(number: Number, instrument: Arc<dyn sdk_api::SyncInstrumentCore>) -> Self {
        Measurement { number, instrument }
    }

    /// The measured value
    pub fn number(&self) -> Number {
        self.number
    }

    /// The instrument the value is recorded to
    pub fn instrument(&self) -> &Arc<dyn sdk_api::SyncInstrumentCore> {
        &self.instrument
    }

    pub(crate) fn record(self, attributes: &[KeyValue]) {
        record_checked(&self.instrument, self.number, attributes)
    }
}

fn record_checked(
    instrument: &Arc<dyn sdk_api::SyncInstrumentCore>,
    number: Number,
    attributes: &[KeyValue],
) {
    if let Err(err) = range_test(number, instrument.descriptor()) {
        instrument.handle_error(err);
        return;
    }
    instrument.record_one(number, attributes)
}

/// Wrapper around a sdk-implemented sync instrument for a given type
#[derive(Clone, Debug)]
pub(crate) struct SyncInstrument<T> {
    instrument: Arc<dyn sdk_api::SyncInstrumentCore>,
    _marker: marker::PhantomData<T>,
}

impl<T: MetricValue> SyncInstrument<T> {
    /// Create a new sync instrument from an sdk-implemented sync instrument
    pub(crate) fn new(instrument: Arc<dyn sdk_api::SyncInstrumentCore>) -> Self {
        SyncInstrument {
            instrument,
            _marker: marker::PhantomData,
        }
    }

    /// Validate and record a value directly to the underlying instrument
    pub(crate) fn direct_record(&self, value: T, attributes: &[KeyValue]) {
        record_checked(&self.instrument, value.into(), attributes)
    }

    pub(crate) fn measurement(&self, value: T) -> Measurement {
        Measurement::new(value.into(), self.instrument.clone())
    }

    /// Reference to the underlying sdk-implemented instrument
    pub(crate) fn instrument(&self) -> &Arc<dyn sdk_api::SyncInstrumentCore> {
        &self.instrument
    }
}

#[allow(unreachable_pub)]
pub(crate) mod private {
    use super::*;

    pub trait SyncInstrumentHandle: Sized {
        type Value: MetricValue;
        const KIND: InstrumentKind;

        fn from_core(instrument: Arc<dyn sdk_api::SyncInstrumentCore>) -> Self;
    }
}

/// Configures and creates a synchronous instrument.
#[derive(Debug)]
pub struct InstrumentBuilder<'a, I> {
    meter: &'a Meter,
    descriptor: Descriptor,
    _marker: marker::PhantomData<I>,
}

impl<'a, I: private::SyncInstrumentHandle> InstrumentBuilder<'a, I> {
    pub(crate) fn new(meter: &'a Meter, name: String) -> Self {
        InstrumentBuilder {
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
        let descriptor = validate_boundaries(self.meter, self.descriptor);
        self.meter.new_sync_instrument(descriptor).map(I::from_core)
    }

    /// Creates the instrument. If the SDK refuses it, the error is reported
    /// and a no-op instrument is returned instead.
    pub fn init(self) -> I {
        let descriptor = validate_boundaries(self.meter, self.descriptor);
        match self.meter.new_sync_instrument(descriptor.clone()) {
            Ok(instrument) => I::from_core(instrument),
            Err(err) => {
                self.meter.handle_error(err);
                I::from_core(Arc::new(NoopSyncInstrument::new(descriptor)))
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }
}

impl<'a, T> InstrumentBuilder<'a, crate::api::metrics::Histogram<T>> {
    /// Set explicit bucket boundaries. They must be finite and strictly
    /// increasing; otherwise they are reported and ignored.
    pub fn with_boundaries(mut self, boundaries: Vec<f64>) -> Self {
        self.descriptor.set_boundaries(boundaries);
        self
    }
}

fn validate_boundaries(meter: &Meter, mut descriptor: Descriptor) -> Descriptor {
    let reason = match descriptor.boundaries() {
        None => return descriptor,
        Some(boundaries) => {
            if boundaries.iter().any(|b| !b.is_finite()) {
                Some("boundaries must be finite")
            } else if boundaries.windows(2).any(|w| w[0] >= w[1]) {
                Some("boundaries must be strictly increasing")
            } else {
                None
            }
        }
    };

    if let Some(reason) = reason {
        meter.handle_error(MetricsError::InvalidBoundaries {
            instrument: descriptor.name().to_string(),
            reason: reason.to_string(),
        });
        descriptor.config_mut().boundaries = None;
    }
    descriptor
}
