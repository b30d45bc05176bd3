//! # Metrics SDK
//!
//! An [`Accumulator`] implements [`MeterCore`](sdk_api::MeterCore) for one
//! instrumentation library. Synchronous recordings are delivered to its
//! [`Processor`] immediately; observable instruments are fed by the batch
//! callbacks registered with it, invoked once per [`Accumulator::collect`].
//!
//! [`SdkMeterProvider`] keeps one accumulator per library and is what the
//! controllers hand out.
use crate::api::attributes::AttributeSet;
use crate::api::core::KeyValue;
use crate::api::metrics::{
    registry::UniqueInstrumentMeterCore,
    sdk_api::{self, AsyncInstrumentCore, InstrumentCore, SyncInstrumentCore},
    BatchObservableCallback, Descriptor, InstrumentationLibrary, Meter, MeterProvider,
    MetricsError, Number, Result,
};
use crate::global;
use crate::sdk::export::metrics::{self as export, Processor};
use dashmap::DashMap;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

mod callbacks;
pub mod controllers;
pub mod processors;

pub use crate::global::ErrorHandler;
pub use controllers::{PullController, PushController, PushControllerWorker};

use callbacks::CallbackRegistry;

static NEXT_ACCUMULATOR_ID: AtomicUsize = AtomicUsize::new(0);

/// Create a new `AccumulatorBuilder` delivering to `processor`.
pub fn accumulator(processor: Arc<dyn Processor>) -> AccumulatorBuilder {
    AccumulatorBuilder {
        processor,
        error_handler: None,
    }
}

/// Configuration for an accumulator
#[derive(Debug)]
pub struct AccumulatorBuilder {
    processor: Arc<dyn Processor>,
    error_handler: Option<ErrorHandler>,
}

impl AccumulatorBuilder {
    /// Route errors found by this accumulator to `error_handler` instead of
    /// the global handler.
    pub fn with_error_handler(self, error_handler: ErrorHandler) -> Self {
        AccumulatorBuilder {
            error_handler: Some(error_handler),
            ..self
        }
    }

    /// Create the accumulator
    pub fn build(self) -> Accumulator {
        Accumulator(Arc::new(AccumulatorCore {
            id: NEXT_ACCUMULATOR_ID.fetch_add(1, Ordering::Relaxed),
            processor: self.processor,
            error_handler: self.error_handler,
            callbacks: CallbackRegistry::default(),
        }))
    }
}

/// The SDK implementation of a meter core.
///
/// Clones share state.
#[derive(Debug, Clone)]
pub struct Accumulator(Arc<AccumulatorCore>);

#[derive(Debug)]
struct AccumulatorCore {
    id: usize,
    processor: Arc<dyn Processor>,
    error_handler: Option<ErrorHandler>,
    callbacks: CallbackRegistry,
}

impl AccumulatorCore {
    fn handle_error(&self, err: MetricsError) {
        match &self.error_handler {
            Some(handler) => handler.call(err),
            None => global::handle_error(err),
        }
    }

    fn deliver(&self, record: export::Record) -> bool {
        match self.processor.process(record) {
            Ok(()) => true,
            Err(err) => {
                self.handle_error(err);
                false
            }
        }
    }
}

impl Accumulator {
    /// Run one collection cycle: invoke every registered batch callback once
    /// and deliver what they observed. Returns the number of delivered
    /// observations.
    pub fn collect(&self) -> usize {
        let core = &self.0;
        let observations = core.callbacks.run(|err| core.handle_error(err));
        let timestamp = SystemTime::now();

        let mut delivered = 0;
        for observation in observations {
            let record = export::record(
                observation.instrument.descriptor().clone(),
                observation.attributes,
                observation.number,
                timestamp,
            );
            if core.deliver(record) {
                delivered += 1;
            }
        }

        tracing::debug!(
            callbacks = core.callbacks.len(),
            delivered,
            "collection cycle finished"
        );
        delivered
    }

    /// Number of batch callback registrations.
    pub fn callback_count(&self) -> usize {
        self.0.callbacks.len()
    }

    /// Map observables handed in by the API to the instruments this
    /// accumulator created, following proxies.
    fn own_instruments(
        &self,
        observables: &[Arc<dyn AsyncInstrumentCore>],
    ) -> Result<Vec<Arc<dyn AsyncInstrumentCore>>> {
        observables
            .iter()
            .map(|observable| {
                let resolved = sdk_api::resolve_async(observable);
                match resolved.as_any().downcast_ref::<AsyncInstrument>() {
                    Some(instrument) if instrument.accumulator == self.0.id => Ok(resolved),
                    _ => Err(MetricsError::Other(format!(
                        "instrument \"{}\" was not created by this meter",
                        observable.descriptor().name()
                    ))),
                }
            })
            .collect()
    }
}

impl sdk_api::MeterCore for Accumulator {
    fn new_sync_instrument(&self, descriptor: Descriptor) -> Result<Arc<dyn SyncInstrumentCore>> {
        Ok(Arc::new(SyncInstrument {
            descriptor,
            meter: self.clone(),
        }))
    }

    fn new_async_instrument(
        &self,
        descriptor: Descriptor,
    ) -> Result<Arc<dyn AsyncInstrumentCore>> {
        Ok(Arc::new(AsyncInstrument {
            descriptor,
            accumulator: self.0.id,
        }))
    }

    fn register_callback(
        &self,
        callback: &BatchObservableCallback,
        observables: &[Arc<dyn AsyncInstrumentCore>],
    ) -> Result<()> {
        let instruments = self.own_instruments(observables)?;
        if !self.0.callbacks.register(callback, instruments) {
            tracing::debug!(callback = %callback.id(), "batch callback already registered");
        }
        Ok(())
    }

    fn unregister_callback(
        &self,
        callback: &BatchObservableCallback,
        observables: &[Arc<dyn AsyncInstrumentCore>],
    ) -> Result<()> {
        let instruments = self.own_instruments(observables)?;
        self.0.callbacks.unregister(callback, &instruments);
        Ok(())
    }

    fn handle_error(&self, err: MetricsError) {
        self.0.handle_error(err)
    }
}

/// A synchronous instrument delivering every recording to the processor.
#[derive(Debug)]
pub struct SyncInstrument {
    descriptor: Descriptor,
    meter: Accumulator,
}

impl InstrumentCore for SyncInstrument {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }
}

impl SyncInstrumentCore for SyncInstrument {
    fn record_one(&self, number: Number, attributes: &[KeyValue]) {
        let record = export::record(
            self.descriptor.clone(),
            AttributeSet::from(attributes),
            number,
            SystemTime::now(),
        );
        self.meter.0.deliver(record);
    }

    fn handle_error(&self, err: MetricsError) {
        self.meter.0.handle_error(err)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An observable instrument; values reach it through batch callbacks only.
#[derive(Debug)]
pub struct AsyncInstrument {
    descriptor: Descriptor,
    accumulator: usize,
}

impl InstrumentCore for AsyncInstrument {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }
}

impl AsyncInstrumentCore for AsyncInstrument {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A `MeterProvider` with one accumulator per instrumentation library.
///
/// Instruments are de-duplicated per library through
/// [`UniqueInstrumentMeterCore`].
#[derive(Debug, Clone)]
pub struct SdkMeterProvider {
    inner: Arc<SdkMeterProviderInner>,
}

#[derive(Debug)]
struct SdkMeterProviderInner {
    processor: Arc<dyn Processor>,
    error_handler: Option<ErrorHandler>,
    meters: DashMap<InstrumentationLibrary, SdkMeter>,
}

#[derive(Debug, Clone)]
struct SdkMeter {
    accumulator: Accumulator,
    core: Arc<dyn sdk_api::MeterCore>,
}

impl SdkMeterProvider {
    /// Create a provider delivering to `processor`.
    pub fn new(processor: Arc<dyn Processor>) -> Self {
        SdkMeterProvider::with_error_handler(processor, None)
    }

    /// Create a provider delivering to `processor`, reporting errors to
    /// `error_handler` when one is given.
    pub fn with_error_handler(
        processor: Arc<dyn Processor>,
        error_handler: Option<ErrorHandler>,
    ) -> Self {
        SdkMeterProvider {
            inner: Arc::new(SdkMeterProviderInner {
                processor,
                error_handler,
                meters: DashMap::new(),
            }),
        }
    }

    /// Run one collection cycle on every accumulator. Returns the number of
    /// delivered observations.
    pub fn collect(&self) -> usize {
        // collected outside the map, callbacks may ask for new meters
        let accumulators: Vec<Accumulator> = self
            .inner
            .meters
            .iter()
            .map(|entry| entry.value().accumulator.clone())
            .collect();

        accumulators
            .iter()
            .map(|accumulator| accumulator.collect())
            .sum()
    }

    fn new_meter(&self) -> SdkMeter {
        let mut builder = accumulator(self.inner.processor.clone());
        if let Some(error_handler) = &self.inner.error_handler {
            builder = builder.with_error_handler(error_handler.clone());
        }
        let accumulator = builder.build();

        SdkMeter {
            core: Arc::new(UniqueInstrumentMeterCore::wrap(Arc::new(
                accumulator.clone(),
            ))),
            accumulator,
        }
    }
}

impl MeterProvider for SdkMeterProvider {
    fn meter_with_library(&self, library: InstrumentationLibrary) -> Meter {
        let core = self
            .inner
            .meters
            .entry(library.clone())
            .or_insert_with(|| self.new_meter())
            .core
            .clone();

        Meter::new(library, core)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{BatchObservableCallback, InstrumentKind};
    use crate::sdk::metrics::processors::InMemoryProcessor;
    use std::sync::Mutex;

    fn provider() -> (Arc<InMemoryProcessor>, SdkMeterProvider, Arc<Mutex<Vec<MetricsError>>>) {
        let processor = Arc::new(InMemoryProcessor::default());
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        let provider = SdkMeterProvider::with_error_handler(
            processor.clone(),
            Some(ErrorHandler::new(move |err| sink.lock().unwrap().push(err))),
        );
        (processor, provider, errors)
    }

    #[test]
    fn sync_recordings_are_delivered_immediately() {
        let (processor, provider, _) = provider();
        let meter = provider.meter("sdk-test");
        let counter = meter.u64_counter("requests").init();

        counter.add(3, &[KeyValue::new("route", "/")]);
        counter.add(2, &[]);

        let records = processor.finished_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].descriptor().name(), "requests");
        assert_eq!(records[0].number().to_u64(records[0].descriptor().number_kind()), 3);
        assert_eq!(records[0].attributes().to_string(), "route=/");
        assert!(records[1].attributes().is_empty());
    }

    #[test]
    fn negative_counter_add_is_dropped() {
        let (processor, provider, errors) = provider();
        let counter = provider.meter("sdk-test").f64_counter("bytes").init();

        counter.add(-1.0, &[]);
        counter.add(f64::NAN, &[]);
        counter.add(4.0, &[]);

        let records = processor.finished_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value(), 4.0);
        assert!(matches!(
            errors.lock().unwrap().as_slice(),
            [
                MetricsError::InvalidMeasurement { .. },
                MetricsError::InvalidMeasurement { .. }
            ]
        ));
    }

    #[test]
    fn instrument_errors_reach_the_provider_handler() {
        let (_, provider, errors) = provider();
        let meter = provider.meter("sdk-test");

        let _jobs = meter.u64_counter("jobs").init();
        let _conflicting = meter.f64_histogram("jobs").init();
        let _latency = meter
            .f64_histogram("latency")
            .with_boundaries(vec![10.0, 1.0])
            .init();

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            &errors[0],
            MetricsError::InstrumentKindConflict { name, .. } if name == "jobs"
        ));
        assert!(matches!(
            &errors[1],
            MetricsError::InvalidBoundaries { instrument, .. } if instrument == "latency"
        ));
    }

    #[test]
    fn invalid_observations_reach_the_provider_handler() {
        let (processor, provider, errors) = provider();
        let meter = provider.meter("sdk-test");
        let hits = meter.f64_observable_counter("hits").init();

        let observable = hits.clone();
        let callback = BatchObservableCallback::new(move |observer| {
            observer.observe(&observable, -1.0, &[]);
            observer.observe(&observable, f64::NAN, &[KeyValue::new("shard", 1i64)]);
        });
        meter.add_batch_observable_callback(&callback, &[&hits]);

        assert_eq!(provider.collect(), 0);
        assert!(processor.finished_records().is_empty());
        assert!(matches!(
            errors.lock().unwrap().as_slice(),
            [
                MetricsError::InvalidMeasurement { .. },
                MetricsError::InvalidMeasurement { .. }
            ]
        ));
    }

    #[test]
    fn batch_callback_observations_are_collected() {
        let (processor, provider, errors) = provider();
        let meter = provider.versioned_meter("svc", Some("1.0"), None);
        let memory = meter.u64_observable_gauge("mem").init();

        let observable = memory.clone();
        let callback = BatchObservableCallback::new(move |observer| {
            observer.observe(&observable, 42, &[]);
        });
        meter.add_batch_observable_callback(&callback, &[&memory]);
        meter.add_batch_observable_callback(&callback, &[&memory]);

        assert_eq!(provider.collect(), 1);
        let records = processor.finished_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].descriptor().name(), "mem");
        assert_eq!(
            records[0].descriptor().instrument_kind(),
            &InstrumentKind::ObservableGauge
        );
        assert_eq!(records[0].value(), 42.0);
        assert!(errors.lock().unwrap().is_empty());

        meter.remove_batch_observable_callback(&callback, &[&memory]);
        processor.reset();
        assert_eq!(provider.collect(), 0);
        assert!(processor.finished_records().is_empty());
    }

    #[test]
    fn observing_undeclared_instrument_is_discarded() {
        let (processor, provider, errors) = provider();
        let meter = provider.meter("sdk-test");
        let a = meter.f64_observable_gauge("a").init();
        let b = meter.f64_observable_gauge("b").init();

        let (observe_a, observe_b) = (a.clone(), b.clone());
        let callback = BatchObservableCallback::new(move |observer| {
            observer.observe(&observe_a, 1.0, &[]);
            observer.observe(&observe_b, 5.0, &[]);
        });
        meter.add_batch_observable_callback(&callback, &[&a]);

        assert_eq!(provider.collect(), 1);
        let records = processor.finished_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].descriptor().name(), "a");

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            MetricsError::UnassociatedObserve { instrument, .. } if instrument == "b"
        ));
    }

    #[test]
    fn last_observation_per_attribute_set_wins() {
        let (processor, provider, _) = provider();
        let meter = provider.meter("sdk-test");
        let queue = meter.i64_observable_up_down_counter("queue").init();

        let observable = queue.clone();
        let callback = BatchObservableCallback::new(move |observer| {
            observer.observe(&observable, 1, &[KeyValue::new("q", "a")]);
            observer.observe(&observable, 7, &[KeyValue::new("q", "b")]);
            observer.observe(&observable, -3, &[KeyValue::new("q", "a")]);
        });
        meter.add_batch_observable_callback(&callback, &[&queue]);

        assert_eq!(provider.collect(), 2);
        let values: Vec<(String, f64)> = processor
            .finished_records()
            .iter()
            .map(|record| (record.attributes().to_string(), record.value()))
            .collect();
        assert_eq!(values, vec![("q=a".to_string(), -3.0), ("q=b".to_string(), 7.0)]);
    }

    #[test]
    fn failing_callback_does_not_abort_the_cycle() {
        let (processor, provider, errors) = provider();
        let meter = provider.meter("sdk-test");
        let gauge = meter.f64_observable_gauge("temperature").init();

        let observable = gauge.clone();
        let failing = BatchObservableCallback::new(move |observer| {
            observer.observe(&observable, 99.0, &[]);
            panic!("sensor offline");
        });
        let observable = gauge.clone();
        let healthy = BatchObservableCallback::new(move |observer| {
            observer.observe(&observable, 21.5, &[]);
        });
        meter.add_batch_observable_callback(&failing, &[&gauge]);
        meter.add_batch_observable_callback(&healthy, &[&gauge]);

        assert_eq!(provider.collect(), 1);
        assert_eq!(processor.finished_records()[0].value(), 21.5);
        assert!(matches!(
            errors.lock().unwrap().as_slice(),
            [MetricsError::CallbackInvocationFailure { .. }]
        ));
    }

    #[test]
    fn observables_of_other_meters_are_rejected() {
        let (_, provider, errors) = provider();
        let meter = provider.meter("first");
        let foreign = provider.meter("second").f64_observable_gauge("g").init();

        let invoked = Arc::new(Mutex::new(false));
        let flag = invoked.clone();
        let callback = BatchObservableCallback::new(move |_| {
            *flag.lock().unwrap() = true;
        });
        meter.add_batch_observable_callback(&callback, &[&foreign]);

        assert_eq!(provider.collect(), 0);
        assert!(!*invoked.lock().unwrap());
        assert!(matches!(
            errors.lock().unwrap().as_slice(),
            [MetricsError::Other(_)]
        ));
    }

    #[test]
    fn meters_are_cached_per_library() {
        let (_, provider, _) = provider();
        let a = provider.meter("lib");
        let b = provider.meter("lib");
        assert!(Arc::ptr_eq(a.core(), b.core()));
        assert!(!Arc::ptr_eq(a.core(), provider.meter("other").core()));
    }
}
