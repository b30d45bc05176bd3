//! Batch observable callback registrations of one accumulator.
use crate::api::attributes::AttributeSet;
use crate::api::core::KeyValue;
use crate::api::metrics::{
    range_test,
    sdk_api::{self, AsyncInstrumentCore},
    BatchObservableCallback, CallbackKey, InstrumentId, MetricsError, Number, ObserverResult,
};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

/// Registered callbacks, keyed by callback identity and observable set.
#[derive(Debug, Default)]
pub(crate) struct CallbackRegistry {
    state: Mutex<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    next_sequence: u64,
    entries: HashMap<CallbackKey, Entry>,
}

#[derive(Clone, Debug)]
struct Entry {
    sequence: u64,
    key: CallbackKey,
    callback: BatchObservableCallback,
    // keeps the instrument identities in `key` from being reused
    _observables: Vec<Arc<dyn AsyncInstrumentCore>>,
}

/// One value reported by a callback during a collection cycle.
#[derive(Debug)]
pub(crate) struct Observation {
    pub(crate) instrument: Arc<dyn AsyncInstrumentCore>,
    pub(crate) attributes: AttributeSet,
    pub(crate) number: Number,
}

impl CallbackRegistry {
    /// Returns false if the exact registration already exists.
    pub(crate) fn register(
        &self,
        callback: &BatchObservableCallback,
        observables: Vec<Arc<dyn AsyncInstrumentCore>>,
    ) -> bool {
        let key = CallbackKey::new(callback, &observables);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.entries.contains_key(&key) {
            return false;
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.entries.insert(
            key.clone(),
            Entry {
                sequence,
                key,
                callback: callback.clone(),
                _observables: observables,
            },
        );
        true
    }

    /// Returns false if there was no such registration.
    pub(crate) fn unregister(
        &self,
        callback: &BatchObservableCallback,
        observables: &[Arc<dyn AsyncInstrumentCore>],
    ) -> bool {
        let key = CallbackKey::new(callback, observables);
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .remove(&key)
            .is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Registrations present right now, oldest first.
    fn snapshot(&self) -> Vec<Entry> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<Entry> = state.entries.values().cloned().collect();
        entries.sort_by_key(|entry| entry.sequence);
        entries
    }

    /// Invoke every registered callback once and gather what they observed.
    ///
    /// Callbacks run without the registry lock held, so they may register and
    /// unregister callbacks themselves; such changes apply to the next cycle.
    /// A callback that panics loses its observations for this cycle.
    pub(crate) fn run(&self, mut report: impl FnMut(MetricsError)) -> Vec<Observation> {
        let mut observations = Vec::new();

        for entry in self.snapshot() {
            let observer = SandboxedObserver::new(&entry.key);
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                entry.callback.call(&ObserverResult::new(&observer))
            }));

            let (observed, errors) = observer.finish();
            for err in errors {
                report(err);
            }

            match result {
                Ok(()) => observations.extend(observed),
                Err(payload) => report(MetricsError::CallbackInvocationFailure {
                    callback: entry.key.callback(),
                    message: panic_message(&*payload),
                }),
            }
        }

        observations
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "callback panicked".to_string()
    }
}

/// Accepts observations for the instruments of one registration only, and
/// only values those instruments accept.
///
/// Repeated observations of the same instrument and attributes keep the last
/// value.
struct SandboxedObserver<'a> {
    key: &'a CallbackKey,
    state: RefCell<ObserverState>,
}

#[derive(Default)]
struct ObserverState {
    observations: Vec<Observation>,
    index: HashMap<(InstrumentId, AttributeSet), usize>,
    errors: Vec<MetricsError>,
}

impl<'a> SandboxedObserver<'a> {
    fn new(key: &'a CallbackKey) -> Self {
        SandboxedObserver {
            key,
            state: RefCell::new(ObserverState::default()),
        }
    }

    fn finish(self) -> (Vec<Observation>, Vec<MetricsError>) {
        let state = self.state.into_inner();
        (state.observations, state.errors)
    }
}

impl sdk_api::ObserverCore for SandboxedObserver<'_> {
    fn observe_one(
        &self,
        instrument: &Arc<dyn AsyncInstrumentCore>,
        number: Number,
        attributes: &[KeyValue],
    ) {
        let resolved = sdk_api::resolve_async(instrument);
        let id = InstrumentId::of(&resolved);
        let mut state = self.state.borrow_mut();

        if !self.key.contains(id) {
            state.errors.push(MetricsError::UnassociatedObserve {
                callback: self.key.callback(),
                instrument: instrument.descriptor().name().to_string(),
            });
            return;
        }
        if let Err(err) = range_test(number, resolved.descriptor()) {
            state.errors.push(err);
            return;
        }

        let attributes = AttributeSet::from(attributes);
        let ObserverState {
            observations,
            index,
            ..
        } = &mut *state;
        match index.get(&(id, attributes.clone())) {
            Some(&position) => observations[position].number = number,
            None => {
                index.insert((id, attributes.clone()), observations.len());
                observations.push(Observation {
                    instrument: resolved,
                    attributes,
                    number,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::metrics::noop::NoopAsyncInstrument;
    use crate::api::metrics::{Descriptor, InstrumentKind, InstrumentationLibrary, NumberKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn gauge(name: &str) -> Arc<dyn AsyncInstrumentCore> {
        Arc::new(NoopAsyncInstrument::new(Descriptor::new(
            name.to_string(),
            InstrumentationLibrary::new("callbacks-test", None, None),
            InstrumentKind::ObservableGauge,
            NumberKind::F64,
        )))
    }

    fn counting_callback(calls: &Arc<AtomicUsize>) -> BatchObservableCallback {
        let calls = calls.clone();
        BatchObservableCallback::new(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn no_errors(err: MetricsError) {
        panic!("unexpected error: {}", err)
    }

    #[test]
    fn identical_registration_is_idempotent() {
        let registry = CallbackRegistry::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let callback = counting_callback(&calls);
        let (a, b) = (gauge("a"), gauge("b"));

        assert!(registry.register(&callback, vec![a.clone(), b.clone()]));
        assert!(!registry.register(&callback, vec![b.clone(), a.clone()]));
        assert_eq!(registry.len(), 1);

        registry.run(no_errors);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn different_observable_sets_are_independent() {
        let registry = CallbackRegistry::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let callback = counting_callback(&calls);
        let (a, b) = (gauge("a"), gauge("b"));

        assert!(registry.register(&callback, vec![a.clone()]));
        assert!(registry.register(&callback, vec![b.clone()]));
        registry.run(no_errors);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(registry.unregister(&callback, &[a]));
        registry.run(no_errors);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn removing_unknown_registration_is_a_no_op() {
        let registry = CallbackRegistry::default();
        let callback = BatchObservableCallback::new(|_| {});
        let a = gauge("a");

        assert!(!registry.unregister(&callback, &[a.clone()]));
        registry.register(&callback, vec![a.clone()]);
        assert!(!registry.unregister(&callback, &[a.clone(), gauge("b")]));
        assert!(registry.unregister(&callback, &[a]));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn entries_run_in_registration_order() {
        let registry = CallbackRegistry::default();
        let order = Arc::new(Mutex::new(Vec::new()));
        let a = gauge("a");

        for i in 0..5 {
            let order = order.clone();
            let callback = BatchObservableCallback::new(move |_| {
                order.lock().unwrap().push(i);
            });
            registry.register(&callback, vec![a.clone()]);
        }

        registry.run(no_errors);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn registrations_made_during_a_cycle_apply_to_the_next() {
        let registry = Arc::new(CallbackRegistry::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let late = counting_callback(&calls);
        let a = gauge("a");

        let registering = {
            let registry = registry.clone();
            let late = late.clone();
            let a = a.clone();
            BatchObservableCallback::new(move |_| {
                registry.register(&late, vec![a.clone()]);
            })
        };
        registry.register(&registering, vec![a.clone()]);

        registry.run(no_errors);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        registry.run(no_errors);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_callback_is_isolated() {
        let registry = CallbackRegistry::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let a = gauge("a");

        let failing = BatchObservableCallback::new(|_| panic!("sensor offline"));
        let healthy = counting_callback(&calls);
        registry.register(&failing, vec![a.clone()]);
        registry.register(&healthy, vec![a.clone()]);

        let mut errors = Vec::new();
        registry.run(|err| errors.push(err));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            MetricsError::CallbackInvocationFailure { callback, message } => {
                assert_eq!(*callback, failing.id());
                assert_eq!(message, "sensor offline");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn undeclared_instrument_is_rejected_before_its_value() {
        use sdk_api::ObserverCore;

        let callback = BatchObservableCallback::new(|_| {});
        let (declared, undeclared) = (gauge("declared"), gauge("undeclared"));
        let key = CallbackKey::new(&callback, &[declared.clone()]);
        let observer = SandboxedObserver::new(&key);

        observer.observe_one(&undeclared, Number::from(f64::NAN), &[]);
        observer.observe_one(&declared, Number::from(f64::INFINITY), &[]);
        observer.observe_one(&declared, Number::from(-3.0), &[]);

        let (observed, errors) = observer.finish();
        assert_eq!(observed.len(), 1);
        assert_eq!(observed[0].number.to_f64(&NumberKind::F64), -3.0);
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            &errors[0],
            MetricsError::UnassociatedObserve { instrument, .. } if instrument == "undeclared"
        ));
        assert!(matches!(
            &errors[1],
            MetricsError::InvalidMeasurement { instrument, .. } if instrument == "declared"
        ));
    }

    #[test]
    fn panic_message_formats() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&7u8), "callback panicked");
    }
}
