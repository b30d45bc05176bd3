//! # Proxy meter provider
//!
//! Handed out by [`meter_provider`](super::meter_provider) while no provider is
//! registered. Everything created through it records nothing until a delegate
//! is installed, after which the same handles forward to the delegate's
//! instruments.
use crate::api::core::KeyValue;
use crate::api::metrics::{
    sdk_api::{AsyncInstrumentCore, InstrumentCore, MeterCore, SyncInstrumentCore},
    BatchObservableCallback, CallbackKey, Descriptor, InstrumentationLibrary, Meter,
    MeterProvider, MetricsError, Number, Result,
};
use crate::global::{handle_error, GlobalMeterProvider};
use arc_swap::ArcSwapOption;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// A `MeterProvider` that forwards to a delegate installed after the fact.
#[derive(Clone, Debug, Default)]
pub struct ProxyMeterProvider {
    state: Arc<Mutex<ProxyProviderState>>,
}

#[derive(Debug, Default)]
struct ProxyProviderState {
    delegate: Option<GlobalMeterProvider>,
    meters: HashMap<InstrumentationLibrary, Arc<ProxyMeterCore>>,
}

impl ProxyMeterProvider {
    /// Create a proxy with no delegate.
    pub fn new() -> Self {
        ProxyMeterProvider::default()
    }

    /// Whether a delegate has been installed.
    pub fn has_delegate(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .delegate
            .is_some()
    }

    /// Bind every meter handed out so far, and every meter handed out from now
    /// on, to `delegate`.
    pub fn set_delegate(&self, delegate: GlobalMeterProvider) {
        let meters: Vec<(InstrumentationLibrary, Arc<ProxyMeterCore>)> = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.delegate = Some(delegate.clone());
            state
                .meters
                .iter()
                .map(|(library, core)| (library.clone(), core.clone()))
                .collect()
        };

        // the delegate may call back into this proxy
        for (library, core) in &meters {
            core.set_delegate(delegate.meter_with_library(library.clone()).core().clone());
        }
        tracing::debug!(meters = meters.len(), "meter provider delegate installed");
    }
}

impl MeterProvider for ProxyMeterProvider {
    fn meter_with_library(&self, library: InstrumentationLibrary) -> Meter {
        let (core, bind_to) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match state.meters.get(&library) {
                Some(core) => (core.clone(), None),
                None => {
                    let core = Arc::new(ProxyMeterCore::default());
                    state.meters.insert(library.clone(), core.clone());
                    (core, state.delegate.clone())
                }
            }
        };

        if let Some(delegate) = bind_to {
            core.set_delegate(delegate.meter_with_library(library.clone()).core().clone());
        }
        Meter::new(library, core)
    }
}

/// The core behind every meter of a [`ProxyMeterProvider`].
///
/// Remembers what was created and registered through it so all of it can be
/// replayed on the delegate.
#[derive(Debug, Default)]
pub(crate) struct ProxyMeterCore {
    state: Mutex<ProxyMeterState>,
}

#[derive(Debug, Default)]
struct ProxyMeterState {
    delegate: Option<Arc<dyn MeterCore>>,
    sync_instruments: Vec<Arc<ProxySyncInstrument>>,
    async_instruments: Vec<Arc<ProxyAsyncInstrument>>,
    callbacks: Vec<ProxyCallback>,
}

#[derive(Debug)]
struct ProxyCallback {
    key: CallbackKey,
    callback: BatchObservableCallback,
    observables: Vec<Arc<dyn AsyncInstrumentCore>>,
}

impl ProxyMeterCore {
    fn set_delegate(&self, delegate: Arc<dyn MeterCore>) {
        let mut errors = Vec::new();
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            for instrument in &state.sync_instruments {
                if let Err(err) = instrument.set_delegate(delegate.as_ref()) {
                    errors.push(err);
                }
            }
            // observables first, the delegate resolves callbacks against them
            for instrument in &state.async_instruments {
                if let Err(err) = instrument.set_delegate(delegate.as_ref()) {
                    errors.push(err);
                }
            }
            for registration in &state.callbacks {
                if let Err(err) =
                    delegate.register_callback(&registration.callback, &registration.observables)
                {
                    errors.push(err);
                }
            }
            state.delegate = Some(delegate.clone());
        }

        for err in errors {
            delegate.handle_error(err);
        }
    }

    fn same_instrument(existing: &Descriptor, requested: &Descriptor) -> bool {
        existing.name() == requested.name()
            && existing.instrument_kind() == requested.instrument_kind()
            && existing.number_kind() == requested.number_kind()
    }
}

impl MeterCore for ProxyMeterCore {
    fn new_sync_instrument(&self, descriptor: Descriptor) -> Result<Arc<dyn SyncInstrumentCore>> {
        let mut state = self.state.lock()?;
        if let Some(existing) = state
            .sync_instruments
            .iter()
            .find(|instrument| Self::same_instrument(&instrument.descriptor, &descriptor))
        {
            return Ok(existing.clone());
        }

        let instrument = Arc::new(ProxySyncInstrument::new(descriptor));
        if let Some(delegate) = &state.delegate {
            instrument.set_delegate(delegate.as_ref())?;
        }
        state.sync_instruments.push(instrument.clone());
        Ok(instrument)
    }

    fn new_async_instrument(
        &self,
        descriptor: Descriptor,
    ) -> Result<Arc<dyn AsyncInstrumentCore>> {
        let mut state = self.state.lock()?;
        if let Some(existing) = state
            .async_instruments
            .iter()
            .find(|instrument| Self::same_instrument(&instrument.descriptor, &descriptor))
        {
            return Ok(existing.clone());
        }

        let instrument = Arc::new(ProxyAsyncInstrument::new(descriptor));
        if let Some(delegate) = &state.delegate {
            instrument.set_delegate(delegate.as_ref())?;
        }
        state.async_instruments.push(instrument.clone());
        Ok(instrument)
    }

    fn register_callback(
        &self,
        callback: &BatchObservableCallback,
        observables: &[Arc<dyn AsyncInstrumentCore>],
    ) -> Result<()> {
        let mut state = self.state.lock()?;
        let key = CallbackKey::new(callback, observables);
        if state.callbacks.iter().any(|registration| registration.key == key) {
            return Ok(());
        }

        if let Some(delegate) = &state.delegate {
            delegate.register_callback(callback, observables)?;
        }
        state.callbacks.push(ProxyCallback {
            key,
            callback: callback.clone(),
            observables: observables.to_vec(),
        });
        Ok(())
    }

    fn unregister_callback(
        &self,
        callback: &BatchObservableCallback,
        observables: &[Arc<dyn AsyncInstrumentCore>],
    ) -> Result<()> {
        let mut state = self.state.lock()?;
        let key = CallbackKey::new(callback, observables);
        state.callbacks.retain(|registration| registration.key != key);

        match &state.delegate {
            Some(delegate) => delegate.unregister_callback(callback, observables),
            None => Ok(()),
        }
    }

    fn handle_error(&self, err: MetricsError) {
        let delegate = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .delegate
            .clone();
        match delegate {
            Some(delegate) => delegate.handle_error(err),
            None => handle_error(err),
        }
    }
}

struct SyncDelegate(Arc<dyn SyncInstrumentCore>);

impl fmt::Debug for SyncDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// A synchronous instrument that records nothing until bound to a delegate.
#[derive(Debug)]
pub(crate) struct ProxySyncInstrument {
    descriptor: Descriptor,
    delegate: ArcSwapOption<SyncDelegate>,
}

impl ProxySyncInstrument {
    fn new(descriptor: Descriptor) -> Self {
        ProxySyncInstrument {
            descriptor,
            delegate: ArcSwapOption::empty(),
        }
    }

    fn set_delegate(&self, meter: &dyn MeterCore) -> Result<()> {
        let instrument = meter.new_sync_instrument(self.descriptor.clone())?;
        self.delegate.store(Some(Arc::new(SyncDelegate(instrument))));
        Ok(())
    }
}

impl InstrumentCore for ProxySyncInstrument {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }
}

impl SyncInstrumentCore for ProxySyncInstrument {
    fn record_one(&self, number: Number, attributes: &[KeyValue]) {
        if let Some(delegate) = &*self.delegate.load() {
            delegate.0.record_one(number, attributes)
        }
    }

    fn handle_error(&self, err: MetricsError) {
        match &*self.delegate.load() {
            Some(delegate) => delegate.0.handle_error(err),
            None => handle_error(err),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct AsyncDelegate(Arc<dyn AsyncInstrumentCore>);

impl fmt::Debug for AsyncDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// An observable instrument that resolves to its delegate once bound.
#[derive(Debug)]
pub(crate) struct ProxyAsyncInstrument {
    descriptor: Descriptor,
    delegate: ArcSwapOption<AsyncDelegate>,
}

impl ProxyAsyncInstrument {
    fn new(descriptor: Descriptor) -> Self {
        ProxyAsyncInstrument {
            descriptor,
            delegate: ArcSwapOption::empty(),
        }
    }

    fn set_delegate(&self, meter: &dyn MeterCore) -> Result<()> {
        let instrument = meter.new_async_instrument(self.descriptor.clone())?;
        self.delegate.store(Some(Arc::new(AsyncDelegate(instrument))));
        Ok(())
    }
}

impl InstrumentCore for ProxyAsyncInstrument {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }
}

impl AsyncInstrumentCore for ProxyAsyncInstrument {
    fn delegate(&self) -> Option<Arc<dyn AsyncInstrumentCore>> {
        self.delegate
            .load_full()
            .map(|delegate| delegate.0.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
