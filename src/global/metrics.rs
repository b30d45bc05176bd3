use crate::api::metrics::{InstrumentationLibrary, Meter, MeterProvider, MetricsError};
use crate::global::{handle_error, ProxyMeterProvider};
use std::sync::{Arc, PoisonError, RwLock};

/// Version of this crate, recorded next to the provider it registers.
const VERSION: &str = env!("CARGO_PKG_VERSION");

lazy_static::lazy_static! {
    /// The global `Meter` provider singleton.
    static ref GLOBAL_METER_PROVIDER: RwLock<GlobalSlot> = RwLock::new(GlobalSlot::new());
}

#[derive(Debug)]
struct GlobalSlot {
    proxy: ProxyMeterProvider,
    proxy_handle: GlobalMeterProvider,
    registered: Option<Registration>,
}

#[derive(Debug)]
struct Registration {
    provider: GlobalMeterProvider,
    version: &'static str,
}

impl GlobalSlot {
    fn new() -> Self {
        let proxy = ProxyMeterProvider::new();
        GlobalSlot {
            proxy_handle: GlobalMeterProvider::new(proxy.clone()),
            proxy,
            registered: None,
        }
    }
}

/// Represents the globally configured [`MeterProvider`] instance.
///
/// Two handles are the same provider when they share one allocation, which
/// is the case for clones and for handles built from clones of one `Arc`.
#[derive(Debug, Clone)]
pub struct GlobalMeterProvider {
    provider: Arc<dyn MeterProvider + Send + Sync>,
}

impl MeterProvider for GlobalMeterProvider {
    fn meter_with_library(&self, library: InstrumentationLibrary) -> Meter {
        self.provider.meter_with_library(library)
    }
}

impl GlobalMeterProvider {
    /// Create a new global meter provider.
    pub fn new<P>(provider: P) -> Self
    where
        P: MeterProvider + Send + Sync + 'static,
    {
        GlobalMeterProvider {
            provider: Arc::new(provider),
        }
    }

    /// Whether `self` and `other` are the same provider instance.
    pub fn is_same(&self, other: &GlobalMeterProvider) -> bool {
        Arc::as_ptr(&self.provider) as *const () == Arc::as_ptr(&other.provider) as *const ()
    }
}

impl<P> From<Arc<P>> for GlobalMeterProvider
where
    P: MeterProvider + Send + Sync + 'static,
{
    fn from(provider: Arc<P>) -> Self {
        GlobalMeterProvider { provider }
    }
}

/// Register `provider` as the global meter provider.
///
/// Succeeds when the slot is empty, or when it already holds this same
/// provider instance. Any other provider is rejected: the conflict is
/// reported, `false` is returned and the active provider stays in place.
///
/// Passing back the proxy returned by [`meter_provider`] is accepted and
/// changes nothing.
///
/// Meters and instruments handed out by [`meter_provider`] before this call
/// forward to `provider` from now on.
pub fn set_meter_provider<P: Into<GlobalMeterProvider>>(provider: P) -> bool {
    let provider = provider.into();
    let proxy = {
        let mut slot = GLOBAL_METER_PROVIDER
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        // the slot's own proxy already forwards to whatever gets registered
        if provider.is_same(&slot.proxy_handle) {
            return true;
        }
        if let Some(registered) = &slot.registered {
            if registered.provider.is_same(&provider) {
                return true;
            }
            let err = MetricsError::RegistrationConflict(format!(
                "a different meter provider was already registered by version {}",
                registered.version
            ));
            drop(slot);
            handle_error(err);
            return false;
        }

        slot.registered = Some(Registration {
            provider: provider.clone(),
            version: VERSION,
        });
        slot.proxy.clone()
    };

    tracing::debug!(version = VERSION, "global meter provider registered");
    // the delegate may call back into the global slot
    proxy.set_delegate(provider);
    true
}

/// Clear the global slot. Returns whether a provider was registered.
///
/// Handles obtained before keep using the provider they were bound to. Later
/// calls to [`meter_provider`] get a fresh proxy.
pub fn unregister_meter_provider() -> bool {
    let mut slot = GLOBAL_METER_PROVIDER
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    let was_registered = slot.registered.is_some();
    *slot = GlobalSlot::new();

    if was_registered {
        tracing::debug!("global meter provider unregistered");
    }
    was_registered
}

/// The version of this crate that registered the active provider, if any.
pub fn registered_version() -> Option<&'static str> {
    GLOBAL_METER_PROVIDER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .registered
        .as_ref()
        .map(|registered| registered.version)
}

/// Returns an instance of the currently configured global [`MeterProvider`]
/// through [`GlobalMeterProvider`].
///
/// Without a registered provider this is a proxy whose meters become live
/// once one is registered.
pub fn meter_provider() -> GlobalMeterProvider {
    let slot = GLOBAL_METER_PROVIDER
        .read()
        .unwrap_or_else(PoisonError::into_inner);
    match &slot.registered {
        Some(registered) => registered.provider.clone(),
        None => slot.proxy_handle.clone(),
    }
}

/// Creates a named [`Meter`] via the configured [`GlobalMeterProvider`].
///
/// This is a more convenient way of expressing `global::meter_provider().meter(name)`.
pub fn meter(name: &'static str) -> Meter {
    meter_provider().meter(name)
}

/// Creates a [`Meter`] with the name, version and schema url via the
/// configured [`GlobalMeterProvider`].
pub fn meter_with_version(
    name: &'static str,
    version: Option<&'static str>,
    schema_url: Option<&'static str>,
) -> Meter {
    meter_provider().versioned_meter(name, version, schema_url)
}
