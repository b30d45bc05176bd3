use crate::sdk::{
    export::metrics::Processor,
    metrics::{ErrorHandler, SdkMeterProvider},
};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(10);

/// Returns a builder for creating a `PullController` delivering to
/// `processor`.
pub fn pull(processor: Arc<dyn Processor>) -> PullControllerBuilder {
    PullControllerBuilder {
        processor,
        error_handler: None,
        cache_period: None,
    }
}

/// Controller manages access to an `SdkMeterProvider` whose collection
/// cycles are run on demand, e.g. when a scrape request arrives.
#[derive(Debug)]
pub struct PullController {
    provider: SdkMeterProvider,
    period: Duration,
    last_collect: Mutex<Option<SystemTime>>,
}

impl PullController {
    /// The provider whose meters this controller collects.
    pub fn provider(&self) -> SdkMeterProvider {
        self.provider.clone()
    }

    /// Run a collection cycle, unless one ran within the cache period.
    /// Returns the number of delivered observations.
    pub fn collect(&self) -> usize {
        {
            let mut last_collect = self
                .last_collect
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let cached = !self.period.is_zero()
                && last_collect
                    .and_then(|last| last.elapsed().ok())
                    .map_or(false, |elapsed| elapsed < self.period);
            if cached {
                return 0;
            }
            *last_collect = Some(SystemTime::now());
        }

        self.provider.collect()
    }
}

/// Configuration for a pull controller.
#[derive(Debug)]
pub struct PullControllerBuilder {
    processor: Arc<dyn Processor>,
    error_handler: Option<ErrorHandler>,
    cache_period: Option<Duration>,
}

impl PullControllerBuilder {
    /// Sets the cache period of the controller. Collections within this
    /// period of the previous one are skipped. Zero disables caching.
    ///
    /// Defaults to ten seconds.
    pub fn with_cache_period(self, period: Duration) -> Self {
        PullControllerBuilder {
            cache_period: Some(period),
            ..self
        }
    }

    /// Route errors found during collection to `error_handler`.
    pub fn with_error_handler(self, error_handler: ErrorHandler) -> Self {
        PullControllerBuilder {
            error_handler: Some(error_handler),
            ..self
        }
    }

    /// Build a new `PullController` from the current configuration.
    pub fn build(self) -> PullController {
        PullController {
            provider: SdkMeterProvider::with_error_handler(self.processor, self.error_handler),
            period: self.cache_period.unwrap_or(DEFAULT_CACHE_DURATION),
            last_collect: Mutex::new(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{BatchObservableCallback, MeterProvider};
    use crate::sdk::metrics::processors::InMemoryProcessor;

    fn controller(period: Duration) -> (Arc<InMemoryProcessor>, PullController) {
        let processor = Arc::new(InMemoryProcessor::default());
        let controller = pull(processor.clone()).with_cache_period(period).build();
        (processor, controller)
    }

    fn register_gauge(controller: &PullController) {
        let meter = controller.provider().meter("pull-test");
        let gauge = meter.u64_observable_gauge("connections").init();
        let observable = gauge.clone();
        let callback = BatchObservableCallback::new(move |observer| {
            observer.observe(&observable, 8, &[]);
        });
        meter.add_batch_observable_callback(&callback, &[&gauge]);
    }

    #[test]
    fn collections_within_period_are_cached() {
        let (processor, controller) = controller(Duration::from_secs(3600));
        register_gauge(&controller);

        assert_eq!(controller.collect(), 1);
        assert_eq!(controller.collect(), 0);
        assert_eq!(processor.finished_records().len(), 1);
    }

    #[test]
    fn zero_period_disables_caching() {
        let (processor, controller) = controller(Duration::from_secs(0));
        register_gauge(&controller);

        assert_eq!(controller.collect(), 1);
        assert_eq!(controller.collect(), 1);
        assert_eq!(processor.finished_records().len(), 2);
    }
}
