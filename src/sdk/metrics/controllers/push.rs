use crate::sdk::{
    export::metrics::Processor,
    metrics::{ErrorHandler, SdkMeterProvider},
};
use futures::{channel::mpsc, task, Future, Stream, StreamExt};
use std::env;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time;

const DEFAULT_PUSH_PERIOD: time::Duration = time::Duration::from_secs(10);
const EXPORT_INTERVAL_ENV: &str = "OTEL_METRIC_EXPORT_INTERVAL";

/// Returns a builder for creating a `PushController` delivering to
/// `processor`.
///
/// `spawn` receives the worker future and must drive it to completion.
/// `interval` turns the push period into a stream of ticks; every tick runs
/// one collection cycle.
pub fn push<SP, SO, I, IO>(
    processor: Arc<dyn Processor>,
    spawn: SP,
    interval: I,
) -> PushControllerBuilder<SP, I>
where
    SP: Fn(PushControllerWorker) -> SO,
    I: Fn(time::Duration) -> IO,
{
    PushControllerBuilder {
        processor,
        spawn,
        interval,
        error_handler: None,
        period: None,
    }
}

/// Organizes a periodic push of metric data.
#[derive(Debug)]
pub struct PushController {
    message_sender: Mutex<mpsc::Sender<PushMessage>>,
    provider: SdkMeterProvider,
}

#[derive(Debug)]
enum PushMessage {
    Tick,
    Shutdown,
}

/// The future which runs the collection cycles of a `PushController`.
///
/// Completes on shutdown, or once the tick stream has ended and the
/// controller has been dropped.
#[allow(missing_debug_implementations)]
pub struct PushControllerWorker {
    messages: Pin<Box<dyn Stream<Item = PushMessage> + Send>>,
    provider: SdkMeterProvider,
}

impl PushControllerWorker {
    fn on_tick(&self) {
        let delivered = self.provider.collect();
        tracing::debug!(delivered, "push collection finished");
    }
}

impl Future for PushControllerWorker {
    type Output = ();
    fn poll(mut self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<Self::Output> {
        loop {
            match futures::ready!(self.messages.poll_next_unpin(cx)) {
                Some(PushMessage::Tick) => self.on_tick(),
                // final message or stream ended
                Some(PushMessage::Shutdown) | None => return task::Poll::Ready(()),
            }
        }
    }
}

impl PushController {
    /// The provider whose meters this controller collects.
    pub fn provider(&self) -> SdkMeterProvider {
        self.provider.clone()
    }

    /// Run a collection cycle on the worker without waiting for the next tick.
    pub fn flush(&self) {
        self.send(PushMessage::Tick)
    }

    /// Stop the worker. Collections that were already requested are still
    /// run.
    pub fn shutdown(&self) {
        self.send(PushMessage::Shutdown)
    }

    fn send(&self, message: PushMessage) {
        let mut sender = self
            .message_sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = sender.try_send(message) {
            tracing::debug!(error = %err, "push controller worker is not accepting messages");
        }
    }
}

/// Configuration for building a new `PushController`.
#[derive(Debug)]
pub struct PushControllerBuilder<S, I> {
    processor: Arc<dyn Processor>,
    spawn: S,
    interval: I,
    error_handler: Option<ErrorHandler>,
    period: Option<time::Duration>,
}

impl<S, SO, I, IS, ISI> PushControllerBuilder<S, I>
where
    S: Fn(PushControllerWorker) -> SO,
    I: Fn(time::Duration) -> IS,
    IS: Stream<Item = ISI> + Send + 'static,
{
    /// Configure the period of this controller. Takes precedence over the
    /// `OTEL_METRIC_EXPORT_INTERVAL` environment variable.
    pub fn with_period(self, period: time::Duration) -> Self {
        PushControllerBuilder {
            period: Some(period),
            ..self
        }
    }

    /// Route errors found during collection to `error_handler`.
    pub fn with_error_handler<T>(self, error_handler: T) -> Self
    where
        T: Fn(crate::metrics::MetricsError) + Send + Sync + 'static,
    {
        PushControllerBuilder {
            error_handler: Some(ErrorHandler::new(error_handler)),
            ..self
        }
    }

    /// Build a new `PushController`, handing its worker to `spawn`.
    pub fn build(self) -> PushController {
        let provider = SdkMeterProvider::with_error_handler(self.processor, self.error_handler);
        let period = self.period.or_else(period_from_env).unwrap_or(DEFAULT_PUSH_PERIOD);

        let (message_sender, message_receiver) = mpsc::channel(256);
        let ticker = (self.interval)(period).map(|_| PushMessage::Tick);

        (self.spawn)(PushControllerWorker {
            messages: Box::pin(futures::stream::select(message_receiver, ticker)),
            provider: provider.clone(),
        });

        PushController {
            message_sender: Mutex::new(message_sender),
            provider,
        }
    }
}

fn period_from_env() -> Option<time::Duration> {
    let value = env::var(EXPORT_INTERVAL_ENV).ok()?;
    parse_period(&value)
}

fn parse_period(value: &str) -> Option<time::Duration> {
    match value.trim().parse::<u64>() {
        Ok(millis) if millis > 0 => Some(time::Duration::from_millis(millis)),
        _ => {
            tracing::debug!(
                value,
                variable = EXPORT_INTERVAL_ENV,
                "ignoring invalid export interval"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{BatchObservableCallback, MeterProvider};
    use crate::sdk::metrics::processors::InMemoryProcessor;
    use futures::executor::block_on;

    type Slot = Arc<Mutex<Option<PushControllerWorker>>>;

    fn controller(ticks: usize, period: Arc<Mutex<Option<time::Duration>>>) -> (
        Arc<InMemoryProcessor>,
        PushController,
        Slot,
    ) {
        let processor = Arc::new(InMemoryProcessor::default());
        let slot: Slot = Arc::new(Mutex::new(None));
        let spawned = slot.clone();

        let controller = push(
            processor.clone(),
            move |worker| {
                *spawned.lock().unwrap() = Some(worker);
            },
            move |interval| {
                *period.lock().unwrap() = Some(interval);
                futures::stream::iter(vec![(); ticks])
            },
        )
        .with_period(time::Duration::from_millis(250))
        .build();

        (processor, controller, slot)
    }

    #[test]
    fn worker_collects_once_per_tick() {
        let period = Arc::new(Mutex::new(None));
        let (processor, controller, slot) = controller(3, period.clone());
        assert_eq!(
            *period.lock().unwrap(),
            Some(time::Duration::from_millis(250))
        );

        let meter = controller.provider().meter("push-test");
        let gauge = meter.f64_observable_gauge("load").init();
        let observable = gauge.clone();
        let callback = BatchObservableCallback::new(move |observer| {
            observer.observe(&observable, 0.5, &[]);
        });
        meter.add_batch_observable_callback(&callback, &[&gauge]);

        drop(controller);
        let worker = slot.lock().unwrap().take().unwrap();
        block_on(worker);

        assert_eq!(processor.finished_records().len(), 3);
    }

    #[test]
    fn shutdown_stops_the_worker() {
        let (processor, controller, slot) = controller(0, Arc::new(Mutex::new(None)));
        let meter = controller.provider().meter("push-test");
        let gauge = meter.u64_observable_counter("restarts").init();
        let observable = gauge.clone();
        let callback = BatchObservableCallback::new(move |observer| {
            observer.observe(&observable, 1, &[]);
        });
        meter.add_batch_observable_callback(&callback, &[&gauge]);

        controller.flush();
        controller.shutdown();
        let worker = slot.lock().unwrap().take().unwrap();
        block_on(worker);

        assert_eq!(processor.finished_records().len(), 1);
    }

    #[test]
    fn export_interval_parsing() {
        assert_eq!(parse_period("1500"), Some(time::Duration::from_millis(1500)));
        assert_eq!(parse_period(" 20 "), Some(time::Duration::from_millis(20)));
        assert_eq!(parse_period("0"), None);
        assert_eq!(parse_period("soon"), None);
    }
}
