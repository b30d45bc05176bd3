use crate::metrics::MetricsError;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

lazy_static::lazy_static! {
    /// The global error handler.
    static ref GLOBAL_ERROR_HANDLER: RwLock<Option<ErrorHandler>> = RwLock::new(None);
}

/// A callback receiving every error the metrics API and SDK report.
#[derive(Clone)]
pub struct ErrorHandler(Arc<dyn Fn(MetricsError) + Send + Sync>);

impl ErrorHandler {
    /// Wrap `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(MetricsError) + Send + Sync + 'static,
    {
        ErrorHandler(Arc::new(handler))
    }

    /// Pass `err` to the handler.
    pub fn call(&self, err: MetricsError) {
        (self.0)(err)
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("closure", &"Fn(MetricsError)")
            .finish()
    }
}

/// Handle error using the globally configured error handler.
///
/// Writes a `tracing` event at the error's severity if no handler is set.
pub fn handle_error<T: Into<MetricsError>>(err: T) {
    let err = err.into();
    let handler = GLOBAL_ERROR_HANDLER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();

    match handler {
        Some(handler) => handler.call(err),
        None => log_error(&err),
    }
}

/// Set global error handler.
pub fn set_error_handler<F>(f: F)
where
    F: Fn(MetricsError) + Send + Sync + 'static,
{
    let mut handler = GLOBAL_ERROR_HANDLER
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    *handler = Some(ErrorHandler::new(f));
}

/// Restore the default handler, which reports through `tracing`.
pub fn reset_error_handler() {
    let mut handler = GLOBAL_ERROR_HANDLER
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    *handler = None;
}

fn log_error(err: &MetricsError) {
    let level = err.severity();
    if level == tracing::Level::ERROR {
        tracing::error!(error = %err, "metrics error");
    } else if level == tracing::Level::WARN {
        tracing::warn!(error = %err, "metrics error");
    } else if level == tracing::Level::INFO {
        tracing::info!(error = %err, "metrics error");
    } else {
        tracing::debug!(error = %err, "metrics error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::InvalidMeasurementReason;

    #[test]
    fn default_handler_logs_every_severity() {
        handle_error(MetricsError::Other("unexpected".into()));
        handle_error(MetricsError::RegistrationConflict("taken".into()));
        handle_error(MetricsError::InvalidMeasurement {
            instrument: "requests".into(),
            reason: InvalidMeasurementReason::Negative,
        });
    }

    #[test]
    fn handler_debug_hides_closure() {
        let handler = ErrorHandler::new(|_| {});
        assert_eq!(
            format!("{:?}", handler),
            "ErrorHandler { closure: \"Fn(MetricsError)\" }"
        );
    }
}
