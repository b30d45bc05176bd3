use crate::api::metrics::Result;
use crate::sdk::export::metrics::{Processor, Record};
use std::sync::{Mutex, PoisonError};

/// A processor that keeps every delivered record in memory.
///
/// Useful for tests and examples:
///
/// ```
/// use otel_metrics::metrics::MeterProvider;
/// use otel_metrics::sdk::metrics::{processors::InMemoryProcessor, SdkMeterProvider};
/// use std::sync::Arc;
///
/// let processor = Arc::new(InMemoryProcessor::default());
/// let provider = SdkMeterProvider::new(processor.clone());
///
/// let counter = provider.meter("example").u64_counter("requests").init();
/// counter.add(1, &[]);
///
/// assert_eq!(processor.finished_records().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryProcessor {
    records: Mutex<Vec<Record>>,
}

impl InMemoryProcessor {
    /// Copies of every record delivered since the last reset, in delivery
    /// order.
    pub fn finished_records(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget every record delivered so far.
    pub fn reset(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Processor for InMemoryProcessor {
    fn process(&self, record: Record) -> Result<()> {
        self.records.lock()?.push(record);
        Ok(())
    }
}
