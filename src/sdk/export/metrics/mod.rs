//! Metrics Export
use crate::api::{
    attributes::AttributeSet,
    metrics::{Descriptor, Number, Result},
};
use std::fmt;
use std::time::SystemTime;

/// Processor receives every measurement the SDK delivers, synchronous
/// recordings as they happen and observations at the end of each collection
/// cycle.
///
/// `process` may be called concurrently from instrumented code and from a
/// collection.
pub trait Processor: fmt::Debug + Send + Sync {
    /// Consume one delivered measurement.
    fn process(&self, record: Record) -> Result<()>;
}

/// Create a new export `Record`.
pub fn record(
    descriptor: Descriptor,
    attributes: AttributeSet,
    number: Number,
    timestamp: SystemTime,
) -> Record {
    Record {
        descriptor,
        attributes,
        number,
        timestamp,
    }
}

/// One measurement as delivered to a [`Processor`].
#[derive(Clone, Debug)]
pub struct Record {
    descriptor: Descriptor,
    attributes: AttributeSet,
    number: Number,
    timestamp: SystemTime,
}

impl Record {
    /// The descriptor of the instrument the measurement belongs to.
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// The attributes of the measurement.
    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    /// The raw value, interpreted through the descriptor's number kind.
    pub fn number(&self) -> Number {
        self.number
    }

    /// The value as an `f64`.
    pub fn value(&self) -> f64 {
        self.number.to_f64(self.descriptor.number_kind())
    }

    /// When the SDK delivered the measurement.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
}
