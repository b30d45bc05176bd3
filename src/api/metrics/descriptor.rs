use crate::api::core::Unit;
use crate::api::metrics::{InstrumentConfig, InstrumentKind, InstrumentationLibrary, NumberKind};

/// Descriptor contains all the settings that describe an instrument, including
/// its name, metric kind, number kind, and the configurable options.
#[derive(Clone, Debug, PartialEq)]
pub struct Descriptor {
    name: String,
    instrument_kind: InstrumentKind,
    number_kind: NumberKind,
    config: InstrumentConfig,
}

impl Descriptor {
    /// Create a new descriptor
    pub fn new(
        name: String,
        library: InstrumentationLibrary,
        instrument_kind: InstrumentKind,
        number_kind: NumberKind,
    ) -> Self {
        Descriptor {
            name,
            instrument_kind,
            number_kind,
            config: InstrumentConfig::with_library(library),
        }
    }

    /// The metric instrument's name.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// The specific kind of instrument.
    pub fn instrument_kind(&self) -> &InstrumentKind {
        &self.instrument_kind
    }

    /// NumberKind returns whether this instrument is declared over i64, f64,
    /// or u64 values.
    pub fn number_kind(&self) -> &NumberKind {
        &self.number_kind
    }

    /// A human-readable description of the metric instrument.
    pub fn description(&self) -> Option<&String> {
        self.config.description.as_ref()
    }

    /// Assign a new description
    pub fn set_description(&mut self, description: String) {
        self.config.description = Some(description);
    }

    /// Unit describes the units of the metric instrument.
    pub fn unit(&self) -> Option<&str> {
        self.config.unit.as_ref().map(|unit| unit.as_ref())
    }

    /// Assign a new unit
    pub fn set_unit(&mut self, unit: Unit) {
        self.config.unit = Some(unit);
    }

    /// Explicit bucket boundaries requested for a histogram.
    pub fn boundaries(&self) -> Option<&[f64]> {
        self.config.boundaries.as_deref()
    }

    /// Assign explicit bucket boundaries
    pub fn set_boundaries(&mut self, boundaries: Vec<f64>) {
        self.config.boundaries = Some(boundaries);
    }

    /// The instrumentation library that created this instrument, as given to
    /// `MeterProvider::meter_with_version`.
    pub fn library(&self) -> &InstrumentationLibrary {
        &self.config.library
    }

    /// Shorthand for the library name.
    pub fn library_name(&self) -> &str {
        self.config.library.name()
    }

    pub(crate) fn config_mut(&mut self) -> &mut InstrumentConfig {
        &mut self.config
    }
}
