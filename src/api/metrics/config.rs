use crate::api::core::Unit;
use crate::api::metrics::NumberKind;
use serde::Deserialize;
use std::borrow::Cow;

/// Identifies the library (or component) a `Meter` instruments.
///
/// Two meters created with equal libraries are interchangeable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct InstrumentationLibrary {
    name: Cow<'static, str>,
    version: Option<Cow<'static, str>>,
    schema_url: Option<Cow<'static, str>>,
}

impl InstrumentationLibrary {
    /// Create a new library descriptor
    pub fn new<T>(name: T, version: Option<T>, schema_url: Option<T>) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        InstrumentationLibrary {
            name: name.into(),
            version: version.map(Into::into),
            schema_url: schema_url.map(Into::into),
        }
    }

    /// The library name
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    /// The library version, if any
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// The schema url the library's telemetry follows, if any
    pub fn schema_url(&self) -> Option<&str> {
        self.schema_url.as_deref()
    }
}

/// Config contains the configurable options of an instrument.
#[derive(Clone, Debug, PartialEq)]
pub struct InstrumentConfig {
    pub(crate) description: Option<String>,
    pub(crate) unit: Option<Unit>,
    pub(crate) boundaries: Option<Vec<f64>>,
    pub(crate) library: InstrumentationLibrary,
}

impl InstrumentConfig {
    /// Empty configuration for instruments created by `library`
    pub fn with_library(library: InstrumentationLibrary) -> Self {
        InstrumentConfig {
            description: None,
            unit: None,
            boundaries: None,
            library,
        }
    }

    /// The configured description
    pub fn description(&self) -> Option<&String> {
        self.description.as_ref()
    }

    /// The configured unit
    pub fn unit(&self) -> Option<&Unit> {
        self.unit.as_ref()
    }

    /// The configured histogram boundaries
    pub fn boundaries(&self) -> Option<&[f64]> {
        self.boundaries.as_deref()
    }

    /// The creating library
    pub fn library(&self) -> &InstrumentationLibrary {
        &self.library
    }
}

/// Representation of an instrument's value type in option documents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueType {
    /// integral values
    Int,
    /// floating point values
    Double,
}

impl ValueType {
    /// Whether numbers of `kind` are represented by this value type.
    pub fn matches(self, kind: &NumberKind) -> bool {
        match self {
            ValueType::Int => matches!(kind, NumberKind::I64 | NumberKind::U64),
            ValueType::Double => matches!(kind, NumberKind::F64),
        }
    }
}

/// Instrument creation options as they appear in configuration documents.
///
/// The set of recognised keys is fixed. Unrecognised keys are ignored so
/// that documents written for newer versions still parse.
///
/// ```
/// use otel_metrics::metrics::InstrumentOptions;
///
/// let options: InstrumentOptions =
///     serde_json::from_str(r#"{"description": "queue depth", "unit": "1", "future": true}"#)
///         .unwrap();
/// assert_eq!(options.description.as_deref(), Some("queue depth"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstrumentOptions {
    /// Human readable description
    pub description: Option<String>,
    /// Unit of the recorded values
    pub unit: Option<String>,
    /// Expected value type; the typed constructor used takes precedence
    pub value_type: Option<ValueType>,
    /// Explicit bucket boundaries, histograms only
    pub boundaries: Option<Vec<f64>>,
}
