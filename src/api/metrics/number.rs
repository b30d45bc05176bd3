use std::fmt;

/// Number represents either an integral or a floating point value. It
/// needs to be accompanied with a source of NumberKind that describes
/// the actual type of the value stored within Number.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Number(u64);

impl Number {
    /// Create a number from its raw bits.
    pub fn from_bits(bits: u64) -> Self {
        Number(bits)
    }

    /// The raw bits of this number.
    pub fn to_bits(self) -> u64 {
        self.0
    }

    /// Interpret the number as an `f64`, converting integers.
    pub fn to_f64(self, number_kind: &NumberKind) -> f64 {
        match number_kind {
            NumberKind::F64 => f64::from_bits(self.0),
            NumberKind::I64 => (self.0 as i64) as f64,
            NumberKind::U64 => self.0 as f64,
        }
    }

    /// Interpret the number as an `i64`, truncating floats.
    pub fn to_i64(self, number_kind: &NumberKind) -> i64 {
        match number_kind {
            NumberKind::F64 => f64::from_bits(self.0) as i64,
            NumberKind::I64 | NumberKind::U64 => self.0 as i64,
        }
    }

    /// Interpret the number as a `u64`, truncating floats.
    pub fn to_u64(self, number_kind: &NumberKind) -> u64 {
        match number_kind {
            NumberKind::F64 => f64::from_bits(self.0) as u64,
            NumberKind::I64 | NumberKind::U64 => self.0,
        }
    }

    /// Only meaningful for `F64` numbers.
    pub fn is_nan(self) -> bool {
        f64::from_bits(self.0).is_nan()
    }

    /// Integers are always finite.
    pub fn is_finite(self, number_kind: &NumberKind) -> bool {
        match number_kind {
            NumberKind::F64 => f64::from_bits(self.0).is_finite(),
            NumberKind::I64 | NumberKind::U64 => true,
        }
    }

    /// Whether the value is strictly below zero. `-0.0` is not negative.
    pub fn is_negative(self, number_kind: &NumberKind) -> bool {
        match number_kind {
            NumberKind::U64 => false,
            NumberKind::I64 => (self.0 as i64) < 0,
            NumberKind::F64 => f64::from_bits(self.0) < 0.0,
        }
    }
}

impl fmt::Debug for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Number").field(&self.0).finish()
    }
}

impl From<f64> for Number {
    fn from(f: f64) -> Self {
        Number(f.to_bits())
    }
}

impl From<i64> for Number {
    fn from(i: i64) -> Self {
        Number(i as u64)
    }
}

impl From<u64> for Number {
    fn from(u: u64) -> Self {
        Number(u)
    }
}

/// Type of the underlying number of an instrument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumberKind {
    /// an i64
    I64,
    /// an f64
    F64,
    /// a u64
    U64,
}

/// Types an instrument can be created over.
pub trait MetricValue: Into<Number> + Copy + fmt::Debug + Send + Sync + 'static {
    /// The `NumberKind` matching `Self`.
    const KIND: NumberKind;
}

impl MetricValue for u64 {
    const KIND: NumberKind = NumberKind::U64;
}

impl MetricValue for i64 {
    const KIND: NumberKind = NumberKind::I64;
}

impl MetricValue for f64 {
    const KIND: NumberKind = NumberKind::F64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_checks_follow_kind() {
        assert!(!Number::from(3u64).is_negative(&NumberKind::U64));
        assert!(Number::from(-3i64).is_negative(&NumberKind::I64));
        assert!(Number::from(-0.5).is_negative(&NumberKind::F64));
        assert!(!Number::from(-0.0).is_negative(&NumberKind::F64));
    }

    #[test]
    fn finite_checks_follow_kind() {
        assert!(!Number::from(f64::INFINITY).is_finite(&NumberKind::F64));
        assert!(Number::from(f64::NAN).is_nan());
        assert!(Number::from(u64::MAX).is_finite(&NumberKind::U64));
    }

    #[test]
    fn conversions() {
        assert_eq!(Number::from(-7i64).to_f64(&NumberKind::I64), -7.0);
        assert_eq!(Number::from(2.5).to_i64(&NumberKind::F64), 2);
        assert_eq!(Number::from(9u64).to_u64(&NumberKind::U64), 9);
    }
}
