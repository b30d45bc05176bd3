//! Metric attributes
use crate::api::core::{KeyValue, Value};
use std::fmt;
use std::hash::{Hash, Hasher};

/// AttributeSet is the representation for a distinct attribute set. It
/// manages an immutable set of attributes sorted by key, with duplicate keys
/// resolved in favour of the last occurrence.
///
/// This type supports the `Equivalent` method of comparison using values of
/// type `Distinct`, which is what is used when attribute sets key a map.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AttributeSet {
    equivalent: Distinct,
}

impl From<&[KeyValue]> for AttributeSet {
    fn from(kvs: &[KeyValue]) -> Self {
        if kvs.is_empty() {
            return AttributeSet::default();
        }
        // stable sort keeps insertion order among equal keys, reverse so
        // that dedup retains the last occurrence.
        let mut inner: Vec<KeyValue> = kvs.iter().rev().cloned().collect();
        inner.sort_by(|a, b| a.key.cmp(&b.key));
        inner.dedup_by(|a, b| a.key.eq(&b.key));

        AttributeSet {
            equivalent: Distinct(inner),
        }
    }
}

impl AttributeSet {
    /// Build a set from an already canonical `Distinct`.
    pub fn with_equivalent(equivalent: Distinct) -> Self {
        AttributeSet { equivalent }
    }

    /// The canonical form of this set.
    pub fn equivalent(&self) -> &Distinct {
        &self.equivalent
    }

    /// Is this set empty?
    pub fn is_empty(&self) -> bool {
        self.equivalent.is_empty()
    }

    /// Number of attributes in this set.
    pub fn len(&self) -> usize {
        self.equivalent.0.len()
    }

    /// Iterate over the attributes in key order.
    pub fn iter(&self) -> Iter<'_> {
        self.into_iter()
    }
}

impl fmt::Display for AttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, kv) in self.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", kv.key, kv.value)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a AttributeSet {
    type Item = &'a KeyValue;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        Iter(self.equivalent.0.iter())
    }
}

/// An iterator over the entries of an `AttributeSet`.
#[derive(Debug)]
pub struct Iter<'a>(std::slice::Iter<'a, KeyValue>);

impl<'a> Iterator for Iter<'a> {
    type Item = &'a KeyValue;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}

/// Distinct wraps a variable-size array of `KeyValue`, constructed with keys
/// in sorted order. This can be used as a map key or for equality checking
/// between sets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Distinct(Vec<KeyValue>);

impl Distinct {
    /// Is this set empty?
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[KeyValue]> for Distinct {
    fn from(kvs: &[KeyValue]) -> Self {
        AttributeSet::from(kvs).equivalent
    }
}

impl Eq for Distinct {}

impl Hash for Distinct {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for kv in self.0.iter() {
            kv.key.hash(state);

            match &kv.value {
                Value::Bool(b) => b.hash(state),
                Value::I64(i) => i.hash(state),
                Value::U64(u) => u.hash(state),
                // f64 is not `Hash`, equal bit patterns hash equally which is
                // consistent with `PartialEq` for everything except NaN.
                Value::F64(f) => f.to_bits().hash(state),
                Value::String(s) => s.hash(state),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_and_last_write_wins() {
        let set = AttributeSet::from(
            &[
                KeyValue::new("b", 1i64),
                KeyValue::new("a", "first"),
                KeyValue::new("a", "second"),
            ][..],
        );

        let keys: Vec<&str> = set.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(set.to_string(), "a=second,b=1");
    }

    #[test]
    fn order_does_not_affect_equivalence() {
        let left = AttributeSet::from(&[KeyValue::new("x", 1i64), KeyValue::new("y", 2i64)][..]);
        let right = AttributeSet::from(&[KeyValue::new("y", 2i64), KeyValue::new("x", 1i64)][..]);
        assert_eq!(left, right);
        assert_eq!(left.equivalent(), right.equivalent());
    }

    #[test]
    fn empty_set() {
        let set = AttributeSet::from(&[][..]);
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        assert_eq!(set.to_string(), "");
    }
}
