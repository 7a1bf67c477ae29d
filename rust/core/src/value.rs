// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parameter values of a STEP entity

/// A single entity parameter
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Value {
    /// Integer: 42
    Integer(i64),
    /// Real: 3.14, 0., 1.5E-10
    Real(f64),
    /// String literal with `''` escapes collapsed
    String(String),
    /// Entity reference: #123
    EntityRef(u64),
    /// Nested list: (1, (2, 3))
    List(Vec<Value>),
    /// Enumeration: .ELEMENT., .T.
    Enum(String),
    /// Typed value: IFCLENGTHMEASURE(0.3048)
    Typed(String, Vec<Value>),
    /// Omitted value: $
    Omitted,
    /// Derived value: *
    Derived,
}

impl Value {
    #[inline]
    pub fn as_entity_ref(&self) -> Option<u64> {
        match self {
            Value::EntityRef(id) => Some(*id),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric value; integers widen to `f64` and single-argument typed
    /// measures are unwrapped.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            Value::Typed(_, args) if args.len() == 1 => args[0].as_f64(),
            _ => None,
        }
    }

    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// `.T.` / `.F.` enumerations
    pub fn as_bool(&self) -> Option<bool> {
        match self.as_enum()? {
            "T" | "TRUE" => Some(true),
            "F" | "FALSE" => Some(false),
            _ => None,
        }
    }

    #[inline]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// `$` or `*`
    #[inline]
    pub fn is_omitted(&self) -> bool {
        matches!(self, Value::Omitted | Value::Derived)
    }

    /// Visit every entity reference, including those nested in lists and
    /// typed values.
    pub fn for_each_ref(&self, f: &mut impl FnMut(u64)) {
        match self {
            Value::EntityRef(id) => f(*id),
            Value::List(items) | Value::Typed(_, items) => {
                for item in items {
                    item.for_each_ref(f);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_accessors() {
        assert_eq!(Value::Integer(3).as_f64(), Some(3.0));
        assert_eq!(Value::Real(0.5).as_f64(), Some(0.5));
        let measure = Value::Typed("IFCLENGTHMEASURE".into(), vec![Value::Real(0.3048)]);
        assert_eq!(measure.as_f64(), Some(0.3048));
        assert_eq!(Value::String("1".into()).as_f64(), None);
    }

    #[test]
    fn test_bool_enum() {
        assert_eq!(Value::Enum("T".into()).as_bool(), Some(true));
        assert_eq!(Value::Enum("F".into()).as_bool(), Some(false));
        assert_eq!(Value::Enum("ELEMENT".into()).as_bool(), None);
    }

    #[test]
    fn test_for_each_ref_walks_nested_lists() {
        let value = Value::List(vec![
            Value::EntityRef(4),
            Value::List(vec![Value::EntityRef(5), Value::Integer(1)]),
            Value::Typed("X".into(), vec![Value::EntityRef(6)]),
        ]);
        let mut refs = Vec::new();
        value.for_each_ref(&mut |id| refs.push(id));
        assert_eq!(refs, vec![4, 5, 6]);
    }
}
