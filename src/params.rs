//! Named field lookup on configuration aggregates.
//!
//! Hosts hand configuration over as a flat C struct. To inspect it by name at runtime
//! (for testing or for diagnostics), every aggregate type registers a [`FieldTable`]: an
//! explicit list of field names with an accessor per field. The table is built once per
//! type through the [`Introspect`] trait.
//!
//! # Example
//!
//! ```
//! use std::sync::OnceLock;
//! use hostfuncs::params::{lookup_double, lookup_int_list, FieldTable, Introspect};
//!
//! struct Settings { a: f64, n: i32, m: i32 }
//!
//! impl Introspect for Settings {
//!     fn field_table() -> &'static FieldTable<Self> {
//!         static TABLE: OnceLock<FieldTable<Settings>> = OnceLock::new();
//!         TABLE.get_or_init(|| {
//!             FieldTable::<Self>::builder()
//!                 .double("a", |s| s.a)
//!                 .int("n", |s| s.n)
//!                 .int("m", |s| s.m)
//!                 .build()
//!         })
//!     }
//! }
//!
//! let s = Settings { a: 3.5, n: 1, m: 2 };
//! assert_eq!(lookup_double(&s, "a").unwrap(), 3.5);
//! assert_eq!(
//!     lookup_int_list(&s, "n|m").unwrap(),
//!     vec![("n".to_string(), 1), ("m".to_string(), 2)]
//! );
//! ```

use std::collections::HashMap;

use itertools::Itertools;

use crate::errors::ParamError;

/// Separator of field names in a field list string.
pub const FIELD_DELIMITER: char = '|';

/// Accessor for a single registered field.
pub enum Accessor<T> {
    Double(fn(&T) -> f64),
    Int(fn(&T) -> i32),
}

impl<T> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Accessor<T> {}

impl<T> std::fmt::Debug for Accessor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Accessor::Double(_) => write!(f, "Double"),
            Accessor::Int(_) => write!(f, "Int"),
        }
    }
}

/// Field name → accessor registry for aggregate type `T`.
pub struct FieldTable<T> {
    order: Vec<&'static str>,
    fields: HashMap<&'static str, Accessor<T>>,
}

impl<T> std::fmt::Debug for FieldTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.order.iter().map(|name| (name, &self.fields[name])))
            .finish()
    }
}

impl<T> FieldTable<T> {
    pub fn builder() -> FieldTableBuilder<T> {
        FieldTableBuilder {
            table: FieldTable {
                order: Vec::new(),
                fields: HashMap::new(),
            },
        }
    }

    /// Registered names in registration order.
    pub fn names(&self) -> &[&'static str] {
        &self.order
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn accessor(&self, name: &str) -> Result<Accessor<T>, ParamError> {
        self.fields
            .get(name)
            .copied()
            .ok_or_else(|| ParamError::UnknownField {
                name: name.to_string(),
                known: self.order.iter().join(", "),
            })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Builder for [`FieldTable`]. Registering a name twice replaces the accessor.
pub struct FieldTableBuilder<T> {
    table: FieldTable<T>,
}

impl<T> FieldTableBuilder<T> {
    pub fn double(self, name: &'static str, get: fn(&T) -> f64) -> Self {
        self.register(name, Accessor::Double(get))
    }

    pub fn int(self, name: &'static str, get: fn(&T) -> i32) -> Self {
        self.register(name, Accessor::Int(get))
    }

    fn register(mut self, name: &'static str, accessor: Accessor<T>) -> Self {
        if self.table.fields.insert(name, accessor).is_none() {
            self.table.order.push(name);
        }
        self
    }

    pub fn build(self) -> FieldTable<T> {
        self.table
    }
}

/// Aggregates whose fields can be looked up by name.
pub trait Introspect: Sized + 'static {
    fn field_table() -> &'static FieldTable<Self>;
}

/// Resolves `name` to a floating point value.
///
/// Integer fields are widened to `f64`, which is exact for every `i32`.
///
/// # Errors
/// Returns [`ParamError::UnknownField`] if `name` is not registered.
pub fn lookup_double<T: Introspect>(aggregate: &T, name: &str) -> Result<f64, ParamError> {
    match T::field_table().accessor(name)? {
        Accessor::Double(get) => Ok(get(aggregate)),
        Accessor::Int(get) => Ok(f64::from(get(aggregate))),
    }
}

/// Resolves `name` to an integer value.
///
/// # Errors
/// Returns [`ParamError::UnknownField`] if `name` is not registered and
/// [`ParamError::FieldTypeMismatch`] if it names a floating point field.
pub fn lookup_int<T: Introspect>(aggregate: &T, name: &str) -> Result<i32, ParamError> {
    match T::field_table().accessor(name)? {
        Accessor::Int(get) => Ok(get(aggregate)),
        Accessor::Double(_) => Err(ParamError::FieldTypeMismatch {
            name: name.to_string(),
            expected: "int",
        }),
    }
}

/// Splits a `|`-delimited field list, skipping empty segments.
pub fn split_field_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(FIELD_DELIMITER).filter(|name| !name.is_empty())
}

/// Looks up every field of a `|`-delimited list as an integer, left to right.
///
/// # Errors
/// Stops at the first field that fails [`lookup_int`].
pub fn lookup_int_list<T: Introspect>(
    aggregate: &T,
    list: &str,
) -> Result<Vec<(String, i32)>, ParamError> {
    split_field_list(list)
        .map(|name| Ok((name.to_string(), lookup_int(aggregate, name)?)))
        .collect()
}

/// Literal substring test: does `needle` occur anywhere in `haystack`?
///
/// This is the legacy "is this field plausibly in the list" check. It reports partial
/// names as present (`"ab"` is found in `"xaby"`); use [`contains_field`] for exact
/// membership.
pub fn contains_substring(needle: &str, haystack: &str) -> bool {
    haystack.contains(needle)
}

/// Exact membership of `name` in a `|`-delimited field list.
pub fn contains_field(name: &str, list: &str) -> bool {
    split_field_list(list).any(|field| field == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    struct Sample {
        a: i32,
        b: i32,
        c: i32,
        x: f64,
    }

    impl Introspect for Sample {
        fn field_table() -> &'static FieldTable<Self> {
            static TABLE: OnceLock<FieldTable<Sample>> = OnceLock::new();
            TABLE.get_or_init(|| {
                FieldTable::<Self>::builder()
                    .int("a", |s| s.a)
                    .int("b", |s| s.b)
                    .int("c", |s| s.c)
                    .double("x", |s| s.x)
                    .build()
            })
        }
    }

    fn sample() -> Sample {
        Sample {
            a: 1,
            b: 2,
            c: 3,
            x: 3.5,
        }
    }

    #[test]
    fn test_lookup_double() {
        let s = sample();
        assert_eq!(lookup_double(&s, "x").unwrap(), 3.5);
        assert_eq!(lookup_double(&s, "b").unwrap(), 2.0);
    }

    #[test]
    fn test_unknown_field() {
        let s = sample();
        let err = lookup_double(&s, "zzz").unwrap_err();
        assert_eq!(
            err,
            ParamError::UnknownField {
                name: "zzz".to_string(),
                known: "a, b, c, x".to_string()
            }
        );
        assert!(matches!(
            lookup_int(&s, "zzz"),
            Err(ParamError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_lookup_int_rejects_double_field() {
        let s = sample();
        assert_eq!(
            lookup_int(&s, "x"),
            Err(ParamError::FieldTypeMismatch {
                name: "x".to_string(),
                expected: "int"
            })
        );
    }

    #[test]
    fn test_lookup_int_list() {
        let s = sample();
        assert_eq!(
            lookup_int_list(&s, "a|b|c").unwrap(),
            vec![
                ("a".to_string(), 1),
                ("b".to_string(), 2),
                ("c".to_string(), 3)
            ]
        );
        // strtok collapses empty segments
        assert_eq!(
            lookup_int_list(&s, "|c||a|").unwrap(),
            vec![("c".to_string(), 3), ("a".to_string(), 1)]
        );
        assert!(lookup_int_list(&s, "").unwrap().is_empty());
        assert!(lookup_int_list(&s, "a|nope|c").is_err());
    }

    #[test]
    fn test_contains_substring_is_literal() {
        assert!(contains_substring("ab", "xaby"));
        assert!(!contains_substring("ab", "xaycz"));
        assert!(contains_substring("N", "threads|N"));
    }

    #[test]
    fn test_contains_substring_looks_for_name_in_list() {
        assert!(contains_substring("a", "threads|N"));
        assert!(!contains_substring("threads|N", "a"));
    }

    #[test]
    fn test_contains_field_is_delimiter_aware() {
        assert!(!contains_field("ab", "xaby|c"));
        assert!(contains_field("c", "xaby|c"));
        assert!(contains_field("a", "a|b"));
        assert!(!contains_field("", "a||b"));
    }

    #[test]
    fn test_table_order_and_duplicates() {
        let table: FieldTable<Sample> = FieldTable::<Sample>::builder()
            .int("a", |s| s.a)
            .double("x", |s| s.x)
            .int("a", |s| s.b)
            .build();
        assert_eq!(table.names(), &["a", "x"]);
        assert_eq!(table.len(), 2);
        assert!(table.contains("x"));
        match table.accessor("a").unwrap() {
            Accessor::Int(get) => assert_eq!(get(&sample()), 2),
            Accessor::Double(_) => panic!("expected int accessor"),
        }
    }
}
