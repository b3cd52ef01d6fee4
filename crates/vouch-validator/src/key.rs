//! Composite keys extracted from rows.

use std::fmt;

use crate::error::ValidatorError;
use crate::interner::{Component, Interner};

/// An ordered tuple of interned byte-string components.
///
/// Equality is component-wise byte equality. Ordering is lexicographic over
/// components, for any arity, with a shorter key ordering before a longer
/// key it is a prefix of.
///
/// Keys that do not apply to a row (an undeclared optional foreign key) are
/// represented as `Option::<Key>::None`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Box<[Component]>);

impl Key {
    pub fn new(components: impl IntoIterator<Item = Component>) -> Self {
        Self(components.into_iter().collect())
    }

    /// Builds a key from the given columns of a row, interning each value.
    ///
    /// # Examples
    ///
    /// ```
    /// # use vouch_validator::{Interner, Key};
    /// let interner = Interner::new();
    /// let row: Vec<&[u8]> = vec![&b"AN1"[..], &b"SA1"[..], &b"GRCh37"[..]];
    /// let key = Key::from_row(&row, &[1, 0], 2, &interner).unwrap();
    /// assert_eq!(key.to_strings(), vec!["SA1", "AN1"]);
    /// ```
    pub fn from_row(
        row: &[&[u8]],
        indices: &[usize],
        line: u64,
        interner: &Interner,
    ) -> Result<Self, ValidatorError> {
        indices
            .iter()
            .map(|&index| {
                row.get(index)
                    .map(|value| interner.intern(value))
                    .ok_or(ValidatorError::MalformedRow {
                        line,
                        index,
                        len: row.len(),
                    })
            })
            .collect::<Result<Box<[Component]>, _>>()
            .map(Key)
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn component(&self, index: usize) -> Option<&Component> {
        self.0.get(index)
    }

    pub fn components(&self) -> impl Iterator<Item = &[u8]> {
        self.0.iter().map(|component| &**component)
    }

    /// Lossy UTF-8 rendering of each component, for reports.
    pub fn to_strings(&self) -> Vec<String> {
        self.components()
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect()
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.to_strings()).finish()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.to_strings().join(", "))
    }
}
