//! Multi-dimensional position in the image volume.
//!
//! Dimensions 0 and 1 are the in-plane axes, 2 is usually the slice axis
//! and 3 onward are extra dimensions (time frame, ...).

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    values: SmallVec<[i64; 4]>,
}

impl Position {
    pub fn new(values: &[i64]) -> Self {
        Self {
            values: SmallVec::from_slice(values),
        }
    }

    /// A position of `len` dimensions, all zero.
    pub fn zeros(len: usize) -> Self {
        Self {
            values: SmallVec::from_elem(0, len),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, dim: usize) -> Option<i64> {
        self.values.get(dim).copied()
    }

    /// Set a dimension, growing the position with zeros if needed.
    pub fn set(&mut self, dim: usize, value: i64) {
        if dim >= self.values.len() {
            self.values.resize(dim + 1, 0);
        }
        self.values[dim] = value;
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_all_dimensions() {
        assert_eq!(Position::new(&[0, 0, 3, 1]).to_string(), "(0,0,3,1)");
        assert_eq!(Position::default().to_string(), "()");
    }

    #[test]
    fn set_grows_with_zeros() {
        let mut p = Position::zeros(3);
        p.set(5, 7);
        assert_eq!(p.values(), &[0, 0, 0, 0, 0, 7]);
        assert_eq!(p.get(2), Some(0));
        assert_eq!(p.get(9), None);
    }
}
