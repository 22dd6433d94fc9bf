//! Fixed-length embedding vectors.
//!
//! [`Vector`] wraps an ordered sequence of `f32` values with the arithmetic
//! needed for similarity computations and the codec used by the store:
//! a bracketed decimal literal for the engine's vector-literal syntax, and
//! packed little-endian IEEE-754 bytes for the storage path.

use crate::{Error, Result};
use std::fmt;

/// A fixed-length sequence of 32-bit floats produced by an embedding model.
///
/// Operations are pure and never mutate their operands.
///
/// # Equality
///
/// Equality is bitwise-exact per element (`f32::to_bits`). The store's byte
/// codec round-trips bits exactly, so an inserted vector compares equal to
/// the vector read back. `NaN` payloads compare equal to themselves and
/// `0.0 != -0.0`, unlike IEEE comparison.
#[derive(Debug, Clone, Default)]
pub struct Vector {
    values: Vec<f32>,
}

impl Vector {
    /// Creates a vector from its element values.
    #[must_use]
    pub const fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Returns the number of elements (the embedding dimensionality).
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the vector has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the element values.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Element-wise sum.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] unless both operands have the
    /// same non-zero length.
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.check_same_dimension(other)?;
        Ok(Self::new(
            self.values
                .iter()
                .zip(&other.values)
                .map(|(a, b)| a + b)
                .collect(),
        ))
    }

    /// Element-wise difference.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] unless both operands have the
    /// same non-zero length.
    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.check_same_dimension(other)?;
        Ok(Self::new(
            self.values
                .iter()
                .zip(&other.values)
                .map(|(a, b)| a - b)
                .collect(),
        ))
    }

    /// Euclidean (L2) norm. The empty vector has norm `0.0`.
    #[must_use]
    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Renders the vector as a bracketed literal accepted by sqlite-vec,
    /// e.g. `[0.000,1.000,-1.000]`.
    ///
    /// Three decimal digits per element, comma-joined, no whitespace. This
    /// is a display form; the storage path uses [`Self::to_le_bytes`].
    #[must_use]
    pub fn to_literal(&self) -> String {
        let mut out = String::with_capacity(self.values.len() * 8 + 2);
        out.push('[');
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&format!("{v:.3}"));
        }
        out.push(']');
        out
    }

    /// Packs the vector into little-endian IEEE-754 bytes, 4 per element.
    ///
    /// This is the canonical storage encoding: the blob written on insert
    /// is byte-identical to the blob read back, so round trips preserve
    /// every bit.
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Decodes a packed little-endian f32 blob.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DecodeFailure`] if the blob length is not a
    /// multiple of 4 bytes.
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 4 != 0 {
            return Err(Error::DecodeFailure {
                cause: format!("blob length {} is not a multiple of 4", bytes.len()),
            });
        }
        let values = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok(Self { values })
    }

    fn check_same_dimension(&self, other: &Self) -> Result<()> {
        if self.values.is_empty() || self.values.len() != other.values.len() {
            return Err(Error::DimensionMismatch {
                left: self.values.len(),
                right: other.values.len(),
            });
        }
        Ok(())
    }
}

impl PartialEq for Vector {
    fn eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for Vector {}

impl From<Vec<f32>> for Vector {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_literal())
    }
}
