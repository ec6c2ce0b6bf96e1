//! Binary vector type for the SDM engine.
//!
//! Addresses, queries, and stored patterns are fixed-length binary vectors.
//! Bits are stored one byte per bit (0 or 1) so Hamming scans stay simple
//! byte loops over at most a few hundred elements.

use rand::seq::index;
use rand::Rng;

/// A fixed-length binary vector with elements in {0, 1}.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitVector {
    bits: Vec<u8>,
}

impl BitVector {
    /// Create a zero vector of the given dimensionality.
    pub fn zeros(dimensions: usize) -> Self {
        Self {
            bits: vec![0; dimensions],
        }
    }

    /// Create a vector from raw bits. Values other than 0 are treated as 1.
    pub fn from_bits(bits: Vec<u8>) -> Self {
        let bits = bits.into_iter().map(|b| (b != 0) as u8).collect();
        Self { bits }
    }

    /// Create a vector with one-bits at the given positions.
    ///
    /// # Panics
    /// Panics if any position is out of range.
    pub fn from_positions(dimensions: usize, positions: &[usize]) -> Self {
        let mut bits = vec![0u8; dimensions];
        for &p in positions {
            bits[p] = 1;
        }
        Self { bits }
    }

    /// Draw a random sparse vector with exactly `⌊dimensions · sparsity⌋`
    /// one-bits, chosen uniformly without replacement.
    pub fn random_sparse<R: Rng + ?Sized>(
        dimensions: usize,
        sparsity: f32,
        rng: &mut R,
    ) -> Self {
        let num_ones = ((dimensions as f32 * sparsity) as usize).min(dimensions);
        let mut bits = vec![0u8; dimensions];
        for i in index::sample(rng, dimensions, num_ones) {
            bits[i] = 1;
        }
        Self { bits }
    }

    /// Get the dimensionality.
    pub fn dimensions(&self) -> usize {
        self.bits.len()
    }

    /// Get the raw bits as a slice.
    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    /// Get one bit.
    pub fn get(&self, index: usize) -> u8 {
        self.bits[index]
    }

    /// Set one bit.
    pub fn set(&mut self, index: usize, value: bool) {
        self.bits[index] = value as u8;
    }

    /// Count the one-bits.
    pub fn count_ones(&self) -> usize {
        self.bits.iter().filter(|&&b| b != 0).count()
    }

    /// Hamming distance to another vector.
    ///
    /// # Panics
    /// Panics if dimensions differ; length checks belong to the caller.
    pub fn hamming(&self, other: &BitVector) -> usize {
        hamming_bits(&self.bits, other.bits())
    }

    /// Number of positions where the two vectors agree.
    pub fn agreement(&self, other: &BitVector) -> usize {
        assert_eq!(
            self.dimensions(),
            other.dimensions(),
            "Dimension mismatch in agreement"
        );
        self.bits
            .iter()
            .zip(other.bits())
            .filter(|(&a, &b)| a == b)
            .count()
    }
}

/// Hamming distance between two equal-length bit slices.
pub fn hamming_bits(a: &[u8], b: &[u8]) -> usize {
    assert_eq!(a.len(), b.len(), "Dimension mismatch in hamming");
    a.iter().zip(b).filter(|(&x, &y)| x != y).count()
}
