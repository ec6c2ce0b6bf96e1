//! Store configuration and runtime statistics.

use serde::{Deserialize, Serialize};

/// Immutable description of one store instance.
///
/// A store samples `num_locations` random addresses of `vector_dim` bits,
/// each carrying `⌊vector_dim · sparsity⌋` one-bits, and activates every
/// location within Hamming distance `access_radius` of an input.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SdmConfig {
    /// Bit-vector dimensionality D
    pub vector_dim: u16,
    /// Number of hard locations N
    pub num_locations: u16,
    /// Activation radius R in Hamming distance
    pub access_radius: u16,
    /// Target fraction of one-bits in generated addresses
    pub sparsity: f32,
}

impl Default for SdmConfig {
    fn default() -> Self {
        Self {
            vector_dim: 128,
            num_locations: 1000,
            access_radius: 20,
            sparsity: 0.03,
        }
    }
}

impl SdmConfig {
    /// Dimension as a usize for indexing.
    pub fn dim(&self) -> usize {
        self.vector_dim as usize
    }

    /// Location count as a usize for indexing.
    pub fn locations(&self) -> usize {
        self.num_locations as usize
    }

    /// Number of one-bits in a generated sparse vector: `⌊D · s⌋`.
    pub fn num_ones(&self) -> usize {
        (self.vector_dim as f32 * self.sparsity) as usize
    }

    /// Estimated resident footprint in bytes: address bits, 2-byte
    /// counters, and 2-byte access counts.
    pub fn estimated_bytes(&self) -> u64 {
        let n = self.num_locations as u64;
        let d = self.vector_dim as u64;
        n * d * 3 + n * 2
    }
}

/// Cumulative usage statistics for one store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SdmStats {
    pub total_writes: u32,
    pub total_reads: u32,
    pub last_confidence: f32,
    pub last_activated_locations: u16,
    pub avg_match_ratio: f32,
}
