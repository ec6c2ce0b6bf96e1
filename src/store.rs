//! Sparse Distributed Memory store: hard locations and signed counters.
//!
//! A store owns N fixed random D-bit addresses (the hard locations), an
//! N×D matrix of signed saturating counters, and per-location access
//! counts. Writing a vector reinforces the counters of every location
//! within the access radius; reading takes a distance-weighted majority
//! vote across the activated locations.
//!
//! # Key Insight
//!
//! Nearby queries activate overlapping location sets, so a pattern written
//! once is recoverable from any query within the radius: the counters
//! accumulate votes, and the weighted mean per bit position recovers the
//! majority sign even under noise and interference.

use crate::config::{SdmConfig, SdmStats};
use crate::error::{Result, SdmError};
use crate::vector::{hamming_bits, BitVector};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Derive an independent RNG stream seed from a base seed and a label.
///
/// SHA-256 of `(seed || label)`, first 8 bytes little-endian. The same
/// `(seed, label)` pair always yields the same stream.
pub(crate) fn derive_stream_seed(seed: u64, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(label.as_bytes());
    let hash = hasher.finalize();
    u64::from_le_bytes(hash[0..8].try_into().unwrap())
}

/// A sparse distributed memory over binary vectors.
///
/// Constructed from an [`SdmConfig`], populated by [`initialize`]
/// (address sampling and counter allocation), then mutated by [`write`]
/// and queried by [`read`] in any interleaving.
///
/// [`initialize`]: SparseMemory::initialize
/// [`write`]: SparseMemory::write
/// [`read`]: SparseMemory::read
pub struct SparseMemory {
    config: SdmConfig,
    /// Hard location addresses, row-major N×D, one byte per bit
    addresses: Vec<u8>,
    /// Signed counters, row-major N×D
    counters: Vec<i16>,
    /// Per-location activation counts
    access_counts: Vec<u16>,
    stats: SdmStats,
    rng: ChaCha8Rng,
}

impl SparseMemory {
    /// Create a store with entropy-seeded address sampling.
    ///
    /// Nothing is allocated until [`initialize`](SparseMemory::initialize).
    pub fn new(config: SdmConfig) -> Self {
        Self::with_rng(config, ChaCha8Rng::from_entropy())
    }

    /// Create a store whose address sampling is reproducible from `seed`.
    pub fn with_seed(config: SdmConfig, seed: u64) -> Self {
        let stream = derive_stream_seed(seed, "addresses");
        Self::with_rng(config, ChaCha8Rng::seed_from_u64(stream))
    }

    fn with_rng(config: SdmConfig, rng: ChaCha8Rng) -> Self {
        Self {
            config,
            addresses: Vec::new(),
            counters: Vec::new(),
            access_counts: Vec::new(),
            stats: SdmStats::default(),
            rng,
        }
    }

    /// Sample the hard locations and zero all counters.
    ///
    /// Allocation is fallible: an oversized configuration returns
    /// [`SdmError::Allocation`] and leaves the store unusable but intact,
    /// so callers (the benchmark sweeps in particular) can skip the
    /// configuration and continue.
    pub fn initialize(&mut self) -> Result<()> {
        let n = self.config.locations();
        let d = self.config.dim();

        let mut addresses: Vec<u8> = Vec::new();
        addresses.try_reserve_exact(n * d)?;
        let mut counters: Vec<i16> = Vec::new();
        counters.try_reserve_exact(n * d)?;
        let mut access_counts: Vec<u16> = Vec::new();
        access_counts.try_reserve_exact(n)?;

        for _ in 0..n {
            let address = BitVector::random_sparse(d, self.config.sparsity, &mut self.rng);
            addresses.extend_from_slice(address.bits());
        }
        counters.resize(n * d, 0);
        access_counts.resize(n, 0);

        self.addresses = addresses;
        self.counters = counters;
        self.access_counts = access_counts;
        self.stats = SdmStats::default();

        info!(
            locations = n,
            dimensions = d,
            footprint_bytes = self.config.estimated_bytes(),
            "sparse memory initialized"
        );
        Ok(())
    }

    /// Whether [`initialize`](SparseMemory::initialize) has run.
    pub fn is_initialized(&self) -> bool {
        !self.addresses.is_empty()
    }

    /// The configuration this store was built from.
    pub fn config(&self) -> &SdmConfig {
        &self.config
    }

    /// Cumulative usage statistics.
    pub fn stats(&self) -> &SdmStats {
        &self.stats
    }

    /// Zero the statistics record.
    pub fn reset_stats(&mut self) {
        self.stats = SdmStats::default();
    }

    /// Record a benchmark match ratio in the statistics slot.
    pub fn record_match_ratio(&mut self, ratio: f32) {
        self.stats.avg_match_ratio = ratio;
    }

    /// Per-location activation counts.
    pub fn access_counts(&self) -> &[u16] {
        &self.access_counts
    }

    /// The counter matrix, row-major N×D.
    pub fn counters(&self) -> &[i16] {
        &self.counters
    }

    /// Address bits of location `index`.
    pub fn address(&self, index: usize) -> &[u8] {
        let d = self.config.dim();
        &self.addresses[index * d..(index + 1) * d]
    }

    /// Replace counters and access counts with persisted values.
    ///
    /// Callers must have validated shapes already; this is the final step
    /// of a state load and must not be reachable with mismatched lengths.
    pub(crate) fn restore_state(&mut self, access_counts: Vec<u16>, counters: Vec<i16>) {
        debug_assert_eq!(access_counts.len(), self.config.locations());
        debug_assert_eq!(counters.len(), self.config.locations() * self.config.dim());
        self.access_counts = access_counts;
        self.counters = counters;
    }

    fn check_dimensions(&self, vector: &BitVector) -> Result<()> {
        if vector.dimensions() != self.config.dim() {
            return Err(SdmError::DimensionMismatch {
                expected: self.config.dim(),
                got: vector.dimensions(),
            });
        }
        Ok(())
    }

    /// Write a vector into every location within the access radius.
    ///
    /// Each activated location gets its access count incremented and its
    /// counters moved by `strength` toward the input: +strength where the
    /// input bit is 1, −strength where it is 0, saturating at the i16
    /// range. Returns the number of activated locations.
    pub fn write(&mut self, input: &BitVector, strength: u8) -> Result<u16> {
        self.check_dimensions(input)?;

        let n = self.config.locations();
        let d = self.config.dim();
        let radius = self.config.access_radius as usize;
        let step = strength as i16;
        let mut activated: u16 = 0;

        for i in 0..n {
            let distance = hamming_bits(input.bits(), &self.addresses[i * d..(i + 1) * d]);
            if distance > radius {
                continue;
            }
            activated += 1;
            self.access_counts[i] = self.access_counts[i].saturating_add(1);

            let row = &mut self.counters[i * d..(i + 1) * d];
            for (cell, &bit) in row.iter_mut().zip(input.bits()) {
                *cell = if bit == 1 {
                    cell.saturating_add(step)
                } else {
                    cell.saturating_sub(step)
                };
            }
        }

        self.stats.total_writes += 1;
        self.stats.last_activated_locations = activated;
        Ok(activated)
    }

    /// Read the vector most consistent with everything written near `query`.
    ///
    /// Activated locations contribute their counters with weight
    /// `1 / (1 + distance)`; each output bit is 1 where the weighted mean
    /// is positive. The confidence is the maximum absolute weighted mean
    /// across bit positions. A query that activates nothing returns the
    /// zero vector with confidence 0.
    pub fn read(&mut self, query: &BitVector) -> Result<(BitVector, f32)> {
        self.check_dimensions(query)?;

        let n = self.config.locations();
        let d = self.config.dim();
        let radius = self.config.access_radius as usize;

        let mut activated: Vec<(usize, usize)> = Vec::new();
        for i in 0..n {
            let distance = hamming_bits(query.bits(), &self.addresses[i * d..(i + 1) * d]);
            if distance <= radius {
                activated.push((i, distance));
            }
        }

        if activated.is_empty() {
            return Ok((BitVector::zeros(d), 0.0));
        }

        let mut total = vec![0.0f64; d];
        let mut total_weight = 0.0f64;
        for &(i, distance) in &activated {
            let weight = 1.0 / (1.0 + distance as f64);
            total_weight += weight;
            for (sum, &counter) in total.iter_mut().zip(&self.counters[i * d..(i + 1) * d]) {
                *sum += weight * counter as f64;
            }
        }

        let mut output = vec![0u8; d];
        let mut max_confidence = 0.0f64;
        for (j, &sum) in total.iter().enumerate() {
            let mean = sum / total_weight;
            if mean > 0.0 {
                output[j] = 1;
            }
            max_confidence = max_confidence.max(mean.abs());
        }

        self.stats.total_reads += 1;
        self.stats.last_confidence = max_confidence as f32;
        Ok((BitVector::from_bits(output), max_confidence as f32))
    }

    /// Zero the counters and access counts without resampling addresses.
    pub fn clear(&mut self) {
        self.counters.fill(0);
        self.access_counts.fill(0);
        debug!("counter matrix cleared");
    }

    /// Export the sign patterns of frequently activated locations.
    ///
    /// Locations with more than `min_access` activations yield a pattern
    /// with a 1 wherever the counter is positive, labelled
    /// `pattern_{index}_access_{count}`. Suitable for
    /// [`Storage::save_library`](crate::persistence::Storage::save_library).
    pub fn export_patterns(&self, min_access: u16) -> (Vec<BitVector>, Vec<String>) {
        let d = self.config.dim();
        let mut vectors = Vec::new();
        let mut labels = Vec::new();

        for (i, &count) in self.access_counts.iter().enumerate() {
            if count <= min_access {
                continue;
            }
            let bits: Vec<u8> = self.counters[i * d..(i + 1) * d]
                .iter()
                .map(|&c| (c > 0) as u8)
                .collect();
            vectors.push(BitVector::from_bits(bits));
            labels.push(format!("pattern_{}_access_{}", i, count));
        }

        (vectors, labels)
    }

    /// Log the resident footprint of the allocated matrices.
    pub fn log_memory_usage(&self) {
        let n = self.config.locations();
        let d = self.config.dim();
        debug!(
            address_bytes = n * d,
            counter_bytes = n * d * 2,
            access_count_bytes = n * 2,
            total_bytes = self.config.estimated_bytes(),
            "memory usage"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SdmConfig {
        SdmConfig {
            vector_dim: 32,
            num_locations: 100,
            access_radius: 6,
            sparsity: 0.03125,
        }
    }

    fn initialized(config: SdmConfig, seed: u64) -> SparseMemory {
        let mut store = SparseMemory::with_seed(config, seed);
        store.initialize().expect("initialize failed");
        store
    }

    #[test]
    fn test_addresses_have_exact_sparsity() {
        let store = initialized(small_config(), 1);
        let expected = small_config().num_ones();
        for i in 0..store.config().locations() {
            let ones = store.address(i).iter().filter(|&&b| b == 1).count();
            assert_eq!(ones, expected, "location {} has wrong density", i);
        }
    }

    #[test]
    fn test_seeded_stores_sample_identical_addresses() {
        let a = initialized(small_config(), 42);
        let b = initialized(small_config(), 42);
        for i in 0..a.config().locations() {
            assert_eq!(a.address(i), b.address(i));
        }
    }

    #[test]
    fn test_write_rejects_dimension_mismatch() {
        let mut store = initialized(small_config(), 1);
        let wrong = BitVector::zeros(64);
        let err = store.write(&wrong, 1).unwrap_err();
        assert!(matches!(
            err,
            SdmError::DimensionMismatch {
                expected: 32,
                got: 64
            }
        ));
        // Store untouched
        assert_eq!(store.stats().total_writes, 0);
        assert!(store.counters().iter().all(|&c| c == 0));
    }

    #[test]
    fn test_read_rejects_dimension_mismatch() {
        let mut store = initialized(small_config(), 1);
        let wrong = BitVector::zeros(16);
        assert!(store.read(&wrong).is_err());
        assert_eq!(store.stats().total_reads, 0);
    }

    #[test]
    fn test_exact_recall() {
        // Every 1-one address lies within distance 5 of a 4-one vector,
        // so the radius of 6 activates all 100 locations.
        let mut store = initialized(small_config(), 3);
        let v = BitVector::from_positions(32, &[1, 7, 15, 23]);

        for _ in 0..10 {
            let activated = store.write(&v, 5).unwrap();
            assert_eq!(activated, 100);
        }

        let (output, confidence) = store.read(&v).unwrap();
        assert_eq!(output, v);
        assert!(confidence > 0.0);
        assert_eq!(store.stats().total_writes, 10);
        assert_eq!(store.stats().total_reads, 1);
        assert_eq!(store.stats().last_activated_locations, 100);
    }

    #[test]
    fn test_noise_tolerance() {
        let mut store = initialized(small_config(), 4);
        let v = BitVector::from_positions(32, &[1, 7, 15, 23]);
        for _ in 0..10 {
            store.write(&v, 5).unwrap();
        }

        // Flip two of the stored one-bits off
        let noisy = BitVector::from_positions(32, &[15, 23]);
        let (output, _) = store.read(&noisy).unwrap();
        let matches = output.agreement(&v);
        assert!(matches >= 28, "expected >= 28/32 agreement, got {}", matches);
    }

    #[test]
    fn test_read_with_no_activation_returns_zero() {
        let config = SdmConfig {
            access_radius: 0,
            ..small_config()
        };
        let mut store = initialized(config, 5);
        // A 4-one query cannot equal any 1-one address
        let query = BitVector::from_positions(32, &[1, 7, 15, 23]);
        let (output, confidence) = store.read(&query).unwrap();
        assert_eq!(output, BitVector::zeros(32));
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn test_radius_extremes_do_not_panic() {
        let zero = SdmConfig {
            access_radius: 0,
            ..small_config()
        };
        let mut store = initialized(zero, 6);
        let v = BitVector::from_positions(32, &[2, 9]);
        store.write(&v, 1).unwrap();
        store.read(&v).unwrap();

        // R = D activates every location on every call
        let full = SdmConfig {
            access_radius: 32,
            ..small_config()
        };
        let mut store = initialized(full, 6);
        assert_eq!(store.write(&v, 1).unwrap(), 100);
        let (_, confidence) = store.read(&v).unwrap();
        assert!(confidence > 0.0);
    }

    #[test]
    fn test_access_counts_sum_matches_activations() {
        let mut store = initialized(small_config(), 7);
        let mut expected: u64 = 0;
        for positions in [&[1usize, 5, 9, 13][..], &[0, 2, 4, 6], &[3, 11, 19, 27]] {
            let v = BitVector::from_positions(32, positions);
            expected += store.write(&v, 1).unwrap() as u64;
        }
        let total: u64 = store.access_counts().iter().map(|&c| c as u64).sum();
        assert_eq!(total, expected);
    }

    #[test]
    fn test_counters_saturate() {
        let config = SdmConfig {
            vector_dim: 16,
            num_locations: 20,
            access_radius: 16,
            sparsity: 0.125,
        };
        let mut store = initialized(config, 8);
        let v = BitVector::from_positions(16, &[0, 8]);

        // 200 × 255 far exceeds the i16 range in both directions
        for _ in 0..200 {
            store.write(&v, 255).unwrap();
        }
        for i in 0..store.config().locations() {
            let row = &store.counters()[i * 16..(i + 1) * 16];
            assert_eq!(row[0], i16::MAX);
            assert_eq!(row[8], i16::MAX);
            assert_eq!(row[1], i16::MIN);
        }

        // Saturated counters still read back cleanly
        let (output, confidence) = store.read(&v).unwrap();
        assert_eq!(output, v);
        assert!(confidence > 0.0);
    }

    #[test]
    fn test_repeated_write_same_activation_set() {
        let mut store = initialized(small_config(), 9);
        let v = BitVector::from_positions(32, &[4, 12, 20, 28]);
        let first = store.write(&v, 1).unwrap();
        let second = store.write(&v, 1).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reading_twice_is_identical() {
        let mut store = initialized(small_config(), 10);
        let v = BitVector::from_positions(32, &[1, 7, 15, 23]);
        for _ in 0..5 {
            store.write(&v, 2).unwrap();
        }
        let (out1, conf1) = store.read(&v).unwrap();
        let (out2, conf2) = store.read(&v).unwrap();
        assert_eq!(out1, out2);
        assert_eq!(conf1, conf2);
    }

    #[test]
    fn test_reset_stats() {
        let mut store = initialized(small_config(), 11);
        let v = BitVector::from_positions(32, &[1, 7, 15, 23]);
        store.write(&v, 1).unwrap();
        store.read(&v).unwrap();
        assert!(store.stats().total_writes > 0);

        store.reset_stats();
        assert_eq!(*store.stats(), SdmStats::default());
    }

    #[test]
    fn test_clear_keeps_addresses() {
        let mut store = initialized(small_config(), 12);
        let before: Vec<u8> = store.address(0).to_vec();
        let v = BitVector::from_positions(32, &[1, 7, 15, 23]);
        store.write(&v, 3).unwrap();

        store.clear();
        assert!(store.counters().iter().all(|&c| c == 0));
        assert!(store.access_counts().iter().all(|&c| c == 0));
        assert_eq!(store.address(0), &before[..]);
    }

    #[test]
    fn test_export_patterns() {
        let mut store = initialized(small_config(), 13);
        let v = BitVector::from_positions(32, &[1, 7, 15, 23]);
        // Six writes pushes every activated location past the threshold
        for _ in 0..6 {
            store.write(&v, 2).unwrap();
        }

        let (vectors, labels) = store.export_patterns(5);
        assert_eq!(vectors.len(), 100);
        assert_eq!(labels.len(), vectors.len());
        assert!(labels[0].starts_with("pattern_0_access_"));
        // Every exported pattern is the sign of a uniformly written store
        for pattern in &vectors {
            assert_eq!(*pattern, v);
        }

        // Nothing qualifies at a higher threshold
        let (none, _) = store.export_patterns(6);
        assert!(none.is_empty());
    }
}
