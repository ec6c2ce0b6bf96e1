//! # sdm: Embedded-Class Sparse Distributed Memory
//!
//! `sdm` is an associative memory engine that stores and retrieves binary
//! sparse vectors by content similarity rather than exact address. A query
//! returns the vector most consistent with everything previously written
//! near it in Hamming space, together with a confidence score. The engine
//! targets tight RAM budgets and persists its state to a block-oriented
//! store so learning survives restarts.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sdm::Sdm;
//!
//! // Open the engine over a mounted block device
//! let mut engine = Sdm::open("/mnt/sd");
//! engine.initialize()?;
//!
//! // Lift a domain value into bit-vector space and learn it
//! let pattern = engine.encoder().encode_text("HELLO");
//! engine.write(&pattern, 5)?;
//!
//! // Recall by content, even from a noisy query
//! let (recalled, confidence) = engine.read(&pattern)?;
//! println!("confidence {:.1}, {} bits", confidence, recalled.count_ones());
//! # Ok::<(), sdm::SdmError>(())
//! ```
//!
//! ## Core Concepts
//!
//! - **Hard locations**: N fixed random D-bit addresses, the quantum of
//!   storage
//! - **Activation**: a location participates in a write or read when its
//!   address lies within Hamming radius R of the input
//! - **Counters**: N×D signed saturating counters accumulating majority
//!   votes across overlapping writes
//! - **Confidence**: the maximum absolute distance-weighted mean across
//!   bit positions during a read
//!
//! The [`Benchmark`] sweeps (dimension, capacity, radius) under a live
//! memory ceiling and persists the best configuration for the next boot.

pub mod benchmark;
pub mod config;
pub mod encoder;
pub mod error;
pub mod persistence;
pub mod store;
pub mod vector;

// Re-exports for convenience
pub use benchmark::{Benchmark, FixedBudget, MemoryProbe, TrialScore};
pub use config::{SdmConfig, SdmStats};
pub use encoder::{Encoder, Encoding, Value, DEFAULT_SEQUENCE_LENGTH};
pub use error::{Result, SdmError};
pub use persistence::{
    save_common_words_library, save_numbers_library, LibraryInfo, Storage,
    DEFAULT_REINFORCEMENT,
};
pub use store::SparseMemory;
pub use vector::BitVector;

use tracing::{debug, warn};

/// The host-facing engine handle: one store, one encoder, one storage root.
///
/// Wires the full lifecycle together: configuration is loaded from the
/// device (or supplied), [`initialize`](Sdm::initialize) samples the hard
/// locations and merges any persisted counters, then writes and reads
/// interleave freely. State is flushed on [`save`](Sdm::save) and
/// best-effort at drop.
pub struct Sdm {
    store: SparseMemory,
    encoder: Encoder,
    storage: Storage,
}

impl Sdm {
    /// Open an engine over a storage root, preferring the persisted
    /// configuration and falling back to defaults.
    pub fn open(root: impl Into<std::path::PathBuf>) -> Self {
        let storage = Storage::new(root);
        let mut config = SdmConfig::default();
        storage.load_config(&mut config);
        Self::assemble(storage, config)
    }

    /// Open an engine with an explicit configuration, ignoring any
    /// persisted one.
    pub fn with_config(root: impl Into<std::path::PathBuf>, config: SdmConfig) -> Self {
        Self::assemble(Storage::new(root), config)
    }

    fn assemble(storage: Storage, config: SdmConfig) -> Self {
        let store = SparseMemory::new(config);
        let encoder = Encoder::new(config.dim());
        Self {
            store,
            encoder,
            storage,
        }
    }

    /// Sample hard locations, zero counters, and merge persisted state.
    ///
    /// A missing state file starts fresh; a rejected one (shape mismatch,
    /// truncation) is logged and also starts fresh. Only allocation
    /// failure is surfaced.
    pub fn initialize(&mut self) -> Result<()> {
        self.store.initialize()?;
        match self.storage.load_state(&mut self.store) {
            Ok(true) => {}
            Ok(false) => debug!("no persisted state, starting fresh"),
            Err(error) => warn!(%error, "persisted state rejected, starting fresh"),
        }
        Ok(())
    }

    /// The active configuration.
    pub fn config(&self) -> &SdmConfig {
        self.store.config()
    }

    /// Cumulative usage statistics.
    pub fn stats(&self) -> &SdmStats {
        self.store.stats()
    }

    /// Zero the statistics record.
    pub fn reset_stats(&mut self) {
        self.store.reset_stats();
    }

    /// The encoder matched to this engine's dimensionality.
    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    /// Read access to the underlying store.
    pub fn store(&self) -> &SparseMemory {
        &self.store
    }

    /// Mutable access to the underlying store.
    pub fn store_mut(&mut self) -> &mut SparseMemory {
        &mut self.store
    }

    /// Write a vector. See [`SparseMemory::write`].
    pub fn write(&mut self, input: &BitVector, strength: u8) -> Result<u16> {
        self.store.write(input, strength)
    }

    /// Read by content. See [`SparseMemory::read`].
    pub fn read(&mut self, query: &BitVector) -> Result<(BitVector, f32)> {
        self.store.read(query)
    }

    /// Merge a named library into the store at the default reinforcement.
    pub fn merge_library(&mut self, name: &str) -> Result<usize> {
        self.storage
            .merge_library(name, &mut self.store, DEFAULT_REINFORCEMENT)
    }

    /// Export the store's frequently activated patterns as a named
    /// library.
    pub fn export_library(&self, name: &str) -> Result<LibraryInfo> {
        let (vectors, labels) = self.store.export_patterns(5);
        self.storage.save_library(name, &vectors, Some(&labels))
    }

    /// Names of libraries present on the device.
    pub fn list_libraries(&self) -> Vec<String> {
        self.storage.list_libraries()
    }

    /// Flush configuration, counters, and statistics to the device.
    pub fn save(&self) -> Result<()> {
        self.storage.save_config(self.store.config())?;
        if self.store.is_initialized() {
            self.storage.save_state(&self.store)?;
        }
        self.storage.save_stats(self.store.stats())
    }
}

impl Drop for Sdm {
    fn drop(&mut self) {
        if self.store.is_initialized() {
            if let Err(error) = self.save() {
                warn!(%error, "failed to persist state at teardown");
            }
        }
    }
}
