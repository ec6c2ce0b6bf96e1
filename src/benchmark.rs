//! Parameter sweeps that search the configuration space under a live
//! memory ceiling.
//!
//! Three sweeps are provided: *quick* (coarse grid, fast), *comprehensive*
//! (full grid, hours on a slow host), and *memory-constraint* (probes how
//! large a store the host can hold). Each sweep instantiates a fresh store
//! per grid point, measures self-recall fidelity, appends one CSV row per
//! point (flushed immediately so crashes preserve progress), and persists
//! the winning configuration.
//!
//! # Self-recall fidelity
//!
//! A trial draws a fresh random sparse vector, writes it ten times at unit
//! strength, reads it back, and scores the fraction of agreeing bit
//! positions. The point's score is the mean over its trials. Trials share
//! one store, so later trials run against the interference of earlier
//! ones.

use crate::config::SdmConfig;
use crate::error::Result;
use crate::persistence::Storage;
use crate::store::{derive_stream_seed, SparseMemory};
use crate::vector::BitVector;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fs::File;
use std::io::Write;
use std::time::Instant;
use tracing::{debug, info, warn};

const QUICK_RESULTS_FILE: &str = "sdm_benchmark_results.csv";
const COMPREHENSIVE_RESULTS_FILE: &str = "sdm_comprehensive_benchmark.csv";
const MEMORY_RESULTS_FILE: &str = "sdm_memory_test.csv";

/// Free-memory floors, in bytes. Sweeps stop or skip rather than dip
/// below these.
const QUICK_MEMORY_FLOOR: u64 = 50_000;
const COMPREHENSIVE_MEMORY_FLOOR: u64 = 100_000;
const MEMORY_SWEEP_FLOOR: u64 = 50_000;
const MEMORY_SWEEP_STOP: u64 = 30_000;

/// Default free-memory envelope reported by [`FixedBudget`]: the typical
/// free heap of the embedded host this engine targets.
pub const DEFAULT_FREE_BYTES: u64 = 320 * 1024;

/// Writes per self-recall trial.
const RECALL_WRITES: u32 = 10;

/// Source of live free-memory readings.
///
/// The engine cannot portably observe the host heap, so the benchmark
/// polls this seam between grid points. Embedded hosts implement it over
/// their heap introspection; elsewhere [`FixedBudget`] supplies a fixed
/// envelope.
pub trait MemoryProbe {
    /// Currently free bytes.
    fn free_bytes(&self) -> u64;
}

/// A probe reporting a constant free-memory figure.
pub struct FixedBudget(pub u64);

impl MemoryProbe for FixedBudget {
    fn free_bytes(&self) -> u64 {
        self.0
    }
}

/// Outcome of one self-recall measurement.
#[derive(Clone, Copy, Debug)]
pub struct TrialScore {
    /// Mean fraction of agreeing bit positions over the trials
    pub match_ratio: f32,
    /// Read-back confidence of the final trial
    pub confidence: f32,
}

/// Benchmark runner bound to a storage root.
pub struct Benchmark {
    storage: Storage,
    probe: Box<dyn MemoryProbe>,
    seed: Option<u64>,
}

impl Benchmark {
    /// Create a runner with entropy-seeded trials.
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            probe: Box::new(FixedBudget(DEFAULT_FREE_BYTES)),
            seed: None,
        }
    }

    /// Create a runner whose trials are reproducible from `seed`.
    pub fn with_seed(storage: Storage, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::new(storage)
        }
    }

    /// Replace the free-memory probe.
    pub fn with_memory_probe(mut self, probe: Box<dyn MemoryProbe>) -> Self {
        self.probe = probe;
        self
    }

    fn store_for(&self, config: SdmConfig, label: &str) -> SparseMemory {
        match self.seed {
            Some(seed) => SparseMemory::with_seed(config, derive_stream_seed(seed, label)),
            None => SparseMemory::new(config),
        }
    }

    fn trial_rng(&self, label: &str) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(derive_stream_seed(seed, label)),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// Measure self-recall fidelity for one configuration.
    ///
    /// A store that cannot allocate scores 0 rather than failing, so
    /// sweeps skip past oversized points.
    pub fn test_configuration(&self, config: &SdmConfig, num_tests: u8) -> Result<TrialScore> {
        let label = format!(
            "trial_{}x{}r{}",
            config.vector_dim, config.num_locations, config.access_radius
        );
        let mut store = self.store_for(*config, &label);
        if let Err(error) = store.initialize() {
            warn!(%error, "store initialization failed, scoring 0");
            return Ok(TrialScore {
                match_ratio: 0.0,
                confidence: 0.0,
            });
        }

        let mut rng = self.trial_rng(&format!("{}_vectors", label));
        let trials = num_tests.max(1);
        let mut total_match = 0.0f32;
        let mut confidence = 0.0f32;

        for _ in 0..trials {
            let test_vector = BitVector::random_sparse(config.dim(), config.sparsity, &mut rng);
            for _ in 0..RECALL_WRITES {
                store.write(&test_vector, 1)?;
            }
            let (output, read_confidence) = store.read(&test_vector)?;
            total_match += test_vector.agreement(&output) as f32 / config.dim() as f32;
            confidence = read_confidence;
        }

        let match_ratio = total_match / trials as f32;
        store.record_match_ratio(match_ratio);
        Ok(TrialScore {
            match_ratio,
            confidence,
        })
    }

    fn create_csv(&self, relative: &str, header: &str) -> Result<File> {
        let path = self.storage.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        writeln!(file, "{}", header)?;
        Ok(file)
    }

    /// Quick sweep: coarse grid for a fast baseline.
    ///
    /// Logs to `sdm_benchmark_results.csv` and persists the winning
    /// configuration. Aborts early when free memory drops below the floor.
    pub fn run_quick_sweep(&self) -> Result<SdmConfig> {
        info!("running quick benchmark sweep");
        let mut csv = self.create_csv(
            QUICK_RESULTS_FILE,
            "vector_dim,num_locations,access_radius,radius_factor,reinforcement,\
             match_ratio,confidence,duration_ms,memory_usage",
        )?;

        let mut best: Option<(f32, SdmConfig)> = None;

        'sweep: for &dim in &[32u16, 64] {
            for &locations in &[100u16, 200] {
                for &factor in &[0.2f32, 0.4, 0.6] {
                    for &reinforcement in &[5u8, 15, 30] {
                        let config = SdmConfig {
                            vector_dim: dim,
                            num_locations: locations,
                            access_radius: (dim as f32 * factor) as u16,
                            ..SdmConfig::default()
                        };
                        debug!(
                            dim,
                            locations,
                            radius = config.access_radius,
                            reinforcement,
                            "quick sweep point"
                        );

                        let started = Instant::now();
                        let score = self.test_configuration(&config, 5)?;
                        let duration_ms = started.elapsed().as_millis();

                        writeln!(
                            csv,
                            "{},{},{},{:.2},{},{:.3},{:.3},{},{}",
                            dim,
                            locations,
                            config.access_radius,
                            factor,
                            reinforcement,
                            score.match_ratio,
                            score.confidence,
                            duration_ms,
                            config.estimated_bytes()
                        )?;
                        csv.flush()?;

                        if best
                            .as_ref()
                            .map_or(true, |(top, _)| score.match_ratio > *top)
                        {
                            best = Some((score.match_ratio, config));
                        }

                        if self.probe.free_bytes() < QUICK_MEMORY_FLOOR {
                            warn!("free memory below floor, stopping quick sweep");
                            break 'sweep;
                        }
                    }
                }
            }
        }

        let (score, config) = best.unwrap_or((0.0, SdmConfig::default()));
        info!(
            match_ratio = score,
            dim = config.vector_dim,
            locations = config.num_locations,
            radius = config.access_radius,
            "quick sweep complete"
        );
        self.storage.save_optimal_config(&config)?;
        Ok(config)
    }

    /// Comprehensive sweep: full parameter grid.
    ///
    /// Logs to `sdm_comprehensive_benchmark.csv` with a live free-memory
    /// column. Points whose footprint would leave less than the floor are
    /// skipped.
    pub fn run_comprehensive_sweep(&self) -> Result<SdmConfig> {
        info!("running comprehensive benchmark sweep");
        let mut csv = self.create_csv(
            COMPREHENSIVE_RESULTS_FILE,
            "vector_dim,num_locations,access_radius,radius_factor,reinforcement,\
             match_ratio,confidence,duration_ms,memory_usage,free_bytes",
        )?;

        let mut best: Option<(f32, SdmConfig)> = None;
        let mut point_count: u32 = 0;

        for &dim in &[32u16, 64, 128, 256] {
            for &locations in &[500u16, 1000, 2000] {
                let required = SdmConfig {
                    vector_dim: dim,
                    num_locations: locations,
                    ..SdmConfig::default()
                }
                .estimated_bytes();
                let free = self.probe.free_bytes();
                if required > free.saturating_sub(COMPREHENSIVE_MEMORY_FLOOR) {
                    warn!(dim, locations, required, free, "skipping oversized point");
                    continue;
                }

                for &factor in &[0.1f32, 0.2, 0.4, 0.6] {
                    for &reinforcement in &[1u8, 5, 10, 20, 30] {
                        point_count += 1;
                        let config = SdmConfig {
                            vector_dim: dim,
                            num_locations: locations,
                            access_radius: (dim as f32 * factor) as u16,
                            ..SdmConfig::default()
                        };

                        let started = Instant::now();
                        let score = self.test_configuration(&config, 3)?;
                        let duration_ms = started.elapsed().as_millis();

                        writeln!(
                            csv,
                            "{},{},{},{:.2},{},{:.4},{:.3},{},{},{}",
                            dim,
                            locations,
                            config.access_radius,
                            factor,
                            reinforcement,
                            score.match_ratio,
                            score.confidence,
                            duration_ms,
                            required,
                            self.probe.free_bytes()
                        )?;
                        csv.flush()?;

                        if best
                            .as_ref()
                            .map_or(true, |(top, _)| score.match_ratio > *top)
                        {
                            best = Some((score.match_ratio, config));
                        }

                        if point_count % 20 == 0 {
                            info!(
                                points = point_count,
                                best = best.as_ref().map(|(top, _)| *top),
                                "comprehensive sweep progress"
                            );
                        }
                    }
                }
            }
        }

        let (score, config) = best.unwrap_or((0.0, SdmConfig::default()));
        info!(
            match_ratio = score,
            dim = config.vector_dim,
            locations = config.num_locations,
            radius = config.access_radius,
            "comprehensive sweep complete"
        );
        self.storage.save_optimal_config(&config)?;
        Ok(config)
    }

    /// Memory-constraint sweep: probe how large a store the host can hold.
    ///
    /// Logs to `sdm_memory_test.csv`, recording free memory before and
    /// after each instantiation. Stops a dimension's row of points once a
    /// configuration fails or free memory falls below the stop line.
    pub fn run_memory_sweep(&self) -> Result<()> {
        info!("running memory constraint sweep");
        let mut csv = self.create_csv(
            MEMORY_RESULTS_FILE,
            "vector_dim,num_locations,memory_required,free_bytes_before,\
             free_bytes_after,initialization_success,test_performance",
        )?;

        for &dim in &[32u16, 64, 128, 256, 512, 1024] {
            for &locations in &[100u16, 500, 1000, 2000, 5000, 8000, 10000] {
                let config = SdmConfig {
                    vector_dim: dim,
                    num_locations: locations,
                    access_radius: dim / 4,
                    ..SdmConfig::default()
                };
                let required = config.estimated_bytes();
                let free_before = self.probe.free_bytes();
                debug!(dim, locations, required, "memory sweep point");

                let mut success = false;
                let mut performance = 0.0f32;

                if required < free_before.saturating_sub(MEMORY_SWEEP_FLOOR) {
                    let mut probe_store =
                        self.store_for(config, &format!("memory_{}x{}", dim, locations));
                    success = probe_store.initialize().is_ok();
                    if success {
                        performance = self.test_configuration(&config, 2)?.match_ratio;
                    }
                }

                let free_after = if success {
                    free_before.saturating_sub(required)
                } else {
                    free_before
                };

                writeln!(
                    csv,
                    "{},{},{},{},{},{},{:.3}",
                    dim, locations, required, free_before, free_after, success as u8, performance
                )?;
                csv.flush()?;

                if !success || free_after < MEMORY_SWEEP_STOP {
                    warn!(dim, locations, "memory limit reached");
                    break;
                }
            }
        }

        info!("memory constraint sweep complete");
        Ok(())
    }

    /// The configuration the engine should boot with.
    ///
    /// Prefers the persisted optimal configuration when present and
    /// parseable. Otherwise falls back to a conservative default small
    /// enough for any host, and writes it back so the decision sticks;
    /// running a sweep at boot is not an option on a constrained device.
    pub fn find_optimal_config(&self) -> SdmConfig {
        match self.storage.load_optimal_config() {
            Ok(config) => {
                info!(
                    dim = config.vector_dim,
                    locations = config.num_locations,
                    "loaded optimal config"
                );
                config
            }
            Err(_) => {
                let fallback = SdmConfig {
                    vector_dim: 16,
                    num_locations: 50,
                    access_radius: 3,
                    sparsity: 0.03,
                };
                info!("no optimal config found, using conservative defaults");
                if let Err(error) = self.storage.save_optimal_config(&fallback) {
                    warn!(%error, "failed to persist fallback config");
                }
                fallback
            }
        }
    }
}
