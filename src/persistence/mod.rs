//! Persistence over a mounted block-device filesystem.
//!
//! [`Storage`] owns a root directory (the mount point) and serialises the
//! engine's state beneath it:
//!
//! - `sdm_config.json` — active configuration (JSON, partial overlay on load)
//! - `sdm/memory.bin` — counter matrix and access counts (binary, little-endian)
//! - `sdm/stats.json` — cumulative statistics (JSON)
//! - `sdm_optimal_config.json` — benchmark-selected configuration (JSON)
//! - `lib/<name>/` — frozen vector libraries (see [`library`])
//!
//! Optional reads (config, state) miss softly: an absent or garbled file
//! leaves the in-memory values untouched. Explicit loads (libraries, the
//! optimal config) fail hard. No load partially mutates a store: payloads
//! are decoded and validated completely before anything is swapped in.

mod library;

pub use library::{
    save_common_words_library, save_numbers_library, LibraryInfo, DEFAULT_REINFORCEMENT,
};

use crate::config::{SdmConfig, SdmStats};
use crate::error::{Result, SdmError};
use crate::store::SparseMemory;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const CONFIG_FILE: &str = "sdm_config.json";
const STATE_FILE: &str = "sdm/memory.bin";
const STATS_FILE: &str = "sdm/stats.json";
const OPTIMAL_CONFIG_FILE: &str = "sdm_optimal_config.json";
pub(crate) const LIB_DIR: &str = "lib";

/// Opaque timestamp: seconds since the Unix epoch, 0 if the clock is
/// unavailable.
pub(crate) fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Serialize)]
struct ConfigFile {
    vector_dim: u16,
    num_locations: u16,
    access_radius: u16,
    sparsity: f32,
    timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'static str>,
}

impl ConfigFile {
    fn new(config: &SdmConfig, version: Option<&'static str>) -> Self {
        Self {
            vector_dim: config.vector_dim,
            num_locations: config.num_locations,
            access_radius: config.access_radius,
            sparsity: config.sparsity,
            timestamp: unix_timestamp(),
            version,
        }
    }
}

/// Overlay view of a persisted configuration: absent fields keep the
/// current in-memory value, unknown fields are ignored.
#[derive(Default, Deserialize)]
#[serde(default)]
struct PartialConfig {
    vector_dim: Option<u16>,
    num_locations: Option<u16>,
    access_radius: Option<u16>,
    sparsity: Option<f32>,
}

impl PartialConfig {
    fn apply(&self, config: &mut SdmConfig) {
        if let Some(v) = self.vector_dim {
            config.vector_dim = v;
        }
        if let Some(v) = self.num_locations {
            config.num_locations = v;
        }
        if let Some(v) = self.access_radius {
            config.access_radius = v;
        }
        if let Some(v) = self.sparsity {
            config.sparsity = v;
        }
    }
}

#[derive(Serialize)]
struct StatsFile<'a> {
    #[serde(flatten)]
    stats: &'a SdmStats,
    timestamp: u64,
}

/// Handle to the engine's directory tree on the block device.
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Create a storage handle rooted at the given mount point.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The mount point this storage writes beneath.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    fn write_file(&self, relative: &str, contents: &[u8]) -> Result<()> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(())
    }

    /// Persist the active configuration.
    pub fn save_config(&self, config: &SdmConfig) -> Result<()> {
        let json = serde_json::to_string(&ConfigFile::new(config, None))?;
        self.write_file(CONFIG_FILE, json.as_bytes())?;
        debug!("config saved");
        Ok(())
    }

    /// Overlay the persisted configuration onto `config`.
    ///
    /// Returns `true` when a file was found and parsed. An absent or
    /// unparseable file is a soft miss: `config` keeps its current values.
    pub fn load_config(&self, config: &mut SdmConfig) -> bool {
        let path = self.path(CONFIG_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => {
                debug!("no config file, keeping current values");
                return false;
            }
        };
        let partial: PartialConfig = match serde_json::from_str(&content) {
            Ok(partial) => partial,
            Err(error) => {
                warn!(%error, "config file unparseable, keeping current values");
                return false;
            }
        };
        partial.apply(config);
        info!(
            vector_dim = config.vector_dim,
            num_locations = config.num_locations,
            "config loaded"
        );
        true
    }

    /// Persist the counter matrix and access counts.
    ///
    /// Layout, all little-endian: `u16` location count, `u16` dimension,
    /// then one `u16` access count per location, then the `i16` counters
    /// row-major.
    pub fn save_state(&self, store: &SparseMemory) -> Result<()> {
        let n = store.config().num_locations;
        let d = store.config().vector_dim;

        let mut payload =
            Vec::with_capacity(4 + store.access_counts().len() * 2 + store.counters().len() * 2);
        payload.extend_from_slice(&n.to_le_bytes());
        payload.extend_from_slice(&d.to_le_bytes());
        for &count in store.access_counts() {
            payload.extend_from_slice(&count.to_le_bytes());
        }
        for &counter in store.counters() {
            payload.extend_from_slice(&counter.to_le_bytes());
        }

        self.write_file(STATE_FILE, &payload)?;
        info!(locations = n, dimensions = d, "state saved");
        Ok(())
    }

    /// Load persisted counters into `store`.
    ///
    /// Returns `Ok(false)` when no state file exists (soft miss). A header
    /// whose shape differs from the store's configuration, or a truncated
    /// payload, is an error and leaves the store untouched.
    pub fn load_state(&self, store: &mut SparseMemory) -> Result<bool> {
        let path = self.path(STATE_FILE);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(_) => {
                debug!("no state file, starting fresh");
                return Ok(false);
            }
        };

        if data.len() < 4 {
            return Err(SdmError::Truncated {
                path: path.display().to_string(),
            });
        }
        let stored_locations = u16::from_le_bytes([data[0], data[1]]);
        let stored_dim = u16::from_le_bytes([data[2], data[3]]);

        let config = *store.config();
        if stored_locations != config.num_locations || stored_dim != config.vector_dim {
            warn!(
                stored_locations,
                stored_dim,
                locations = config.num_locations,
                dim = config.vector_dim,
                "state file shape mismatch"
            );
            return Err(SdmError::StateShapeMismatch {
                stored_locations,
                stored_dim,
                locations: config.num_locations,
                dim: config.vector_dim,
            });
        }

        let n = config.locations();
        let d = config.dim();
        let expected = 4 + n * 2 + n * d * 2;
        if data.len() != expected {
            return Err(SdmError::Truncated {
                path: path.display().to_string(),
            });
        }

        let mut offset = 4;
        let mut access_counts = Vec::with_capacity(n);
        for _ in 0..n {
            access_counts.push(u16::from_le_bytes([data[offset], data[offset + 1]]));
            offset += 2;
        }
        let mut counters = Vec::with_capacity(n * d);
        for _ in 0..n * d {
            counters.push(i16::from_le_bytes([data[offset], data[offset + 1]]));
            offset += 2;
        }

        store.restore_state(access_counts, counters);
        info!(locations = n, dimensions = d, "state loaded");
        Ok(true)
    }

    /// Persist the statistics record with a timestamp.
    pub fn save_stats(&self, stats: &SdmStats) -> Result<()> {
        let json = serde_json::to_string(&StatsFile {
            stats,
            timestamp: unix_timestamp(),
        })?;
        self.write_file(STATS_FILE, json.as_bytes())?;
        debug!("stats saved");
        Ok(())
    }

    /// Persist a benchmark-selected configuration.
    pub fn save_optimal_config(&self, config: &SdmConfig) -> Result<()> {
        let json = serde_json::to_string(&ConfigFile::new(config, Some("1.0")))?;
        self.write_file(OPTIMAL_CONFIG_FILE, json.as_bytes())?;
        info!(
            vector_dim = config.vector_dim,
            num_locations = config.num_locations,
            access_radius = config.access_radius,
            "optimal config saved"
        );
        Ok(())
    }

    /// Load the persisted optimal configuration.
    ///
    /// This is an explicit load: absence or malformed content is a hard
    /// failure.
    pub fn load_optimal_config(&self) -> Result<SdmConfig> {
        let content = fs::read_to_string(self.path(OPTIMAL_CONFIG_FILE))?;
        let config: SdmConfig = serde_json::from_str(&content)?;
        Ok(config)
    }
}
