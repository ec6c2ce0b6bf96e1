//! Named, frozen vector libraries on the block device.
//!
//! A library is a directory under `lib/<name>/` holding a binary pack of
//! bit-vectors, an optional positional label list, and a metadata record:
//!
//! - `vectors.bin` — `u32` vector count, `u32` dimension (little-endian),
//!   then one byte per bit
//! - `labels.txt` — one label per line, aligned to the vector order
//! - `info.json` — [`LibraryInfo`] metadata
//!
//! Libraries are immutable once written. Merging replays every vector
//! through the store's write path so the counters absorb the patterns.

use super::{unix_timestamp, Storage, LIB_DIR};
use crate::encoder::Encoder;
use crate::error::{Result, SdmError};
use crate::store::SparseMemory;
use crate::vector::BitVector;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// Default number of write replays when merging a library.
pub const DEFAULT_REINFORCEMENT: u8 = 3;

/// Write strength used for merge replays.
const MERGE_STRENGTH: u8 = 2;

const LIBRARY_VERSION: &str = "1.0";

/// Metadata record stored as `info.json` alongside a library.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LibraryInfo {
    pub name: String,
    pub vector_count: u32,
    pub file_size: u64,
    pub vector_dim: u32,
    pub created_at: u64,
    pub version: String,
}

impl Storage {
    fn library_dir(&self, name: &str) -> PathBuf {
        self.path(LIB_DIR).join(name)
    }

    /// Save a named library of vectors with optional positional labels.
    ///
    /// All vectors must share one dimensionality.
    pub fn save_library(
        &self,
        name: &str,
        vectors: &[BitVector],
        labels: Option<&[String]>,
    ) -> Result<LibraryInfo> {
        let dim = vectors.first().map_or(0, |v| v.dimensions());
        for v in vectors {
            if v.dimensions() != dim {
                return Err(SdmError::DimensionMismatch {
                    expected: dim,
                    got: v.dimensions(),
                });
            }
        }

        let dir = self.library_dir(name);
        fs::create_dir_all(&dir)?;

        let mut payload = Vec::with_capacity(8 + vectors.len() * dim);
        payload.extend_from_slice(&(vectors.len() as u32).to_le_bytes());
        payload.extend_from_slice(&(dim as u32).to_le_bytes());
        for v in vectors {
            payload.extend_from_slice(v.bits());
        }
        let vectors_path = dir.join("vectors.bin");
        fs::write(&vectors_path, &payload)?;

        if let Some(labels) = labels {
            let mut text = labels.join("\n");
            text.push('\n');
            fs::write(dir.join("labels.txt"), text)?;
        }

        let info = LibraryInfo {
            name: name.to_string(),
            vector_count: vectors.len() as u32,
            file_size: payload.len() as u64,
            vector_dim: dim as u32,
            created_at: unix_timestamp(),
            version: LIBRARY_VERSION.to_string(),
        };
        fs::write(dir.join("info.json"), serde_json::to_string(&info)?)?;

        info!(library = name, count = vectors.len(), "library saved");
        Ok(info)
    }

    /// Load a named library, validating its dimension against `vector_dim`.
    ///
    /// This is an explicit load: a missing library, a dimension mismatch,
    /// or a truncated pack is a hard failure. Returns the vectors and the
    /// label list (empty when no `labels.txt` exists).
    pub fn load_library(
        &self,
        name: &str,
        vector_dim: usize,
    ) -> Result<(Vec<BitVector>, Vec<String>)> {
        let dir = self.library_dir(name);
        let vectors_path = dir.join("vectors.bin");
        let data = match fs::read(&vectors_path) {
            Ok(data) => data,
            Err(_) => return Err(SdmError::LibraryNotFound(name.to_string())),
        };

        if data.len() < 8 {
            return Err(SdmError::Truncated {
                path: vectors_path.display().to_string(),
            });
        }
        let count = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        let dim = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;

        if dim != vector_dim {
            return Err(SdmError::DimensionMismatch {
                expected: vector_dim,
                got: dim,
            });
        }
        if data.len() != 8 + count * dim {
            return Err(SdmError::Truncated {
                path: vectors_path.display().to_string(),
            });
        }

        let vectors: Vec<BitVector> = data[8..]
            .chunks_exact(dim)
            .map(|chunk| BitVector::from_bits(chunk.to_vec()))
            .collect();

        let labels = match fs::read_to_string(dir.join("labels.txt")) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
            Err(_) => Vec::new(),
        };

        debug!(library = name, count = vectors.len(), "library loaded");
        Ok((vectors, labels))
    }

    /// Merge a named library into a live store.
    ///
    /// Every vector is replayed `reinforcement` times at medium strength.
    /// The dimension check happens before any write, so a mismatched
    /// library never partially mutates the store. Returns the number of
    /// merged vectors.
    pub fn merge_library(
        &self,
        name: &str,
        store: &mut SparseMemory,
        reinforcement: u8,
    ) -> Result<usize> {
        let (vectors, _) = self.load_library(name, store.config().dim())?;

        for vector in &vectors {
            for _ in 0..reinforcement {
                store.write(vector, MERGE_STRENGTH)?;
            }
        }

        info!(
            library = name,
            count = vectors.len(),
            reinforcement,
            "library merged"
        );
        Ok(vectors.len())
    }

    /// List the names of libraries present on the device.
    ///
    /// A directory under `lib/` counts as a library when it contains a
    /// `vectors.bin`. Names are returned sorted.
    pub fn list_libraries(&self) -> Vec<String> {
        let mut names = Vec::new();
        let Ok(entries) = fs::read_dir(self.path(LIB_DIR)) else {
            return names;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() && path.join("vectors.bin").exists() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        names
    }

    /// Read a library's metadata record.
    pub fn library_info(&self, name: &str) -> Result<LibraryInfo> {
        let path = self.library_dir(name).join("info.json");
        let content = fs::read_to_string(&path)
            .map_err(|_| SdmError::LibraryNotFound(name.to_string()))?;
        Ok(serde_json::from_str(&content)?)
    }
}

const COMMON_WORDS: &[&str] = &[
    "THE", "AND", "FOR", "ARE", "BUT", "NOT", "YOU", "ALL", "CAN", "HER", "WAS", "ONE", "OUR",
    "HAD", "BY", "WORD", "WHAT", "SAY", "EACH", "SHE", "WHICH", "DO", "HOW", "THEIR", "TIME",
    "WILL", "ABOUT", "IF", "UP", "OUT", "MANY", "THEN", "THEM", "THESE", "SO", "SOME", "HIM",
    "HAS", "TWO", "MORE", "VERY", "GO", "NO", "WAY", "COULD", "MY", "THAN", "FIRST", "WATER",
    "BEEN", "CALL", "WHO", "AM", "ITS", "NOW", "FIND", "LONG", "DOWN", "DAY", "DID", "GET",
    "COME", "MADE", "MAY", "PART",
];

/// Build and save the stock library of common English words, encoded
/// through the text encoder.
pub fn save_common_words_library(storage: &Storage, encoder: &Encoder) -> Result<LibraryInfo> {
    let labels: Vec<String> = COMMON_WORDS.iter().map(|w| w.to_string()).collect();
    let vectors: Vec<BitVector> = COMMON_WORDS.iter().map(|w| encoder.encode_text(w)).collect();
    storage.save_library("common_words", &vectors, Some(&labels))
}

/// Build and save the stock library of the numbers 0–100 as text patterns.
pub fn save_numbers_library(storage: &Storage, encoder: &Encoder) -> Result<LibraryInfo> {
    let labels: Vec<String> = (0..=100).map(|i| i.to_string()).collect();
    let vectors: Vec<BitVector> = labels.iter().map(|s| encoder.encode_text(s)).collect();
    storage.save_library("numbers", &vectors, Some(&labels))
}
