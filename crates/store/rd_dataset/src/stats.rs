use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use rd_chunk::ChunkStore;

use crate::{DatasetError, DatasetResult};

/// Standard deviations are floored to this value so that normalization never
/// divides by zero, even for constant features.
pub const STD_EPSILON: f32 = 1e-6;

/// The well-known cache location used when [`crate::DatasetConfig`] doesn't
/// override it.
pub fn default_cache_path() -> PathBuf {
    std::env::temp_dir().join("rd_dataset_stats.json")
}

// ---

/// Per-dimension mean and standard deviation for the state and action columns.
///
/// Computed with a single streaming pass over every chunk, then cached to disk
/// so the O(total frames) scan isn't repeated on the next run. Immutable once
/// computed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NormalizationStats {
    pub state_mean: Vec<f32>,
    pub state_std: Vec<f32>,
    pub action_mean: Vec<f32>,
    pub action_std: Vec<f32>,
}

impl NormalizationStats {
    #[inline]
    pub fn state_dim(&self) -> usize {
        self.state_mean.len()
    }

    #[inline]
    pub fn action_dim(&self) -> usize {
        self.action_mean.len()
    }

    fn is_well_formed(&self) -> bool {
        !self.state_mean.is_empty()
            && self.state_mean.len() == self.state_std.len()
            && !self.action_mean.is_empty()
            && self.action_mean.len() == self.action_std.len()
    }

    /// Try to read a previously persisted cache.
    ///
    /// Returns `None` (signalling fall-through to recomputation) on any
    /// problem: missing file, parse failure, missing key, mismatched vector
    /// lengths. A corrupt cache is never a hard error.
    pub fn load_cache(path: &Path) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        let stats: Self = serde_json::from_str(&contents).ok()?;
        stats.is_well_formed().then_some(stats)
    }

    /// Persist to `path`, overwriting any prior cache.
    pub fn save_cache(&self, path: &Path) -> DatasetResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// One streaming pass over every row of every chunk.
    ///
    /// Dimensionality is auto-detected from the first chunk that can report it
    /// (legacy scalar columns count as dimensionality 1). Rows that are null in
    /// either column, or whose vector length doesn't match the detected
    /// dimensionality, are skipped. Deterministic for fixed chunk contents.
    pub fn compute(store: &ChunkStore, state_key: &str, action_key: &str) -> DatasetResult<Self> {
        let state_dim = detect_dim(store, state_key)
            .ok_or_else(|| DatasetError::UnknownDimensionality(state_key.to_owned()))?;
        let action_dim = detect_dim(store, action_key)
            .ok_or_else(|| DatasetError::UnknownDimensionality(action_key.to_owned()))?;

        let mut state_acc = Accumulator::new(state_dim);
        let mut action_acc = Accumulator::new(action_dim);

        for chunk in store.chunks() {
            let state_col = chunk.column(state_key);
            let action_col = chunk.column(action_key);

            for row in 0..chunk.num_rows() {
                // A row only counts if both columns have a value for it.
                let (Some(state), Some(action)) =
                    (state_col.vector(row), action_col.vector(row))
                else {
                    continue;
                };
                if state.len() != state_dim || action.len() != action_dim {
                    log::debug!(
                        "row skipped: dims {}/{} vs expected {state_dim}/{action_dim}",
                        state.len(),
                        action.len(),
                    );
                    continue;
                }

                state_acc.push(&state);
                action_acc.push(&action);
            }
        }

        let (state_mean, state_std) = state_acc
            .finish()
            .ok_or_else(|| DatasetError::NoValidRows(state_key.to_owned()))?;
        let (action_mean, action_std) = action_acc
            .finish()
            .ok_or_else(|| DatasetError::NoValidRows(action_key.to_owned()))?;

        Ok(Self {
            state_mean,
            state_std,
            action_mean,
            action_std,
        })
    }

    /// The main entry point: load the cache if it's usable, otherwise
    /// recompute and persist.
    ///
    /// A failure to *persist* is only a warning: the stats themselves are
    /// fine, the next run just pays for the scan again.
    pub fn compute_or_load(
        store: &ChunkStore,
        state_key: &str,
        action_key: &str,
        cache_path: &Path,
    ) -> DatasetResult<Self> {
        if let Some(stats) = Self::load_cache(cache_path) {
            log::info!(
                "normalization stats loaded from cache at {}",
                cache_path.display(),
            );
            return Ok(stats);
        }

        log::info!(
            "recomputing normalization stats over {} frames",
            store.num_frames(),
        );
        let stats = Self::compute(store, state_key, action_key)?;

        if let Err(err) = stats.save_cache(cache_path) {
            log::warn!(
                "failed to persist normalization cache at {}: {err}",
                cache_path.display(),
            );
        }

        Ok(stats)
    }
}

fn detect_dim(store: &ChunkStore, key: &str) -> Option<usize> {
    store.chunks().iter().find_map(|chunk| chunk.column(key).dim())
}

// ---

/// Running sum and sum-of-squares per dimension, in f64 to keep long scans
/// from losing precision.
struct Accumulator {
    count: u64,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl Accumulator {
    fn new(dim: usize) -> Self {
        Self {
            count: 0,
            sum: vec![0.0; dim],
            sum_sq: vec![0.0; dim],
        }
    }

    fn push(&mut self, values: &[f32]) {
        debug_assert_eq!(values.len(), self.sum.len());
        self.count += 1;
        for (i, &value) in values.iter().enumerate() {
            let value = f64::from(value);
            self.sum[i] += value;
            self.sum_sq[i] += value * value;
        }
    }

    /// Mean and epsilon-floored standard deviation; `None` if nothing was
    /// accumulated.
    fn finish(self) -> Option<(Vec<f32>, Vec<f32>)> {
        if self.count == 0 {
            return None;
        }

        let n = self.count as f64;
        let mean: Vec<f64> = self.sum.iter().map(|sum| sum / n).collect();
        let std: Vec<f32> = self
            .sum_sq
            .iter()
            .zip(&mean)
            .map(|(sum_sq, mean)| {
                let variance = sum_sq / n - mean * mean;
                variance.max(0.0).sqrt().max(f64::from(STD_EPSILON)) as f32
            })
            .collect();

        Some((mean.into_iter().map(|mean| mean as f32).collect(), std))
    }
}

// ---
