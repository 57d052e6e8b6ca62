use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use image::RgbImage;
use ordered_float::NotNan;
use parking_lot::Mutex;

use rd_chunk::{Chunk, ChunkError, ChunkStore};
use rd_video::FrameSync;

use crate::{DatasetInfo, DeltaSampler, DeltaTimestamps, NormalizationStats, stats};

/// Default name of the per-frame state vector column.
pub const DEFAULT_STATE_KEY: &str = "observation.state";

/// Default name of the per-frame action vector column.
pub const DEFAULT_ACTION_KEY: &str = "action";

/// Name of the per-frame timestamp column (seconds).
pub const TIMESTAMP_KEY: &str = "timestamp";

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "webm"];

// ---

#[derive(thiserror::Error, Debug)]
pub enum DatasetError {
    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error("frame index out of range: {index} (size={size})")]
    OutOfRange { index: usize, size: usize },

    #[error("column {0:?} has no valid rows; cannot compute normalization stats")]
    NoValidRows(String),

    #[error("cannot determine feature dimensionality of column {0:?}")]
    UnknownDimensionality(String),

    #[error("missing value in column {0:?}")]
    MissingColumn(String),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DatasetResult<T> = Result<T, DatasetError>;

// ---

/// Construction-time configuration for [`EpisodeDataset`].
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Dataset root directory. The only required setting.
    pub root: PathBuf,

    /// Per-modality image sampling offsets; empty means no image sampling.
    pub delta_timestamps: DeltaTimestamps,

    pub state_key: String,

    pub action_key: String,

    /// Whether `get` populates the image mapping. Toggleable after
    /// construction through [`EpisodeDataset::set_image_loading`].
    pub load_images: bool,

    /// Overrides the well-known normalization-cache location
    /// ([`crate::default_cache_path`]).
    pub stats_cache: Option<PathBuf>,

    /// Error on absent columns instead of zero-filling. Off by default; meant
    /// for validating datasets in tests.
    pub strict: bool,
}

impl DatasetConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            delta_timestamps: DeltaTimestamps::default(),
            state_key: DEFAULT_STATE_KEY.to_owned(),
            action_key: DEFAULT_ACTION_KEY.to_owned(),
            load_images: true,
            stats_cache: None,
            strict: false,
        }
    }

    #[inline]
    pub fn with_delta_timestamps(mut self, deltas: DeltaTimestamps) -> Self {
        self.delta_timestamps = deltas;
        self
    }

    #[inline]
    pub fn with_keys(mut self, state_key: impl Into<String>, action_key: impl Into<String>) -> Self {
        self.state_key = state_key.into();
        self.action_key = action_key.into();
        self
    }

    #[inline]
    pub fn with_stats_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.stats_cache = Some(path.into());
        self
    }
}

// ---

/// The atomic unit returned by [`EpisodeDataset::get`]: one row of tabular
/// data plus its synchronized imagery.
///
/// Vectors are raw. Normalization (subtract mean, divide by std) is applied by
/// the caller using [`EpisodeDataset::normalization_stats`], which keeps the
/// sample reusable independent of any particular normalization epoch.
///
/// The image map is sparse: offsets whose target timestamp was negative, or
/// whose decode missed, have no entry.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    pub timestamp: f64,
    pub state: Vec<f32>,
    pub action: Vec<f32>,
    pub images: BTreeMap<NotNan<f64>, RgbImage>,
}

// ---

/// Maps data chunks to their camera video files.
///
/// Only the first camera directory (sorted) is consumed, matching the single
/// image modality recognized by the sampler. A chunk with no matching video
/// file falls back to the first camera file discovered.
#[derive(Debug, Default)]
struct CameraLayout {
    /// (group directory name, file stem) → video path for the primary camera.
    by_chunk: BTreeMap<(String, String), PathBuf>,
    fallback: Option<PathBuf>,
}

impl CameraLayout {
    /// Walk `<root>/videos/<camera>/<group>/<chunk>.<ext>`. A missing tree is
    /// a valid dataset with no video.
    fn discover(root: &Path) -> Self {
        let videos = root.join("videos");
        if !videos.is_dir() {
            return Self::default();
        }

        let mut cameras: Vec<PathBuf> = match std::fs::read_dir(&videos) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect(),
            Err(err) => {
                log::warn!("cannot read {}: {err}", videos.display());
                return Self::default();
            }
        };
        cameras.sort();

        let Some(primary) = cameras.first() else {
            return Self::default();
        };
        if cameras.len() > 1 {
            log::debug!(
                "multiple cameras found; using {}",
                primary.display(),
            );
        }

        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(primary)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext))
            })
            .collect();
        files.sort();

        let mut layout = Self {
            by_chunk: BTreeMap::new(),
            fallback: files.first().cloned(),
        };
        for file in files {
            if let Some(key) = group_and_stem(&file) {
                layout.by_chunk.insert(key, file);
            }
        }

        log::info!("discovered {} camera files", layout.by_chunk.len());
        layout
    }

    /// The video file matching a chunk's group/stem, else the fallback.
    fn camera_for(&self, chunk: &Chunk) -> Option<&Path> {
        group_and_stem(chunk.path())
            .and_then(|key| self.by_chunk.get(&key))
            .or(self.fallback.as_ref())
            .map(PathBuf::as_path)
    }
}

fn group_and_stem(path: &Path) -> Option<(String, String)> {
    let group = path.parent()?.file_name()?.to_str()?;
    let stem = path.file_stem()?.to_str()?;
    Some((group.to_owned(), stem.to_owned()))
}

// ---

/// A loaded episode dataset: chunk store, global index, episode boundaries,
/// video synchronization and normalization stats behind one `get` surface.
///
/// Everything except the camera decode handles is immutable after `open`
/// returns, so a dataset can be shared freely across reader threads. The
/// handles live behind a mutex, preserving the one-seek-per-handle invariant.
pub struct EpisodeDataset {
    config: DatasetConfig,
    info: DatasetInfo,
    store: ChunkStore,
    stats: NormalizationStats,
    sampler: DeltaSampler,
    cameras: CameraLayout,
    sync: Mutex<FrameSync>,
    load_images: AtomicBool,
}

impl EpisodeDataset {
    /// Open the dataset rooted at `config.root`.
    ///
    /// Fatal conditions (missing root or `data/` subtree, a malformed chunk,
    /// unusable normalization stats) abort construction. No partially
    /// initialized dataset is ever returned; anything opened along the way is
    /// released on the error path.
    pub fn open(config: DatasetConfig) -> DatasetResult<Self> {
        if !config.root.is_dir() {
            return Err(ChunkError::MissingDataDir(config.root.clone()).into());
        }

        let info = DatasetInfo::load_or_default(&config.root);
        let store = ChunkStore::load(&config.root.join("data"))?;

        let cache_path = config
            .stats_cache
            .clone()
            .unwrap_or_else(stats::default_cache_path);
        let stats = NormalizationStats::compute_or_load(
            &store,
            &config.state_key,
            &config.action_key,
            &cache_path,
        )?;

        let sampler = DeltaSampler::new(&config.delta_timestamps);
        let cameras = CameraLayout::discover(&config.root);
        let sync = Mutex::new(FrameSync::new(info.fps));

        log::info!(
            "dataset ready: {} frames, {} episodes, {} fps",
            store.num_frames(),
            store.episode_count(),
            info.fps,
        );

        Ok(Self {
            load_images: AtomicBool::new(config.load_images),
            config,
            info,
            store,
            stats,
            sampler,
            cameras,
            sync,
        })
    }

    /// Total number of frames.
    #[inline]
    pub fn size(&self) -> usize {
        self.store.num_frames()
    }

    #[inline]
    pub fn episode_count(&self) -> usize {
        self.store.episode_count()
    }

    /// The first global frame index of each episode, ascending.
    #[inline]
    pub fn episode_boundaries(&self) -> &[usize] {
        self.store.boundaries().starts()
    }

    #[inline]
    pub fn normalization_stats(&self) -> &NormalizationStats {
        &self.stats
    }

    #[inline]
    pub fn fps(&self) -> f64 {
        self.info.fps
    }

    #[inline]
    pub fn image_loading(&self) -> bool {
        self.load_images.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_image_loading(&self, enabled: bool) {
        self.load_images.store(enabled, Ordering::Relaxed);
    }

    /// Column names of the first chunk, in schema order.
    pub fn column_names(&self) -> Vec<String> {
        self.store
            .chunks()
            .first()
            .map(Chunk::column_names)
            .unwrap_or_default()
    }

    /// Fetch one frame by global index.
    ///
    /// Out-of-range indices are an explicit error, never clamped or wrapped.
    /// Missing or null state/action/timestamp values degrade to zeros (unless
    /// `strict`), so a long training loop over random indices doesn't crash on
    /// sparse data.
    pub fn get(&self, index: usize) -> DatasetResult<Sample> {
        let size = self.size();
        if index >= size {
            return Err(DatasetError::OutOfRange { index, size });
        }

        let (chunk, row) = self.store.locate(index)?;

        let state = self.read_vector(chunk, row, &self.config.state_key, self.stats.state_dim())?;
        let action =
            self.read_vector(chunk, row, &self.config.action_key, self.stats.action_dim())?;

        let timestamp = match chunk.scalar_at(TIMESTAMP_KEY, row) {
            Some(timestamp) => timestamp,
            None if self.config.strict => {
                return Err(DatasetError::MissingColumn(TIMESTAMP_KEY.to_owned()));
            }
            None => {
                log::debug!("no timestamp at frame {index}; substituting 0.0");
                0.0
            }
        };

        let images = if self.image_loading() && !self.sampler.is_empty() {
            let camera = self.cameras.camera_for(chunk);
            let mut sync = self.sync.lock();
            self.sampler.sample(timestamp, camera, &mut sync)
        } else {
            BTreeMap::new()
        };

        Ok(Sample {
            timestamp,
            state,
            action,
            images,
        })
    }

    /// A row's feature vector, zero-filled to the stats-derived dimensionality
    /// when the column or value is absent (or an error, in strict mode).
    fn read_vector(
        &self,
        chunk: &Chunk,
        row: usize,
        key: &str,
        dim: usize,
    ) -> DatasetResult<Vec<f32>> {
        if let Some(vector) = chunk.vector_at(key, row) {
            if vector.len() == dim {
                return Ok(vector);
            }
            log::debug!(
                "column {key:?} row has dimension {} (expected {dim}); zero-filling",
                vector.len(),
            );
        }

        if self.config.strict {
            return Err(DatasetError::MissingColumn(key.to_owned()));
        }

        Ok(vec![0.0; dim])
    }
}
