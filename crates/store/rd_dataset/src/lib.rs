//! Indexed, synchronized and normalized access to robot-demonstration
//! episode datasets.
//!
//! A dataset on disk is a conventional directory tree:
//!
//! ```text
//! <root>
//! ├── data
//! │   └── chunk-000
//! │       ├── file-000.parquet
//! │       └── file-001.parquet
//! ├── meta
//! │   └── info.json
//! └── videos
//!     └── observation.image
//!         └── chunk-000
//!             └── file-000.mp4
//! ```
//!
//! [`EpisodeDataset`] composes the chunk store, the global index mapper, the
//! episode boundary detector, the video frame synchronizer, the
//! delta-timestamp sampler and the normalization engine behind a single
//! `get(index) -> Sample` surface. Samples are raw: normalization (subtract
//! mean, divide by std) is the caller's responsibility, using the stats
//! exposed by [`EpisodeDataset::normalization_stats`].

mod dataset;
mod meta;
mod sampler;
mod stats;

pub use self::dataset::{
    DEFAULT_ACTION_KEY, DEFAULT_STATE_KEY, DatasetConfig, DatasetError, DatasetResult,
    EpisodeDataset, Sample, TIMESTAMP_KEY,
};
pub use self::meta::DatasetInfo;
pub use self::sampler::{DeltaSampler, DeltaTimestamps, IMAGE_KEY};
pub use self::stats::{NormalizationStats, STD_EPSILON, default_cache_path};
