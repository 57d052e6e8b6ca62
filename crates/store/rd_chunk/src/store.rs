use std::path::{Path, PathBuf};

use crate::{Chunk, ChunkError, ChunkIndex, ChunkResult, EpisodeBoundaries};

/// The episode-id column every dataset chunk is expected to carry.
pub const EPISODE_INDEX_KEY: &str = "episode_index";

// ---

/// Discovers, loads and owns every data chunk under a dataset's `data/`
/// subtree.
///
/// Loading is all-or-nothing: a single malformed chunk aborts construction,
/// since skipping one would make the global row accounting inconsistent.
#[derive(Debug)]
pub struct ChunkStore {
    chunks: Vec<Chunk>,
    index: ChunkIndex,
    boundaries: EpisodeBoundaries,
}

impl ChunkStore {
    /// Recursively discover and load every `*.parquet` chunk under `data_dir`.
    pub fn load(data_dir: &Path) -> ChunkResult<Self> {
        let paths = discover_chunk_files(data_dir)?;
        if paths.is_empty() {
            return Err(ChunkError::NoChunks(data_dir.to_owned()));
        }

        let chunks = paths
            .iter()
            .map(|path| Chunk::from_parquet(path))
            .collect::<ChunkResult<Vec<_>>>()?;

        Ok(Self::from_chunks(chunks))
    }

    /// Build a store from chunks that are already in memory.
    ///
    /// The chunks must be in frame order.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        let index = ChunkIndex::from_chunks(&chunks);
        let boundaries = EpisodeBoundaries::detect(&chunks, EPISODE_INDEX_KEY);

        log::info!(
            "loaded {} chunks: {} frames, {} episodes",
            chunks.len(),
            index.total_rows(),
            boundaries.count(),
        );

        Self {
            chunks,
            index,
            boundaries,
        }
    }

    #[inline]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[inline]
    pub fn chunk(&self, chunk_id: usize) -> Option<&Chunk> {
        self.chunks.get(chunk_id)
    }

    #[inline]
    pub fn index(&self) -> &ChunkIndex {
        &self.index
    }

    #[inline]
    pub fn boundaries(&self) -> &EpisodeBoundaries {
        &self.boundaries
    }

    /// Total number of frames across all chunks.
    #[inline]
    pub fn num_frames(&self) -> usize {
        self.index.total_rows()
    }

    #[inline]
    pub fn episode_count(&self) -> usize {
        self.boundaries.count()
    }

    /// Locate a global frame index, returning the owning chunk and local row.
    pub fn locate(&self, global: usize) -> ChunkResult<(&Chunk, usize)> {
        let (chunk_id, row) = self.index.locate(global)?;
        debug_assert!(chunk_id < self.chunks.len());
        Ok((&self.chunks[chunk_id], row))
    }
}

// ---

/// All chunk files under `dir`, at any depth of group/chunk nesting.
///
/// Discovery is decoupled from loading and the result is sorted by full path,
/// so the global index→row mapping is deterministic and independent of
/// filesystem iteration order.
pub fn discover_chunk_files(dir: &Path) -> ChunkResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ChunkError::MissingDataDir(dir.to_owned()));
    }

    let mut paths = Vec::new();
    for entry in walkdir::WalkDir::new(dir) {
        let entry = entry.map_err(|err| ChunkError::Io {
            path: dir.to_owned(),
            source: err.into(),
        })?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "parquet")
        {
            paths.push(entry.into_path());
        }
    }

    paths.sort();
    Ok(paths)
}
