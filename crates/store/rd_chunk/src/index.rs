use crate::{Chunk, ChunkError, ChunkResult};

// ---

/// Prefix-sum lookup table translating a flat global frame index into
/// `(chunk id, local row)`.
///
/// This is a pure function of the immutable chunk list: chunks never change
/// after loading, so there is nothing to invalidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkIndex {
    /// `cumulative[i]` is the total number of rows in chunks `0..=i`.
    ///
    /// Monotone non-decreasing by construction.
    cumulative: Vec<usize>,
}

impl ChunkIndex {
    pub fn new(row_counts: impl IntoIterator<Item = usize>) -> Self {
        let mut total = 0;
        let cumulative = row_counts
            .into_iter()
            .map(|count| {
                total += count;
                total
            })
            .collect();
        Self { cumulative }
    }

    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        Self::new(chunks.iter().map(Chunk::num_rows))
    }

    #[inline]
    pub fn num_chunks(&self) -> usize {
        self.cumulative.len()
    }

    /// Total number of frames across all chunks.
    #[inline]
    pub fn total_rows(&self) -> usize {
        self.cumulative.last().copied().unwrap_or(0)
    }

    /// Translate a global frame index into `(chunk id, local row)`.
    ///
    /// Errors on `global >= total_rows()`; indices are never clamped.
    pub fn locate(&self, global: usize) -> ChunkResult<(usize, usize)> {
        let total = self.total_rows();
        if global >= total {
            return Err(ChunkError::IndexOutOfBounds {
                index: global,
                total,
            });
        }

        // First chunk whose cumulative row count exceeds the index.
        let chunk = self.cumulative.partition_point(|&end| end <= global);
        let preceding = if chunk == 0 {
            0
        } else {
            self.cumulative[chunk - 1]
        };
        Ok((chunk, global - preceding))
    }

    /// Inverse of [`Self::locate`]: reconstruct the global index of a local row.
    ///
    /// `chunk` must be a valid chunk id, i.e. `< num_chunks()`.
    #[inline]
    pub fn global_at(&self, chunk: usize, row: usize) -> usize {
        debug_assert!(
            chunk < self.num_chunks(),
            "chunk id {chunk} out of range (num_chunks={})",
            self.num_chunks()
        );
        let preceding = if chunk == 0 {
            0
        } else {
            self.cumulative[chunk - 1]
        };
        preceding + row
    }
}

// ---

/// Global frame indices at which episodes begin.
///
/// Strictly increasing, first element always 0, length equals the episode
/// count. Built once after all chunks have loaded, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeBoundaries {
    starts: Vec<usize>,
}

impl EpisodeBoundaries {
    /// Scan the episode-id column of every chunk, row by row, in chunk-load
    /// order.
    ///
    /// A boundary is recorded at global index 0 unconditionally, and wherever
    /// the id differs from the immediately preceding row, including across a
    /// chunk border (the previous chunk's trailing id is carried over).
    /// Rows with no readable id inherit the previous one.
    ///
    /// The final sort is defensive: detection already proceeds in index order,
    /// but the invariant must hold even if chunk load order ever isn't strictly
    /// index order.
    pub fn detect(chunks: &[Chunk], episode_key: &str) -> Self {
        let mut starts = Vec::new();
        let mut prev: Option<i64> = None;
        let mut global = 0;

        for chunk in chunks {
            let ids = chunk.column(episode_key);
            for row in 0..chunk.num_rows() {
                let id = ids.int(row).or(prev);
                if global == 0 || id != prev {
                    starts.push(global);
                }
                prev = id;
                global += 1;
            }
        }

        starts.sort_unstable();
        starts.dedup();

        Self { starts }
    }

    /// Number of episodes.
    #[inline]
    pub fn count(&self) -> usize {
        self.starts.len()
    }

    /// The first global frame index of each episode, ascending.
    #[inline]
    pub fn starts(&self) -> &[usize] {
        &self.starts
    }
}

// ---

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Int64Array};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;

    use crate::{Chunk, ChunkError, EPISODE_INDEX_KEY};

    use super::{ChunkIndex, EpisodeBoundaries};

    fn episode_chunk(name: &str, ids: &[i64]) -> Chunk {
        let array: ArrayRef = Arc::new(Int64Array::from(ids.to_vec()));
        let schema = Schema::new(vec![Field::new(
            EPISODE_INDEX_KEY,
            array.data_type().clone(),
            true,
        )]);
        Chunk::from_record_batch(name, RecordBatch::try_new(Arc::new(schema), vec![array]).unwrap())
    }

    #[test]
    fn locate_round_trips_every_index() {
        let index = ChunkIndex::new([3, 1, 4, 2]);
        assert_eq!(index.total_rows(), 10);

        for global in 0..index.total_rows() {
            let (chunk, row) = index.locate(global).unwrap();
            assert!(chunk < index.num_chunks());
            assert_eq!(index.global_at(chunk, row), global);
        }
    }

    #[test]
    #[should_panic(expected = "chunk id 2 out of range")]
    fn global_at_rejects_invalid_chunk_ids() {
        ChunkIndex::new([3, 2]).global_at(2, 0);
    }

    #[test]
    fn locate_rejects_out_of_range() {
        let index = ChunkIndex::new([3, 2]);

        assert_eq!(index.locate(4).unwrap(), (1, 1));
        assert!(matches!(
            index.locate(5),
            Err(ChunkError::IndexOutOfBounds { index: 5, total: 5 })
        ));
        assert!(index.locate(usize::MAX).is_err());

        let empty = ChunkIndex::new([]);
        assert!(empty.locate(0).is_err());
    }

    #[test]
    fn boundaries_for_the_canonical_two_chunk_layout() {
        // Row counts [3, 2], episode ids [0,0,1 | 1,1].
        let chunks = vec![
            episode_chunk("chunk-0", &[0, 0, 1]),
            episode_chunk("chunk-1", &[1, 1]),
        ];

        let boundaries = EpisodeBoundaries::detect(&chunks, EPISODE_INDEX_KEY);
        assert_eq!(boundaries.starts(), &[0, 2]);
        assert_eq!(boundaries.count(), 2);
    }

    #[test]
    fn boundary_across_a_chunk_border() {
        // The id changes exactly at the first row of the second chunk.
        let chunks = vec![
            episode_chunk("chunk-0", &[0, 0, 0]),
            episode_chunk("chunk-1", &[1, 1]),
        ];

        let boundaries = EpisodeBoundaries::detect(&chunks, EPISODE_INDEX_KEY);
        assert_eq!(boundaries.starts(), &[0, 3]);
    }

    #[test]
    fn missing_episode_column_yields_one_episode() {
        let chunks = vec![episode_chunk("chunk-0", &[7, 7, 7])];
        let boundaries = EpisodeBoundaries::detect(&chunks, "some_other_key");
        assert_eq!(boundaries.starts(), &[0]);
    }

    #[test]
    fn first_row_is_always_a_boundary() {
        let chunks = vec![episode_chunk("chunk-0", &[5, 5, 6, 6, 6, 7])];
        let boundaries = EpisodeBoundaries::detect(&chunks, EPISODE_INDEX_KEY);
        assert_eq!(boundaries.starts(), &[0, 2, 5]);
        assert_eq!(boundaries.starts()[0], 0);
        assert!(boundaries.starts().windows(2).all(|pair| pair[0] < pair[1]));
    }
}
