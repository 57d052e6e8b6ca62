//! Chunked columnar storage and indexing for robot-demonstration episodes.
//!
//! A dataset's numeric per-frame data lives in Parquet chunk files under
//! `<root>/data/<group>/<chunk>.parquet`. This crate discovers and loads those
//! chunks ([`ChunkStore`]), translates flat frame indices into chunk-local rows
//! ([`ChunkIndex`]), and detects episode starts ([`EpisodeBoundaries`]).
//!
//! Chunks are loaded once at construction and never mutated: everything in
//! here may be read concurrently without synchronization once loading is done.

mod chunk;
mod index;
mod store;

pub use self::chunk::{Chunk, ChunkError, ChunkResult, Column};
pub use self::index::{ChunkIndex, EpisodeBoundaries};
pub use self::store::{ChunkStore, EPISODE_INDEX_KEY, discover_chunk_files};
