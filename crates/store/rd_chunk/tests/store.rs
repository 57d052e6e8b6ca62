use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, FixedSizeListBuilder, Float32Builder, Float64Array, Int64Array};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use similar_asserts::assert_eq;

use rd_chunk::{ChunkError, ChunkStore, discover_chunk_files};

// ---

/// Writes a Parquet chunk with the standard columns: a 2d state vector per
/// row, a 2d action vector, an episode id and a timestamp.
fn write_chunk(path: &Path, episode_ids: &[i64], first_timestamp: f64) -> anyhow::Result<()> {
    let num_rows = episode_ids.len();

    let mut state = FixedSizeListBuilder::new(Float32Builder::new(), 2);
    let mut action = FixedSizeListBuilder::new(Float32Builder::new(), 2);
    for row in 0..num_rows {
        state.values().append_slice(&[row as f32, row as f32 + 0.5]);
        state.append(true);
        action.values().append_slice(&[-(row as f32), 1.0]);
        action.append(true);
    }

    let columns: Vec<(&str, ArrayRef)> = vec![
        ("observation.state", Arc::new(state.finish())),
        ("action", Arc::new(action.finish())),
        ("episode_index", Arc::new(Int64Array::from(episode_ids.to_vec()))),
        (
            "timestamp",
            Arc::new(Float64Array::from(
                (0..num_rows)
                    .map(|row| first_timestamp + row as f64 / 30.0)
                    .collect::<Vec<_>>(),
            )),
        ),
    ];

    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect();
    let batch = RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        columns.into_iter().map(|(_, array)| array).collect(),
    )?;

    std::fs::create_dir_all(path.parent().unwrap())?;
    let mut writer = ArrowWriter::try_new(File::create(path)?, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

#[test]
fn discovery_is_sorted_and_filtered() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let data = dir.path().join("data");

    // Created out of order on purpose.
    write_chunk(&data.join("chunk-001/file-000.parquet"), &[2, 2], 0.0)?;
    write_chunk(&data.join("chunk-000/file-001.parquet"), &[1, 1], 0.0)?;
    write_chunk(&data.join("chunk-000/file-000.parquet"), &[0, 0, 0], 0.0)?;
    std::fs::write(data.join("chunk-000/notes.json"), "{}")?;

    let paths = discover_chunk_files(&data)?;
    assert_eq!(paths.len(), 3);
    assert!(paths[0].ends_with("chunk-000/file-000.parquet"));
    assert!(paths[1].ends_with("chunk-000/file-001.parquet"));
    assert!(paths[2].ends_with("chunk-001/file-000.parquet"));

    Ok(())
}

#[test]
fn load_builds_index_and_boundaries() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let data = dir.path().join("data");

    // Row counts [3, 2] with episode ids [0,0,1 | 1,1].
    write_chunk(&data.join("chunk-000/file-000.parquet"), &[0, 0, 1], 0.0)?;
    write_chunk(&data.join("chunk-000/file-001.parquet"), &[1, 1], 0.1)?;

    let store = ChunkStore::load(&data)?;
    assert_eq!(store.num_frames(), 5);
    assert_eq!(store.episode_count(), 2);
    assert_eq!(store.boundaries().starts(), &[0, 2]);
    assert_eq!(store.index().locate(4)?, (1, 1));

    // Round-trip law over every valid index.
    for global in 0..store.num_frames() {
        let (chunk_id, row) = store.index().locate(global)?;
        assert!(row < store.chunk(chunk_id).unwrap().num_rows());
        assert_eq!(store.index().global_at(chunk_id, row), global);
    }

    // Row data is readable through the typed column views.
    let (chunk, row) = store.locate(3)?;
    assert_eq!(chunk.vector_at("observation.state", row), Some(vec![1.0, 1.5]));
    assert_eq!(chunk.int_at("episode_index", row), Some(1));

    Ok(())
}

#[test]
fn malformed_chunk_fails_construction() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let data = dir.path().join("data");

    write_chunk(&data.join("chunk-000/file-000.parquet"), &[0, 0], 0.0)?;
    std::fs::write(data.join("chunk-000/file-001.parquet"), b"not a parquet file")?;

    let result = ChunkStore::load(&data);
    assert!(matches!(result, Err(ChunkError::Parquet { .. })));

    Ok(())
}

#[test]
fn missing_data_dir_is_fatal() {
    let result = ChunkStore::load(Path::new("/definitely/not/a/dataset/data"));
    assert!(matches!(result, Err(ChunkError::MissingDataDir(_))));
}

#[test]
fn empty_tree_has_no_chunks() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let data = dir.path().join("data");
    std::fs::create_dir_all(data.join("chunk-000"))?;

    assert!(matches!(
        ChunkStore::load(&data),
        Err(ChunkError::NoChunks(_))
    ));

    Ok(())
}
