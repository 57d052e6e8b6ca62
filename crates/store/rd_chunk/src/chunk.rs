use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::array::{
    Array as ArrowArray, ArrayRef as ArrowArrayRef, FixedSizeListArray, Float32Array,
    Float64Array, Int32Array, Int64Array, ListArray as ArrowListArray, RecordBatch,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

// ---

/// Errors that can occur when discovering, loading or indexing [`Chunk`]s.
#[derive(thiserror::Error, Debug)]
pub enum ChunkError {
    #[error("data directory not found: {0}")]
    MissingDataDir(PathBuf),

    #[error("no chunk files found under {0}")]
    NoChunks(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed chunk {path}: {source}")]
    Parquet {
        path: PathBuf,
        source: parquet::errors::ParquetError,
    },

    #[error("chunk file contains no rows: {0}")]
    Empty(PathBuf),

    #[error("Arrow: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("frame index out of bounds: {index} (total={total})")]
    IndexOutOfBounds { index: usize, total: usize },
}

pub type ChunkResult<T> = Result<T, ChunkError>;

// ---

/// One loaded unit of tabular row data, covering a contiguous range of global
/// frame indices.
///
/// Immutable once loaded. Owned by the [`crate::ChunkStore`] for the dataset's
/// lifetime.
#[derive(Debug, Clone)]
pub struct Chunk {
    path: PathBuf,
    batch: RecordBatch,
}

impl Chunk {
    /// Load a whole Parquet chunk file into memory.
    ///
    /// All record batches in the file are concatenated: a chunk is one table.
    /// Any parse failure is fatal for dataset construction; silently skipping
    /// a chunk would corrupt the global row accounting.
    pub fn from_parquet(path: &Path) -> ChunkResult<Self> {
        let file = File::open(path).map_err(|source| ChunkError::Io {
            path: path.to_owned(),
            source,
        })?;

        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .and_then(|builder| builder.build())
            .map_err(|source| ChunkError::Parquet {
                path: path.to_owned(),
                source,
            })?;

        let batches: Vec<RecordBatch> = reader.collect::<Result<_, _>>()?;
        let Some(first) = batches.first() else {
            return Err(ChunkError::Empty(path.to_owned()));
        };

        let batch = arrow::compute::concat_batches(&first.schema(), &batches)?;
        if batch.num_rows() == 0 {
            return Err(ChunkError::Empty(path.to_owned()));
        }

        Ok(Self {
            path: path.to_owned(),
            batch,
        })
    }

    /// Wrap an already materialized [`RecordBatch`].
    ///
    /// `path` is only used for provenance (camera-file resolution, error
    /// messages) and does not have to exist on disk.
    pub fn from_record_batch(path: impl Into<PathBuf>, batch: RecordBatch) -> Self {
        Self {
            path: path.into(),
            batch,
        }
    }

    /// The file this chunk was loaded from.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// All column names, in schema order.
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect()
    }

    /// Resolve a column by name into a typed view.
    #[inline]
    pub fn column(&self, name: &str) -> Column<'_> {
        Column::resolve(&self.batch, name)
    }

    /// The row's feature vector for `name`, if the column exists and the row
    /// is non-null.
    #[inline]
    pub fn vector_at(&self, name: &str, row: usize) -> Option<Vec<f32>> {
        self.column(name).vector(row)
    }

    /// The row's scalar value for `name` (e.g. a timestamp), if present.
    #[inline]
    pub fn scalar_at(&self, name: &str, row: usize) -> Option<f64> {
        self.column(name).scalar(row)
    }

    /// The row's integer value for `name` (e.g. an episode id), if present.
    #[inline]
    pub fn int_at(&self, name: &str, row: usize) -> Option<i64> {
        self.column(name).int(row)
    }
}

// ---

/// A column resolved by name into a tagged, typed view.
///
/// Dataset schemas are heterogeneous and evolve over time, so resolution has
/// to tolerate both missing columns and multiple physical encodings of the
/// same logical data. Every consumer handles [`Column::Absent`] explicitly
/// instead of crashing on a failed lookup.
#[derive(Debug, Clone, Copy)]
pub enum Column<'a> {
    /// Fixed-length feature vectors (`FixedSizeList<Float32>`), the common
    /// encoding for state/action columns.
    FixedVec(&'a FixedSizeListArray),

    /// Variable-length feature vectors (`List<Float32>`).
    VarVec(&'a ArrowListArray),

    /// Legacy scalar encoding of a one-dimensional feature.
    F32(&'a Float32Array),

    F64(&'a Float64Array),

    I32(&'a Int32Array),

    I64(&'a Int64Array),

    /// The column exists but has a datatype we don't know how to read.
    Unsupported,

    /// No column with the requested name.
    Absent,
}

impl<'a> Column<'a> {
    pub fn resolve(batch: &'a RecordBatch, name: &str) -> Self {
        let Some(array) = batch.column_by_name(name) else {
            return Self::Absent;
        };

        let any = array.as_any();
        if let Some(array) = any.downcast_ref::<FixedSizeListArray>() {
            Self::FixedVec(array)
        } else if let Some(array) = any.downcast_ref::<ArrowListArray>() {
            Self::VarVec(array)
        } else if let Some(array) = any.downcast_ref::<Float32Array>() {
            Self::F32(array)
        } else if let Some(array) = any.downcast_ref::<Float64Array>() {
            Self::F64(array)
        } else if let Some(array) = any.downcast_ref::<Int32Array>() {
            Self::I32(array)
        } else if let Some(array) = any.downcast_ref::<Int64Array>() {
            Self::I64(array)
        } else {
            Self::Unsupported
        }
    }

    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Feature dimensionality, if it can be determined.
    ///
    /// Fixed-size lists know their length up front; variable lists report the
    /// first non-null row; scalar columns are dimensionality 1.
    pub fn dim(&self) -> Option<usize> {
        match self {
            Self::FixedVec(array) => Some(array.value_length() as usize),
            Self::VarVec(array) => (0..array.len())
                .find(|&row| array.is_valid(row))
                .map(|row| array.value(row).len()),
            Self::F32(_) | Self::F64(_) | Self::I32(_) | Self::I64(_) => Some(1),
            Self::Unsupported | Self::Absent => None,
        }
    }

    /// The row's feature vector as `f32`, if the row exists and is non-null.
    pub fn vector(&self, row: usize) -> Option<Vec<f32>> {
        match self {
            Self::FixedVec(array) => (row < array.len() && array.is_valid(row))
                .then(|| values_as_f32(&array.value(row)))
                .flatten(),
            Self::VarVec(array) => (row < array.len() && array.is_valid(row))
                .then(|| values_as_f32(&array.value(row)))
                .flatten(),
            Self::F32(array) => {
                (row < array.len() && array.is_valid(row)).then(|| vec![array.value(row)])
            }
            Self::F64(array) => {
                (row < array.len() && array.is_valid(row)).then(|| vec![array.value(row) as f32])
            }
            Self::I32(_) | Self::I64(_) | Self::Unsupported | Self::Absent => None,
        }
    }

    /// The row as a scalar, if the column holds scalars and the row is non-null.
    pub fn scalar(&self, row: usize) -> Option<f64> {
        match self {
            Self::F32(array) => {
                (row < array.len() && array.is_valid(row)).then(|| f64::from(array.value(row)))
            }
            Self::F64(array) => {
                (row < array.len() && array.is_valid(row)).then(|| array.value(row))
            }
            Self::I32(array) => {
                (row < array.len() && array.is_valid(row)).then(|| f64::from(array.value(row)))
            }
            Self::I64(array) => {
                (row < array.len() && array.is_valid(row)).then(|| array.value(row) as f64)
            }
            Self::FixedVec(_) | Self::VarVec(_) | Self::Unsupported | Self::Absent => None,
        }
    }

    /// The row as an integer, if the column holds integers and the row is non-null.
    pub fn int(&self, row: usize) -> Option<i64> {
        match self {
            Self::I32(array) => {
                (row < array.len() && array.is_valid(row)).then(|| i64::from(array.value(row)))
            }
            Self::I64(array) => {
                (row < array.len() && array.is_valid(row)).then(|| array.value(row))
            }
            Self::FixedVec(_)
            | Self::VarVec(_)
            | Self::F32(_)
            | Self::F64(_)
            | Self::Unsupported
            | Self::Absent => None,
        }
    }
}

/// Read a row's inner values array out as `f32`s.
///
/// Inner nulls are not expected in practice; they read as zero.
fn values_as_f32(values: &ArrowArrayRef) -> Option<Vec<f32>> {
    let any = values.as_any();
    if let Some(floats) = any.downcast_ref::<Float32Array>() {
        Some(
            (0..floats.len())
                .map(|i| if floats.is_valid(i) { floats.value(i) } else { 0.0 })
                .collect(),
        )
    } else if let Some(floats) = any.downcast_ref::<Float64Array>() {
        Some(
            (0..floats.len())
                .map(|i| if floats.is_valid(i) { floats.value(i) as f32 } else { 0.0 })
                .collect(),
        )
    } else {
        None
    }
}

// ---

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, FixedSizeListBuilder, Float32Array, Float32Builder, Int64Array};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;

    use super::Column;

    fn batch_of(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
            .collect();
        let arrays = columns.into_iter().map(|(_, array)| array).collect();
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
    }

    fn fixed_vec_column(rows: &[Option<&[f32]>], dim: i32) -> ArrayRef {
        let mut builder = FixedSizeListBuilder::new(Float32Builder::new(), dim);
        for row in rows {
            match row {
                Some(values) => {
                    builder.values().append_slice(values);
                    builder.append(true);
                }
                None => {
                    for _ in 0..dim {
                        builder.values().append_null();
                    }
                    builder.append(false);
                }
            }
        }
        Arc::new(builder.finish())
    }

    #[test]
    fn fixed_vec_roundtrip() {
        let batch = batch_of(vec![(
            "observation.state",
            fixed_vec_column(&[Some(&[1.0, 2.0]), None, Some(&[3.0, 4.0])], 2),
        )]);

        let col = Column::resolve(&batch, "observation.state");
        assert_eq!(col.dim(), Some(2));
        assert_eq!(col.vector(0), Some(vec![1.0, 2.0]));
        assert_eq!(col.vector(1), None); // null row
        assert_eq!(col.vector(2), Some(vec![3.0, 4.0]));
        assert_eq!(col.vector(3), None); // past the end
    }

    #[test]
    fn scalar_fallback_is_dim_1() {
        let scalars: ArrayRef = Arc::new(Float32Array::from(vec![0.5_f32, 1.5]));
        let batch = batch_of(vec![("action", scalars)]);

        let col = Column::resolve(&batch, "action");
        assert_eq!(col.dim(), Some(1));
        assert_eq!(col.vector(1), Some(vec![1.5]));
        assert_eq!(col.scalar(0), Some(0.5));
    }

    #[test]
    fn absent_column_is_explicit() {
        let ids: ArrayRef = Arc::new(Int64Array::from(vec![0_i64, 0, 1]));
        let batch = batch_of(vec![("episode_index", ids)]);

        assert!(Column::resolve(&batch, "nope").is_absent());
        assert_eq!(Column::resolve(&batch, "nope").vector(0), None);

        let col = Column::resolve(&batch, "episode_index");
        assert_eq!(col.int(2), Some(1));
        assert_eq!(col.vector(0), None); // integers are not feature vectors
    }
}
