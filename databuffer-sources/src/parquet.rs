use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ::parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use ::parquet::arrow::ProjectionMask;
use ::parquet::file::metadata::ParquetMetaData;
use ::parquet::file::statistics::Statistics;
use arrow::array::{ArrayRef, AsArray, Float64Array, RecordBatch};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};
use log::debug;

use databuffer_core::error::DataBufferError;
use databuffer_core::source::{ChunkIter, ColumnStats, DataChunk, DataSource, SourceDescriptor};

use crate::check_extension;
use crate::error::DataSourceError;

/// Columnar chunked-file source. Record batches stream straight out of the
/// file's row groups; per-column min/max comes from row-group statistics
/// when every row group carries them.
pub struct ParquetSource {
    path: PathBuf,
    descriptor: SourceDescriptor,
    metadata: Arc<ParquetMetaData>,
}

impl ParquetSource {
    pub fn open(path: &Path, x: &str, y: &str, category: &str) -> Result<Self, DataBufferError> {
        check_extension(path, &["parq", "parquet"], "parquet")?;
        let file = File::open(path)?;
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(file).map_err(DataSourceError::from)?;
        for column in [x, y, category] {
            if builder.schema().index_of(column).is_err() {
                return Err(DataBufferError::UnknownColumn(column.to_string()));
            }
        }
        let metadata = Arc::clone(builder.metadata());
        Ok(Self {
            path: path.to_path_buf(),
            descriptor: SourceDescriptor {
                filename: path.display().to_string(),
                kind: "parq".to_string(),
                x_field: x.to_string(),
                y_field: y.to_string(),
                category_field: category.to_string(),
            },
            metadata,
        })
    }

    fn reader(&self) -> Result<ParquetRecordBatchReader, DataBufferError> {
        let file = File::open(&self.path)?;
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(file).map_err(DataSourceError::from)?;
        let mask = ProjectionMask::columns(
            builder.parquet_schema(),
            [
                self.descriptor.x_field.as_str(),
                self.descriptor.y_field.as_str(),
                self.descriptor.category_field.as_str(),
            ],
        );
        builder
            .with_projection(mask)
            .build()
            .map_err(|e| DataSourceError::from(e).into())
    }
}

impl DataSource for ParquetSource {
    fn descriptor(&self) -> SourceDescriptor {
        self.descriptor.clone()
    }

    /// Min/max folded over the statistics of every row group. `None` when
    /// any row group lacks them, forcing the resolver's scan fallback.
    fn column_stats(&self, column: &str) -> Option<ColumnStats> {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for row_group in self.metadata.row_groups() {
            let chunk = row_group
                .columns()
                .iter()
                .find(|c| c.column_descr().name() == column)?;
            let (lo, hi) = stat_min_max(chunk.statistics()?)?;
            min = min.min(lo);
            max = max.max(hi);
        }
        if min.is_finite() && max.is_finite() {
            Some(ColumnStats { min, max })
        } else {
            None
        }
    }

    fn scan(&self) -> Result<ChunkIter<'_>, DataBufferError> {
        let reader = self.reader()?;
        let descriptor = self.descriptor.clone();
        Ok(Box::new(reader.map(move |batch| {
            let batch = batch.map_err(DataBufferError::from)?;
            debug!("Read record batch of {} rows", batch.num_rows());
            batch_to_chunk(&batch, &descriptor)
        })))
    }
}

fn stat_min_max(statistics: &Statistics) -> Option<(f64, f64)> {
    match statistics {
        Statistics::Double(s) => Some((*s.min_opt()?, *s.max_opt()?)),
        Statistics::Float(s) => Some((*s.min_opt()? as f64, *s.max_opt()? as f64)),
        Statistics::Int64(s) => Some((*s.min_opt()? as f64, *s.max_opt()? as f64)),
        Statistics::Int32(s) => Some((*s.min_opt()? as f64, *s.max_opt()? as f64)),
        _ => None,
    }
}

fn batch_to_chunk(
    batch: &RecordBatch,
    descriptor: &SourceDescriptor,
) -> Result<DataChunk, DataBufferError> {
    let x = float_column(batch, &descriptor.x_field)?;
    let y = float_column(batch, &descriptor.y_field)?;
    let category = category_column(batch, &descriptor.category_field)?;
    DataChunk::new(x, y, category)
}

fn float_column(batch: &RecordBatch, name: &str) -> Result<Float64Array, DataBufferError> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| DataBufferError::UnknownColumn(name.to_string()))?;
    let column = cast(column, &DataType::Float64)?;
    Ok(column.as_primitive::<Float64Type>().clone())
}

/// Category columns pass through when already a supported label type;
/// dictionary and string-view encodings decode to plain text, narrow
/// integers widen.
fn category_column(batch: &RecordBatch, name: &str) -> Result<ArrayRef, DataBufferError> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| DataBufferError::UnknownColumn(name.to_string()))?;
    match column.data_type() {
        DataType::Utf8 | DataType::Int64 | DataType::Int32 => Ok(column.clone()),
        DataType::LargeUtf8 | DataType::Utf8View | DataType::Dictionary(_, _) => {
            Ok(cast(column, &DataType::Utf8)?)
        }
        DataType::Int8 | DataType::Int16 | DataType::UInt8 | DataType::UInt16
        | DataType::UInt32 => Ok(cast(column, &DataType::Int64)?),
        other => Err(DataBufferError::CategoryType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::parquet::arrow::ArrowWriter;
    use ::parquet::file::properties::WriterProperties;
    use arrow::array::StringArray;
    use arrow::datatypes::{Field, Schema};
    use databuffer_core::source::CategoryValue;

    fn write_sample(path: &Path, row_group_size: usize) {
        let schema = Arc::new(Schema::new(vec![
            Field::new("easting", DataType::Float64, false),
            Field::new("northing", DataType::Float64, false),
            Field::new("race", DataType::Utf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Float64Array::from(vec![1.0, 9.0, 1.0, 5.0])) as ArrayRef,
                Arc::new(Float64Array::from(vec![1.0, 9.0, 9.0, 5.0])) as ArrayRef,
                Arc::new(StringArray::from(vec!["w", "w", "b", "a"])) as ArrayRef,
            ],
        )
        .unwrap();
        let props = WriterProperties::builder()
            .set_max_row_group_size(row_group_size)
            .build();
        let file = File::create(path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, Some(props)).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn test_open_and_column_stats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("census.parq");
        write_sample(&path, 2);

        let source = ParquetSource::open(&path, "easting", "northing", "race").unwrap();
        assert_eq!(
            source.column_stats("easting"),
            Some(ColumnStats { min: 1.0, max: 9.0 })
        );
        assert_eq!(
            source.column_stats("northing"),
            Some(ColumnStats { min: 1.0, max: 9.0 })
        );
        // Text columns carry no numeric statistics
        assert_eq!(source.column_stats("race"), None);
    }

    #[test]
    fn test_scan_streams_row_groups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("census.parq");
        write_sample(&path, 2);

        let source = ParquetSource::open(&path, "easting", "northing", "race").unwrap();
        let chunks: Vec<DataChunk> = source
            .scan()
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        // Two row groups of two rows each
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks.iter().map(DataChunk::len).sum::<usize>(), 4);
        assert_eq!(
            chunks[1].category_values().unwrap()[0],
            CategoryValue::Text("b".to_string())
        );

        // A second scan yields the same data
        let again: Vec<DataChunk> = source
            .scan()
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(again[0].x().value(1), chunks[0].x().value(1));
    }

    #[test]
    fn test_unknown_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("census.parq");
        write_sample(&path, 4);
        assert!(matches!(
            ParquetSource::open(&path, "easting", "altitude", "race"),
            Err(DataBufferError::UnknownColumn(name)) if name == "altitude"
        ));
    }

    #[test]
    fn test_wrong_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("census.arrow");
        write_sample(&path, 4);
        assert!(matches!(
            ParquetSource::open(&path, "easting", "northing", "race"),
            Err(DataBufferError::InvalidFormat { .. })
        ));
    }
}
