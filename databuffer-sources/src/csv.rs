use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray};

use databuffer_core::error::DataBufferError;
use databuffer_core::source::{ChunkIter, DataChunk, DataSource, SourceDescriptor};

use crate::check_extension;
use crate::error::DataSourceError;

/// Delimited-text source, fully materialized at open time into a single
/// chunk.
pub struct CsvSource {
    descriptor: SourceDescriptor,
    chunk: DataChunk,
}

impl CsvSource {
    /// Read the x/y/category columns of a `.csv` file. `filter`, when
    /// supplied, is a category allow-list: rows carrying any other label
    /// are dropped at read time and never reach the accumulator.
    pub fn open(
        path: &Path,
        x: &str,
        y: &str,
        category: &str,
        filter: Option<&[String]>,
    ) -> Result<Self, DataBufferError> {
        check_extension(path, &["csv"], "csv")?;

        let mut reader = ::csv::Reader::from_path(path).map_err(DataSourceError::from)?;
        let headers = reader.headers().map_err(DataSourceError::from)?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| DataBufferError::UnknownColumn(name.to_string()))
        };
        let xi = column(x)?;
        let yi = column(y)?;
        let ci = column(category)?;

        let mut xs = Vec::new();
        let mut ys = Vec::new();
        let mut labels = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(DataSourceError::from)?;
            let field = |index: usize, name: &str| {
                record.get(index).ok_or_else(|| {
                    DataBufferError::MalformedInput(format!(
                        "{}:{}: missing column `{name}`",
                        path.display(),
                        row + 2
                    ))
                })
            };
            let label = field(ci, category)?;
            if let Some(allowed) = filter {
                if !allowed.iter().any(|a| a == label) {
                    continue;
                }
            }
            let number = |index: usize, name: &str| -> Result<f64, DataBufferError> {
                let raw = field(index, name)?;
                raw.trim().parse().map_err(|_| {
                    DataBufferError::MalformedInput(format!(
                        "{}:{}: bad number `{raw}` in column `{name}`",
                        path.display(),
                        row + 2
                    ))
                })
            };
            let label = label.to_string();
            xs.push(number(xi, x)?);
            ys.push(number(yi, y)?);
            labels.push(label);
        }

        let chunk = DataChunk::new(
            Float64Array::from(xs),
            Float64Array::from(ys),
            Arc::new(StringArray::from(labels)) as ArrayRef,
        )?;
        Ok(Self {
            descriptor: SourceDescriptor {
                filename: path.display().to_string(),
                kind: "csv".to_string(),
                x_field: x.to_string(),
                y_field: y.to_string(),
                category_field: category.to_string(),
            },
            chunk,
        })
    }
}

impl DataSource for CsvSource {
    fn descriptor(&self) -> SourceDescriptor {
        self.descriptor.clone()
    }

    fn scan(&self) -> Result<ChunkIter<'_>, DataBufferError> {
        Ok(Box::new(std::iter::once(Ok(self.chunk.clone()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use databuffer_core::source::CategoryValue;
    use std::io::Write;

    fn write_sample(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    const SAMPLE: &str = "lon,lat,mode\n1.0,2.0,walk\n3.5,4.5,bike\n5.0,6.0,walk\n";

    #[test]
    fn test_open_and_scan() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(&dir, "trips.csv", SAMPLE);
        let source = CsvSource::open(&path, "lon", "lat", "mode", None).unwrap();

        let chunks: Vec<DataChunk> = source.scan().unwrap().map(Result::unwrap).collect();
        assert_eq!(chunks.len(), 1);
        let chunk = &chunks[0];
        assert_eq!(chunk.len(), 3);
        assert_eq!(chunk.x().value(1), 3.5);
        assert_eq!(chunk.y().value(2), 6.0);
        assert_eq!(
            chunk.category_values().unwrap()[1],
            CategoryValue::Text("bike".to_string())
        );
        assert_eq!(source.descriptor().kind, "csv");
    }

    #[test]
    fn test_filter_drops_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(&dir, "trips.csv", SAMPLE);
        let filter = vec!["walk".to_string()];
        let source = CsvSource::open(&path, "lon", "lat", "mode", Some(&filter)).unwrap();
        let chunks: Vec<DataChunk> = source.scan().unwrap().map(Result::unwrap).collect();
        assert_eq!(chunks[0].len(), 2);
    }

    #[test]
    fn test_wrong_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(&dir, "trips.tsv", SAMPLE);
        assert!(matches!(
            CsvSource::open(&path, "lon", "lat", "mode", None),
            Err(DataBufferError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_unknown_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(&dir, "trips.csv", SAMPLE);
        assert!(matches!(
            CsvSource::open(&path, "lon", "lat", "color", None),
            Err(DataBufferError::UnknownColumn(name)) if name == "color"
        ));
    }

    #[test]
    fn test_bad_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(&dir, "trips.csv", "lon,lat,mode\noops,2.0,walk\n");
        assert!(matches!(
            CsvSource::open(&path, "lon", "lat", "mode", None),
            Err(DataBufferError::MalformedInput(_))
        ));
    }
}
