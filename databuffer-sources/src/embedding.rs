use std::fs;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array};

use databuffer_core::error::DataBufferError;
use databuffer_core::source::{ChunkIter, DataChunk, DataSource, SourceDescriptor};

/// Embedding/label pair source: a points file of whitespace-separated
/// `x y` lines plus a labels file with one integer label per line, matched
/// by line index.
pub struct EmbeddingSource {
    descriptor: SourceDescriptor,
    chunk: DataChunk,
}

impl EmbeddingSource {
    pub fn open(points_path: &Path, labels_path: &Path) -> Result<Self, DataBufferError> {
        let (xs, ys) = read_points(points_path)?;
        let labels = read_labels(labels_path)?;
        if xs.len() != labels.len() {
            return Err(DataBufferError::MalformedInput(format!(
                "{} points but {} labels",
                xs.len(),
                labels.len()
            )));
        }
        let chunk = DataChunk::new(
            Float64Array::from(xs),
            Float64Array::from(ys),
            Arc::new(Int64Array::from(labels)) as ArrayRef,
        )?;
        let category_field = labels_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("label")
            .to_string();
        Ok(Self {
            descriptor: SourceDescriptor {
                filename: points_path.display().to_string(),
                kind: "txt".to_string(),
                x_field: "x".to_string(),
                y_field: "y".to_string(),
                category_field,
            },
            chunk,
        })
    }
}

impl DataSource for EmbeddingSource {
    fn descriptor(&self) -> SourceDescriptor {
        self.descriptor.clone()
    }

    fn scan(&self) -> Result<ChunkIter<'_>, DataBufferError> {
        Ok(Box::new(std::iter::once(Ok(self.chunk.clone()))))
    }
}

fn read_points(path: &Path) -> Result<(Vec<f64>, Vec<f64>), DataBufferError> {
    let content = fs::read_to_string(path)?;
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let x = parts.next().and_then(|v| v.parse().ok());
        let y = parts.next().and_then(|v| v.parse().ok());
        match (x, y) {
            (Some(x), Some(y)) if parts.next().is_none() => {
                xs.push(x);
                ys.push(y);
            }
            _ => {
                return Err(DataBufferError::MalformedInput(format!(
                    "{}:{}: expected `x y`, got `{line}`",
                    path.display(),
                    index + 1
                )))
            }
        }
    }
    Ok((xs, ys))
}

fn read_labels(path: &Path) -> Result<Vec<i64>, DataBufferError> {
    let content = fs::read_to_string(path)?;
    let mut labels = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let label = line.parse().map_err(|_| {
            DataBufferError::MalformedInput(format!(
                "{}:{}: bad label `{line}`",
                path.display(),
                index + 1
            ))
        })?;
        labels.push(label);
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use databuffer_core::source::CategoryValue;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_open_and_scan() {
        let dir = tempfile::tempdir().unwrap();
        let points = write_file(&dir, "tsne.txt", "0.5 1.5\n-2.0 3.0\n7.25 -0.5\n");
        let labels = write_file(&dir, "digits.txt", "3\n7\n3\n");
        let source = EmbeddingSource::open(&points, &labels).unwrap();

        let chunks: Vec<DataChunk> = source.scan().unwrap().map(Result::unwrap).collect();
        assert_eq!(chunks.len(), 1);
        let chunk = &chunks[0];
        assert_eq!(chunk.len(), 3);
        assert_eq!(chunk.x().value(1), -2.0);
        assert_eq!(chunk.y().value(2), -0.5);
        assert_eq!(chunk.category_values().unwrap()[1], CategoryValue::Number(7));
        assert_eq!(source.descriptor().category_field, "digits");
    }

    #[test]
    fn test_length_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let points = write_file(&dir, "tsne.txt", "0.5 1.5\n-2.0 3.0\n");
        let labels = write_file(&dir, "digits.txt", "3\n");
        assert!(matches!(
            EmbeddingSource::open(&points, &labels),
            Err(DataBufferError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_bad_point_line() {
        let dir = tempfile::tempdir().unwrap();
        let points = write_file(&dir, "tsne.txt", "0.5 1.5\n0.25\n");
        let labels = write_file(&dir, "digits.txt", "3\n7\n");
        assert!(matches!(
            EmbeddingSource::open(&points, &labels),
            Err(DataBufferError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_bad_label() {
        let dir = tempfile::tempdir().unwrap();
        let points = write_file(&dir, "tsne.txt", "0.5 1.5\n");
        let labels = write_file(&dir, "digits.txt", "seven\n");
        assert!(matches!(
            EmbeddingSource::open(&points, &labels),
            Err(DataBufferError::MalformedInput(_))
        ));
    }
}
