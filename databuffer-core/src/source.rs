use std::fmt;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array};
use arrow::datatypes::{DataType, Int32Type, Int64Type};

use crate::error::DataBufferError;

/// Identifies a data source and the columns a run reads from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub filename: String,
    /// Format tag recorded in the manifest ("csv", "parq", "txt", ...).
    pub kind: String,
    pub x_field: String,
    pub y_field: String,
    pub category_field: String,
}

/// Precomputed min/max for one column. Trusted only when the backing
/// format carries both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub min: f64,
    pub max: f64,
}

/// A raw category label read from a chunk column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CategoryValue {
    Text(String),
    Number(i64),
}

impl fmt::Display for CategoryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryValue::Text(s) => write!(f, "{s}"),
            CategoryValue::Number(n) => write!(f, "{n}"),
        }
    }
}

/// One unit of a streamed source: three equal-length parallel columns.
#[derive(Debug, Clone)]
pub struct DataChunk {
    x: Float64Array,
    y: Float64Array,
    category: ArrayRef,
}

impl DataChunk {
    pub fn new(
        x: Float64Array,
        y: Float64Array,
        category: ArrayRef,
    ) -> Result<Self, DataBufferError> {
        if x.len() != y.len() || x.len() != category.len() {
            return Err(DataBufferError::MalformedInput(format!(
                "column lengths differ: x={}, y={}, category={}",
                x.len(),
                y.len(),
                category.len()
            )));
        }
        Ok(Self { x, y, category })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn x(&self) -> &Float64Array {
        &self.x
    }

    pub fn y(&self) -> &Float64Array {
        &self.y
    }

    pub fn category(&self) -> &ArrayRef {
        &self.category
    }

    /// Category labels row by row. Null labels read as empty text / zero.
    pub fn category_values(&self) -> Result<Vec<CategoryValue>, DataBufferError> {
        match self.category.data_type() {
            DataType::Utf8 => {
                let array = self.category.as_string::<i32>();
                Ok(array
                    .iter()
                    .map(|v| CategoryValue::Text(v.unwrap_or_default().to_string()))
                    .collect())
            }
            DataType::Int64 => {
                let array = self.category.as_primitive::<Int64Type>();
                Ok(array
                    .iter()
                    .map(|v| CategoryValue::Number(v.unwrap_or_default()))
                    .collect())
            }
            DataType::Int32 => {
                let array = self.category.as_primitive::<Int32Type>();
                Ok(array
                    .iter()
                    .map(|v| CategoryValue::Number(v.unwrap_or_default() as i64))
                    .collect())
            }
            other => Err(DataBufferError::CategoryType(other.to_string())),
        }
    }
}

pub type ChunkIter<'a> = Box<dyn Iterator<Item = Result<DataChunk, DataBufferError>> + 'a>;

/// A chunked tabular data source.
///
/// `scan` may be called more than once per run (bounds pass, accumulation
/// pass) and must yield identical data each time.
pub trait DataSource {
    fn descriptor(&self) -> SourceDescriptor;

    /// Precomputed min/max statistics for `column`, if the backing format
    /// carries them.
    fn column_stats(&self, _column: &str) -> Option<ColumnStats> {
        None
    }

    fn scan(&self) -> Result<ChunkIter<'_>, DataBufferError>;
}
