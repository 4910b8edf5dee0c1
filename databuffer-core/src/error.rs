use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataBufferError {
    #[error("Expected a {expected} file, got {path}")]
    InvalidFormat { path: String, expected: &'static str },

    #[error("Invalid bounds: [[{xmin}, {xmax}], [{ymin}, {ymax}]]")]
    InvalidDomain {
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
    },

    #[error("Bin grid must be at least 1x1, got {width}x{height}")]
    InvalidGrid { width: u32, height: u32 },

    #[error("Column not found in source: `{0}`")]
    UnknownColumn(String),

    #[error("Unsupported category column type: `{0}`")]
    CategoryType(String),

    #[error("Grid shape mismatch: {rows}x{cols} vs {other_rows}x{other_cols}")]
    GridShapeMismatch {
        rows: usize,
        cols: usize,
        other_rows: usize,
        other_cols: usize,
    },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Data source error: `{0}`")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Arrow error: `{0}`")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("IO error: `{0}`")]
    Io(#[from] std::io::Error),

    #[error("JSON error: `{0}`")]
    Json(#[from] serde_json::Error),
}

impl DataBufferError {
    /// Wrap a reader-side error crossing the `DataSource` boundary.
    pub fn source(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Source(Box::new(err))
    }
}
