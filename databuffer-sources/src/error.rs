use databuffer_core::error::DataBufferError;
use thiserror::Error;

/// Reader-side errors, converted into the engine taxonomy at the
/// `DataSource` boundary.
#[derive(Error, Debug)]
pub enum DataSourceError {
    #[error("CSV error: `{0}`")]
    Csv(#[from] ::csv::Error),

    #[error("Parquet error: `{0}`")]
    Parquet(#[from] ::parquet::errors::ParquetError),

    #[error("Arrow error: `{0}`")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("IO error: `{0}`")]
    Io(#[from] std::io::Error),
}

impl From<DataSourceError> for DataBufferError {
    fn from(err: DataSourceError) -> Self {
        DataBufferError::Source(Box::new(err))
    }
}
