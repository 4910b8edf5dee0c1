pub mod csv;
pub mod embedding;
pub mod error;
pub mod parquet;
pub mod synthetic;

use std::path::Path;

use databuffer_core::error::DataBufferError;

/// Enforce the expected filename extension for a source format.
pub(crate) fn check_extension(
    path: &Path,
    allowed: &[&str],
    expected: &'static str,
) -> Result<(), DataBufferError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if allowed.iter().any(|a| ext.eq_ignore_ascii_case(a)) {
        Ok(())
    } else {
        Err(DataBufferError::InvalidFormat {
            path: path.display().to_string(),
            expected,
        })
    }
}
