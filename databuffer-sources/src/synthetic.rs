use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use databuffer_core::error::DataBufferError;
use databuffer_core::source::{ChunkIter, DataChunk, DataSource, SourceDescriptor};

/// Configuration for a mixture of 2-D Gaussians: one class per mean, all
/// classes sharing a covariance.
#[derive(Debug, Clone)]
pub struct GaussianMixtureConfig {
    pub samples_per_class: usize,
    pub means: Vec<[f64; 2]>,
    pub covariance: [[f64; 2]; 2],
    pub seed: Option<u64>,
}

impl Default for GaussianMixtureConfig {
    fn default() -> Self {
        Self {
            samples_per_class: 100_000,
            means: vec![[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0], [1.0, 1.0]],
            covariance: [[3.0, 0.0], [0.0, 3.0]],
            seed: None,
        }
    }
}

/// In-memory synthetic source. Classes are labelled "1".."k" in mean
/// order and delivered one chunk per class.
pub struct GaussianMixtureSource {
    descriptor: SourceDescriptor,
    chunks: Vec<DataChunk>,
}

impl GaussianMixtureSource {
    /// Samples are drawn once here so that repeated scans (bounds pass,
    /// accumulation pass) observe identical data.
    pub fn new(name: &str, config: &GaussianMixtureConfig) -> Result<Self, DataBufferError> {
        let [[a, b], [c, d]] = config.covariance;
        if b != c || a <= 0.0 || a * d - b * c <= 0.0 {
            return Err(DataBufferError::MalformedInput(format!(
                "covariance must be symmetric positive-definite, got {:?}",
                config.covariance
            )));
        }
        // 2x2 Cholesky factor of the covariance
        let l11 = a.sqrt();
        let l21 = b / l11;
        let l22 = (d - l21 * l21).sqrt();

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut chunks = Vec::with_capacity(config.means.len());
        for (index, mean) in config.means.iter().enumerate() {
            let label = (index + 1).to_string();
            let mut xs = Vec::with_capacity(config.samples_per_class);
            let mut ys = Vec::with_capacity(config.samples_per_class);
            for _ in 0..config.samples_per_class {
                let z0: f64 = rng.sample(StandardNormal);
                let z1: f64 = rng.sample(StandardNormal);
                xs.push(mean[0] + l11 * z0);
                ys.push(mean[1] + l21 * z0 + l22 * z1);
            }
            let labels: ArrayRef =
                Arc::new(StringArray::from(vec![label; config.samples_per_class]));
            chunks.push(DataChunk::new(
                Float64Array::from(xs),
                Float64Array::from(ys),
                labels,
            )?);
        }
        Ok(Self {
            descriptor: SourceDescriptor {
                filename: name.to_string(),
                kind: "synthetic".to_string(),
                x_field: "x".to_string(),
                y_field: "y".to_string(),
                category_field: "category".to_string(),
            },
            chunks,
        })
    }
}

impl DataSource for GaussianMixtureSource {
    fn descriptor(&self) -> SourceDescriptor {
        self.descriptor.clone()
    }

    fn scan(&self) -> Result<ChunkIter<'_>, DataBufferError> {
        Ok(Box::new(self.chunks.iter().cloned().map(Ok)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use databuffer_core::source::CategoryValue;

    fn config() -> GaussianMixtureConfig {
        GaussianMixtureConfig {
            samples_per_class: 100,
            means: vec![[-1.0, -1.0], [1.0, 1.0]],
            covariance: [[2.0, 0.5], [0.5, 1.0]],
            seed: Some(42),
        }
    }

    #[test]
    fn test_one_chunk_per_class() {
        let source = GaussianMixtureSource::new("mn", &config()).unwrap();
        let chunks: Vec<DataChunk> = source.scan().unwrap().map(Result::unwrap).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(
            chunks[0].category_values().unwrap()[0],
            CategoryValue::Text("1".to_string())
        );
        assert_eq!(
            chunks[1].category_values().unwrap()[99],
            CategoryValue::Text("2".to_string())
        );
    }

    #[test]
    fn test_seed_determinism() {
        let a = GaussianMixtureSource::new("mn", &config()).unwrap();
        let b = GaussianMixtureSource::new("mn", &config()).unwrap();
        let ca: Vec<DataChunk> = a.scan().unwrap().map(Result::unwrap).collect();
        let cb: Vec<DataChunk> = b.scan().unwrap().map(Result::unwrap).collect();
        for (x, y) in ca.iter().zip(&cb) {
            assert_eq!(x.x(), y.x());
            assert_eq!(x.y(), y.y());
        }
    }

    #[test]
    fn test_rescan_yields_identical_data() {
        let source = GaussianMixtureSource::new("mn", &config()).unwrap();
        let first: Vec<DataChunk> = source.scan().unwrap().map(Result::unwrap).collect();
        let second: Vec<DataChunk> = source.scan().unwrap().map(Result::unwrap).collect();
        assert_eq!(first[1].x(), second[1].x());
    }

    #[test]
    fn test_invalid_covariance() {
        let mut bad = config();
        bad.covariance = [[1.0, 2.0], [2.0, 1.0]]; // det < 0
        assert!(matches!(
            GaussianMixtureSource::new("mn", &bad),
            Err(DataBufferError::MalformedInput(_))
        ));

        let mut asym = config();
        asym.covariance = [[1.0, 0.2], [0.3, 1.0]];
        assert!(matches!(
            GaussianMixtureSource::new("mn", &asym),
            Err(DataBufferError::MalformedInput(_))
        ));
    }
}
