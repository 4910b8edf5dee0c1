use crate::error::DataBufferError;

/// Row-major matrix of per-bin counts.
///
/// Counts stay whole-valued; only an explicit normalization pass
/// ([`CountGrid::scale_to_total`]) makes them fractional. During
/// accumulation the shape is `width x height` with entry `[ix][iy]`; the
/// display transform ([`CountGrid::to_raster`]) turns that into a
/// `height x width` matrix whose row 0 is the top of the rendered image.
#[derive(Debug, Clone, PartialEq)]
pub struct CountGrid {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl CountGrid {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            values: vec![0.0; rows * cols],
        }
    }

    /// Build from nested rows, e.g. a buffer file read back for
    /// aggregation. Rows must be equal length and non-empty.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, DataBufferError> {
        let nrows = rows.len();
        let ncols = rows.first().map(Vec::len).unwrap_or(0);
        if nrows == 0 || ncols == 0 || rows.iter().any(|r| r.len() != ncols) {
            return Err(DataBufferError::MalformedInput(
                "grid rows must be non-empty and of equal length".to_string(),
            ));
        }
        Ok(Self {
            rows: nrows,
            cols: ncols,
            values: rows.into_iter().flatten().collect(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    pub(crate) fn add_at(&mut self, row: usize, col: usize, amount: f64) {
        self.values[row * self.cols + col] += amount;
    }

    /// Elementwise addition. Commutative and associative, so merged chunk
    /// results are invariant to chunk partitioning.
    pub fn merge_from(&mut self, other: &CountGrid) -> Result<(), DataBufferError> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(DataBufferError::GridShapeMismatch {
                rows: self.rows,
                cols: self.cols,
                other_rows: other.rows,
                other_cols: other.cols,
            });
        }
        for (v, o) in self.values.iter_mut().zip(&other.values) {
            *v += o;
        }
        Ok(())
    }

    pub fn transposed(&self) -> CountGrid {
        let mut out = CountGrid::zeros(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.values[c * self.rows + r] = self.values[r * self.cols + c];
            }
        }
        out
    }

    pub fn flipped_vertical(&self) -> CountGrid {
        let mut values = Vec::with_capacity(self.values.len());
        for r in (0..self.rows).rev() {
            values.extend_from_slice(&self.values[r * self.cols..(r + 1) * self.cols]);
        }
        Self {
            rows: self.rows,
            cols: self.cols,
            values,
        }
    }

    /// The display-orientation transform: transpose, then vertical flip.
    pub fn to_raster(&self) -> CountGrid {
        self.transposed().flipped_vertical()
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn min_max(&self) -> (f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in &self.values {
            min = min.min(v);
            max = max.max(v);
        }
        (min, max)
    }

    /// Scale the grid so it sums to `target` (e.g. 100 for percentages).
    /// An all-zero grid is left untouched.
    pub fn scale_to_total(&mut self, target: f64) {
        let sum = self.total();
        if sum > 0.0 {
            for v in &mut self.values {
                *v *= target / sum;
            }
        }
    }

    pub fn row_slices(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks(self.cols)
    }

    /// Nested-array representation for JSON buffer files.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.row_slices().map(<[f64]>::to_vec).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn sample() -> CountGrid {
        // 2x3:
        //   1 2 3
        //   4 5 6
        CountGrid::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap()
    }

    #[test]
    fn test_transpose() {
        let t = sample().transposed();
        assert_eq!(t.rows(), 3);
        assert_eq!(t.cols(), 2);
        assert_eq!(t.to_rows(), vec![vec![1.0, 4.0], vec![2.0, 5.0], vec![3.0, 6.0]]);
    }

    #[test]
    fn test_flip_vertical() {
        let f = sample().flipped_vertical();
        assert_eq!(f.to_rows(), vec![vec![4.0, 5.0, 6.0], vec![1.0, 2.0, 3.0]]);
    }

    #[test]
    fn test_raster_transform_round_trips() {
        // transpose+flip then flip+transpose restores the original
        let grid = sample();
        let restored = grid.to_raster().flipped_vertical().transposed();
        assert_eq!(restored, grid);
    }

    #[test]
    fn test_merge() {
        let mut a = sample();
        let b = sample();
        a.merge_from(&b).unwrap();
        assert_eq!(a.get(0, 0), 2.0);
        assert_eq!(a.get(1, 2), 12.0);

        let narrow = CountGrid::zeros(2, 2);
        assert!(matches!(
            a.merge_from(&narrow),
            Err(DataBufferError::GridShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_scale_to_total() {
        let mut grid = sample();
        grid.scale_to_total(100.0);
        assert_approx_eq!(f64, grid.total(), 100.0, epsilon = 1e-9);
        assert_approx_eq!(f64, grid.get(0, 0), 100.0 / 21.0, epsilon = 1e-9);

        let mut zeros = CountGrid::zeros(2, 2);
        zeros.scale_to_total(100.0);
        assert_eq!(zeros.total(), 0.0);
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        assert!(matches!(
            CountGrid::from_rows(vec![vec![1.0], vec![1.0, 2.0]]),
            Err(DataBufferError::MalformedInput(_))
        ));
        assert!(matches!(
            CountGrid::from_rows(vec![]),
            Err(DataBufferError::MalformedInput(_))
        ));
    }
}
