use crate::domain::{BinGrid, SpatialDomain};

/// Relative tolerance used by [`BinEdges::matches`]: two edge values agree
/// when they differ by at most `EDGE_EPSILON * max(1, |expected|)`.
pub const EDGE_EPSILON: f64 = 1e-9;

/// The explicit bin boundaries of a run: `width + 1` x-edges and
/// `height + 1` y-edges, strictly ascending, endpoints pinned exactly to
/// the domain. Locked when the accumulator is created; every histogram is
/// computed against these edges rather than edges inferred from the data.
#[derive(Debug, Clone, PartialEq)]
pub struct BinEdges {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl BinEdges {
    pub fn from_domain(domain: &SpatialDomain, grid: &BinGrid) -> Self {
        Self {
            x: linspace(domain.xmin, domain.xmax, grid.width),
            y: linspace(domain.ymin, domain.ymax, grid.height),
        }
    }

    /// Build from explicit boundary sequences. Used when reconciliation
    /// adopts externally produced edges.
    pub fn from_edges(x: Vec<f64>, y: Vec<f64>) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn x_bins(&self) -> usize {
        self.x.len() - 1
    }

    pub fn y_bins(&self) -> usize {
        self.y.len() - 1
    }

    /// True when `other` has the same shape and every edge agrees within
    /// [`EDGE_EPSILON`].
    pub fn matches(&self, other: &BinEdges) -> bool {
        edges_match(&self.x, &other.x) && edges_match(&self.y, &other.y)
    }

    /// Bin index along x, or `None` for out-of-domain or non-finite values.
    pub fn x_bin(&self, value: f64) -> Option<usize> {
        bin_index(&self.x, value)
    }

    /// Bin index along y, or `None` for out-of-domain or non-finite values.
    pub fn y_bin(&self, value: f64) -> Option<usize> {
        bin_index(&self.y, value)
    }
}

fn linspace(start: f64, stop: f64, bins: u32) -> Vec<f64> {
    let n = bins as usize;
    let step = (stop - start) / bins as f64;
    let mut edges: Vec<f64> = (0..=n).map(|i| start + step * i as f64).collect();
    // Pin the endpoint exactly; accumulated rounding must not move it.
    edges[n] = stop;
    edges
}

fn edges_match(expected: &[f64], produced: &[f64]) -> bool {
    expected.len() == produced.len()
        && expected
            .iter()
            .zip(produced)
            .all(|(e, p)| (e - p).abs() <= EDGE_EPSILON * e.abs().max(1.0))
}

/// Locate `value` among ascending `edges`. The rightmost bin is closed on
/// both sides, every other bin is half-open `[lo, hi)`.
fn bin_index(edges: &[f64], value: f64) -> Option<usize> {
    let last = edges.len() - 1;
    if !value.is_finite() || value < edges[0] || value > edges[last] {
        return None;
    }
    if value == edges[last] {
        return Some(last - 1);
    }
    let upper = edges.partition_point(|e| *e <= value);
    Some(upper - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn domain() -> SpatialDomain {
        SpatialDomain::new(0.0, 10.0, 0.0, 5.0).unwrap()
    }

    #[test]
    fn test_from_domain_shape_and_endpoints() {
        let grid = BinGrid::new(4, 5).unwrap();
        let edges = BinEdges::from_domain(&domain(), &grid);
        assert_eq!(edges.x().len(), 5);
        assert_eq!(edges.y().len(), 6);
        assert_eq!(edges.x()[0], 0.0);
        assert_eq!(edges.x()[4], 10.0);
        assert_eq!(edges.y()[5], 5.0);
        assert_approx_eq!(f64, edges.x()[1], 2.5);
    }

    #[test]
    fn test_endpoint_pinned_for_awkward_spans() {
        let domain = SpatialDomain::new(0.1, 0.3, 0.0, 1.0).unwrap();
        let grid = BinGrid::new(7, 1).unwrap();
        let edges = BinEdges::from_domain(&domain, &grid);
        assert_eq!(edges.x()[7], 0.3);
    }

    #[test]
    fn test_bin_index() {
        let grid = BinGrid::new(4, 4).unwrap();
        let edges = BinEdges::from_domain(&domain(), &grid);
        assert_eq!(edges.x_bin(0.0), Some(0)); // left edge
        assert_eq!(edges.x_bin(2.5), Some(1)); // interior boundary goes right
        assert_eq!(edges.x_bin(9.99), Some(3));
        assert_eq!(edges.x_bin(10.0), Some(3)); // rightmost edge inclusive
        assert_eq!(edges.x_bin(-0.1), None);
        assert_eq!(edges.x_bin(10.1), None);
        assert_eq!(edges.x_bin(f64::NAN), None);
    }

    #[test]
    fn test_matches_within_epsilon() {
        let grid = BinGrid::new(4, 4).unwrap();
        let edges = BinEdges::from_domain(&domain(), &grid);

        let mut nudged = edges.x().to_vec();
        nudged[2] += 1e-12;
        let close = BinEdges::from_edges(nudged, edges.y().to_vec());
        assert!(edges.matches(&close));

        let mut drifted = edges.x().to_vec();
        drifted[2] += 1e-3;
        let far = BinEdges::from_edges(drifted, edges.y().to_vec());
        assert!(!edges.matches(&far));

        // Differing bin counts never match
        let short = BinEdges::from_edges(edges.x()[..4].to_vec(), edges.y().to_vec());
        assert!(!edges.matches(&short));
    }
}
