use serde::{Deserialize, Serialize};

use crate::error::DataBufferError;

/// Default width of the binned image when no override is supplied.
pub const DEFAULT_WIDTH: u32 = 512;

/// Rectangular spatial extent of a run. Resolved once, read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialDomain {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl SpatialDomain {
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Result<Self, DataBufferError> {
        let domain = Self {
            xmin,
            xmax,
            ymin,
            ymax,
        };
        domain.validate()?;
        Ok(domain)
    }

    /// All bounds finite, `xmin < xmax` and `ymin < ymax`. A degenerate or
    /// non-finite domain is a fatal configuration error, never corrected.
    pub fn validate(&self) -> Result<(), DataBufferError> {
        let finite = self.xmin.is_finite()
            && self.xmax.is_finite()
            && self.ymin.is_finite()
            && self.ymax.is_finite();
        if !finite || self.xmin >= self.xmax || self.ymin >= self.ymax {
            return Err(DataBufferError::InvalidDomain {
                xmin: self.xmin,
                xmax: self.xmax,
                ymin: self.ymin,
                ymax: self.ymax,
            });
        }
        Ok(())
    }

    pub fn x_span(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn y_span(&self) -> f64 {
        self.ymax - self.ymin
    }
}

/// Bin discretization of the domain. Resolved once, read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinGrid {
    pub width: u32,
    pub height: u32,
}

impl BinGrid {
    pub fn new(width: u32, height: u32) -> Result<Self, DataBufferError> {
        if width == 0 || height == 0 {
            return Err(DataBufferError::InvalidGrid { width, height });
        }
        Ok(Self { width, height })
    }

    /// Height derived from the width and the aspect ratio of the domain,
    /// rounded, never below 1.
    pub fn with_derived_height(
        width: u32,
        domain: &SpatialDomain,
    ) -> Result<Self, DataBufferError> {
        let ratio = domain.y_span() / domain.x_span();
        let height = ((width as f64 * ratio).round() as u32).max(1);
        Self::new(width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_height() {
        let domain = SpatialDomain::new(0.0, 100.0, 0.0, 50.0).unwrap();
        let grid = BinGrid::with_derived_height(512, &domain).unwrap();
        assert_eq!(grid.width, 512);
        assert_eq!(grid.height, 256);
    }

    #[test]
    fn test_derived_height_never_below_one() {
        // Extremely flat domain still produces a usable grid
        let domain = SpatialDomain::new(0.0, 1000.0, 0.0, 0.001).unwrap();
        let grid = BinGrid::with_derived_height(64, &domain).unwrap();
        assert_eq!(grid.height, 1);
    }

    #[test]
    fn test_degenerate_domain() {
        assert!(matches!(
            SpatialDomain::new(3.0, 3.0, 0.0, 1.0),
            Err(DataBufferError::InvalidDomain { .. })
        ));
        assert!(matches!(
            SpatialDomain::new(0.0, 1.0, 5.0, 5.0),
            Err(DataBufferError::InvalidDomain { .. })
        ));
        // Reversed bounds are not silently swapped
        assert!(matches!(
            SpatialDomain::new(1.0, 0.0, 0.0, 1.0),
            Err(DataBufferError::InvalidDomain { .. })
        ));
        assert!(matches!(
            SpatialDomain::new(f64::NAN, 1.0, 0.0, 1.0),
            Err(DataBufferError::InvalidDomain { .. })
        ));
    }

    #[test]
    fn test_zero_grid_rejected() {
        assert!(matches!(
            BinGrid::new(0, 10),
            Err(DataBufferError::InvalidGrid { .. })
        ));
        assert!(matches!(
            BinGrid::new(10, 0),
            Err(DataBufferError::InvalidGrid { .. })
        ));
    }
}
