use log::info;

use crate::domain::{BinGrid, SpatialDomain, DEFAULT_WIDTH};
use crate::error::DataBufferError;
use crate::source::DataSource;

/// Caller-supplied bounds and grid dimensions. Any field left `None` is
/// derived from the source.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundsOverrides {
    pub xmin: Option<f64>,
    pub xmax: Option<f64>,
    pub ymin: Option<f64>,
    pub ymax: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Resolve the spatial domain and bin grid for a run.
///
/// Per coordinate: an override wins; otherwise per-column statistics from
/// the source are used when available; otherwise a chunk scan folds each
/// chunk's local min/max into a running global min/max. The fold is
/// associative, so the result does not depend on chunk boundaries.
pub fn resolve(
    source: &dyn DataSource,
    overrides: &BoundsOverrides,
) -> Result<(SpatialDomain, BinGrid), DataBufferError> {
    let descriptor = source.descriptor();

    let mut xmin = overrides.xmin;
    let mut xmax = overrides.xmax;
    let mut ymin = overrides.ymin;
    let mut ymax = overrides.ymax;

    if xmin.is_none() || xmax.is_none() {
        if let Some(stats) = source.column_stats(&descriptor.x_field) {
            xmin.get_or_insert(stats.min);
            xmax.get_or_insert(stats.max);
        }
    }
    if ymin.is_none() || ymax.is_none() {
        if let Some(stats) = source.column_stats(&descriptor.y_field) {
            ymin.get_or_insert(stats.min);
            ymax.get_or_insert(stats.max);
        }
    }

    if xmin.is_none() || xmax.is_none() || ymin.is_none() || ymax.is_none() {
        info!("Incomplete stats, computing min/max");
        let (sx, sy) = scan_min_max(source)?;
        xmin.get_or_insert(sx.0);
        xmax.get_or_insert(sx.1);
        ymin.get_or_insert(sy.0);
        ymax.get_or_insert(sy.1);
    }

    // An empty source leaves infinities behind; validation rejects them.
    let domain = SpatialDomain::new(
        xmin.unwrap_or(f64::INFINITY),
        xmax.unwrap_or(f64::NEG_INFINITY),
        ymin.unwrap_or(f64::INFINITY),
        ymax.unwrap_or(f64::NEG_INFINITY),
    )?;

    let width = overrides.width.unwrap_or(DEFAULT_WIDTH);
    let grid = match overrides.height {
        Some(height) => BinGrid::new(width, height)?,
        None => BinGrid::with_derived_height(width, &domain)?,
    };

    info!(
        "Range: [[{}, {}], [{}, {}]], bins: ({}, {})",
        domain.xmin, domain.xmax, domain.ymin, domain.ymax, grid.width, grid.height
    );
    Ok((domain, grid))
}

/// Fold min/max over every chunk, skipping non-finite values.
fn scan_min_max(source: &dyn DataSource) -> Result<((f64, f64), (f64, f64)), DataBufferError> {
    let mut x = (f64::INFINITY, f64::NEG_INFINITY);
    let mut y = (f64::INFINITY, f64::NEG_INFINITY);
    for chunk in source.scan()? {
        let chunk = chunk?;
        for v in chunk.x().iter().flatten().filter(|v| v.is_finite()) {
            x.0 = x.0.min(v);
            x.1 = x.1.max(v);
        }
        for v in chunk.y().iter().flatten().filter(|v| v.is_finite()) {
            y.0 = y.0.min(v);
            y.1 = y.1.max(v);
        }
    }
    Ok((x, y))
}
