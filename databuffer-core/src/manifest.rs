use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::accumulate::CategoryKey;
use crate::domain::{BinGrid, SpatialDomain};
use crate::error::DataBufferError;
use crate::grid::CountGrid;
use crate::projection::Projection;
use crate::source::SourceDescriptor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub rows: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionInfo {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisType {
    Quantitative,
    Longitude,
    Latitude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinSpec {
    pub maxbins: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleSpec {
    pub domain: [f64; 2],
    pub range: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisEncoding {
    pub field: String,
    #[serde(rename = "type")]
    pub kind: AxisType,
    pub bin: BinSpec,
    pub aggregate: String,
    pub scale: ScaleSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScale {
    pub domain: Vec<CategoryKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoding {
    pub field: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub scale: CategoryScale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encoding {
    pub x: AxisEncoding,
    pub y: AxisEncoding,
    pub z: CategoryEncoding,
}

/// One entry of the manifest's ordered buffer list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferEntry {
    pub url: String,
    pub count: u64,
    pub value: CategoryKey,
    pub range: [i64; 2],
}

/// The run's output description. Assembled once, after every grid is
/// frozen; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub source: SourceInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<ProjectionInfo>,
    pub encoding: Encoding,
    pub buffers: Vec<BufferEntry>,
}

/// A finished, display-oriented grid plus the location it belongs at.
#[derive(Debug, Clone)]
pub struct DataBuffer {
    pub url: String,
    pub key: CategoryKey,
    pub grid: CountGrid,
}

/// Turns finished per-category grids into display-oriented buffers and
/// the manifest describing them. The caller owns all writing.
pub struct BufferManifestBuilder {
    stem: String,
    normalize_total: Option<f64>,
    projection: Option<Box<dyn Projection>>,
}

impl BufferManifestBuilder {
    pub fn new(stem: impl Into<String>) -> Self {
        Self {
            stem: stem.into(),
            normalize_total: None,
            projection: None,
        }
    }

    /// Scale every grid so it sums to `target` (e.g. 100 for percentages).
    pub fn with_normalize_total(mut self, target: f64) -> Self {
        self.normalize_total = Some(target);
        self
    }

    /// Report inverse-projected (lon/lat) scale domains. Description only;
    /// bin edges are never affected.
    pub fn with_projection(mut self, projection: Box<dyn Projection>) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn build(
        &self,
        domain: &SpatialDomain,
        grid: &BinGrid,
        grids: IndexMap<CategoryKey, CountGrid>,
        counts: IndexMap<CategoryKey, u64>,
        source: &SourceDescriptor,
    ) -> Result<(Vec<DataBuffer>, Manifest), DataBufferError> {
        let mut buffers = Vec::with_capacity(grids.len());
        let mut entries = Vec::with_capacity(grids.len());
        let mut total_rows = 0u64;
        let keys: Vec<CategoryKey> = grids.keys().cloned().collect();

        for (key, counted) in grids {
            let mut raster = counted.to_raster();
            if let Some(target) = self.normalize_total {
                raster.scale_to_total(target);
            }
            let (grid_min, grid_max) = raster.min_max();
            let count = counts.get(&key).copied().unwrap_or(0);
            let url = format!("{}_cat_{}.json", self.stem, key);
            entries.push(BufferEntry {
                url: url.clone(),
                count,
                value: key.clone(),
                range: [grid_min as i64, grid_max as i64],
            });
            buffers.push(DataBuffer {
                url,
                key,
                grid: raster,
            });
            total_rows += count;
        }

        let manifest = Manifest {
            source: SourceInfo {
                filename: source.filename.clone(),
                kind: source.kind.clone(),
                rows: total_rows,
            },
            projection: self.projection.as_ref().map(|p| ProjectionInfo {
                kind: p.name().to_string(),
            }),
            encoding: self.encoding(domain, grid, source, keys),
            buffers: entries,
        };
        Ok((buffers, manifest))
    }

    /// Per-axis descriptor. The y scale domain is emitted top-down to
    /// match the flipped raster orientation.
    fn encoding(
        &self,
        domain: &SpatialDomain,
        grid: &BinGrid,
        source: &SourceDescriptor,
        keys: Vec<CategoryKey>,
    ) -> Encoding {
        let (x_domain, y_domain, x_type, y_type) = match &self.projection {
            Some(projection) => {
                let (lon_min, lat_min) = projection.invert(domain.xmin, domain.ymin);
                let (lon_max, lat_max) = projection.invert(domain.xmax, domain.ymax);
                (
                    [lon_min, lon_max],
                    [lat_max, lat_min],
                    AxisType::Longitude,
                    AxisType::Latitude,
                )
            }
            None => (
                [domain.xmin, domain.xmax],
                [domain.ymax, domain.ymin],
                AxisType::Quantitative,
                AxisType::Quantitative,
            ),
        };

        Encoding {
            x: AxisEncoding {
                field: source.x_field.clone(),
                kind: x_type,
                bin: BinSpec {
                    maxbins: grid.width,
                },
                aggregate: "count".to_string(),
                scale: ScaleSpec {
                    domain: x_domain,
                    range: [0.0, grid.width as f64],
                },
            },
            y: AxisEncoding {
                field: source.y_field.clone(),
                kind: y_type,
                bin: BinSpec {
                    maxbins: grid.height,
                },
                aggregate: "count".to_string(),
                scale: ScaleSpec {
                    domain: y_domain,
                    range: [0.0, grid.height as f64],
                },
            },
            z: CategoryEncoding {
                field: source.category_field.clone(),
                kind: "nominal".to_string(),
                scale: CategoryScale { domain: keys },
            },
        }
    }
}
