use std::fmt;

use arrow::array::{Array, Float64Array};
use indexmap::map::Entry;
use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::domain::{BinGrid, SpatialDomain};
use crate::edges::BinEdges;
use crate::error::DataBufferError;
use crate::grid::CountGrid;
use crate::source::{CategoryValue, DataChunk};

/// How category labels become buffer keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyPolicy {
    /// Use the label itself (numbers formatted as decimal text).
    #[default]
    Verbatim,
    /// Assign 1-based ordinals in first-seen order, for filename safety.
    Ordinal,
}

/// Buffer key for one category. Unique within a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryKey {
    Ordinal(u32),
    Label(String),
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryKey::Label(s) => write!(f, "{s}"),
            CategoryKey::Ordinal(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AccumulatorConfig {
    pub key_policy: KeyPolicy,
}

/// Accumulates one 2-D count grid per category over a stream of chunks.
///
/// Bin edges are locked from the domain and grid at construction and every
/// histogram is computed against them, so one chunk and many chunks
/// produce identical output. Grids for a recurring category merge by
/// elementwise addition; row counts by addition.
pub struct CategoryHistogramAccumulator {
    edges: BinEdges,
    key_policy: KeyPolicy,
    keys: IndexMap<CategoryValue, CategoryKey>,
    grids: IndexMap<CategoryKey, CountGrid>,
    counts: IndexMap<CategoryKey, u64>,
}

impl CategoryHistogramAccumulator {
    pub fn new(
        domain: SpatialDomain,
        grid: BinGrid,
        config: AccumulatorConfig,
    ) -> Result<Self, DataBufferError> {
        domain.validate()?;
        Ok(Self {
            edges: BinEdges::from_domain(&domain, &grid),
            key_policy: config.key_policy,
            keys: IndexMap::new(),
            grids: IndexMap::new(),
            counts: IndexMap::new(),
        })
    }

    /// The edges every histogram in this run bins against.
    pub fn edges(&self) -> &BinEdges {
        &self.edges
    }

    /// Fold one chunk into the per-category grids.
    ///
    /// Rows are grouped by category label, stable in first-seen order. A
    /// never-seen label introduces a new key; there is no unknown-category
    /// error. Rows whose point is non-finite or outside the domain are
    /// counted for their category but not binned.
    pub fn accumulate(&mut self, chunk: &DataChunk) -> Result<(), DataBufferError> {
        let labels = chunk.category_values()?;
        let mut groups: IndexMap<CategoryValue, Vec<usize>> = IndexMap::new();
        for (row, label) in labels.into_iter().enumerate() {
            groups.entry(label).or_default().push(row);
        }

        for (label, rows) in groups {
            let key = self.key_for(&label);
            let (histogram, produced) = histogram2d(chunk.x(), chunk.y(), &rows, &self.edges);
            self.reconcile_edges(&produced);
            match self.grids.entry(key.clone()) {
                Entry::Occupied(mut entry) => entry.get_mut().merge_from(&histogram)?,
                Entry::Vacant(entry) => {
                    entry.insert(histogram);
                }
            }
            *self.counts.entry(key).or_insert(0) += rows.len() as u64;
        }
        Ok(())
    }

    /// Compare edges reported by a histogram computation against the
    /// locked run edges; on drift, warn and adopt the produced edges.
    /// Returns whether adoption happened.
    pub fn reconcile_edges(&mut self, produced: &BinEdges) -> bool {
        if self.edges.matches(produced) {
            return false;
        }
        warn!(
            "Bin edges differ: adopting {} x {} produced edges",
            produced.x().len(),
            produced.y().len()
        );
        self.edges = produced.clone();
        true
    }

    /// Finalize, handing the grids and row counts over by value.
    pub fn finish(self) -> (IndexMap<CategoryKey, CountGrid>, IndexMap<CategoryKey, u64>) {
        (self.grids, self.counts)
    }

    fn key_for(&mut self, label: &CategoryValue) -> CategoryKey {
        if let Some(key) = self.keys.get(label) {
            return key.clone();
        }
        let key = match self.key_policy {
            KeyPolicy::Verbatim => CategoryKey::Label(label.to_string()),
            KeyPolicy::Ordinal => CategoryKey::Ordinal(self.keys.len() as u32 + 1),
        };
        self.keys.insert(label.clone(), key.clone());
        key
    }
}

/// 2-D histogram of the selected rows against explicit edges, echoing the
/// edges it binned with. Entry `[ix][iy]`.
fn histogram2d(
    x: &Float64Array,
    y: &Float64Array,
    rows: &[usize],
    edges: &BinEdges,
) -> (CountGrid, BinEdges) {
    let mut grid = CountGrid::zeros(edges.x_bins(), edges.y_bins());
    for &row in rows {
        if x.is_null(row) || y.is_null(row) {
            continue;
        }
        if let (Some(ix), Some(iy)) = (edges.x_bin(x.value(row)), edges.y_bin(y.value(row))) {
            grid.add_at(ix, iy, 1.0);
        }
    }
    (grid, edges.clone())
}
