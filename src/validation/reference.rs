//! One-dimensional reference concentration curve
//!
//! Loaded from a text file with at least two numeric columns
//! (`coordinate concentration`). Evaluation is piecewise linear inside the
//! sampled range and extends the first/last segment linearly outside it, so
//! evaluation never fails.

use std::path::{Path, PathBuf};

use crate::error::DataFormatError;
use crate::io::ColumnTable;

/// Columns required in a reference file.
pub const REFERENCE_COLUMNS: usize = 2;

/// Immutable `(coordinate, concentration)` samples, sorted by coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSolution {
    coordinates: Vec<f64>,
    concentrations: Vec<f64>,
}

impl ReferenceSolution {
    /// Read a reference file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataFormatError> {
        let path = path.as_ref();
        let table = ColumnTable::read(path, REFERENCE_COLUMNS)?;
        let reference = Self::from_table(&table, path)?;
        log::info!("loaded reference solution from {} ({} points)", path.display(), reference.len());
        Ok(reference)
    }

    /// Parse reference samples from in-memory text.
    pub fn parse(text: &str) -> Result<Self, DataFormatError> {
        let table = ColumnTable::parse(text, "<memory>", REFERENCE_COLUMNS)?;
        Self::from_table(&table, Path::new("<memory>"))
    }

    fn from_table(table: &ColumnTable, origin: &Path) -> Result<Self, DataFormatError> {
        Self::build(table.column(0), table.column(1), origin.to_path_buf())
    }

    /// Build from explicit samples, in any order.
    pub fn from_points(coordinates: Vec<f64>, concentrations: Vec<f64>) -> Result<Self, DataFormatError> {
        Self::build(coordinates, concentrations, PathBuf::from("<points>"))
    }

    /// Constant curve, handy for mixing tests.
    pub fn constant(value: f64) -> Self {
        Self {
            coordinates: vec![0.0],
            concentrations: vec![value],
        }
    }

    fn build(coordinates: Vec<f64>, concentrations: Vec<f64>, origin: PathBuf) -> Result<Self, DataFormatError> {
        if coordinates.is_empty() {
            return Err(DataFormatError::Empty { path: origin });
        }
        if coordinates.len() != concentrations.len() {
            return Err(DataFormatError::Invalid {
                path: origin,
                message: format!(
                    "{} coordinates but {} concentrations",
                    coordinates.len(),
                    concentrations.len()
                ),
            });
        }
        if coordinates.iter().chain(&concentrations).any(|v| !v.is_finite()) {
            return Err(DataFormatError::Invalid {
                path: origin,
                message: "non-finite sample".to_string(),
            });
        }

        let mut pairs: Vec<(f64, f64)> = coordinates.into_iter().zip(concentrations).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        if let Some(w) = pairs.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(DataFormatError::Invalid {
                path: origin,
                message: format!("duplicate coordinate {}", w[0].0),
            });
        }

        let (coordinates, concentrations) = pairs.into_iter().unzip();
        Ok(Self {
            coordinates,
            concentrations,
        })
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    pub fn coordinates(&self) -> &[f64] {
        &self.coordinates
    }

    pub fn concentrations(&self) -> &[f64] {
        &self.concentrations
    }

    /// Evaluate at a single coordinate.
    pub fn interpolate_at(&self, x: f64) -> f64 {
        let xs = &self.coordinates;
        let ys = &self.concentrations;
        let n = xs.len();
        if n == 1 {
            return ys[0];
        }

        // Segment [k, k+1] containing x; the end segments extend outward.
        let k = match xs.partition_point(|&c| c <= x) {
            0 => 0,
            p if p >= n => n - 2,
            p => p - 1,
        };
        let (x0, x1) = (xs[k], xs[k + 1]);
        let (y0, y1) = (ys[k], ys[k + 1]);
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }

    /// Evaluate at every coordinate of `xs`.
    pub fn interpolate(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.interpolate_at(x)).collect()
    }
}
