//! Sampled velocity field with nearest-sample lookup
//!
//! The field is a scattered set of `(x, y) → (vx, vy)` samples read from a
//! delimited text file with at least four numeric columns. A query returns the
//! velocity of the nearest sample under Euclidean distance; there is no
//! interpolation between samples.

use std::path::Path;

use nalgebra::Vector2;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::DataFormatError;
use crate::io::ColumnTable;
use crate::physics::kdtree::KdTree;

#[cfg(feature = "parallel")]
use crate::solver::parallel_threshold;

/// Columns required in a velocity file: `x y vx vy`.
pub const VELOCITY_COLUMNS: usize = 4;

/// Immutable set of velocity samples backed by a static k-d tree.
#[derive(Debug, Clone)]
pub struct VelocityField {
    tree: KdTree,
    velocities: Vec<Vector2<f64>>,
}

impl VelocityField {
    /// Build from explicit samples. Fails when `samples` is empty.
    pub fn from_samples(samples: Vec<(Vector2<f64>, Vector2<f64>)>) -> Result<Self, DataFormatError> {
        if samples.is_empty() {
            return Err(DataFormatError::Empty {
                path: "<samples>".into(),
            });
        }
        let (positions, velocities): (Vec<_>, Vec<_>) = samples.into_iter().unzip();
        Ok(Self {
            tree: KdTree::build(positions),
            velocities,
        })
    }

    /// Read a velocity file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataFormatError> {
        let path = path.as_ref();
        let table = ColumnTable::read(path, VELOCITY_COLUMNS)?;
        let field = Self::from_table(&table);
        log::info!(
            "loaded velocity field from {} ({} samples)",
            path.display(),
            field.len()
        );
        Ok(field)
    }

    /// Parse velocity samples from in-memory text.
    pub fn parse(text: &str) -> Result<Self, DataFormatError> {
        let table = ColumnTable::parse(text, "<memory>", VELOCITY_COLUMNS)?;
        Ok(Self::from_table(&table))
    }

    fn from_table(table: &ColumnTable) -> Self {
        let (positions, velocities) = table
            .rows()
            .iter()
            .map(|row| (Vector2::new(row[0], row[1]), Vector2::new(row[2], row[3])))
            .unzip();
        Self {
            tree: KdTree::build(positions),
            velocities,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.velocities.len()
    }

    /// Always false for a constructed field.
    pub fn is_empty(&self) -> bool {
        self.velocities.is_empty()
    }

    /// Index of the sample nearest to `position`.
    pub fn nearest_index(&self, position: &Vector2<f64>) -> usize {
        // A constructed field always has at least one sample.
        self.tree.nearest(position).unwrap_or(0)
    }

    /// Velocity of the sample nearest to `position`.
    #[inline]
    pub fn velocity_at_point(&self, position: &Vector2<f64>) -> Vector2<f64> {
        self.velocities[self.nearest_index(position)]
    }

    /// Batched lookup, one query per position.
    ///
    /// Read-only; runs in parallel above the solver's parallel threshold when
    /// the `parallel` feature is enabled.
    pub fn velocity_at(&self, positions: &[Vector2<f64>]) -> Vec<Vector2<f64>> {
        let mut out = vec![Vector2::zeros(); positions.len()];
        self.velocity_into(positions, &mut out);
        out
    }

    /// Like [`velocity_at`](Self::velocity_at) but writes into a caller buffer
    /// of the same length.
    pub fn velocity_into(&self, positions: &[Vector2<f64>], out: &mut [Vector2<f64>]) {
        debug_assert_eq!(positions.len(), out.len());

        #[cfg(feature = "parallel")]
        if positions.len() > parallel_threshold() {
            out.par_iter_mut()
                .zip(positions.par_iter())
                .for_each(|(v, p)| *v = self.velocity_at_point(p));
            return;
        }

        for (v, p) in out.iter_mut().zip(positions) {
            *v = self.velocity_at_point(p);
        }
    }

    /// Sample position and velocity at index `i`.
    pub fn sample(&self, i: usize) -> (Vector2<f64>, Vector2<f64>) {
        (self.tree.point(i), self.velocities[i])
    }

    /// Bounding box `(min, max)` of the sample positions.
    pub fn bounds(&self) -> (Vector2<f64>, Vector2<f64>) {
        let mut lo = Vector2::repeat(f64::INFINITY);
        let mut hi = Vector2::repeat(f64::NEG_INFINITY);
        for p in self.tree.points() {
            lo = lo.inf(p);
            hi = hi.sup(p);
        }
        (lo, hi)
    }

    /// Number of distinct x and y sample coordinates.
    ///
    /// For a field sampled on a regular lattice this is its `(width, height)`.
    pub fn grid_shape(&self) -> (usize, usize) {
        let distinct = |axis: usize| {
            let mut values: Vec<f64> = self.tree.points().iter().map(|p| p[axis]).collect();
            values.sort_by(f64::total_cmp);
            values.dedup();
            values.len()
        };
        (distinct(0), distinct(1))
    }

    /// Largest sample speed, useful to sanity-check `dt`.
    pub fn max_speed(&self) -> f64 {
        self.velocities.iter().map(|v| v.norm()).fold(0.0, f64::max)
    }
}
