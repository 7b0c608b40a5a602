//! Particle positions → concentration grid
//!
//! # Binning rule
//!
//! Each particle is assigned to a cell by normalizing its position to
//! `[0, 1]²` and rounding `normalized · (n − 1)` on each axis. A cell's
//! concentration is the mean label of the particles in it, or `0` when no
//! particle landed there.
//!
//! # Layout
//!
//! Grids are `ndarray::Array2` indexed `[[row, col]]`:
//!
//! - `row` is the **y** cell index, row 0 at `min_y`
//! - `col` is the **x** cell index, col 0 at `min_x`
//!
//! No rotation or flip is applied. A renderer that draws row 0 at the top of
//! the screen must flip vertically itself.
//!
//! # Determinism
//!
//! Cells accumulate integer label sums and counts, so the map-reduce used on
//! large particle sets yields exactly the same grid as the sequential loop.

use ndarray::Array2;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use nalgebra::Vector2;

use crate::error::Axis;
use crate::physics::{CellGrid, DomainSpec, Label, ParticleSet};

#[cfg(feature = "parallel")]
use crate::solver::parallel_threshold;

// =================================================================================================
// Grid
// =================================================================================================

/// Concentration per cell plus the occupancy it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcentrationGrid {
    values: Array2<f64>,
    counts: Array2<usize>,
    domain: DomainSpec,
    grid: CellGrid,
}

impl ConcentrationGrid {
    /// Mean label per cell, shape `(ny, nx)`.
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Consume the grid and keep only the values.
    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    /// Particles per cell, shape `(ny, nx)`.
    pub fn counts(&self) -> &Array2<usize> {
        &self.counts
    }

    pub fn domain(&self) -> &DomainSpec {
        &self.domain
    }

    pub fn cell_grid(&self) -> &CellGrid {
        &self.grid
    }

    /// `(rows, cols) = (ny, nx)`.
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Concentration of cell `(col, row)` = `(x index, y index)`.
    pub fn at(&self, col: usize, row: usize) -> Option<f64> {
        self.values.get([row, col]).copied()
    }

    /// Number of particles that were binned.
    pub fn particle_count(&self) -> usize {
        self.counts.sum()
    }

    /// Number of cells that received no particle.
    pub fn empty_cells(&self) -> usize {
        self.counts.iter().filter(|&&c| c == 0).count()
    }

    /// Occupancy-weighted mean concentration.
    ///
    /// Equals the mean label of the binned particles up to rounding.
    pub fn weighted_mean(&self) -> f64 {
        let total = self.particle_count();
        if total == 0 {
            return 0.0;
        }
        let weighted: f64 = self
            .values
            .iter()
            .zip(self.counts.iter())
            .map(|(&v, &c)| v * c as f64)
            .sum();
        weighted / total as f64
    }

    /// Largest cell concentration.
    pub fn max_value(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    /// Axis the 1D profile runs along.
    ///
    /// The grid's single varying axis, or x for full 2D grids.
    pub fn profile_axis(&self) -> Axis {
        self.grid.profile_axis().unwrap_or(Axis::X)
    }

    /// One-dimensional concentration profile.
    ///
    /// - `nx × 1` grid: the single row
    /// - `1 × ny` grid: the single column
    /// - 2D grid: mean over rows for every column (profile along x)
    pub fn profile(&self) -> Vec<f64> {
        match self.grid.profile_axis() {
            Some(Axis::Y) => self.values.column(0).to_vec(),
            Some(Axis::X) => self.values.row(0).to_vec(),
            None => self
                .values
                .columns()
                .into_iter()
                .map(|column| column.sum() / column.len() as f64)
                .collect(),
        }
    }

    /// Physical coordinates matching [`profile`](Self::profile).
    pub fn profile_coordinates(&self) -> Vec<f64> {
        self.grid.axis_coordinates(&self.domain, self.profile_axis())
    }

    /// Cell-centre coordinates along x (one per column).
    pub fn x_coordinates(&self) -> Vec<f64> {
        self.grid.axis_coordinates(&self.domain, Axis::X)
    }

    /// Cell-centre coordinates along y (one per row).
    pub fn y_coordinates(&self) -> Vec<f64> {
        self.grid.axis_coordinates(&self.domain, Axis::Y)
    }
}

// =================================================================================================
// Binner
// =================================================================================================

/// Stateless binning of particles onto a fixed domain and cell grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConcentrationBinner {
    domain: DomainSpec,
    grid: CellGrid,
}

impl ConcentrationBinner {
    pub fn new(domain: DomainSpec, grid: CellGrid) -> Self {
        Self { domain, grid }
    }

    pub fn domain(&self) -> &DomainSpec {
        &self.domain
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    /// Bin a particle set. Pure: the set is not modified.
    pub fn bin(&self, particles: &ParticleSet) -> ConcentrationGrid {
        self.bin_parts(particles.positions(), particles.labels())
    }

    /// Bin index-aligned positions and labels.
    pub fn bin_parts(&self, positions: &[Vector2<f64>], labels: &[Label]) -> ConcentrationGrid {
        debug_assert_eq!(positions.len(), labels.len());

        let (sums, counts) = self.accumulate(positions, labels);

        let nx = self.grid.nx();
        let counts = Array2::from_shape_fn(self.grid.shape(), |(row, col)| counts[row * nx + col]);
        let values = Array2::from_shape_fn(self.grid.shape(), |(row, col)| {
            match counts[[row, col]] {
                0 => 0.0,
                c => sums[row * nx + col] as f64 / c as f64,
            }
        });

        log::debug!(
            "binned {} particles onto {}x{} cells",
            positions.len(),
            nx,
            self.grid.ny()
        );

        ConcentrationGrid {
            values,
            counts,
            domain: self.domain,
            grid: self.grid,
        }
    }

    fn accumulate(&self, positions: &[Vector2<f64>], labels: &[Label]) -> (Vec<u64>, Vec<usize>) {
        let len = self.grid.len();

        #[cfg(feature = "parallel")]
        if positions.len() > parallel_threshold() {
            return positions
                .par_iter()
                .zip(labels.par_iter())
                .fold(
                    || (vec![0u64; len], vec![0usize; len]),
                    |(mut sums, mut counts), (p, &label)| {
                        let cell = self.grid.flat_index(&self.domain, p);
                        sums[cell] += u64::from(label);
                        counts[cell] += 1;
                        (sums, counts)
                    },
                )
                .reduce(
                    || (vec![0u64; len], vec![0usize; len]),
                    |(mut sums, mut counts), (other_sums, other_counts)| {
                        for (s, o) in sums.iter_mut().zip(other_sums) {
                            *s += o;
                        }
                        for (c, o) in counts.iter_mut().zip(other_counts) {
                            *c += o;
                        }
                        (sums, counts)
                    },
                );
        }

        let mut sums = vec![0u64; len];
        let mut counts = vec![0usize; len];
        for (p, &label) in positions.iter().zip(labels) {
            let cell = self.grid.flat_index(&self.domain, p);
            sums[cell] += u64::from(label);
            counts[cell] += 1;
        }
        (sums, counts)
    }
}
