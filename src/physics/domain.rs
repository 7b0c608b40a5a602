//! Rectangular domain and concentration cell grid

use nalgebra::Vector2;

use crate::error::{Axis, ConfigurationError};

// =================================================================================================
// Domain
// =================================================================================================

/// Axis-aligned rectangle `[min_x, max_x] × [min_y, max_y]`.
///
/// Immutable once built; `max > min` holds on both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainSpec {
    min: Vector2<f64>,
    max: Vector2<f64>,
}

impl DomainSpec {
    /// Create a domain, rejecting empty or non-finite extents.
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Result<Self, ConfigurationError> {
        for axis in Axis::ALL {
            let (lo, hi) = (min[axis.index()], max[axis.index()]);
            if !lo.is_finite() || !hi.is_finite() {
                return Err(ConfigurationError::NonFinite("domain bounds"));
            }
            if hi <= lo {
                return Err(ConfigurationError::EmptyDomain { axis, min: lo, max: hi });
            }
        }
        Ok(Self {
            min: Vector2::new(min[0], min[1]),
            max: Vector2::new(max[0], max[1]),
        })
    }

    /// The `[-1, 1] × [-1, 1]` square of the default configuration.
    pub fn unit_square() -> Self {
        Self {
            min: Vector2::new(-1.0, -1.0),
            max: Vector2::new(1.0, 1.0),
        }
    }

    pub fn min(&self) -> Vector2<f64> {
        self.min
    }

    pub fn max(&self) -> Vector2<f64> {
        self.max
    }

    /// `max - min` per axis.
    pub fn extent(&self) -> Vector2<f64> {
        self.max - self.min
    }

    /// Lower bound on one axis.
    pub fn lower(&self, axis: Axis) -> f64 {
        self.min[axis.index()]
    }

    /// Upper bound on one axis.
    pub fn upper(&self, axis: Axis) -> f64 {
        self.max[axis.index()]
    }

    /// Inclusive containment test.
    pub fn contains(&self, position: &Vector2<f64>) -> bool {
        (0..2).all(|k| position[k] >= self.min[k] && position[k] <= self.max[k])
    }

    /// Map a position onto `[0, 1] × [0, 1]`.
    pub fn normalize(&self, position: &Vector2<f64>) -> Vector2<f64> {
        (position - self.min).component_div(&self.extent())
    }
}

// =================================================================================================
// Cell grid
// =================================================================================================

/// Resolution `(nx, ny)` of the concentration grid.
///
/// Cell `i` on an axis with `n > 1` cells is centred on
/// `min + i * (max - min) / (n - 1)`, i.e. the first and last cells sit on
/// the domain boundary. This matches the rounding used by the binner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellGrid {
    nx: usize,
    ny: usize,
}

impl CellGrid {
    pub fn new(nx: usize, ny: usize) -> Result<Self, ConfigurationError> {
        if nx == 0 {
            return Err(ConfigurationError::EmptyCellGrid(Axis::X));
        }
        if ny == 0 {
            return Err(ConfigurationError::EmptyCellGrid(Axis::Y));
        }
        Ok(Self { nx, ny })
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Cells along one axis.
    pub fn cells(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => self.nx,
            Axis::Y => self.ny,
        }
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    /// Never true: both dimensions are positive by construction.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major array shape `(rows, cols) = (ny, nx)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.ny, self.nx)
    }

    /// The single varying axis when the grid is one cell thick, if any.
    ///
    /// A `1 × 1` grid has no profile axis.
    pub fn profile_axis(&self) -> Option<Axis> {
        match (self.nx, self.ny) {
            (nx, 1) if nx > 1 => Some(Axis::X),
            (1, ny) if ny > 1 => Some(Axis::Y),
            _ => None,
        }
    }

    /// `(col, row)` cell of a position inside `domain`.
    ///
    /// Uses `round(normalized * (n - 1))`; coordinates outside the domain are
    /// clamped to the edge cells.
    pub fn cell_of(&self, domain: &DomainSpec, position: &Vector2<f64>) -> (usize, usize) {
        let normalized = domain.normalize(position);
        (
            scale_to_cell(normalized.x, self.nx),
            scale_to_cell(normalized.y, self.ny),
        )
    }

    /// Flat row-major index of a position.
    pub fn flat_index(&self, domain: &DomainSpec, position: &Vector2<f64>) -> usize {
        let (col, row) = self.cell_of(domain, position);
        row * self.nx + col
    }

    /// Physical coordinate of cell `index` on `axis`.
    pub fn cell_coordinate(&self, domain: &DomainSpec, axis: Axis, index: usize) -> f64 {
        let n = self.cells(axis);
        let (lo, hi) = (domain.lower(axis), domain.upper(axis));
        if n == 1 {
            return 0.5 * (lo + hi);
        }
        lo + (hi - lo) * index as f64 / (n - 1) as f64
    }

    /// Coordinates of every cell on `axis`.
    pub fn axis_coordinates(&self, domain: &DomainSpec, axis: Axis) -> Vec<f64> {
        (0..self.cells(axis))
            .map(|i| self.cell_coordinate(domain, axis, i))
            .collect()
    }
}

#[inline]
fn scale_to_cell(normalized: f64, n: usize) -> usize {
    let scaled = (normalized * (n - 1) as f64).round();
    if scaled <= 0.0 {
        0
    } else {
        (scaled as usize).min(n - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn domain_rejects_inverted_axis() {
        let err = DomainSpec::new([0.0, 1.0], [1.0, 1.0]).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::EmptyDomain { axis: Axis::Y, min: 1.0, max: 1.0 }
        );
    }

    #[test]
    fn domain_rejects_nan() {
        assert!(DomainSpec::new([f64::NAN, 0.0], [1.0, 1.0]).is_err());
    }

    #[test]
    fn normalize_maps_corners() {
        let domain = DomainSpec::new([-1.0, 0.0], [1.0, 4.0]).unwrap();
        let lo = domain.normalize(&Vector2::new(-1.0, 0.0));
        let hi = domain.normalize(&Vector2::new(1.0, 4.0));
        assert_relative_eq!(lo.x, 0.0);
        assert_relative_eq!(lo.y, 0.0);
        assert_relative_eq!(hi.x, 1.0);
        assert_relative_eq!(hi.y, 1.0);
    }

    #[test]
    fn grid_rejects_zero_cells() {
        assert_eq!(CellGrid::new(0, 4).unwrap_err(), ConfigurationError::EmptyCellGrid(Axis::X));
        assert_eq!(CellGrid::new(4, 0).unwrap_err(), ConfigurationError::EmptyCellGrid(Axis::Y));
    }

    #[test]
    fn cell_of_rounds_to_nearest_cell() {
        let domain = DomainSpec::unit_square();
        let grid = CellGrid::new(5, 3).unwrap();
        // x: -1 → 0, 1 → 4 ; y: 0 → 1
        assert_eq!(grid.cell_of(&domain, &Vector2::new(-1.0, 0.0)), (0, 1));
        assert_eq!(grid.cell_of(&domain, &Vector2::new(1.0, 1.0)), (4, 2));
        // normalized x = 0.3 → 1.2 → 1
        assert_eq!(grid.cell_of(&domain, &Vector2::new(-0.4, -1.0)), (1, 0));
    }

    #[test]
    fn single_cell_axis_collapses() {
        let domain = DomainSpec::unit_square();
        let grid = CellGrid::new(8, 1).unwrap();
        assert_eq!(grid.cell_of(&domain, &Vector2::new(0.3, 0.9)).1, 0);
        assert_eq!(grid.profile_axis(), Some(Axis::X));
        assert_relative_eq!(grid.cell_coordinate(&domain, Axis::Y, 0), 0.0);
    }

    #[test]
    fn axis_coordinates_span_domain() {
        let domain = DomainSpec::unit_square();
        let grid = CellGrid::new(5, 5).unwrap();
        let xs = grid.axis_coordinates(&domain, Axis::X);
        assert_eq!(xs.len(), 5);
        assert_relative_eq!(xs[0], -1.0);
        assert_relative_eq!(xs[2], 0.0);
        assert_relative_eq!(xs[4], 1.0);
    }

    #[test]
    fn out_of_domain_positions_clamp_to_edge_cells() {
        let domain = DomainSpec::unit_square();
        let grid = CellGrid::new(4, 4).unwrap();
        assert_eq!(grid.cell_of(&domain, &Vector2::new(-3.0, 9.0)), (0, 3));
    }
}
