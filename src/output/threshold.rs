//! Cells that ever exceeded a concentration threshold
//!
//! Used to follow a spill: once a cell's concentration goes above the
//! threshold it stays marked for the rest of the run, even after the
//! substance has diffused away.

use ndarray::{Array2, Zip};

use crate::output::concentration::ConcentrationGrid;

/// Default highlight threshold for spill tracking.
pub const DEFAULT_HIGHLIGHT_THRESHOLD: f64 = 0.3;

/// Sticky per-cell "exceeded" mask.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTracker {
    threshold: f64,
    marked: Array2<bool>,
}

impl ThresholdTracker {
    /// Tracker for grids of shape `(rows, cols)`.
    pub fn new(threshold: f64, shape: (usize, usize)) -> Self {
        Self {
            threshold,
            marked: Array2::from_elem(shape, false),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn marked(&self) -> &Array2<bool> {
        &self.marked
    }

    /// Number of cells marked so far.
    pub fn marked_count(&self) -> usize {
        self.marked.iter().filter(|&&m| m).count()
    }

    /// Mark every cell strictly above the threshold and return how many cells
    /// were newly marked.
    ///
    /// A grid of a different shape resets the tracker first.
    pub fn update(&mut self, grid: &ConcentrationGrid) -> usize {
        if self.marked.dim() != grid.shape() {
            log::debug!("threshold tracker reshaped to {:?}", grid.shape());
            self.marked = Array2::from_elem(grid.shape(), false);
        }
        let threshold = self.threshold;
        let mut newly = 0;
        Zip::from(&mut self.marked)
            .and(grid.values())
            .for_each(|marked, &value| {
                if !*marked && value > threshold {
                    *marked = true;
                    newly += 1;
                }
            });
        newly
    }

    /// Marked cells as `1.0`, every other cell at its current concentration.
    pub fn highlighted(&self, grid: &ConcentrationGrid) -> Array2<f64> {
        let mut out = grid.values().clone();
        if out.dim() != self.marked.dim() {
            return out;
        }
        Zip::from(&mut out)
            .and(&self.marked)
            .for_each(|value, &marked| {
                if marked {
                    *value = 1.0;
                }
            });
        out
    }

    /// `update` then `highlighted`.
    pub fn observe(&mut self, grid: &ConcentrationGrid) -> Array2<f64> {
        self.update(grid);
        self.highlighted(grid)
    }

    /// Clear all marks.
    pub fn reset(&mut self) {
        self.marked.fill(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ConcentrationBinner;
    use crate::physics::{CellGrid, DomainSpec};
    use nalgebra::Vector2;

    fn grid_with(labels: &[u8]) -> ConcentrationGrid {
        // One particle per cell of a 3x1 grid.
        let positions = vec![Vector2::new(-1.0, 0.0), Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0)];
        ConcentrationBinner::new(DomainSpec::unit_square(), CellGrid::new(3, 1).unwrap())
            .bin_parts(&positions, labels)
    }

    #[test]
    fn test_marks_are_sticky() {
        let mut tracker = ThresholdTracker::new(0.3, (1, 3));
        assert_eq!(tracker.update(&grid_with(&[1, 0, 0])), 1);

        let later = grid_with(&[0, 1, 0]);
        assert_eq!(tracker.update(&later), 1);
        assert_eq!(tracker.marked_count(), 2);

        let highlighted = tracker.highlighted(&later);
        assert_eq!(highlighted.row(0).to_vec(), vec![1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut tracker = ThresholdTracker::new(1.0, (1, 3));
        assert_eq!(tracker.update(&grid_with(&[1, 1, 1])), 0);
        assert_eq!(tracker.marked_count(), 0);
    }

    #[test]
    fn test_reset_and_reshape() {
        let mut tracker = ThresholdTracker::new(0.3, (2, 2));
        tracker.update(&grid_with(&[1, 1, 0]));
        assert_eq!(tracker.marked().dim(), (1, 3));
        assert_eq!(tracker.marked_count(), 2);
        tracker.reset();
        assert_eq!(tracker.marked_count(), 0);
    }

    #[test]
    fn test_observe_unmarked_cells_keep_value() {
        let mut tracker = ThresholdTracker::new(DEFAULT_HIGHLIGHT_THRESHOLD, (1, 3));
        let out = tracker.observe(&grid_with(&[0, 0, 0]));
        assert_eq!(out.sum(), 0.0);
    }
}
