//! Particle population and region painting
//!
//! Particles are stored column-wise: one position array and one label array,
//! index-aligned. Labels identify one of two substances (`0` or `1`).
//!
//! Painting is a one-time initialization step: a region overwrites the labels
//! of the particles whose position lies inside it *at the time of painting*.
//! It is never re-applied while the simulation runs.
//!
//! # Boundary convention
//!
//! Both region predicates are inclusive. A particle exactly on the circle
//! (`|p - c|² == r²`) or exactly on a rectangle edge is painted.

use nalgebra::Vector2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::physics::domain::DomainSpec;

/// Substance label carried by a particle.
pub type Label = u8;

// =================================================================================================
// Regions
// =================================================================================================

/// Labelled region used to paint particles at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Region {
    /// Disc of `radius` around `center`.
    Circle {
        center: [f64; 2],
        radius: f64,
        value: Label,
    },
    /// Axis-aligned rectangle between two corners.
    Rectangle {
        min: [f64; 2],
        max: [f64; 2],
        value: Label,
    },
}

impl Region {
    /// Label written into matching particles.
    pub fn value(&self) -> Label {
        match self {
            Region::Circle { value, .. } | Region::Rectangle { value, .. } => *value,
        }
    }

    /// Inclusive membership test.
    #[inline]
    pub fn contains(&self, position: &Vector2<f64>) -> bool {
        match self {
            Region::Circle { center, radius, .. } => {
                let dx = position.x - center[0];
                let dy = position.y - center[1];
                dx * dx + dy * dy <= radius * radius
            }
            Region::Rectangle { min, max, .. } => {
                position.x >= min[0]
                    && position.x <= max[0]
                    && position.y >= min[1]
                    && position.y <= max[1]
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Region::Circle { .. } => "circle",
            Region::Rectangle { .. } => "rectangle",
        }
    }

    /// Reject labels other than 0/1 and degenerate geometry.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.value() > 1 {
            return Err(ConfigurationError::InvalidLabel {
                region: self.name(),
                value: i64::from(self.value()),
            });
        }
        match self {
            Region::Circle { center, radius, .. } => {
                if !center.iter().all(|c| c.is_finite()) {
                    return Err(ConfigurationError::NonFinite("circle center"));
                }
                if !radius.is_finite() || *radius < 0.0 {
                    return Err(ConfigurationError::NegativeRadius(*radius));
                }
            }
            Region::Rectangle { min, max, .. } => {
                if !min.iter().chain(max.iter()).all(|c| c.is_finite()) {
                    return Err(ConfigurationError::NonFinite("rectangle corners"));
                }
                for axis in crate::error::Axis::ALL {
                    let k = axis.index();
                    if min[k] > max[k] {
                        return Err(ConfigurationError::InvertedRectangle {
                            axis,
                            min: min[k],
                            max: max[k],
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

// =================================================================================================
// Particle set
// =================================================================================================

/// `N` particles: positions and labels, index-aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSet {
    positions: Vec<Vector2<f64>>,
    labels: Vec<Label>,
}

impl ParticleSet {
    /// Draw `n` positions uniformly inside `domain`; all labels start at 0.
    pub fn generate_random<R: Rng + ?Sized>(n: usize, domain: &DomainSpec, rng: &mut R) -> Self {
        let (min, extent) = (domain.min(), domain.extent());
        let positions = (0..n)
            .map(|_| {
                let u: f64 = rng.random();
                let v: f64 = rng.random();
                Vector2::new(min.x + u * extent.x, min.y + v * extent.y)
            })
            .collect();
        Self {
            positions,
            labels: vec![0; n],
        }
    }

    /// Build from explicit positions, labels all 0.
    pub fn from_positions(positions: Vec<Vector2<f64>>) -> Self {
        let labels = vec![0; positions.len()];
        Self { positions, labels }
    }

    /// Build from explicit positions and labels of equal length.
    pub fn from_parts(positions: Vec<Vector2<f64>>, labels: Vec<Label>) -> Result<Self, ConfigurationError> {
        if positions.len() != labels.len() {
            return Err(ConfigurationError::Invalid(format!(
                "{} positions but {} labels",
                positions.len(),
                labels.len()
            )));
        }
        Ok(Self { positions, labels })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vector2<f64>] {
        &self.positions
    }

    pub(crate) fn positions_mut(&mut self) -> &mut [Vector2<f64>] {
        &mut self.positions
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Overwrite the labels of every particle inside `region`.
    ///
    /// Returns how many particles were painted.
    pub fn paint(&mut self, region: &Region) -> usize {
        let value = region.value();
        let mut painted = 0;
        for (label, position) in self.labels.iter_mut().zip(&self.positions) {
            if region.contains(position) {
                *label = value;
                painted += 1;
            }
        }
        painted
    }

    /// Paint a disc (inclusive on the rim).
    pub fn paint_circle(&mut self, center: [f64; 2], radius: f64, value: Label) -> usize {
        self.paint(&Region::Circle { center, radius, value })
    }

    /// Paint an axis-aligned rectangle (inclusive on the edges).
    pub fn paint_rectangle(&mut self, min_corner: [f64; 2], max_corner: [f64; 2], value: Label) -> usize {
        self.paint(&Region::Rectangle { min: min_corner, max: max_corner, value })
    }

    /// Number of particles carrying `label`.
    pub fn count_label(&self, label: Label) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }

    /// Mean label over all particles (0 for an empty set).
    pub fn mean_label(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.labels.iter().map(|&l| u64::from(l)).sum();
        sum as f64 / self.labels.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn generate_random_stays_in_domain() {
        let domain = DomainSpec::new([-2.0, 0.0], [1.0, 0.5]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let set = ParticleSet::generate_random(500, &domain, &mut rng);
        assert_eq!(set.len(), 500);
        assert!(set.positions().iter().all(|p| domain.contains(p)));
        assert!(set.labels().iter().all(|&l| l == 0));
    }

    #[test]
    fn same_seed_same_particles() {
        let domain = DomainSpec::unit_square();
        let a = ParticleSet::generate_random(64, &domain, &mut StdRng::seed_from_u64(3));
        let b = ParticleSet::generate_random(64, &domain, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }

    #[test]
    fn circle_is_inclusive_on_the_rim() {
        let mut set = ParticleSet::from_positions(vec![
            Vector2::new(1.0, 0.0),  // on the rim
            Vector2::new(0.5, 0.5),  // inside
            Vector2::new(1.0, 1.0),  // outside
        ]);
        let painted = set.paint_circle([0.0, 0.0], 1.0, 1);
        assert_eq!(painted, 2);
        assert_eq!(set.labels(), &[1, 1, 0]);
    }

    #[test]
    fn rectangle_is_inclusive_on_edges() {
        let mut set = ParticleSet::from_positions(vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(0.0001, 0.5),
        ]);
        set.paint_rectangle([-1.0, -1.0], [0.0, 1.0], 1);
        assert_eq!(set.labels(), &[1, 1, 0]);
    }

    #[test]
    fn painting_never_moves_particles() {
        let domain = DomainSpec::unit_square();
        let mut set = ParticleSet::generate_random(100, &domain, &mut StdRng::seed_from_u64(11));
        let before = set.positions().to_vec();
        set.paint_circle([0.0, 0.0], 0.5, 1);
        assert_eq!(set.positions(), before.as_slice());
    }

    #[test]
    fn later_regions_overwrite_earlier_ones() {
        let mut set = ParticleSet::from_positions(vec![Vector2::new(0.0, 0.0)]);
        set.paint_rectangle([-1.0, -1.0], [1.0, 1.0], 1);
        set.paint_circle([0.0, 0.0], 0.1, 0);
        assert_eq!(set.labels(), &[0]);
    }

    #[test]
    fn mean_label_counts_ones() {
        let set = ParticleSet::from_parts(
            vec![Vector2::zeros(); 4],
            vec![1, 0, 1, 1],
        )
        .unwrap();
        assert_eq!(set.count_label(1), 3);
        assert!((set.mean_label() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn from_parts_rejects_length_mismatch() {
        assert!(ParticleSet::from_parts(vec![Vector2::zeros(); 2], vec![0]).is_err());
    }

    #[test]
    fn region_validation() {
        let bad_label = Region::Circle { center: [0.0, 0.0], radius: 1.0, value: 2 };
        assert!(matches!(bad_label.validate(), Err(ConfigurationError::InvalidLabel { .. })));

        let bad_radius = Region::Circle { center: [0.0, 0.0], radius: -0.1, value: 1 };
        assert!(matches!(bad_radius.validate(), Err(ConfigurationError::NegativeRadius(_))));

        let inverted = Region::Rectangle { min: [0.0, 1.0], max: [1.0, 0.0], value: 1 };
        assert!(matches!(inverted.validate(), Err(ConfigurationError::InvertedRectangle { .. })));

        let ok = Region::Rectangle { min: [-1.0, -1.0], max: [0.0, 1.0], value: 1 };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn region_serde_uses_shape_tag() {
        let region = Region::Circle { center: [0.4, 0.4], radius: 0.1, value: 1 };
        let json = serde_json::to_string(&region).unwrap();
        assert!(json.contains("\"shape\":\"circle\""));
        let back: Region = serde_json::from_str(&json).unwrap();
        assert_eq!(back, region);
    }
}
