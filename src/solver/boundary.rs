//! Reflective domain boundary
//!
//! After each stochastic update some particles may have left the domain.
//! The reflective policy mirrors them back across the wall they crossed:
//!
//! ```text
//! p < min  →  p' = 2·min − p
//! p > max  →  p' = 2·max − p
//! ```
//!
//! applied independently per axis. A single reflection is only guaranteed to
//! land inside the domain when the overshoot is smaller than the domain
//! extent. For larger excursions (large `dt`, large diffusivity) the
//! reflected coordinate is clamped onto the boundary.
//!
//! # Caveat
//!
//! The clamp is a heuristic. It keeps every particle inside
//! `[min, max]` but piles the clamped mass on the walls, and it does not
//! preserve the distribution a true reflected Brownian motion would have near
//! corners. Keep `sqrt(2·D·dt)` and `|v|·dt` well below the domain extent.

use nalgebra::Vector2;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::physics::DomainSpec;
use crate::solver::traits::BoundaryPolicy;

#[cfg(feature = "parallel")]
use crate::solver::parallel_threshold;

/// Mirror-then-clamp boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReflectiveBoundary;

impl ReflectiveBoundary {
    pub fn new() -> Self {
        Self
    }

    /// Reflect one coordinate into `[lo, hi]`.
    ///
    /// Mirrors across `lo`, then across `hi` on the updated value, then
    /// clamps whatever is still outside.
    #[inline]
    pub fn reflect(value: f64, lo: f64, hi: f64) -> f64 {
        let mut value = value;
        if value < lo {
            value = 2.0 * lo - value;
        }
        if value > hi {
            value = 2.0 * hi - value;
        }
        value.clamp(lo, hi)
    }

    #[inline]
    fn reflect_point(position: &mut Vector2<f64>, lo: &Vector2<f64>, hi: &Vector2<f64>) {
        position.x = Self::reflect(position.x, lo.x, hi.x);
        position.y = Self::reflect(position.y, lo.y, hi.y);
    }
}

impl BoundaryPolicy for ReflectiveBoundary {
    fn apply(&self, positions: &mut [Vector2<f64>], domain: &DomainSpec) {
        let (lo, hi) = (domain.min(), domain.max());

        #[cfg(feature = "parallel")]
        if positions.len() > parallel_threshold() {
            positions
                .par_iter_mut()
                .for_each(|p| Self::reflect_point(p, &lo, &hi));
            return;
        }

        for p in positions.iter_mut() {
            Self::reflect_point(p, &lo, &hi);
        }
    }

    fn name(&self) -> &str {
        "Reflective"
    }
}
