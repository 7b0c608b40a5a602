//! Mock time-stepping schemes for testing
//!
//! Deterministic schemes whose particle trajectories are known exactly,
//! so engine bookkeeping can be checked without statistics.

use lagrangian_rs::solver::{Scheme, StepParameters};
use nalgebra::Vector2;

// =================================================================================================
// Frozen: particles never move
// =================================================================================================

/// Leaves every position untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Frozen;

impl Scheme for Frozen {
    fn advance(&self, _positions: &mut [Vector2<f64>], _velocities: Option<&[Vector2<f64>]>, _params: &StepParameters) {}

    fn name(&self) -> &str {
        "Frozen"
    }
}

// =================================================================================================
// Constant drift: p += u * dt
// =================================================================================================

/// Uniform translation, ignoring the velocity field and diffusivity.
///
/// Exact solution: `p(t) = p₀ + u·t`, reflected at the walls.
#[derive(Debug, Clone, Copy)]
pub struct ConstantDrift {
    pub velocity: Vector2<f64>,
}

impl ConstantDrift {
    pub fn new(vx: f64, vy: f64) -> Self {
        Self { velocity: Vector2::new(vx, vy) }
    }
}

impl Scheme for ConstantDrift {
    fn advance(&self, positions: &mut [Vector2<f64>], _velocities: Option<&[Vector2<f64>]>, params: &StepParameters) {
        for p in positions.iter_mut() {
            *p += self.velocity * params.dt;
        }
    }

    fn name(&self) -> &str {
        "ConstantDrift"
    }
}
