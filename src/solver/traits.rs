//! Scheme and boundary traits
//!
//! The engine is assembled from two seams:
//!
//! - [`Scheme`]: moves every particle forward by one time step
//!   (deterministic drift plus stochastic increment).
//! - [`BoundaryPolicy`]: brings particles that left the domain back in.
//!
//! Both operate on the whole position slice at once so implementations are
//! free to parallelize across particles. Neither owns simulation state.

use std::fmt::Debug;

use nalgebra::Vector2;

use crate::physics::DomainSpec;

/// Per-step constants handed to a [`Scheme`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParameters {
    /// Time step.
    pub dt: f64,
    /// Diffusion coefficient `D`.
    pub diffusivity: f64,
    /// Seed for this step's random increments.
    ///
    /// Implementations must derive all randomness from it so that a step is
    /// reproducible independently of thread scheduling.
    pub seed: u64,
}

impl StepParameters {
    /// Standard deviation of the diffusive displacement per axis, `sqrt(2·D·dt)`.
    pub fn diffusive_scale(&self) -> f64 {
        (2.0 * self.diffusivity * self.dt).sqrt()
    }
}

/// Stochastic time-stepping scheme.
pub trait Scheme: Send + Sync + Debug {
    /// Advance `positions` in place by one step.
    ///
    /// `velocities` is `None` for pure diffusion, otherwise index-aligned
    /// with `positions`. Positions may leave the domain; the boundary policy
    /// runs afterwards.
    fn advance(&self, positions: &mut [Vector2<f64>], velocities: Option<&[Vector2<f64>]>, params: &StepParameters);

    /// Human-readable name, used in logs.
    fn name(&self) -> &str;
}

/// Policy applied to positions after each update.
pub trait BoundaryPolicy: Send + Sync + Debug {
    /// Move every position back into `domain`.
    ///
    /// Postcondition: `domain.contains(p)` for all finite `p`.
    fn apply(&self, positions: &mut [Vector2<f64>], domain: &DomainSpec);

    /// Human-readable name, used in logs.
    fn name(&self) -> &str;
}
