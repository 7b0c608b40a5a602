//! Euler–Maruyama scheme for advection–diffusion
//!
//! # Mathematical Background
//!
//! Each particle follows the Itô stochastic differential equation
//!
//! ```text
//! dX = v(X) dt + sqrt(2 D) dW
//! ```
//!
//! whose probability density obeys the advection–diffusion equation
//! `∂c/∂t + v·∇c = D ∇²c`. The Euler–Maruyama discretization is
//!
//! ```text
//! X_{n+1} = X_n + v(X_n) dt + sqrt(2 D dt) ξ_n,     ξ_n ~ N(0, I₂)
//! ```
//!
//! # Characteristics
//!
//! - **Weak order**: 1 in `dt`
//! - **Statistical error**: `O(N^-1/2)` in the particle count
//! - **Cost**: one velocity lookup and two normal draws per particle per step
//!
//! # Reproducibility
//!
//! Particles are processed in fixed chunks of [`PARTICLE_CHUNK`]. Chunk `i`
//! draws from its own generator seeded with a mix of the step seed and `i`,
//! so parallel and sequential execution produce bit-identical positions.

use nalgebra::Vector2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::solver::traits::{Scheme, StepParameters};

#[cfg(feature = "parallel")]
use crate::solver::parallel_threshold;

/// Particles per random-number stream.
pub const PARTICLE_CHUNK: usize = 1024;

/// Euler–Maruyama advection–diffusion step.
#[derive(Debug, Clone, Copy, Default)]
pub struct EulerMaruyama;

impl EulerMaruyama {
    pub fn new() -> Self {
        Self
    }
}

/// SplitMix64 finalizer; decorrelates neighbouring chunk seeds.
#[inline]
pub(crate) fn chunk_seed(step_seed: u64, chunk: usize) -> u64 {
    let mut z = step_seed ^ (chunk as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[inline]
fn advance_chunk(
    index: usize,
    positions: &mut [Vector2<f64>],
    velocities: Option<&[Vector2<f64>]>,
    params: &StepParameters,
) {
    let dt = params.dt;

    if let Some(velocities) = velocities {
        for (p, v) in positions.iter_mut().zip(velocities) {
            *p += v * dt;
        }
    }

    let scale = params.diffusive_scale();
    if scale == 0.0 {
        return;
    }

    let mut rng = StdRng::seed_from_u64(chunk_seed(params.seed, index));
    for p in positions.iter_mut() {
        let xi = Vector2::new(rng.sample::<f64, _>(StandardNormal), rng.sample::<f64, _>(StandardNormal));
        *p += xi * scale;
    }
}

impl Scheme for EulerMaruyama {
    fn advance(&self, positions: &mut [Vector2<f64>], velocities: Option<&[Vector2<f64>]>, params: &StepParameters) {
        debug_assert!(velocities.is_none_or(|v| v.len() == positions.len()));

        let velocity_chunk = |index: usize, len: usize| {
            velocities.map(|v| {
                let start = index * PARTICLE_CHUNK;
                &v[start..start + len]
            })
        };

        #[cfg(feature = "parallel")]
        if positions.len() > parallel_threshold() {
            positions
                .par_chunks_mut(PARTICLE_CHUNK)
                .enumerate()
                .for_each(|(index, chunk)| {
                    let vel = velocity_chunk(index, chunk.len());
                    advance_chunk(index, chunk, vel, params);
                });
            return;
        }

        for (index, chunk) in positions.chunks_mut(PARTICLE_CHUNK).enumerate() {
            let vel = velocity_chunk(index, chunk.len());
            advance_chunk(index, chunk, vel, params);
        }
    }

    fn name(&self) -> &str {
        "Euler-Maruyama"
    }
}
