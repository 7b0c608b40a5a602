//! How particles move: configuration, scheme, boundary and engine
//!
//! # Core Concepts
//!
//! The solver separates concerns into four layers:
//!
//! 1. **Configuration** ([`SimulationConfig`]) - WHAT to simulate
//!    - Clock (`time_max`, `dt`), domain, cell grid
//!    - Particle count, diffusivity, velocity source
//!    - Painting regions and seed
//!
//! 2. **Scheme** ([`Scheme`] trait) - HOW one step moves particles
//!    - [`EulerMaruyama`]: `p += v·dt + sqrt(2·D·dt)·ξ`
//!
//! 3. **Boundary** ([`BoundaryPolicy`] trait) - what happens at the walls
//!    - [`ReflectiveBoundary`]: mirror, then clamp
//!
//! 4. **Engine** ([`SimulationEngine`]) - owns the particles and runs steps
//!    - `Constructed → Stepping → Terminal`
//!
//! # Module Organization
//!
//! - **`config`**: [`SimulationConfig`], its builder, the flat
//!   [`SimulationParameters`] record and [`SimulationClock`]
//! - **`traits`**: [`Scheme`], [`BoundaryPolicy`], [`StepParameters`]
//! - **`boundary`**: [`ReflectiveBoundary`]
//! - **`methods`**: scheme implementations
//! - **`engine`**: [`SimulationEngine`], [`EngineState`], [`Frame`]
//!
//! # Quick Start Example
//!
//! ```rust
//! use lagrangian_rs::physics::Region;
//! use lagrangian_rs::solver::{SimulationConfig, SimulationEngine};
//!
//! let config = SimulationConfig::builder()
//!     .time_max(0.05)
//!     .dt(0.01)
//!     .particle_count(2_000)
//!     .cells(16, 16)
//!     .region(Region::Circle { center: [0.0, 0.0], radius: 0.3, value: 1 })
//!     .seed(7)
//!     .build()?;
//!
//! let mut engine = SimulationEngine::new(config)?;
//! engine.run_to_completion()?;
//!
//! let grid = engine.concentrations();
//! assert_eq!(grid.values().dim(), (16, 16));
//! # Ok::<(), lagrangian_rs::error::SimulationError>(())
//! ```
//!
//! # Error Handling
//!
//! Construction fails with a [`ConfigurationError`](crate::error::ConfigurationError)
//! or a [`DataFormatError`](crate::error::DataFormatError) (velocity file).
//! Stepping fails when a position becomes NaN or infinite, or when `step()`
//! is called after the run is complete.

// =================================================================================================
// Module Declarations
// =================================================================================================
mod boundary;
mod config;
mod engine;
pub mod methods;
mod traits;

// =================================================================================================
// Parallel Execution Threshold
// =================================================================================================
//
// Deciding *when* to hand per-particle work off to Rayon is a numerical
// execution concern shared by the velocity lookup, the scheme, the boundary
// pass and the binner. It lives here so all of them read the same value.
//
// The threshold is stored in an AtomicUsize so that it can be changed at
// runtime (useful in benchmarks and tests) without a mutex on every step.
// Relaxed ordering is sufficient: the value is a performance hint, not a
// synchronisation point.
// =================================================================================================

use std::sync::atomic::{AtomicUsize, Ordering};

/// Default number of particles above which per-particle loops switch to
/// parallel iteration.
///
/// Below roughly a thousand particles the overhead of Rayon's thread-pool
/// dispatch outweighs the per-particle work of one step.
const DEFAULT_PARALLEL_THRESHOLD: usize = 999;

/// Runtime-configurable parallel-execution threshold.
///
/// Read via [`parallel_threshold()`], written via [`set_parallel_threshold()`].
static PARALLEL_THRESHOLD: AtomicUsize = AtomicUsize::new(DEFAULT_PARALLEL_THRESHOLD);

/// Return the current parallel-execution threshold.
///
/// Per-particle loops run sequentially when there are at most this many
/// particles and switch to Rayon above it, but only when the crate is
/// compiled with the `parallel` feature.
///
/// # Example
///
/// ```rust
/// use lagrangian_rs::solver::parallel_threshold;
///
/// assert!(parallel_threshold() > 0);
/// ```
pub fn parallel_threshold() -> usize {
    PARALLEL_THRESHOLD.load(Ordering::Relaxed)
}

/// Set the parallel-execution threshold to a new value.
///
/// Results do not depend on the threshold: every parallel path produces the
/// same output as its sequential counterpart.
///
/// # Panics
///
/// Panics when `threshold == 0`.
///
/// # Example
///
/// ```rust
/// use lagrangian_rs::solver::{parallel_threshold, set_parallel_threshold};
///
/// let previous = parallel_threshold();
/// set_parallel_threshold(4096);
/// assert_eq!(parallel_threshold(), 4096);
///
/// // Restore so other tests are not affected.
/// set_parallel_threshold(previous);
/// ```
pub fn set_parallel_threshold(threshold: usize) {
    assert!(threshold > 0, "parallel threshold must be at least 1");
    PARALLEL_THRESHOLD.store(threshold, Ordering::Relaxed);
}

/// Serializes tests that modify the threshold.
#[cfg(test)]
static THRESHOLD_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// RAII guard that saves the current threshold on construction and restores
/// it on drop.
///
/// Only compiled in test builds. Holds a global lock for its lifetime so
/// concurrently running tests never observe each other's threshold. Never
/// hold two guards in the same test.
///
/// ```rust,ignore
/// let _guard = crate::solver::ThresholdGuard::save(50);
/// // threshold is now 50 …
/// // … and is automatically restored when _guard is dropped.
/// ```
#[cfg(test)]
pub(crate) struct ThresholdGuard {
    previous: usize,
    _lock: std::sync::MutexGuard<'static, ()>,
}

#[cfg(test)]
impl ThresholdGuard {
    /// Set the threshold to `new_value` and return a guard that will
    /// restore the previous value on drop.
    pub(crate) fn save(new_value: usize) -> Self {
        let lock = THRESHOLD_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = parallel_threshold();
        set_parallel_threshold(new_value);
        Self { previous, _lock: lock }
    }
}

#[cfg(test)]
impl Drop for ThresholdGuard {
    fn drop(&mut self) {
        // Bypass the public setter so that restoring never panics.
        PARALLEL_THRESHOLD.store(self.previous, Ordering::Relaxed);
    }
}

// =================================================================================================
// Public Re-exports
// =================================================================================================

pub use boundary::ReflectiveBoundary;
pub use config::{
    SimulationClock,
    SimulationConfig,
    SimulationConfigBuilder,
    SimulationParameters,
    VelocitySource,
};
pub use engine::{EngineState, Frame, SimulationEngine};
pub use methods::EulerMaruyama;
pub use traits::{BoundaryPolicy, Scheme, StepParameters};

// =================================================================================================
// Helper Functions
// =================================================================================================

use nalgebra::Vector2;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::SimulationError;

/// Check positions for NaN or infinite coordinates.
///
/// Runs after the stochastic update and before the boundary pass, which
/// would otherwise clamp an infinite coordinate onto a wall and hide it.
/// Reports the lowest offending particle index.
pub(crate) fn validate_positions(positions: &[Vector2<f64>], step: usize) -> Result<(), SimulationError> {
    let is_bad = |p: &Vector2<f64>| !(p.x.is_finite() && p.y.is_finite());

    #[cfg(feature = "parallel")]
    let offending = if positions.len() > parallel_threshold() {
        positions.par_iter().position_first(is_bad)
    } else {
        positions.iter().position(is_bad)
    };

    #[cfg(not(feature = "parallel"))]
    let offending = positions.iter().position(is_bad);

    match offending {
        Some(particle) => Err(SimulationError::NonFinitePosition { step, particle }),
        None => Ok(()),
    }
}

// =================================================================================================
// Tests
// =================================================================================================
