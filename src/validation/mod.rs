//! Statistical convergence of the particle method
//!
//! - [`ReferenceSolution`]: 1D reference curve with linear interpolation
//! - [`fitting`]: moving average and the `E(N) = a · N^β` power-law fit
//! - [`ValidationHarness`]: RMSE sweeps over `(dt, particle_count)` pairs
//!
//! ```text
//! validation/
//! ├── mod.rs
//! ├── reference.rs   ← ReferenceSolution
//! ├── fitting.rs     ← moving_average, fit_power_law, PowerLawFit
//! └── harness.rs     ← ValidationHarness, ConvergenceReport, ReferenceComparison
//! ```

pub mod fitting;
mod harness;
mod reference;

pub use fitting::{PowerLawFit, fit_power_law, moving_average};
pub use harness::{
    AbortHandle, CONVERGENCE_ORDER_TOLERANCE, ConvergenceReport, EXPECTED_CONVERGENCE_ORDER, ReferenceComparison,
    ValidationHarness,
};
pub use reference::{REFERENCE_COLUMNS, ReferenceSolution};
