//! Stochastic time-stepping schemes
//!
//! Concrete implementations of the [`Scheme`](crate::solver::Scheme) trait.
//!
//! # Available Methods
//!
//! - **[`EulerMaruyama`]**: explicit first-order scheme for
//!   `dX = v(X) dt + sqrt(2D) dW`
//!   - Weak order 1 in `dt`
//!   - Cost: one velocity lookup and two normal draws per particle
//!
//! Schemes are stateless: all randomness comes from the per-step seed in
//! [`StepParameters`](crate::solver::StepParameters), so a scheme value can be
//! shared by any number of engines.

pub mod euler_maruyama;

pub use euler_maruyama::{EulerMaruyama, PARTICLE_CHUNK};
