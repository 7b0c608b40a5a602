//! What moves: domain, particles and the velocity field
//!
//! This module holds the state of a simulation, independent of how it is
//! advanced in time:
//!
//! - **Domain** ([`DomainSpec`]): the rectangle particles live in.
//! - **Cell grid** ([`CellGrid`]): resolution of the concentration output.
//! - **Particles** ([`ParticleSet`]): positions and substance labels, painted
//!   once at initialization through [`Region`]s.
//! - **Velocity field** ([`VelocityField`]): scattered samples queried by
//!   nearest neighbour through a static [`KdTree`].
//!
//! The numerical scheme that moves particles lives in [`crate::solver`].
//!
//! # Example
//!
//! ```rust
//! use lagrangian_rs::physics::{DomainSpec, ParticleSet};
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! let domain = DomainSpec::unit_square();
//! let mut rng = StdRng::seed_from_u64(1);
//! let mut particles = ParticleSet::generate_random(1_000, &domain, &mut rng);
//! particles.paint_circle([0.4, 0.4], 0.1, 1);
//!
//! assert!(particles.positions().iter().all(|p| domain.contains(p)));
//! ```

pub mod domain;
pub mod kdtree;
pub mod particles;
pub mod velocity;

pub use domain::{CellGrid, DomainSpec};
pub use kdtree::KdTree;
pub use particles::{Label, ParticleSet, Region};
pub use velocity::VelocityField;
