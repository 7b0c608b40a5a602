//! lagrangian-rs: Lagrangian Particle Simulation of Advection–Diffusion
//!
//! Simulates a labeled particle population drifting through a 2D rectangle
//! under a sampled velocity field plus Brownian diffusion, and reports the
//! resulting concentration on a regular cell grid. A validation harness
//! measures how fast the Monte-Carlo error shrinks with the particle count.
//!
//! # Architecture
//!
//! lagrangian-rs follows two principles:
//!
//! 1. **Separation of state and numerics**
//!    - [`physics`] holds what moves (domain, particles, velocity field)
//!    - [`solver`] decides how it moves (scheme, boundary, engine)
//!
//! 2. **Validated, immutable configuration**
//!    - Every parameter is checked once, when the configuration is built
//!    - Engines never share mutable state, so runs parallelize freely
//!
//! # Quick Start
//!
//! ```rust
//! use lagrangian_rs::prelude::*;
//!
//! // 1. Configure: left half of the domain holds substance 1
//! let config = SimulationConfig::builder()
//!     .time_max(0.1)
//!     .dt(0.01)
//!     .particle_count(10_000)
//!     .cells(32, 1)
//!     .diffusivity(0.1)
//!     .region(Region::Rectangle { min: [-1.0, -1.0], max: [0.0, 1.0], value: 1 })
//!     .seed(42)
//!     .build()?;
//!
//! // 2. Run
//! let mut engine = SimulationEngine::new(config)?;
//! engine.run_to_completion()?;
//!
//! // 3. Read the concentration profile
//! let grid = engine.concentrations();
//! let profile = grid.profile();
//! assert_eq!(profile.len(), 32);
//! assert!(profile[0] > profile[31]);
//! # Ok::<(), lagrangian_rs::error::SimulationError>(())
//! ```
//!
//! # Modules
//!
//! - [`physics`]: domain, particles, velocity field
//! - [`solver`]: configuration, time stepping, engine
//! - [`output`]: concentration grids, threshold tracking, CSV export
//! - [`validation`]: reference curves, RMSE sweeps, power-law fits
//! - [`io`]: numeric column files
//! - [`error`]: error types

pub mod error;
pub mod io;
pub mod output;
pub mod physics;
pub mod solver;
pub mod validation;

pub mod prelude {
    //! Convenient imports for common usage
    //!
    //! ```rust
    //! use lagrangian_rs::prelude::*;
    //! ```
    pub use crate::error::{ConfigurationError, DataFormatError, NumericalWarning, SimulationError};
    pub use crate::output::{ConcentrationBinner, ConcentrationGrid, CsvExporter, Exporter, ThresholdTracker};
    pub use crate::physics::{CellGrid, DomainSpec, ParticleSet, Region, VelocityField};
    pub use crate::solver::{
        EngineState, EulerMaruyama, Frame, ReflectiveBoundary, SimulationConfig, SimulationEngine,
        SimulationParameters,
    };
    pub use crate::validation::{ConvergenceReport, ReferenceComparison, ReferenceSolution, ValidationHarness};
}
