//! Error taxonomy for the simulation core
//!
//! Three families of failure exist:
//!
//! - [`ConfigurationError`]: construction parameters violate an invariant.
//!   Reported before any simulation work begins and never retried.
//! - [`DataFormatError`]: an input file (velocity field, reference curve)
//!   is unreadable or structurally invalid.
//! - [`NumericalWarning`]: non-fatal diagnostics (poor convergence order,
//!   empty cells). These are logged and returned inside reports, never as
//!   `Err`.
//!
//! [`SimulationError`] wraps the first two and adds the runtime failures of
//! the engine and the validation sweep.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, SimulationError>;

/// Axis identifier used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    /// Both axes, in storage order.
    pub const ALL: [Axis; 2] = [Axis::X, Axis::Y];

    /// Index of the axis in `[x, y]` arrays.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "x"),
            Axis::Y => write!(f, "y"),
        }
    }
}

/// A construction parameter violates one of the documented invariants.
///
/// Each variant names exactly one violated constraint so the caller (usually
/// the front end) can point the user at the offending field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("time_max must be finite and > 0 (got {0})")]
    NonPositiveTimeMax(f64),

    #[error("dt must be finite and > 0 (got {0})")]
    NonPositiveTimeStep(f64),

    #[error("dt ({dt}) must not exceed time_max ({time_max})")]
    TimeStepExceedsTimeMax { dt: f64, time_max: f64 },

    #[error("time_max / dt is too large for a step count (time_max {time_max}, dt {dt})")]
    TooManySteps { time_max: f64, dt: f64 },

    #[error("domain max must be > min on the {axis} axis (min {min}, max {max})")]
    EmptyDomain { axis: Axis, min: f64, max: f64 },

    #[error("particle_count must be > 0")]
    NoParticles,

    #[error("cell_size must be > 0 on the {0} axis")]
    EmptyCellGrid(Axis),

    #[error("diffusivity must be finite and >= 0 (got {0})")]
    NegativeDiffusivity(f64),

    #[error("use_velocity is set but no velocity_field_path was given")]
    MissingVelocityField,

    #[error("{region} label must be 0 or 1 (got {value})")]
    InvalidLabel { region: &'static str, value: i64 },

    #[error("circle radius must be finite and >= 0 (got {0})")]
    NegativeRadius(f64),

    #[error("rectangle min must be <= max on the {axis} axis (min {min}, max {max})")]
    InvertedRectangle { axis: Axis, min: f64, max: f64 },

    #[error("{0} must be finite")]
    NonFinite(&'static str),

    #[error("{what} must not be empty")]
    EmptySweep { what: &'static str },

    #[error("{0}")]
    Invalid(String),
}

/// An input data file could not be turned into numeric samples.
#[derive(Debug, Error)]
pub enum DataFormatError {
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: no numeric rows found")]
    Empty { path: PathBuf },

    #[error("{path}:{line}: expected at least {required} numeric columns, found {found}")]
    TooFewColumns {
        path: PathBuf,
        line: usize,
        required: usize,
        found: usize,
    },

    #[error("{path}:{line}: column {column} is not a number ({token:?})")]
    InvalidNumber {
        path: PathBuf,
        line: usize,
        column: usize,
        token: String,
    },

    #[error("{path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// Failure of a simulation run or of the validation harness.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("invalid data file: {0}")]
    DataFormat(#[from] DataFormatError),

    /// A particle coordinate became NaN or infinite during an update.
    #[error("non-finite position for particle {particle} at step {step}")]
    NonFinitePosition { step: usize, particle: usize },

    /// `step()` was called after the clock ran out.
    #[error("simulation already completed all {steps} steps")]
    Exhausted { steps: usize },

    /// A validation sweep was cancelled between two runs.
    #[error("sweep aborted after {completed} of {total} runs")]
    Aborted { completed: usize, total: usize },

    #[error("curve fit failed: {0}")]
    Fit(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Non-fatal numerical diagnostic.
///
/// Warnings are emitted through `log::warn!` at the point they are detected
/// and collected in the report returned to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericalWarning {
    /// Fitted convergence exponent deviates from the Monte-Carlo expectation.
    ConvergenceOrder { dt: f64, beta: f64, expected: f64 },

    /// Some cells of a concentration grid received no particle.
    EmptyCells { particle_count: usize, dt: f64, empty: usize, total: usize },
}

impl fmt::Display for NumericalWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericalWarning::ConvergenceOrder { dt, beta, expected } => write!(
                f,
                "convergence exponent {beta:.3} at dt={dt} is far from the expected {expected}"
            ),
            NumericalWarning::EmptyCells { particle_count, dt, empty, total } => write!(
                f,
                "{empty} of {total} cells empty (particle_count={particle_count}, dt={dt})"
            ),
        }
    }
}

impl NumericalWarning {
    /// Log the warning and hand it back, for `warnings.push(w.emit())`.
    pub fn emit(self) -> Self {
        log::warn!("{self}");
        self
    }
}
