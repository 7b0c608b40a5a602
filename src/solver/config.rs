//! Simulation configuration
//!
//! Two representations exist:
//!
//! - [`SimulationParameters`]: the flat record exchanged with front ends and
//!   stored as JSON. Every field is a plain number, array, flag or path, and
//!   nothing is validated.
//! - [`SimulationConfig`]: the validated, immutable configuration consumed by
//!   [`SimulationEngine`](crate::solver::SimulationEngine). Built through
//!   [`SimulationConfigBuilder`] or converted from the flat record with
//!   `TryFrom`.
//!
//! # Example
//!
//! ```rust
//! use lagrangian_rs::physics::Region;
//! use lagrangian_rs::solver::SimulationConfig;
//!
//! let config = SimulationConfig::builder()
//!     .time_max(0.2)
//!     .dt(0.01)
//!     .diffusivity(0.1)
//!     .particle_count(10_000)
//!     .cells(64, 1)
//!     .region(Region::Rectangle { min: [-1.0, -1.0], max: [0.0, 1.0], value: 1 })
//!     .seed(42)
//!     .build()?;
//!
//! assert_eq!(config.clock().steps(), 21);
//! # Ok::<(), lagrangian_rs::error::ConfigurationError>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Axis, ConfigurationError, SimulationError};
use crate::physics::{CellGrid, DomainSpec, Label, Region, VelocityField};

// =================================================================================================
// Clock
// =================================================================================================

/// Time step and horizon of a run.
///
/// `steps = floor(time_max / dt) + 1`: the engine performs that many updates,
/// so the last frame sits at `steps * dt`, one step past `time_max` when the
/// ratio is an integer. The ratio is taken literally, so representation
/// error counts: `0.3 / 0.1` evaluates just below 3 and gives 3 steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationClock {
    time_max: f64,
    dt: f64,
}

impl SimulationClock {
    pub fn new(time_max: f64, dt: f64) -> Result<Self, ConfigurationError> {
        if !time_max.is_finite() || time_max <= 0.0 {
            return Err(ConfigurationError::NonPositiveTimeMax(time_max));
        }
        if !dt.is_finite() || dt <= 0.0 {
            return Err(ConfigurationError::NonPositiveTimeStep(dt));
        }
        if dt > time_max {
            return Err(ConfigurationError::TimeStepExceedsTimeMax { dt, time_max });
        }
        // `as usize` saturates, so the count must be checked before it is taken.
        if (time_max / dt).floor() >= usize::MAX as f64 {
            return Err(ConfigurationError::TooManySteps { time_max, dt });
        }
        Ok(Self { time_max, dt })
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn time_max(&self) -> f64 {
        self.time_max
    }

    /// Number of `step()` calls in a complete run.
    pub fn steps(&self) -> usize {
        (self.time_max / self.dt).floor() as usize + 1
    }

    /// Simulated time after `step` updates.
    pub fn time_at(&self, step: usize) -> f64 {
        step as f64 * self.dt
    }
}

// =================================================================================================
// Velocity source
// =================================================================================================

/// Where the engine gets particle velocities from.
#[derive(Debug, Clone, Default)]
pub enum VelocitySource {
    /// Zero velocity everywhere: pure diffusion.
    #[default]
    None,
    /// Load samples from a file when the engine is built.
    File(PathBuf),
    /// Already-loaded samples, shared between engines.
    Field(Arc<VelocityField>),
}

impl VelocitySource {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, VelocitySource::None)
    }

    /// Resolve to a loaded field, reading the file if needed.
    pub fn resolve(&self) -> Result<Option<Arc<VelocityField>>, SimulationError> {
        match self {
            VelocitySource::None => Ok(None),
            VelocitySource::File(path) => Ok(Some(Arc::new(VelocityField::load(path)?))),
            VelocitySource::Field(field) => Ok(Some(Arc::clone(field))),
        }
    }
}

// =================================================================================================
// Validated configuration
// =================================================================================================

/// Validated, immutable parameters of one simulation run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    clock: SimulationClock,
    domain: DomainSpec,
    grid: CellGrid,
    particle_count: usize,
    diffusivity: f64,
    velocity: VelocitySource,
    regions: Vec<Region>,
    seed: Option<u64>,
}

impl SimulationConfig {
    pub fn builder() -> SimulationConfigBuilder {
        SimulationConfigBuilder::default()
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn domain(&self) -> &DomainSpec {
        &self.domain
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    pub fn particle_count(&self) -> usize {
        self.particle_count
    }

    pub fn diffusivity(&self) -> f64 {
        self.diffusivity
    }

    pub fn velocity(&self) -> &VelocitySource {
        &self.velocity
    }

    /// Regions painted in order at initialization.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Copy with a different time step, revalidated against `time_max`.
    pub fn with_dt(&self, dt: f64) -> Result<Self, ConfigurationError> {
        Ok(Self {
            clock: SimulationClock::new(self.clock.time_max, dt)?,
            ..self.clone()
        })
    }

    /// Copy with a different particle count.
    pub fn with_particle_count(&self, particle_count: usize) -> Result<Self, ConfigurationError> {
        if particle_count == 0 {
            return Err(ConfigurationError::NoParticles);
        }
        Ok(Self {
            particle_count,
            ..self.clone()
        })
    }

    /// Copy with a different seed.
    pub fn with_seed(&self, seed: Option<u64>) -> Self {
        Self { seed, ..self.clone() }
    }

    /// Copy sharing an already-loaded velocity field.
    pub fn with_velocity(&self, velocity: VelocitySource) -> Self {
        Self {
            velocity,
            ..self.clone()
        }
    }
}

/// Builder for [`SimulationConfig`].
///
/// Defaults reproduce the one-dimensional diffusion setup: `[-1, 1]²`,
/// `time_max = 0.2`, `dt = 0.01`, `D = 0.1`, 65 536 particles on a `64 × 1`
/// grid, no velocity field, no regions.
#[derive(Debug, Clone)]
pub struct SimulationConfigBuilder {
    time_max: f64,
    dt: f64,
    min: [f64; 2],
    max: [f64; 2],
    cells: [usize; 2],
    particle_count: usize,
    diffusivity: f64,
    velocity: VelocitySource,
    regions: Vec<Region>,
    seed: Option<u64>,
}

impl Default for SimulationConfigBuilder {
    fn default() -> Self {
        Self {
            time_max: 0.2,
            dt: 0.01,
            min: [-1.0, -1.0],
            max: [1.0, 1.0],
            cells: [64, 1],
            particle_count: 65_536,
            diffusivity: 0.1,
            velocity: VelocitySource::None,
            regions: Vec::new(),
            seed: None,
        }
    }
}

impl SimulationConfigBuilder {
    pub fn time_max(mut self, time_max: f64) -> Self {
        self.time_max = time_max;
        self
    }

    pub fn dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    pub fn domain(mut self, min: [f64; 2], max: [f64; 2]) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn cells(mut self, nx: usize, ny: usize) -> Self {
        self.cells = [nx, ny];
        self
    }

    pub fn particle_count(mut self, particle_count: usize) -> Self {
        self.particle_count = particle_count;
        self
    }

    pub fn diffusivity(mut self, diffusivity: f64) -> Self {
        self.diffusivity = diffusivity;
        self
    }

    pub fn velocity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.velocity = VelocitySource::File(path.into());
        self
    }

    pub fn velocity_field(mut self, field: Arc<VelocityField>) -> Self {
        self.velocity = VelocitySource::Field(field);
        self
    }

    /// Append a painting region; later regions overwrite earlier ones.
    pub fn region(mut self, region: Region) -> Self {
        self.regions.push(region);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate every parameter and freeze the configuration.
    ///
    /// Checks, in order: clock, domain, particle count, cell grid,
    /// diffusivity, regions.
    pub fn build(self) -> Result<SimulationConfig, ConfigurationError> {
        let clock = SimulationClock::new(self.time_max, self.dt)?;
        let domain = DomainSpec::new(self.min, self.max)?;
        if self.particle_count == 0 {
            return Err(ConfigurationError::NoParticles);
        }
        let grid = CellGrid::new(self.cells[0], self.cells[1])?;
        if !self.diffusivity.is_finite() || self.diffusivity < 0.0 {
            return Err(ConfigurationError::NegativeDiffusivity(self.diffusivity));
        }
        for region in &self.regions {
            region.validate()?;
        }

        Ok(SimulationConfig {
            clock,
            domain,
            grid,
            particle_count: self.particle_count,
            diffusivity: self.diffusivity,
            velocity: self.velocity,
            regions: self.regions,
            seed: self.seed,
        })
    }
}

// =================================================================================================
// Flat parameter record
// =================================================================================================

/// Flat, unvalidated simulation parameters as exchanged with a front end.
///
/// Paint values are carried as `i64` so that out-of-range labels survive
/// deserialization and are reported by the conversion instead of by serde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    pub time_max: f64,
    pub dt: f64,
    pub diffusivity: f64,
    pub particle_count: usize,
    pub min: [f64; 2],
    pub max: [f64; 2],
    pub cell_size: [usize; 2],

    #[serde(default)]
    pub use_velocity: bool,
    #[serde(default)]
    pub velocity_field_path: Option<PathBuf>,

    #[serde(default)]
    pub use_circle: bool,
    #[serde(default)]
    pub circle_center: [f64; 2],
    #[serde(default)]
    pub circle_radius: f64,
    #[serde(default)]
    pub circle_value: i64,

    #[serde(default)]
    pub use_rectangle: bool,
    #[serde(default)]
    pub rectangle_min: [f64; 2],
    #[serde(default)]
    pub rectangle_max: [f64; 2],
    #[serde(default)]
    pub rectangle_value: i64,

    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            time_max: 0.2,
            dt: 0.01,
            diffusivity: 0.1,
            particle_count: 65_536,
            min: [-1.0, -1.0],
            max: [1.0, 1.0],
            cell_size: [64, 1],
            use_velocity: false,
            velocity_field_path: None,
            use_circle: false,
            circle_center: [0.0, 0.0],
            circle_radius: 0.0,
            circle_value: 1,
            use_rectangle: false,
            rectangle_min: [-1.0, -1.0],
            rectangle_max: [0.0, 1.0],
            rectangle_value: 1,
            seed: None,
        }
    }
}

impl SimulationParameters {
    /// Load from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, SimulationError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Save as pretty-printed JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), SimulationError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }
}

fn checked_label(region: &'static str, value: i64) -> Result<Label, ConfigurationError> {
    match value {
        0 | 1 => Ok(value as Label),
        _ => Err(ConfigurationError::InvalidLabel { region, value }),
    }
}

impl TryFrom<&SimulationParameters> for SimulationConfig {
    type Error = ConfigurationError;

    fn try_from(params: &SimulationParameters) -> Result<Self, Self::Error> {
        let mut builder = SimulationConfig::builder()
            .time_max(params.time_max)
            .dt(params.dt)
            .diffusivity(params.diffusivity)
            .particle_count(params.particle_count)
            .domain(params.min, params.max)
            .cells(params.cell_size[0], params.cell_size[1]);

        if params.use_velocity {
            match &params.velocity_field_path {
                Some(path) if !path.as_os_str().is_empty() => builder = builder.velocity_file(path.clone()),
                _ => return Err(ConfigurationError::MissingVelocityField),
            }
        }

        if params.use_circle {
            builder = builder.region(Region::Circle {
                center: params.circle_center,
                radius: params.circle_radius,
                value: checked_label("circle", params.circle_value)?,
            });
        }

        if params.use_rectangle {
            for axis in Axis::ALL {
                let k = axis.index();
                if params.rectangle_min[k] > params.rectangle_max[k] {
                    return Err(ConfigurationError::InvertedRectangle {
                        axis,
                        min: params.rectangle_min[k],
                        max: params.rectangle_max[k],
                    });
                }
            }
            builder = builder.region(Region::Rectangle {
                min: params.rectangle_min,
                max: params.rectangle_max,
                value: checked_label("rectangle", params.rectangle_value)?,
            });
        }

        if let Some(seed) = params.seed {
            builder = builder.seed(seed);
        }

        builder.build()
    }
}

impl TryFrom<SimulationParameters> for SimulationConfig {
    type Error = ConfigurationError;

    fn try_from(params: SimulationParameters) -> Result<Self, Self::Error> {
        SimulationConfig::try_from(&params)
    }
}
