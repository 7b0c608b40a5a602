//! Simulation engine
//!
//! # Lifecycle
//!
//! ```text
//! Constructed ──step()──▶ Stepping ──step() × (steps − 1)──▶ Terminal
//!      │                     │
//!      └──────── non-finite position ──────▶ Failed
//! ```
//!
//! One step performs, in order:
//!
//! 1. velocity lookup (nearest sample, or zero without a field);
//! 2. the scheme update `p += v·dt + sqrt(2·D·dt)·ξ`;
//! 3. a NaN/Inf check on every position;
//! 4. the boundary policy.
//!
//! After `steps = floor(time_max / dt) + 1` calls the engine is terminal and
//! further `step()` calls return [`SimulationError::Exhausted`].
//!
//! # Reproducibility
//!
//! With a seed, the engine's master generator draws the initial positions and
//! then one 64-bit seed per step. The scheme derives all increments from that
//! step seed, so a seeded run is identical whatever the thread count.

use std::ops::ControlFlow;
use std::sync::Arc;

use nalgebra::Vector2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Result, SimulationError};
use crate::output::{ConcentrationBinner, ConcentrationGrid};
use crate::physics::{ParticleSet, VelocityField};
use crate::solver::boundary::ReflectiveBoundary;
use crate::solver::config::SimulationConfig;
use crate::solver::methods::EulerMaruyama;
use crate::solver::traits::{BoundaryPolicy, Scheme, StepParameters};
use crate::solver::validate_positions;

/// Where an engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Built and painted, no step taken yet.
    Constructed,
    /// At least one step taken, more remain.
    Stepping,
    /// All steps taken.
    Terminal,
    /// A step produced a non-finite position; the particle state is invalid.
    Failed { step: usize, particle: usize },
}

/// Snapshot handed to observers of [`SimulationEngine::run_observed`].
#[derive(Debug, Clone)]
pub struct Frame {
    /// Number of steps taken so far (0 for the initial frame).
    pub step: usize,
    /// Elapsed simulated time, `step · dt`.
    pub time: f64,
    /// Concentration grid at this step.
    pub concentrations: ConcentrationGrid,
}

/// Owns the particles of one run and advances them step by step.
#[derive(Debug)]
pub struct SimulationEngine {
    config: SimulationConfig,
    particles: ParticleSet,
    velocity: Option<Arc<VelocityField>>,
    velocity_buffer: Vec<Vector2<f64>>,
    scheme: Box<dyn Scheme>,
    boundary: Box<dyn BoundaryPolicy>,
    binner: ConcentrationBinner,
    rng: StdRng,
    steps: usize,
    step_count: usize,
    state: EngineState,
}

impl SimulationEngine {
    /// Build an engine: load the velocity field if requested, draw uniform
    /// particle positions and paint the configured regions.
    ///
    /// # Errors
    ///
    /// [`SimulationError::DataFormat`] when the velocity file cannot be read.
    /// Parameter validation already happened when the configuration was
    /// built.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let velocity = config.velocity().resolve()?;

        let mut rng = match config.seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut particles = ParticleSet::generate_random(config.particle_count(), config.domain(), &mut rng);
        for region in config.regions() {
            let painted = particles.paint(region);
            log::debug!("painted {painted} particles with {region:?}");
        }

        let velocity_buffer = match velocity {
            Some(_) => vec![Vector2::zeros(); particles.len()],
            None => Vec::new(),
        };

        let steps = config.clock().steps();
        let binner = ConcentrationBinner::new(*config.domain(), *config.grid());

        log::info!(
            "engine ready: {} particles, dt={}, time_max={}, {} steps, D={}, velocity field: {}",
            particles.len(),
            config.clock().dt(),
            config.clock().time_max(),
            steps,
            config.diffusivity(),
            velocity.as_ref().map_or("none".to_string(), |f| format!("{} samples", f.len())),
        );

        Ok(Self {
            config,
            particles,
            velocity,
            velocity_buffer,
            scheme: Box::new(EulerMaruyama),
            boundary: Box::new(ReflectiveBoundary),
            binner,
            rng,
            steps,
            step_count: 0,
            state: EngineState::Constructed,
        })
    }

    /// Replace the time-stepping scheme. Only meaningful before the first step.
    pub fn with_scheme(mut self, scheme: impl Scheme + 'static) -> Self {
        self.scheme = Box::new(scheme);
        self
    }

    /// Replace the boundary policy. Only meaningful before the first step.
    pub fn with_boundary(mut self, boundary: impl BoundaryPolicy + 'static) -> Self {
        self.boundary = Box::new(boundary);
        self
    }

    /// Replace the particle set, e.g. with hand-placed particles in tests.
    ///
    /// Only allowed before the first step.
    pub fn with_particles(mut self, particles: ParticleSet) -> Result<Self> {
        if self.state != EngineState::Constructed {
            return Err(SimulationError::Configuration(crate::error::ConfigurationError::Invalid(
                "particles can only be replaced before the first step".to_string(),
            )));
        }
        if self.velocity.is_some() {
            self.velocity_buffer = vec![Vector2::zeros(); particles.len()];
        }
        self.particles = particles;
        Ok(self)
    }

    // ====== Introspection ======

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    pub fn velocity_field(&self) -> Option<&VelocityField> {
        self.velocity.as_deref()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, EngineState::Terminal | EngineState::Failed { .. })
    }

    /// Steps taken so far.
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Total steps in a complete run.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Elapsed simulated time, `step_count · dt`.
    pub fn elapsed_time(&self) -> f64 {
        self.config.clock().time_at(self.step_count)
    }

    pub fn scheme_name(&self) -> &str {
        self.scheme.name()
    }

    /// Bin the current particle state. Does not modify the engine.
    pub fn concentrations(&self) -> ConcentrationGrid {
        self.binner.bin(&self.particles)
    }

    fn frame(&self) -> Frame {
        Frame {
            step: self.step_count,
            time: self.elapsed_time(),
            concentrations: self.concentrations(),
        }
    }

    // ====== Stepping ======

    /// Advance all particles by one time step.
    ///
    /// # Errors
    ///
    /// - [`SimulationError::Exhausted`] when the run is already complete
    /// - [`SimulationError::NonFinitePosition`] when the update produced a NaN
    ///   or infinite coordinate; the engine then moves to `Failed`
    pub fn step(&mut self) -> Result<()> {
        match self.state {
            EngineState::Terminal => return Err(SimulationError::Exhausted { steps: self.steps }),
            EngineState::Failed { step, particle } => {
                return Err(SimulationError::NonFinitePosition { step, particle });
            }
            EngineState::Constructed | EngineState::Stepping => {}
        }

        let step = self.step_count + 1;

        let velocities = match &self.velocity {
            Some(field) => {
                field.velocity_into(self.particles.positions(), &mut self.velocity_buffer);
                Some(self.velocity_buffer.as_slice())
            }
            None => None,
        };

        let params = StepParameters {
            dt: self.config.clock().dt(),
            diffusivity: self.config.diffusivity(),
            seed: self.rng.random(),
        };

        let positions = self.particles.positions_mut();
        self.scheme.advance(positions, velocities, &params);

        if let Err(err) = validate_positions(positions, step) {
            if let SimulationError::NonFinitePosition { step, particle } = err {
                log::warn!("non-finite position for particle {particle} at step {step}");
                self.state = EngineState::Failed { step, particle };
            }
            return Err(err);
        }

        self.boundary.apply(positions, self.config.domain());

        self.step_count = step;
        self.state = if step >= self.steps {
            EngineState::Terminal
        } else {
            EngineState::Stepping
        };

        log::debug!("step {}/{} (t={:.6})", step, self.steps, self.elapsed_time());
        Ok(())
    }

    /// Step until terminal. A no-op on an already terminal engine.
    ///
    /// A failed engine keeps reporting its [`SimulationError::NonFinitePosition`].
    pub fn run_to_completion(&mut self) -> Result<()> {
        if self.state == EngineState::Terminal {
            return Ok(());
        }
        while self.state != EngineState::Terminal {
            self.step()?;
        }
        log::info!(
            "run complete: {} steps, t={:.6}",
            self.step_count,
            self.elapsed_time()
        );
        Ok(())
    }

    /// Run to completion, handing a [`Frame`] to `observer` at the start and
    /// after every step.
    ///
    /// The initial frame is only emitted when no step has been taken yet. The
    /// observer can stop the run early by returning `ControlFlow::Break(())`;
    /// the engine then stays in its current state and can be resumed.
    ///
    /// Returns the number of frames emitted.
    pub fn run_observed<F>(&mut self, mut observer: F) -> Result<usize>
    where
        F: FnMut(&Frame) -> ControlFlow<()>,
    {
        let mut emitted = 0;

        if self.state == EngineState::Constructed {
            emitted += 1;
            if observer(&self.frame()).is_break() {
                return Ok(emitted);
            }
        }

        while self.state != EngineState::Terminal {
            self.step()?;
            emitted += 1;
            if observer(&self.frame()).is_break() {
                log::info!("run stopped by observer at step {}", self.step_count);
                break;
            }
        }
        Ok(emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigurationError;
    use crate::physics::{DomainSpec, Region};

    fn config(seed: u64) -> SimulationConfig {
        SimulationConfig::builder()
            .time_max(0.1)
            .dt(0.02)
            .particle_count(500)
            .cells(8, 8)
            .diffusivity(0.05)
            .seed(seed)
            .build()
            .unwrap()
    }

    /// Scheme that pushes the first particle to infinity.
    #[derive(Debug)]
    struct Exploding;

    impl Scheme for Exploding {
        fn advance(&self, positions: &mut [Vector2<f64>], _: Option<&[Vector2<f64>]>, _: &StepParameters) {
            positions[0].x = f64::INFINITY;
        }

        fn name(&self) -> &str {
            "Exploding"
        }
    }

    #[test]
    fn test_lifecycle() {
        let mut engine = SimulationEngine::new(config(1)).unwrap();
        assert_eq!(engine.state(), EngineState::Constructed);
        assert_eq!(engine.steps(), 6);

        engine.step().unwrap();
        assert_eq!(engine.state(), EngineState::Stepping);
        assert_eq!(engine.step_count(), 1);

        engine.run_to_completion().unwrap();
        assert_eq!(engine.state(), EngineState::Terminal);
        assert_eq!(engine.step_count(), 6);
        assert!((engine.elapsed_time() - 0.12).abs() < 1e-12);
    }

    #[test]
    fn test_step_after_terminal_is_rejected() {
        let mut engine = SimulationEngine::new(config(2)).unwrap();
        engine.run_to_completion().unwrap();
        let err = engine.step().unwrap_err();
        assert!(matches!(err, SimulationError::Exhausted { steps: 6 }));
        assert_eq!(engine.step_count(), 6);
        // Idempotent
        engine.run_to_completion().unwrap();
    }

    #[test]
    fn test_same_seed_same_run() {
        let mut a = SimulationEngine::new(config(42)).unwrap();
        let mut b = SimulationEngine::new(config(42)).unwrap();
        a.run_to_completion().unwrap();
        b.run_to_completion().unwrap();
        assert_eq!(a.particles(), b.particles());

        let mut c = SimulationEngine::new(config(43)).unwrap();
        c.run_to_completion().unwrap();
        assert_ne!(a.particles(), c.particles());
    }

    #[test]
    fn test_positions_stay_in_domain() {
        let cfg = SimulationConfig::builder()
            .time_max(1.0)
            .dt(0.1)
            .particle_count(2_000)
            .diffusivity(1.0)
            .domain([0.0, 0.0], [0.5, 0.25])
            .seed(3)
            .build()
            .unwrap();
        let domain = *cfg.domain();
        let mut engine = SimulationEngine::new(cfg).unwrap();
        while !engine.is_terminal() {
            engine.step().unwrap();
            assert!(engine.particles().positions().iter().all(|p| domain.contains(p)));
        }
    }

    #[test]
    fn test_non_finite_position_fails_engine() {
        let mut engine = SimulationEngine::new(config(4)).unwrap().with_scheme(Exploding);
        let err = engine.step().unwrap_err();
        assert!(matches!(err, SimulationError::NonFinitePosition { step: 1, particle: 0 }));
        assert_eq!(engine.state(), EngineState::Failed { step: 1, particle: 0 });
        assert!(engine.is_terminal());
        assert!(engine.step().is_err());
        assert!(matches!(
            engine.run_to_completion(),
            Err(SimulationError::NonFinitePosition { step: 1, particle: 0 })
        ));
    }

    #[test]
    fn test_observed_run_reports_failure() {
        let mut engine = SimulationEngine::new(config(4)).unwrap().with_scheme(Exploding);
        let mut frames = 0;
        let result = engine.run_observed(|_| {
            frames += 1;
            ControlFlow::Continue(())
        });
        assert!(matches!(result, Err(SimulationError::NonFinitePosition { step: 1, .. })));
        assert_eq!(frames, 1);

        // A second call must not report success either.
        assert!(engine.run_observed(|_| ControlFlow::Continue(())).is_err());
    }

    #[test]
    fn test_painting_applied_at_construction() {
        let cfg = SimulationConfig::builder()
            .particle_count(4_000)
            .region(Region::Rectangle { min: [-1.0, -1.0], max: [0.0, 1.0], value: 1 })
            .seed(5)
            .build()
            .unwrap();
        let engine = SimulationEngine::new(cfg).unwrap();
        let particles = engine.particles();
        for (p, &label) in particles.positions().iter().zip(particles.labels()) {
            assert_eq!(label == 1, p.x <= 0.0);
        }
    }

    #[test]
    fn test_missing_velocity_file_is_data_error() {
        let cfg = SimulationConfig::builder()
            .velocity_file("/definitely/not/here.dat")
            .particle_count(10)
            .build()
            .unwrap();
        let err = SimulationEngine::new(cfg).unwrap_err();
        assert!(matches!(err, SimulationError::DataFormat(_)));
    }

    #[test]
    fn test_run_observed_emits_initial_and_every_step() {
        let mut engine = SimulationEngine::new(config(6)).unwrap();
        let mut steps = Vec::new();
        let emitted = engine
            .run_observed(|frame| {
                steps.push(frame.step);
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(emitted, 7);
        assert_eq!(steps, (0..=6).collect::<Vec<_>>());
        assert!(engine.is_terminal());
    }

    #[test]
    fn test_run_observed_can_stop_and_resume() {
        let mut engine = SimulationEngine::new(config(7)).unwrap();
        let emitted = engine
            .run_observed(|frame| {
                if frame.step == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();
        assert_eq!(emitted, 3);
        assert_eq!(engine.step_count(), 2);
        assert_eq!(engine.state(), EngineState::Stepping);

        let rest = engine.run_observed(|_| ControlFlow::Continue(())).unwrap();
        assert_eq!(rest, 4);
        assert!(engine.is_terminal());
    }

    #[test]
    fn test_frame_time_matches_step() {
        let mut engine = SimulationEngine::new(config(8)).unwrap();
        engine
            .run_observed(|frame| {
                assert!((frame.time - frame.step as f64 * 0.02).abs() < 1e-12);
                assert_eq!(frame.concentrations.shape(), (8, 8));
                ControlFlow::Continue(())
            })
            .unwrap();
    }

    #[test]
    fn test_with_particles_only_before_first_step() {
        let domain = DomainSpec::unit_square();
        let particles = ParticleSet::from_positions(vec![domain.max()]);
        let mut engine = SimulationEngine::new(config(9)).unwrap();
        engine.step().unwrap();
        let err = engine.with_particles(particles).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Configuration(ConfigurationError::Invalid(_))
        ));
    }
}
