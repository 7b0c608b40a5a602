//! Convergence study driver
//!
//! [`ValidationHarness`] runs independent engines over a matrix of
//! `(dt, particle_count)` pairs, compares each final grid against a
//! [`ReferenceSolution`], and fits the RMSE curves with a power law.
//!
//! Every pair builds its own engine from the base configuration, so runs
//! share nothing mutable. With the `parallel` feature the pairs run on the
//! rayon pool. A sweep can be cancelled from another thread through an
//! [`AbortHandle`]; runs already started finish, the rest are skipped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ndarray::Array2;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{Axis, ConfigurationError, NumericalWarning, Result, SimulationError};
use crate::output::ConcentrationGrid;
use crate::solver::methods::euler_maruyama::chunk_seed;
use crate::solver::{SimulationConfig, SimulationEngine, VelocitySource};
use crate::validation::fitting::{self, DEFAULT_SMOOTHING_WINDOW, PowerLawFit};
use crate::validation::reference::ReferenceSolution;

/// Exponent expected for Monte-Carlo sampling error.
pub const EXPECTED_CONVERGENCE_ORDER: f64 = -0.5;

/// Deviation from [`EXPECTED_CONVERGENCE_ORDER`] that triggers a warning.
pub const CONVERGENCE_ORDER_TOLERANCE: f64 = 0.25;

// =================================================================================================
// Cancellation
// =================================================================================================

/// Shared cancellation flag for a running sweep.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    /// Ask the sweep to stop before its next run.
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag so the harness can run again.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// =================================================================================================
// Reports
// =================================================================================================

/// RMSE table with one power-law fit per time step.
///
/// Tables are indexed `[[dt_index, count_index]]`.
#[derive(Debug, Clone)]
pub struct ConvergenceReport {
    dts: Vec<f64>,
    particle_counts: Vec<usize>,
    rmse: Array2<f64>,
    smoothed: Array2<f64>,
    fits: Vec<PowerLawFit>,
    fitted: Array2<f64>,
    warnings: Vec<NumericalWarning>,
}

impl ConvergenceReport {
    pub fn dts(&self) -> &[f64] {
        &self.dts
    }

    pub fn particle_counts(&self) -> &[usize] {
        &self.particle_counts
    }

    /// Raw RMSE values.
    pub fn rmse(&self) -> &Array2<f64> {
        &self.rmse
    }

    /// RMSE after the moving average, as passed to the fit.
    pub fn smoothed(&self) -> &Array2<f64> {
        &self.smoothed
    }

    /// One fit per dt, in `dts()` order.
    pub fn fits(&self) -> &[PowerLawFit] {
        &self.fits
    }

    /// `a · N^β` evaluated at every particle count.
    pub fn fitted(&self) -> &Array2<f64> {
        &self.fitted
    }

    pub fn warnings(&self) -> &[NumericalWarning] {
        &self.warnings
    }
}

/// Simulated 1D profiles next to the reference curve, all at one dt.
#[derive(Debug, Clone)]
pub struct ReferenceComparison {
    dt: f64,
    coordinates: Vec<f64>,
    reference: Vec<f64>,
    curves: Vec<(usize, Vec<f64>)>,
    rmse: Vec<f64>,
}

impl ReferenceComparison {
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Cell coordinates along the profile axis.
    pub fn coordinates(&self) -> &[f64] {
        &self.coordinates
    }

    /// Reference curve evaluated at [`coordinates`](Self::coordinates).
    pub fn reference(&self) -> &[f64] {
        &self.reference
    }

    /// `(particle_count, profile)` for every requested count.
    pub fn curves(&self) -> &[(usize, Vec<f64>)] {
        &self.curves
    }

    /// Grid RMSE of each run, aligned with [`curves`](Self::curves).
    pub fn rmse(&self) -> &[f64] {
        &self.rmse
    }
}

// =================================================================================================
// Harness
// =================================================================================================

#[derive(Debug, Clone, Copy)]
struct Run {
    dt_index: usize,
    count_index: usize,
    dt: f64,
    particle_count: usize,
    seed: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
struct RunSummary {
    rmse: f64,
    empty_cells: usize,
    cells: usize,
}

/// Batch client of [`SimulationEngine`] measuring statistical convergence.
///
/// # Example
///
/// ```rust
/// use lagrangian_rs::physics::Region;
/// use lagrangian_rs::solver::SimulationConfig;
/// use lagrangian_rs::validation::{ReferenceSolution, ValidationHarness};
///
/// let base = SimulationConfig::builder()
///     .time_max(0.05)
///     .dt(0.05)
///     .cells(8, 1)
///     .region(Region::Rectangle { min: [-1.0, -1.0], max: [0.0, 1.0], value: 1 })
///     .seed(3)
///     .build()?;
/// let harness = ValidationHarness::new(base, ReferenceSolution::constant(0.5))?;
///
/// let rmse = harness.run_rmse_sweep(&[100, 400], &[0.05])?;
/// assert_eq!(rmse.dim(), (1, 2));
/// # Ok::<(), lagrangian_rs::error::SimulationError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ValidationHarness {
    base: SimulationConfig,
    reference: ReferenceSolution,
    reference_grid: Array2<f64>,
    smoothing_window: usize,
    abort: AbortHandle,
}

impl ValidationHarness {
    /// Wrap a base configuration; `dt` and particle count are overridden per run.
    ///
    /// A file velocity source is loaded once here and shared by every run.
    pub fn new(base: SimulationConfig, reference: ReferenceSolution) -> Result<Self> {
        let base = match base.velocity().resolve()? {
            Some(field) => base.with_velocity(VelocitySource::Field(field)),
            None => base,
        };
        let reference_grid = reference_grid(&base, &reference);
        Ok(Self {
            base,
            reference,
            reference_grid,
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
            abort: AbortHandle::default(),
        })
    }

    /// Moving-average window applied before fitting (`<= 1` disables it).
    pub fn with_smoothing_window(mut self, window: usize) -> Self {
        self.smoothing_window = window;
        self
    }

    pub fn base(&self) -> &SimulationConfig {
        &self.base
    }

    pub fn reference(&self) -> &ReferenceSolution {
        &self.reference
    }

    /// Reference values on the cell grid, shape `(ny, nx)`.
    pub fn reference_grid(&self) -> &Array2<f64> {
        &self.reference_grid
    }

    /// Handle for cancelling a sweep from another thread.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Root-mean-square difference between a grid and the reference.
    pub fn rmse(&self, grid: &ConcentrationGrid) -> f64 {
        let diff = &self.reference_grid - grid.values();
        (diff.mapv(|d| d * d).sum() / diff.len() as f64).sqrt()
    }

    /// RMSE of every `(dt, particle_count)` pair, shape `[dts][particle_counts]`.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError`] for empty inputs, a zero count or an invalid dt,
    ///   before any run starts
    /// - [`SimulationError::Aborted`] when the [`AbortHandle`] fired
    /// - any engine failure
    pub fn run_rmse_sweep(&self, particle_counts: &[usize], dts: &[f64]) -> Result<Array2<f64>> {
        let (rmse, _) = self.sweep(particle_counts, dts)?;
        Ok(rmse)
    }

    /// Smooth one RMSE row, then fit `E(N) = a · N^β`.
    pub fn fit_power_law(&self, particle_counts: &[usize], rmse_row: &[f64]) -> Result<PowerLawFit> {
        let ns: Vec<f64> = particle_counts.iter().map(|&n| n as f64).collect();
        let smoothed = fitting::moving_average(rmse_row, self.smoothing_window);
        fitting::fit_power_law(&ns, &smoothed)
    }

    /// Full convergence study: sweep, smoothing, one fit per dt.
    pub fn fit_rmse_curves(&self, particle_counts: &[usize], dts: &[f64]) -> Result<ConvergenceReport> {
        let (rmse, mut warnings) = self.sweep(particle_counts, dts)?;
        let ns: Vec<f64> = particle_counts.iter().map(|&n| n as f64).collect();

        let mut smoothed = Array2::zeros(rmse.dim());
        let mut fitted = Array2::zeros(rmse.dim());
        let mut fits = Vec::with_capacity(dts.len());

        for (i, &dt) in dts.iter().enumerate() {
            let row = rmse.row(i).to_vec();
            let smooth_row = fitting::moving_average(&row, self.smoothing_window);
            let fit = fitting::fit_power_law(&ns, &smooth_row)?;

            log::info!("dt={dt}: E(N) = {:.4} * N^{:.4}", fit.a, fit.beta);
            if (fit.beta - EXPECTED_CONVERGENCE_ORDER).abs() > CONVERGENCE_ORDER_TOLERANCE {
                warnings.push(
                    NumericalWarning::ConvergenceOrder {
                        dt,
                        beta: fit.beta,
                        expected: EXPECTED_CONVERGENCE_ORDER,
                    }
                    .emit(),
                );
            }

            for (j, &n) in ns.iter().enumerate() {
                smoothed[[i, j]] = smooth_row[j];
                fitted[[i, j]] = fit.evaluate(n);
            }
            fits.push(fit);
        }

        Ok(ConvergenceReport {
            dts: dts.to_vec(),
            particle_counts: particle_counts.to_vec(),
            rmse,
            smoothed,
            fits,
            fitted,
            warnings,
        })
    }

    /// Final 1D profile for every particle count at a single `dt`.
    pub fn reference_comparison(&self, particle_counts: &[usize], dt: f64) -> Result<ReferenceComparison> {
        let runs = self.plan(particle_counts, &[dt])?;
        let profiles = self.execute(&runs, |grid| (grid.profile(), self.rmse(&grid)))?;

        let template = self.base.with_dt(dt)?;
        let coordinates = template.grid().axis_coordinates(template.domain(), profile_axis(&template));
        let reference = self.reference.interpolate(&coordinates);

        let (curves, rmse): (Vec<_>, Vec<_>) = runs
            .iter()
            .zip(profiles)
            .map(|(run, (profile, rmse))| ((run.particle_count, profile), rmse))
            .unzip();

        Ok(ReferenceComparison {
            dt,
            coordinates,
            reference,
            curves,
            rmse,
        })
    }

    fn sweep(&self, particle_counts: &[usize], dts: &[f64]) -> Result<(Array2<f64>, Vec<NumericalWarning>)> {
        let runs = self.plan(particle_counts, dts)?;
        log::info!(
            "RMSE sweep: {} particle counts x {} time steps = {} runs",
            particle_counts.len(),
            dts.len(),
            runs.len()
        );

        let summaries = self.execute(&runs, |grid| RunSummary {
            rmse: self.rmse(&grid),
            empty_cells: grid.empty_cells(),
            cells: grid.values().len(),
        })?;

        let mut rmse = Array2::zeros((dts.len(), particle_counts.len()));
        let mut warnings = Vec::new();
        for (run, summary) in runs.iter().zip(summaries) {
            rmse[[run.dt_index, run.count_index]] = summary.rmse;
            if summary.empty_cells > 0 {
                warnings.push(
                    NumericalWarning::EmptyCells {
                        particle_count: run.particle_count,
                        dt: run.dt,
                        empty: summary.empty_cells,
                        total: summary.cells,
                    }
                    .emit(),
                );
            }
        }
        Ok((rmse, warnings))
    }

    /// Validate the inputs and lay out one run per pair, dt-major.
    fn plan(&self, particle_counts: &[usize], dts: &[f64]) -> Result<Vec<Run>> {
        if particle_counts.is_empty() {
            return Err(ConfigurationError::EmptySweep { what: "particle_counts" }.into());
        }
        if dts.is_empty() {
            return Err(ConfigurationError::EmptySweep { what: "dts" }.into());
        }
        if particle_counts.contains(&0) {
            return Err(ConfigurationError::NoParticles.into());
        }
        for &dt in dts {
            self.base.with_dt(dt)?;
        }

        let mut runs = Vec::with_capacity(particle_counts.len() * dts.len());
        for (dt_index, &dt) in dts.iter().enumerate() {
            for (count_index, &particle_count) in particle_counts.iter().enumerate() {
                let stream = dt_index * particle_counts.len() + count_index;
                runs.push(Run {
                    dt_index,
                    count_index,
                    dt,
                    particle_count,
                    seed: self.base.seed().map(|s| chunk_seed(s, stream)),
                });
            }
        }
        Ok(runs)
    }

    fn execute<T, F>(&self, runs: &[Run], summarize: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(ConcentrationGrid) -> T + Sync,
    {
        let total = runs.len();
        let completed = AtomicUsize::new(0);

        let run_one = |run: &Run| -> Result<T> {
            if self.abort.is_aborted() {
                return Err(SimulationError::Aborted {
                    completed: completed.load(Ordering::SeqCst),
                    total,
                });
            }
            log::info!("run N={} dt={}", run.particle_count, run.dt);

            let config = self
                .base
                .with_dt(run.dt)?
                .with_particle_count(run.particle_count)?
                .with_seed(run.seed);
            let mut engine = SimulationEngine::new(config)?;
            engine.run_to_completion()?;
            let summary = summarize(engine.concentrations());

            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            log::debug!("{done}/{total} runs complete");
            Ok(summary)
        };

        #[cfg(feature = "parallel")]
        let results: Result<Vec<T>> = runs.par_iter().map(run_one).collect();
        #[cfg(not(feature = "parallel"))]
        let results: Result<Vec<T>> = runs.iter().map(run_one).collect();

        results.map_err(|err| match err {
            SimulationError::Aborted { .. } => {
                let completed = completed.load(Ordering::SeqCst);
                log::info!("sweep aborted after {completed} of {total} runs");
                SimulationError::Aborted { completed, total }
            }
            other => other,
        })
    }
}

fn profile_axis(config: &SimulationConfig) -> Axis {
    config.grid().profile_axis().unwrap_or(Axis::X)
}

/// Reference evaluated along the profile axis and broadcast across the other.
fn reference_grid(config: &SimulationConfig, reference: &ReferenceSolution) -> Array2<f64> {
    let axis = profile_axis(config);
    let values = reference.interpolate(&config.grid().axis_coordinates(config.domain(), axis));
    Array2::from_shape_fn(config.grid().shape(), |(row, col)| match axis {
        Axis::X => values[col],
        Axis::Y => values[row],
    })
}
