//! 1D Diffusion: Monte-Carlo Convergence Study
//!
//! The left half of the domain starts at concentration 1 and diffuses into
//! the right half. The grid is one cell thick, so the result is a 1D
//! profile. The error against a reference profile is measured for several
//! particle counts and time steps, then fitted with `E(N) = a·N^β`.
//!
//! Without an argument the reference is a 2²⁰-particle run of the same
//! setup; with one it is read from a two-column file.
//!
//! ```bash
//! cargo run --release --example diffusion_1d
//! cargo run --release --example diffusion_1d -- reference.dat
//! ```

use std::error::Error;

use lagrangian_rs::{
    output::{CsvExporter, Exporter},
    physics::Region,
    solver::{SimulationConfig, SimulationEngine},
    validation::{ReferenceSolution, ValidationHarness},
};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    println!("=== 1D Diffusion: convergence in the particle count ===\n");

    let base = SimulationConfig::builder()
        .time_max(0.2)
        .dt(0.01)
        .domain([-1.0, -1.0], [1.0, 1.0])
        .cells(64, 1)
        .particle_count(65_536)
        .diffusivity(0.1)
        .region(Region::Rectangle { min: [-1.0, -1.0], max: [0.0, 1.0], value: 1 })
        .seed(1)
        .build()?;

    let reference = match std::env::args().nth(1) {
        Some(path) => ReferenceSolution::load(&path)?,
        None => {
            println!("Computing a 2^20-particle reference run...");
            let mut engine = SimulationEngine::new(base.with_particle_count(1 << 20)?)?;
            engine.run_to_completion()?;
            let grid = engine.concentrations();
            ReferenceSolution::from_points(grid.profile_coordinates(), grid.profile())?
        }
    };
    println!("Reference: {} points\n", reference.len());

    let harness = ValidationHarness::new(base, reference)?;
    let particle_counts: Vec<usize> = (7..=16).map(|k| 1usize << k).collect();
    let dts = [0.01, 0.02, 0.03];

    let start = std::time::Instant::now();
    let report = harness.fit_rmse_curves(&particle_counts, &dts)?;
    println!("✓ Sweep completed in {:.3}s\n", start.elapsed().as_secs_f64());

    println!("{:>8} {:>10} {:>10}", "dt", "a", "beta");
    for (dt, fit) in report.dts().iter().zip(report.fits()) {
        println!("{dt:>8} {:>10.4} {:>10.4}", fit.a, fit.beta);
    }
    for warning in report.warnings() {
        println!("  warning: {warning}");
    }

    let comparison = harness.reference_comparison(&[128, 1_024, 16_384], 0.01)?;
    println!("\nProfile RMSE at dt = {}:", comparison.dt());
    for ((n, _), rmse) in comparison.curves().iter().zip(comparison.rmse()) {
        println!("  N = {n:>6}: {rmse:.5}");
    }

    let exporter = CsvExporter::default();
    exporter.export_convergence(&report, "convergence.csv")?;
    exporter.export_comparison(&comparison, "comparison.csv")?;
    println!("\nWrote convergence.csv and comparison.csv");

    Ok(())
}
