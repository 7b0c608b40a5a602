//! Helper functions for integration tests

use std::io::Write;
use std::path::{Path, PathBuf};

use lagrangian_rs::physics::Region;
use lagrangian_rs::solver::SimulationConfig;
use ndarray::Array2;

/// Assert that two grids have the same shape and are element-wise close.
pub fn assert_grids_close(a: &Array2<f64>, b: &Array2<f64>, tolerance: f64, message: &str) {
    assert_eq!(a.dim(), b.dim(), "{}: shape mismatch", message);

    for ((index, &v1), &v2) in a.indexed_iter().zip(b.iter()) {
        let diff = (v1 - v2).abs();
        assert!(
            diff <= tolerance,
            "{}: cell {:?} differs by {} (tolerance {})",
            message, index, diff, tolerance
        );
    }
}

/// Pure-diffusion setup on [-1,1]² with the left half painted 1.
pub fn left_half_config(
    particle_count: usize,
    cells: (usize, usize),
    time_max: f64,
    dt: f64,
    diffusivity: f64,
    seed: u64,
) -> SimulationConfig {
    SimulationConfig::builder()
        .time_max(time_max)
        .dt(dt)
        .domain([-1.0, -1.0], [1.0, 1.0])
        .cells(cells.0, cells.1)
        .particle_count(particle_count)
        .diffusivity(diffusivity)
        .region(Region::Rectangle { min: [-1.0, -1.0], max: [0.0, 1.0], value: 1 })
        .seed(seed)
        .build()
        .expect("valid test configuration")
}

/// Write whitespace-separated numeric rows to `dir/name`.
pub fn write_columns(dir: &Path, name: &str, rows: &[Vec<f64>]) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("create fixture file");
    writeln!(file, "# generated fixture").expect("write fixture header");
    for row in rows {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(file, "{}", line.join(" ")).expect("write fixture row");
    }
    path
}

/// Compute relative error: |actual - expected| / |expected|
pub fn relative_error(actual: f64, expected: f64) -> f64 {
    if expected.abs() < 1e-10 {
        (actual - expected).abs()
    } else {
        (actual - expected).abs() / expected.abs()
    }
}
