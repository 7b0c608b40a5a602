//! Integration tests: physics module + solver module
//!
//! These tests verify that particles, velocity field, engine and binning
//! work correctly together.

use std::ops::ControlFlow;

use lagrangian_rs::output::{CsvExporter, DEFAULT_HIGHLIGHT_THRESHOLD, Exporter, ThresholdTracker};
use lagrangian_rs::physics::{DomainSpec, ParticleSet, Region, VelocityField};
use lagrangian_rs::solver::{EngineState, SimulationConfig, SimulationEngine, SimulationParameters};
use nalgebra::Vector2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::tempdir;

mod common;
use common::{ConstantDrift, Frozen, left_half_config, relative_error, write_columns};

// =================================================================================================
// End-to-end scenarios
// =================================================================================================

#[test]
fn test_diffusion_keeps_particles_in_domain() {
    let config = SimulationConfig::builder()
        .time_max(0.1)
        .dt(0.01)
        .domain([-1.0, -1.0], [1.0, 1.0])
        .particle_count(10_000)
        .diffusivity(0.01)
        .seed(1)
        .build()
        .unwrap();
    let domain = *config.domain();

    let mut engine = SimulationEngine::new(config).unwrap();
    engine.run_to_completion().unwrap();

    assert_eq!(engine.state(), EngineState::Terminal);
    assert_eq!(engine.particles().len(), 10_000);
    assert!(engine.particles().positions().iter().all(|p| domain.contains(p)));
}

#[test]
fn test_rectangle_paint_matches_brute_force() {
    let domain = DomainSpec::new([-1.0, -1.0], [1.0, 1.0]).unwrap();
    let mut rng = StdRng::seed_from_u64(2024);
    let mut particles = ParticleSet::generate_random(1_000, &domain, &mut rng);
    let initial = particles.positions().to_vec();

    let painted = particles.paint_rectangle([-1.0, -1.0], [0.0, 1.0], 1);

    let expected: Vec<u8> = initial.iter().map(|p| u8::from(p.x <= 0.0)).collect();
    assert_eq!(particles.labels(), expected.as_slice());
    assert_eq!(painted, expected.iter().filter(|&&l| l == 1).count());
    assert_eq!(particles.positions(), initial.as_slice());

    // Binomial(1000, 0.5): five standard deviations is ~79.
    assert!((420..=580).contains(&painted), "painted {painted}");
}

// =================================================================================================
// Determinism and conservation
// =================================================================================================

#[test]
fn test_seeded_runs_are_identical() {
    let run = || {
        let mut engine = SimulationEngine::new(left_half_config(5_000, (16, 4), 0.05, 0.01, 0.1, 9)).unwrap();
        engine.run_to_completion().unwrap();
        (engine.particles().clone(), engine.concentrations())
    };
    let (a, grid_a) = run();
    let (b, grid_b) = run();
    assert_eq!(a, b);
    assert_eq!(grid_a.values(), grid_b.values());
}

#[test]
fn test_painting_is_deterministic_under_seed() {
    let config = SimulationConfig::builder()
        .particle_count(2_000)
        .region(Region::Circle { center: [0.2, -0.1], radius: 0.5, value: 1 })
        .seed(77)
        .build()
        .unwrap();
    let a = SimulationEngine::new(config.clone()).unwrap();
    let b = SimulationEngine::new(config).unwrap();
    assert_eq!(a.particles().labels(), b.particles().labels());
    assert!(a.particles().count_label(1) > 0);
}

#[test]
fn test_label_mass_is_conserved() {
    let mut engine = SimulationEngine::new(left_half_config(8_000, (20, 10), 0.1, 0.01, 0.2, 5)).unwrap();
    let before = engine.particles().mean_label();

    engine.run_to_completion().unwrap();

    // Stepping never touches labels.
    assert_eq!(engine.particles().mean_label(), before);

    let grid = engine.concentrations();
    assert_eq!(grid.particle_count(), 8_000);
    assert!(relative_error(grid.weighted_mean(), before) < 1e-12);
}

#[test]
fn test_binning_is_idempotent() {
    let mut engine = SimulationEngine::new(left_half_config(3_000, (12, 12), 0.03, 0.01, 0.1, 4)).unwrap();
    engine.step().unwrap();
    let first = engine.concentrations();
    let second = engine.concentrations();
    assert_eq!(first.values(), second.values());
    assert_eq!(first.counts(), second.counts());
}

#[test]
fn test_frozen_scheme_leaves_grid_unchanged() {
    let mut engine = SimulationEngine::new(left_half_config(2_000, (10, 1), 0.05, 0.01, 0.5, 8))
        .unwrap()
        .with_scheme(Frozen);
    let initial = engine.concentrations();
    engine.run_to_completion().unwrap();
    common::assert_grids_close(initial.values(), engine.concentrations().values(), 0.0, "frozen run");
}

// =================================================================================================
// Boundaries
// =================================================================================================

#[test]
fn test_particle_on_max_stays_on_max() {
    let config = SimulationConfig::builder()
        .time_max(0.1)
        .dt(0.01)
        .domain([0.0, 0.0], [2.0, 1.0])
        .particle_count(1)
        .diffusivity(0.0)
        .seed(3)
        .build()
        .unwrap();
    let corner = Vector2::new(2.0, 1.0);
    let mut engine = SimulationEngine::new(config)
        .unwrap()
        .with_particles(ParticleSet::from_positions(vec![corner]))
        .unwrap();

    engine.run_to_completion().unwrap();
    assert_eq!(engine.particles().positions()[0], corner);
}

#[test]
fn test_constant_drift_follows_exact_trajectory() {
    let config = SimulationConfig::builder()
        .time_max(0.5)
        .dt(0.1)
        .particle_count(1)
        .seed(3)
        .build()
        .unwrap();
    let mut engine = SimulationEngine::new(config)
        .unwrap()
        .with_scheme(ConstantDrift::new(1.0, -0.5))
        .with_particles(ParticleSet::from_positions(vec![Vector2::zeros()]))
        .unwrap();

    engine.run_to_completion().unwrap();
    assert_eq!(engine.step_count(), 6);

    let p = engine.particles().positions()[0];
    assert!(relative_error(p.x, 0.6) < 1e-12);
    assert!(relative_error(p.y, -0.3) < 1e-12);
}

#[test]
fn test_drift_into_wall_is_reflected() {
    let config = SimulationConfig::builder()
        .time_max(1.0)
        .dt(0.1)
        .particle_count(1)
        .seed(3)
        .build()
        .unwrap();
    let domain = *config.domain();
    let mut engine = SimulationEngine::new(config)
        .unwrap()
        .with_scheme(ConstantDrift::new(3.0, 0.0))
        .with_particles(ParticleSet::from_positions(vec![Vector2::new(0.5, 0.0)]))
        .unwrap();

    let mut xs = Vec::new();
    while !engine.is_terminal() {
        engine.step().unwrap();
        let p = engine.particles().positions()[0];
        assert!(domain.contains(&p), "left the domain at {p:?}");
        xs.push(p.x);
    }
    assert!(xs.iter().all(|&x| x >= 0.5));
}

// =================================================================================================
// Velocity field
// =================================================================================================

fn uniform_field_rows(vx: f64, vy: f64) -> Vec<Vec<f64>> {
    let mut rows = Vec::new();
    for i in 0..5 {
        for j in 0..5 {
            let x = -1.0 + 0.5 * i as f64;
            let y = -1.0 + 0.5 * j as f64;
            rows.push(vec![x, y, vx, vy]);
        }
    }
    rows
}

#[test]
fn test_velocity_round_trip_on_sample_coordinates() {
    let dir = tempdir().unwrap();
    let rows: Vec<Vec<f64>> = (0..12)
        .map(|k| {
            let t = k as f64 * 0.5;
            vec![t.cos(), t.sin(), k as f64, -(k as f64)]
        })
        .collect();
    let path = write_columns(dir.path(), "velocity.dat", &rows);

    let field = VelocityField::load(&path).unwrap();
    let positions: Vec<Vector2<f64>> = rows.iter().map(|r| Vector2::new(r[0], r[1])).collect();
    let velocities = field.velocity_at(&positions);

    for (row, v) in rows.iter().zip(&velocities) {
        assert_eq!(*v, Vector2::new(row[2], row[3]));
    }
}

#[test]
fn test_uniform_velocity_advects_exactly_without_diffusion() {
    let dir = tempdir().unwrap();
    let path = write_columns(dir.path(), "uniform.dat", &uniform_field_rows(0.5, 0.0));

    let config = SimulationConfig::builder()
        .time_max(0.4)
        .dt(0.1)
        .particle_count(1)
        .diffusivity(0.0)
        .velocity_file(&path)
        .seed(1)
        .build()
        .unwrap();
    let mut engine = SimulationEngine::new(config)
        .unwrap()
        .with_particles(ParticleSet::from_positions(vec![Vector2::new(-0.5, 0.25)]))
        .unwrap();

    engine.run_to_completion().unwrap();
    let p = engine.particles().positions()[0];
    // 5 steps of 0.5 * 0.1
    assert!(relative_error(p.x, -0.25) < 1e-12);
    assert_eq!(p.y, 0.25);
}

#[test]
fn test_short_velocity_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = write_columns(dir.path(), "short.dat", &[vec![0.0, 0.0, 1.0]]);
    let config = SimulationConfig::builder().velocity_file(&path).build().unwrap();
    assert!(SimulationEngine::new(config).is_err());
}

// =================================================================================================
// Front-end surface
// =================================================================================================

#[test]
fn test_flat_parameters_drive_engine() {
    let dir = tempdir().unwrap();
    let json = dir.path().join("params.json");

    let params = SimulationParameters {
        time_max: 0.05,
        dt: 0.01,
        particle_count: 4_000,
        cell_size: [8, 8],
        use_circle: true,
        circle_center: [0.0, 0.0],
        circle_radius: 0.4,
        circle_value: 1,
        seed: Some(12),
        ..SimulationParameters::default()
    };
    params.save_json(&json).unwrap();

    let loaded = SimulationParameters::load_json(&json).unwrap();
    let config = SimulationConfig::try_from(&loaded).unwrap();
    let mut engine = SimulationEngine::new(config).unwrap();

    let mut frames = Vec::new();
    engine
        .run_observed(|frame| {
            frames.push((frame.step, frame.time, frame.concentrations.values().dim()));
            ControlFlow::Continue(())
        })
        .unwrap();

    assert_eq!(frames.len(), 7);
    assert_eq!(frames[0], (0, 0.0, (8, 8)));
    assert!(engine.is_terminal());
}

#[test]
fn test_spill_highlighting_is_sticky() {
    let config = SimulationConfig::builder()
        .time_max(0.2)
        .dt(0.02)
        .cells(16, 16)
        .particle_count(20_000)
        .diffusivity(0.2)
        .region(Region::Circle { center: [0.0, 0.0], radius: 0.3, value: 1 })
        .seed(21)
        .build()
        .unwrap();
    let mut engine = SimulationEngine::new(config).unwrap();
    let mut tracker = ThresholdTracker::new(DEFAULT_HIGHLIGHT_THRESHOLD, (16, 16));

    let mut marked = Vec::new();
    engine
        .run_observed(|frame| {
            let highlighted = tracker.observe(&frame.concentrations);
            assert!(highlighted.iter().all(|&v| (0.0..=1.0).contains(&v)));
            marked.push(tracker.marked_count());
            ControlFlow::Continue(())
        })
        .unwrap();

    assert!(marked[0] > 0);
    assert!(marked.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_final_grid_exports_every_cell() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("grid.csv");

    let mut engine = SimulationEngine::new(left_half_config(1_000, (6, 3), 0.02, 0.01, 0.1, 2)).unwrap();
    engine.run_to_completion().unwrap();
    CsvExporter::default().export_grid(&engine.concentrations(), &path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "x,y,concentration,particles");
    assert_eq!(lines.len(), 1 + 18);
}
