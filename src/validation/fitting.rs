//! Smoothing and power-law fitting of error curves
//!
//! # Model
//!
//! The statistical error of a particle method decays with the particle count
//! as
//!
//! ```text
//! E(N) = a · N^β
//! ```
//!
//! with `β ≈ −0.5` for Monte-Carlo sampling. The parameters are found by
//! nonlinear least squares (Levenberg–Marquardt) on the raw values, not on
//! their logarithms, so large errors at small `N` weigh the most.
//!
//! # Initial guess
//!
//! When every error is positive, a straight-line fit of `ln E` against
//! `ln N` seeds the iteration. Otherwise it starts from `(a, β) = (1, −0.5)`.

use nalgebra::{Matrix2, Vector2};

use crate::error::SimulationError;

/// Default moving-average window.
pub const DEFAULT_SMOOTHING_WINDOW: usize = 3;

const MAX_ITERATIONS: usize = 200;
const INITIAL_DAMPING: f64 = 1e-3;
const MAX_DAMPING: f64 = 1e16;
const RELATIVE_TOLERANCE: f64 = 1e-12;

/// Fitted parameters of `E(N) = a · N^β`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerLawFit {
    pub a: f64,
    pub beta: f64,
    /// Sum of squared residuals at the solution.
    pub residual: f64,
    /// Levenberg–Marquardt iterations taken.
    pub iterations: usize,
}

impl PowerLawFit {
    /// `a · n^β`.
    pub fn evaluate(&self, n: f64) -> f64 {
        self.a * n.powf(self.beta)
    }

    /// Model values at every `n`.
    pub fn evaluate_all(&self, ns: &[f64]) -> Vec<f64> {
        ns.iter().map(|&n| self.evaluate(n)).collect()
    }
}

/// Centered moving average with a window that shrinks at the edges.
///
/// Each output is the mean of the inputs in
/// `[i − (w−1)/2, i + w/2]` clipped to the slice. `window <= 1` copies the
/// input. Output length equals input length.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 || values.is_empty() {
        return values.to_vec();
    }
    let n = values.len();
    let before = (window - 1) / 2;
    let after = window / 2;
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(before);
            let hi = (i + after).min(n - 1);
            let slice = &values[lo..=hi];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

fn sum_of_squares(ns: &[f64], es: &[f64], a: f64, beta: f64) -> f64 {
    ns.iter()
        .zip(es)
        .map(|(&n, &e)| {
            let r = e - a * n.powf(beta);
            r * r
        })
        .sum()
}

fn log_log_guess(ns: &[f64], es: &[f64]) -> Option<(f64, f64)> {
    if es.iter().any(|&e| e <= 0.0) {
        return None;
    }
    let m = ns.len() as f64;
    let xs: Vec<f64> = ns.iter().map(|n| n.ln()).collect();
    let ys: Vec<f64> = es.iter().map(|e| e.ln()).collect();
    let mean_x = xs.iter().sum::<f64>() / m;
    let mean_y = ys.iter().sum::<f64>() / m;
    let sxx: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = xs.iter().zip(&ys).map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
    let beta = sxy / sxx;
    let a = (mean_y - beta * mean_x).exp();
    (a.is_finite() && beta.is_finite()).then_some((a, beta))
}

/// Fit `E(N) = a · N^β` to `(particle_counts, errors)`.
///
/// # Errors
///
/// [`SimulationError::Fit`] when fewer than two points are given, lengths
/// differ, a count is not positive, a value is not finite, or the iteration
/// ends on non-finite parameters.
pub fn fit_power_law(particle_counts: &[f64], errors: &[f64]) -> Result<PowerLawFit, SimulationError> {
    if particle_counts.len() != errors.len() {
        return Err(SimulationError::Fit(format!(
            "{} particle counts but {} error values",
            particle_counts.len(),
            errors.len()
        )));
    }
    if particle_counts.len() < 2 {
        return Err(SimulationError::Fit("need at least two points".to_string()));
    }
    if particle_counts.iter().any(|&n| !(n.is_finite() && n > 0.0)) {
        return Err(SimulationError::Fit("particle counts must be positive".to_string()));
    }
    if errors.iter().any(|e| !e.is_finite()) {
        return Err(SimulationError::Fit("error values must be finite".to_string()));
    }

    let (mut a, mut beta) = log_log_guess(particle_counts, errors).unwrap_or((1.0, -0.5));
    let mut sse = sum_of_squares(particle_counts, errors, a, beta);
    let mut lambda = INITIAL_DAMPING;
    let mut iterations = 0;

    while iterations < MAX_ITERATIONS {
        iterations += 1;

        // Normal equations JᵀJ δ = Jᵀr for the model f = a·N^β.
        let mut jtj = Matrix2::<f64>::zeros();
        let mut jtr = Vector2::<f64>::zeros();
        for (&n, &e) in particle_counts.iter().zip(errors) {
            let power = n.powf(beta);
            let grad = Vector2::new(power, a * power * n.ln());
            let residual = e - a * power;
            jtj += grad * grad.transpose();
            jtr += grad * residual;
        }

        let mut improved = false;
        while lambda < MAX_DAMPING {
            let mut damped = jtj;
            damped[(0, 0)] += lambda * jtj[(0, 0)].max(f64::EPSILON);
            damped[(1, 1)] += lambda * jtj[(1, 1)].max(f64::EPSILON);

            if let Some(delta) = damped.try_inverse().map(|inv| inv * jtr) {
                let (a_new, beta_new) = (a + delta.x, beta + delta.y);
                let sse_new = sum_of_squares(particle_counts, errors, a_new, beta_new);
                if sse_new.is_finite() && sse_new <= sse {
                    let gain = sse - sse_new;
                    a = a_new;
                    beta = beta_new;
                    sse = sse_new;
                    lambda = (lambda / 10.0).max(1e-12);
                    improved = gain > RELATIVE_TOLERANCE * sse.max(f64::MIN_POSITIVE);
                    break;
                }
            }
            lambda *= 10.0;
        }

        if !improved {
            break;
        }
    }

    if !(a.is_finite() && beta.is_finite()) {
        return Err(SimulationError::Fit(format!("diverged to a={a}, beta={beta}")));
    }

    log::debug!("power-law fit a={a:.6} beta={beta:.6} sse={sse:.3e} after {iterations} iterations");

    Ok(PowerLawFit {
        a,
        beta,
        residual: sse,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_moving_average_centered() {
        let smoothed = moving_average(&[3.0, 6.0, 9.0, 12.0], 3);
        assert_eq!(smoothed, vec![4.5, 6.0, 9.0, 10.5]);
    }

    #[test]
    fn test_moving_average_trivial_windows() {
        let values = [1.0, 5.0, 2.0];
        assert_eq!(moving_average(&values, 0), values.to_vec());
        assert_eq!(moving_average(&values, 1), values.to_vec());
        assert!(moving_average(&[], 3).is_empty());
    }

    #[test]
    fn test_moving_average_window_larger_than_input() {
        let smoothed = moving_average(&[1.0, 2.0, 3.0], 9);
        assert_eq!(smoothed, vec![2.0; 3]);
    }

    #[test]
    fn test_moving_average_preserves_constant() {
        let smoothed = moving_average(&[0.7; 6], 3);
        assert_eq!(smoothed.len(), 6);
        for value in smoothed {
            assert_relative_eq!(value, 0.7, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_exact_power_law_is_recovered() {
        let ns = [100.0, 400.0, 1600.0, 6400.0, 25600.0];
        let es: Vec<f64> = ns.iter().map(|n: &f64| 2.0 * n.powf(-0.5)).collect();
        let fit = fit_power_law(&ns, &es).unwrap();
        assert_relative_eq!(fit.a, 2.0, max_relative = 1e-6);
        assert_relative_eq!(fit.beta, -0.5, epsilon = 1e-6);
        assert!(fit.residual < 1e-20);
    }

    #[test]
    fn test_noisy_power_law() {
        let ns = [128.0, 256.0, 512.0, 1024.0, 2048.0, 4096.0];
        let noise = [1.05, 0.97, 1.02, 0.99, 1.03, 0.98];
        let es: Vec<f64> = ns
            .iter()
            .zip(noise)
            .map(|(n, k): (&f64, f64)| 0.8 * n.powf(-0.5) * k)
            .collect();
        let fit = fit_power_law(&ns, &es).unwrap();
        assert!((fit.beta + 0.5).abs() < 0.1, "beta = {}", fit.beta);
        assert!(fit.a > 0.0);
    }

    #[test]
    fn test_fit_starts_from_default_guess_with_non_positive_errors() {
        let ns = [10.0, 100.0, 1000.0];
        let es = [0.3, 0.1, 0.0];
        let fit = fit_power_law(&ns, &es).unwrap();
        assert!(fit.beta < 0.0);
        assert!(fit.residual < sum_of_squares(&ns, &es, 1.0, -0.5));
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        assert!(fit_power_law(&[1.0], &[1.0]).is_err());
        assert!(fit_power_law(&[1.0, 2.0], &[1.0]).is_err());
        assert!(fit_power_law(&[0.0, 2.0], &[1.0, 0.5]).is_err());
        assert!(fit_power_law(&[1.0, 2.0], &[1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_evaluate() {
        let fit = PowerLawFit { a: 3.0, beta: -1.0, residual: 0.0, iterations: 0 };
        assert_relative_eq!(fit.evaluate(4.0), 0.75);
        assert_eq!(fit.evaluate_all(&[1.0, 3.0]), vec![3.0, 1.0]);
    }
}
