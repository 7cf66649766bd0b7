//! Lyapunov exponents across a rate sweep.
//!
//! For a one-dimensional map the exponent is the orbit average of
//! `ln |f'(x_n)|`. The derivative comes from evaluating the map on dual
//! numbers, so any map written generically over `Scalar` works without a
//! hand-coded derivative.

use crate::autodiff::{differentiate, Dual};
use crate::simulate::{ExecutionBackend, SimulationSettings};
use crate::traits::IteratedMap;
use anyhow::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LyapunovPoint {
    pub rate: f64,
    pub exponent: f64,
}

/// Estimates the Lyapunov exponent at every rate of the sweep described by
/// `settings`: `num_discard` burn-in steps, then `num_gens` averaged steps.
///
/// Superstable orbits give `-inf` and divergent ones NaN or `+inf`; these
/// are returned as they are.
pub fn lyapunov_sweep<M>(map: &M, settings: &SimulationSettings) -> Result<Vec<LyapunovPoint>>
where
    M: IteratedMap<f64> + IteratedMap<Dual> + Sync + ?Sized,
{
    settings.validate()?;

    let rates = settings.rates();
    debug!(
        num_gens = settings.num_gens,
        num_rates = rates.len(),
        backend = ?settings.backend,
        "estimating lyapunov exponents"
    );

    let estimate = |&rate: &f64| LyapunovPoint {
        rate,
        exponent: lyapunov_exponent(
            map,
            rate,
            settings.initial_pop,
            settings.num_discard,
            settings.num_gens,
        ),
    };
    let points: Vec<LyapunovPoint> = match settings.backend {
        ExecutionBackend::Serial => rates.iter().map(estimate).collect(),
        ExecutionBackend::Parallel => rates.par_iter().map(estimate).collect(),
    };
    Ok(points)
}

/// Lyapunov exponent of the orbit of `initial_pop` at a single rate.
pub fn lyapunov_exponent<M>(
    map: &M,
    rate: f64,
    initial_pop: f64,
    num_discard: usize,
    steps: usize,
) -> f64
where
    M: IteratedMap<f64> + IteratedMap<Dual> + ?Sized,
{
    let mut pop = initial_pop;
    for _ in 0..num_discard {
        pop = IteratedMap::<f64>::evaluate(map, pop, rate);
    }

    let mut accum = 0.0;
    for _ in 0..steps {
        let (next, slope) = differentiate(map, pop, rate);
        accum += slope.abs().ln();
        pop = next;
    }
    accum / steps as f64
}

#[cfg(test)]
mod tests {
    use super::{lyapunov_exponent, lyapunov_sweep, LyapunovPoint};
    use crate::expression::ExpressionMap;
    use crate::maps::BuiltinMap;
    use crate::simulate::{ExecutionBackend, SimulationSettings};

    fn assert_err_contains<T: std::fmt::Debug>(result: anyhow::Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn stable_fixed_point_exponent_matches_log_slope() {
        // r = 0.5 drives the orbit to 0, where f'(0) = r.
        let exponent = lyapunov_exponent(&BuiltinMap::Logistic, 0.5, 0.5, 2000, 100);
        assert!((exponent - 0.5f64.ln()).abs() < 1e-9, "got {exponent}");
    }

    #[test]
    fn chaotic_regime_has_positive_exponent() {
        let exponent = lyapunov_exponent(&BuiltinMap::Logistic, 3.9, 0.3, 500, 5000);
        assert!(exponent > 0.3 && exponent < 0.7, "got {exponent}");

        let periodic = lyapunov_exponent(&BuiltinMap::Logistic, 3.2, 0.3, 500, 5000);
        assert!(periodic < 0.0, "got {periodic}");
    }

    #[test]
    fn superstable_point_yields_negative_infinity() {
        // x* = 0.5 at r = 2 has f'(x*) = 0.
        let exponent = lyapunov_exponent(&BuiltinMap::Logistic, 2.0, 0.5, 0, 10);
        assert_eq!(exponent, f64::NEG_INFINITY);
    }

    #[test]
    fn sweep_matches_per_rate_estimates_on_both_backends() {
        let mut settings = SimulationSettings {
            num_gens: 300,
            rate_min: 2.9,
            rate_max: 3.9,
            num_rates: 11,
            num_discard: 100,
            initial_pop: 0.3,
            backend: ExecutionBackend::Serial,
        };
        let serial = lyapunov_sweep(&BuiltinMap::Logistic, &settings).expect("serial");
        settings.backend = ExecutionBackend::Parallel;
        let parallel = lyapunov_sweep(&BuiltinMap::Logistic, &settings).expect("parallel");
        assert_eq!(serial.len(), 11);
        for (a, b) in serial.iter().zip(&parallel) {
            assert_eq!(a.rate.to_bits(), b.rate.to_bits());
            assert_eq!(a.exponent.to_bits(), b.exponent.to_bits());
        }
        let LyapunovPoint { rate, exponent } = serial[3];
        assert_eq!(
            exponent,
            lyapunov_exponent(&BuiltinMap::Logistic, rate, 0.3, 100, 300)
        );
    }

    #[test]
    fn expression_maps_match_builtins() {
        let settings = SimulationSettings {
            num_gens: 200,
            rate_min: 3.0,
            rate_max: 4.0,
            num_rates: 6,
            num_discard: 50,
            ..SimulationSettings::default()
        };
        let expression = ExpressionMap::compile("x * r * (1 - x)").expect("compile");
        let from_expr = lyapunov_sweep(&expression, &settings).expect("expression");
        let from_builtin = lyapunov_sweep(&BuiltinMap::Logistic, &settings).expect("builtin");
        assert_eq!(from_expr, from_builtin);
    }

    #[test]
    fn zero_power_terms_do_not_poison_the_exponent() {
        // Burn-in drives the orbit to exactly 0, where x^0 used to give a NaN slope.
        let expression = ExpressionMap::compile("r * x * (1 - x) + x^0 - 1").expect("compile");
        let exponent = lyapunov_exponent(&expression, 0.5, 0.5, 2000, 100);
        assert!((exponent - 0.5f64.ln()).abs() < 1e-9, "got {exponent}");
    }

    #[test]
    fn sweep_validates_settings() {
        let settings = SimulationSettings {
            num_gens: 0,
            ..SimulationSettings::default()
        };
        assert_err_contains(lyapunov_sweep(&BuiltinMap::Cubic, &settings), "num_gens");
    }
}
