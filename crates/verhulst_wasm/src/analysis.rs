//! Lyapunov exponent sweeps.

use crate::map::{for_host, js_error, settings_from, to_js, MapKind, WasmMap};
use verhulst_core::lyapunov::{lyapunov_sweep, LyapunovPoint};
use verhulst_core::SimulationSettings;
use wasm_bindgen::prelude::*;

pub(crate) fn run_lyapunov(
    map: &MapKind,
    settings: SimulationSettings,
) -> anyhow::Result<Vec<LyapunovPoint>> {
    lyapunov_sweep(map, &for_host(settings))
}

#[wasm_bindgen]
impl WasmMap {
    /// Exponent per rate as `[{ rate, exponent }, ...]`. `num_discard` sets
    /// the burn-in and `num_gens` the averaging window.
    pub fn lyapunov(&self, settings_val: JsValue) -> Result<JsValue, JsValue> {
        let settings: SimulationSettings = settings_from(settings_val)?;
        let points = run_lyapunov(&self.map, settings).map_err(js_error)?;
        to_js(&points)
    }
}

#[cfg(test)]
mod tests {
    use super::run_lyapunov;
    use crate::map::MapKind;
    use verhulst_core::SimulationSettings;

    #[test]
    fn expression_and_builtin_agree() {
        let settings = SimulationSettings {
            num_gens: 400,
            rate_min: 3.0,
            rate_max: 3.9,
            num_rates: 4,
            num_discard: 100,
            ..SimulationSettings::default()
        };
        let builtin = MapKind::from_name("logistic").expect("builtin");
        let expression =
            MapKind::from_expression("r * x * (1 - x)", &[], &[]).expect("expression");
        let a = run_lyapunov(&builtin, settings).expect("builtin sweep");
        let b = run_lyapunov(&expression, settings).expect("expression sweep");
        assert_eq!(a.len(), 4);
        for (a, b) in a.iter().zip(&b) {
            assert_eq!(a.rate, b.rate);
            assert!((a.exponent - b.exponent).abs() < 1e-9, "{a:?} vs {b:?}");
        }
        assert!(a[3].exponent > 0.0);
    }

    #[test]
    fn invalid_sweeps_are_rejected() {
        let settings = SimulationSettings {
            rate_min: 4.0,
            rate_max: 1.0,
            ..SimulationSettings::default()
        };
        let map = MapKind::from_name("logistic").expect("builtin");
        let err = run_lyapunov(&map, settings).expect_err("inverted range");
        assert!(err.to_string().contains("rate_min"), "got {err}");
    }
}
