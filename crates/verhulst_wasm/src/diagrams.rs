//! Trajectory sweeps and the point sets drawn from them.

use crate::map::{for_host, js_error, settings_from, to_js, MapKind, WasmMap};
use js_sys::Float64Array;
use serde::Serialize;
use verhulst_core::points::{
    cobweb_diagram, function_curve, to_bifurcation_points, to_phase_points_with, CobwebSettings,
    PhaseSettings, Point2,
};
use verhulst_core::{simulate_with, SimulationSettings, TrajectoryTable};
use wasm_bindgen::prelude::*;

/// Trajectory table as sent to JS: one column of `num_gens` values per rate,
/// columns laid end to end.
#[derive(Debug, Serialize)]
pub(crate) struct TrajectoryPayload {
    pub rates: Vec<f64>,
    pub num_gens: usize,
    pub values: Vec<f64>,
}

impl From<TrajectoryTable> for TrajectoryPayload {
    fn from(table: TrajectoryTable) -> Self {
        let num_gens = table.num_gens();
        let (rates, values) = table.into_parts();
        Self {
            rates,
            num_gens,
            values: values.as_slice().to_vec(),
        }
    }
}

pub(crate) fn run_sweep(
    map: &MapKind,
    settings: SimulationSettings,
) -> anyhow::Result<TrajectoryTable> {
    Ok(simulate_with(map, &for_host(settings))?)
}

/// Flattens points to `[x0, y0, x1, y1, ...]`.
pub(crate) fn interleave(points: &[Point2]) -> Vec<f64> {
    points.iter().flat_map(|p| [p.x, p.y]).collect()
}

#[wasm_bindgen]
impl WasmMap {
    /// Runs a rate sweep and returns `{ rates, num_gens, values }`.
    pub fn simulate(&self, settings_val: JsValue) -> Result<JsValue, JsValue> {
        let settings: SimulationSettings = settings_from(settings_val)?;
        let table = run_sweep(&self.map, settings).map_err(js_error)?;
        to_js(&TrajectoryPayload::from(table))
    }

    /// Every `(rate, population)` cell of a sweep, interleaved.
    pub fn bifurcation_points(&self, settings_val: JsValue) -> Result<Float64Array, JsValue> {
        let settings: SimulationSettings = settings_from(settings_val)?;
        let table = run_sweep(&self.map, settings).map_err(js_error)?;
        let points = to_bifurcation_points(&table);
        Ok(Float64Array::from(interleave(&points).as_slice()))
    }

    /// Delay-embedded points of every run in a sweep, grouped by run.
    pub fn phase_points(
        &self,
        sim_settings: JsValue,
        phase_settings: JsValue,
    ) -> Result<JsValue, JsValue> {
        let settings: SimulationSettings = settings_from(sim_settings)?;
        let phase: PhaseSettings = settings_from(phase_settings)?;
        let table = run_sweep(&self.map, settings).map_err(js_error)?;
        let points = to_phase_points_with(&table, &phase).map_err(js_error)?;
        to_js(&points)
    }

    /// Cobweb path and reference curve at one rate.
    pub fn cobweb(&self, settings_val: JsValue) -> Result<JsValue, JsValue> {
        let settings: CobwebSettings = settings_from(settings_val)?;
        to_js(&cobweb_diagram(&self.map, &settings))
    }

    /// `n` samples of `(x, f(x))` over `[start, end]`, interleaved.
    pub fn function_curve(&self, rate: f64, n: u32, start: f64, end: f64) -> Float64Array {
        let points = function_curve(&self.map, rate, n as usize, start, end);
        Float64Array::from(interleave(&points).as_slice())
    }
}
