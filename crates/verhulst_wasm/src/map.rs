//! Map wrapper shared by all exported runners, plus boundary helpers.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use std::fmt::Display;
use verhulst_core::expression::{DEFAULT_POP_NAMES, DEFAULT_RATE_NAMES};
use verhulst_core::maps::BuiltinMap;
use verhulst_core::{ExecutionBackend, ExpressionMap, IteratedMap, Scalar, SimulationSettings};
use wasm_bindgen::prelude::*;

pub(crate) enum MapKind {
    Builtin(BuiltinMap),
    Expression(ExpressionMap),
}

impl MapKind {
    pub(crate) fn from_name(name: &str) -> anyhow::Result<Self> {
        Ok(MapKind::Builtin(name.parse()?))
    }

    pub(crate) fn from_expression<'a>(
        source: &str,
        pop_names: &'a [String],
        rate_names: &'a [String],
    ) -> anyhow::Result<Self> {
        let names = |given: &'a [String], fallback: &'a [&'a str]| -> Vec<&'a str> {
            if given.is_empty() {
                fallback.to_vec()
            } else {
                given.iter().map(String::as_str).collect()
            }
        };
        let pop = names(pop_names, DEFAULT_POP_NAMES);
        let rate = names(rate_names, DEFAULT_RATE_NAMES);
        Ok(MapKind::Expression(ExpressionMap::compile_with(
            source, &pop, &rate,
        )?))
    }

    pub(crate) fn label(&self) -> String {
        match self {
            MapKind::Builtin(map) => map.name().to_string(),
            MapKind::Expression(map) => map.source().to_string(),
        }
    }
}

impl<T: Scalar> IteratedMap<T> for MapKind {
    fn evaluate(&self, pop: T, rate: T) -> T {
        match self {
            MapKind::Builtin(map) => IteratedMap::<T>::evaluate(map, pop, rate),
            MapKind::Expression(map) => IteratedMap::<T>::evaluate(map, pop, rate),
        }
    }
}

#[wasm_bindgen]
pub struct WasmMap {
    pub(crate) map: MapKind,
}

#[wasm_bindgen]
impl WasmMap {
    /// Built-in map by name: `logistic`, `cubic` or `singer`.
    #[wasm_bindgen(constructor)]
    pub fn new(name: &str) -> Result<WasmMap, JsValue> {
        console_error_panic_hook::set_once();
        let map = MapKind::from_name(name).map_err(js_error)?;
        Ok(WasmMap { map })
    }

    /// Map given by a formula in the population and rate. An empty name list
    /// falls back to `x`/`pop` or `r`/`rate`.
    pub fn from_expression(
        source: &str,
        pop_names: Vec<String>,
        rate_names: Vec<String>,
    ) -> Result<WasmMap, JsValue> {
        console_error_panic_hook::set_once();
        let map = MapKind::from_expression(source, &pop_names, &rate_names).map_err(js_error)?;
        Ok(WasmMap { map })
    }

    pub fn name(&self) -> String {
        self.map.label()
    }

    pub fn evaluate(&self, pop: f64, rate: f64) -> f64 {
        IteratedMap::<f64>::evaluate(&self.map, pop, rate)
    }
}

pub(crate) fn js_error(err: impl Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Deserializes a settings object; `undefined` and `null` give the defaults.
pub(crate) fn settings_from<T: DeserializeOwned + Default>(value: JsValue) -> Result<T, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    from_value(value).map_err(|e| JsValue::from_str(&format!("Invalid settings: {}", e)))
}

pub(crate) fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// The browser build has no worker pool, so sweeps run on the calling thread.
pub(crate) fn for_host(mut settings: SimulationSettings) -> SimulationSettings {
    if cfg!(target_arch = "wasm32") {
        settings.backend = ExecutionBackend::Serial;
    }
    settings
}
