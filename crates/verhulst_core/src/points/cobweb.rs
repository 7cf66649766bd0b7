//! Cobweb construction for a single rate.
//!
//! Starting on the x-axis at `(x0, 0)`, each iteration draws a vertical
//! segment up to the curve at `(x, f(x))`, a horizontal segment across to the
//! diagonal at `(f(x), f(x))`, then a vertical segment to the curve again at
//! `(f(x), f(f(x)))`. The vertices form one connected polyline, so their order
//! is part of the result.

use super::Point2;
use crate::traits::IteratedMap;
use crate::util::linspace;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CobwebSettings {
    pub rate: f64,
    /// Starting population of the cobweb path.
    pub x0: f64,
    /// Iterations of the cobweb path.
    pub cobweb_n: usize,
    /// Samples of the reference curve.
    pub function_n: usize,
    /// Leading path vertices dropped from the result.
    pub num_discard: usize,
    pub start: f64,
    pub end: f64,
}

impl Default for CobwebSettings {
    fn default() -> Self {
        Self {
            rate: 0.0,
            x0: 0.5,
            cobweb_n: 100,
            function_n: 1000,
            num_discard: 0,
            start: 0.0,
            end: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CobwebDiagram {
    pub rate: f64,
    /// Sampled `(x, f(x))` reference curve; not connected to the path.
    pub curve: Vec<Point2>,
    /// Cobweb path vertices in drawing order.
    pub vertices: Vec<Point2>,
}

/// Vertices of `n` cobweb iterations from `x0`: three per iteration after
/// the starting `(x0, 0)`, so `3n + 1` points in all.
pub fn cobweb_vertices<M>(map: &M, rate: f64, x0: f64, n: usize) -> Vec<Point2>
where
    M: IteratedMap + ?Sized,
{
    let mut vertices = Vec::with_capacity(3 * n + 1);
    vertices.push(Point2::new(x0, 0.0));
    let mut x = x0;
    for _ in 0..n {
        let y1 = map.evaluate(x, rate);
        vertices.push(Point2::new(x, y1));
        vertices.push(Point2::new(y1, y1));
        let y2 = map.evaluate(y1, rate);
        vertices.push(Point2::new(y1, y2));
        x = y1;
    }
    vertices
}

/// `n` evenly spaced samples of `(x, f(x))` over `[start, end]`.
pub fn function_curve<M>(map: &M, rate: f64, n: usize, start: f64, end: f64) -> Vec<Point2>
where
    M: IteratedMap + ?Sized,
{
    linspace(start, end, n)
        .into_iter()
        .map(|x| Point2::new(x, map.evaluate(x, rate)))
        .collect()
}

pub fn cobweb_diagram<M>(map: &M, settings: &CobwebSettings) -> CobwebDiagram
where
    M: IteratedMap + ?Sized,
{
    debug!(
        rate = settings.rate,
        x0 = settings.x0,
        cobweb_n = settings.cobweb_n,
        function_n = settings.function_n,
        "building cobweb diagram"
    );
    let curve = function_curve(
        map,
        settings.rate,
        settings.function_n,
        settings.start,
        settings.end,
    );
    let mut vertices = cobweb_vertices(map, settings.rate, settings.x0, settings.cobweb_n);
    let skip = settings.num_discard.min(vertices.len());
    vertices.drain(..skip);

    CobwebDiagram {
        rate: settings.rate,
        curve,
        vertices,
    }
}
