//! Point sets handed to the rendering layer.
//!
//! Each extractor turns simulation output (or a map evaluated directly) into
//! plain coordinates. Nothing here draws; ordering is preserved exactly so
//! that connected paths render correctly.

pub mod bifurcation;
pub mod cobweb;
pub mod phase;

use serde::{Deserialize, Serialize};

pub use bifurcation::to_bifurcation_points;
pub use cobweb::{cobweb_diagram, cobweb_vertices, function_curve, CobwebDiagram, CobwebSettings};
pub use phase::{to_phase_points, to_phase_points_with, PhasePoints, PhaseRun, PhaseSettings};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point2 {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}
