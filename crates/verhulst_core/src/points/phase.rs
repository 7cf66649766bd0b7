//! Delay-coordinate embedding of trajectories.
//!
//! Every run (one column of a [`TrajectoryTable`]) is turned into points
//! `(p[t], p[t+1])` or `(p[t], p[t+1], p[t+2])`. Runs are keyed by their
//! sweep index; the rate travels along as a label only, so two sweep entries
//! with the same numeric rate stay separate.

use crate::error::SimulationError;
use crate::simulate::TrajectoryTable;
use serde::{Deserialize, Serialize};
use std::slice::ChunksExact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseSettings {
    /// Leading generations dropped before embedding. The first generation is
    /// the shared initial population of every run, so one is dropped by
    /// default.
    pub discard_gens: usize,
    pub dimensions: usize,
}

impl Default for PhaseSettings {
    fn default() -> Self {
        Self {
            discard_gens: 1,
            dimensions: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseRun {
    /// Sweep index of the originating column.
    pub run: usize,
    pub rate: f64,
    /// Point coordinates, `dimensions` values per point.
    pub coords: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhasePoints {
    pub dimensions: usize,
    /// Rows actually dropped from the front of every run.
    pub discarded: usize,
    pub runs: Vec<PhaseRun>,
}

impl PhasePoints {
    /// Total number of points across all runs.
    pub fn len(&self) -> usize {
        self.runs.iter().map(|run| run.coords.len()).sum::<usize>() / self.dimensions
    }

    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|run| run.coords.is_empty())
    }

    /// Points of the run at sweep index `run`, or `None` if there is no such
    /// run.
    pub fn run_points(&self, run: usize) -> Option<ChunksExact<'_, f64>> {
        self.runs
            .get(run)
            .map(|run| run.coords.chunks_exact(self.dimensions))
    }

    /// `(run, rate, coordinates)` for every point, grouped by run.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64, &[f64])> + '_ {
        self.runs.iter().flat_map(move |run| {
            run.coords
                .chunks_exact(self.dimensions)
                .map(move |coords| (run.run, run.rate, coords))
        })
    }
}

pub fn to_phase_points(
    table: &TrajectoryTable,
    discard_gens: usize,
    dimensions: usize,
) -> Result<PhasePoints, SimulationError> {
    if !(2..=3).contains(&dimensions) {
        return Err(SimulationError::UnsupportedDimensions(dimensions));
    }

    let num_gens = table.num_gens();
    let discarded = if discard_gens > 0 && discard_gens < num_gens {
        discard_gens
    } else {
        0
    };
    let kept = num_gens - discarded;
    let per_run = (kept + 1).saturating_sub(dimensions);

    let runs = table
        .columns()
        .enumerate()
        .map(|(run, (rate, column))| {
            let window = &column[discarded..];
            let mut coords = Vec::with_capacity(per_run * dimensions);
            for start in 0..per_run {
                coords.extend_from_slice(&window[start..start + dimensions]);
            }
            PhaseRun { run, rate, coords }
        })
        .collect();

    Ok(PhasePoints {
        dimensions,
        discarded,
        runs,
    })
}

pub fn to_phase_points_with(
    table: &TrajectoryTable,
    settings: &PhaseSettings,
) -> Result<PhasePoints, SimulationError> {
    to_phase_points(table, settings.discard_gens, settings.dimensions)
}
