use super::Point2;
use crate::simulate::TrajectoryTable;

/// One `(rate, population)` point per table cell, rate by rate in sweep
/// order and generation by generation within a rate. Nothing is filtered.
pub fn to_bifurcation_points(table: &TrajectoryTable) -> Vec<Point2> {
    let mut points = Vec::with_capacity(table.num_gens() * table.num_rates());
    for (rate, column) in table.columns() {
        points.extend(column.iter().map(|&pop| Point2::new(rate, pop)));
    }
    points
}
