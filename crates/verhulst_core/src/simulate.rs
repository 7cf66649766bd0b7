//! Multi-rate trajectory simulation.
//!
//! For every rate in an evenly spaced sweep the map is iterated from the same
//! initial population: first `num_discard` warm-up steps that are thrown away,
//! then `num_gens` steps that are kept. Rates never interact, so each column
//! of the result is filled independently, either in order on the calling
//! thread or in parallel on the rayon pool. Both backends run the identical
//! per-column loop and therefore produce bit-identical tables.

use crate::error::SimulationError;
use crate::traits::IteratedMap;
use crate::util::linspace;
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::mem::size_of;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionBackend {
    /// One column after another on the calling thread.
    Serial,
    /// Columns spread over the rayon thread pool.
    #[default]
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Generations kept per rate.
    pub num_gens: usize,
    pub rate_min: f64,
    pub rate_max: f64,
    pub num_rates: usize,
    /// Warm-up generations run before recording starts.
    pub num_discard: usize,
    pub initial_pop: f64,
    pub backend: ExecutionBackend,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            num_gens: 50,
            rate_min: 0.5,
            rate_max: 4.0,
            num_rates: 8,
            num_discard: 0,
            initial_pop: 0.5,
            backend: ExecutionBackend::Parallel,
        }
    }
}

impl SimulationSettings {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.num_gens == 0 {
            return Err(SimulationError::ZeroGenerations);
        }
        if self.num_rates == 0 {
            return Err(SimulationError::ZeroRates);
        }
        if !self.rate_min.is_finite() || !self.rate_max.is_finite() {
            return Err(SimulationError::NonFiniteRate {
                min: self.rate_min,
                max: self.rate_max,
            });
        }
        if self.rate_min > self.rate_max {
            return Err(SimulationError::InvertedRange {
                min: self.rate_min,
                max: self.rate_max,
            });
        }
        let bytes = self
            .num_gens
            .checked_mul(self.num_rates)
            .and_then(|cells| cells.checked_mul(size_of::<f64>()));
        if !bytes.is_some_and(|bytes| bytes <= isize::MAX as usize) {
            return Err(SimulationError::TableTooLarge {
                num_gens: self.num_gens,
                num_rates: self.num_rates,
            });
        }
        Ok(())
    }

    /// The rate sweep: `num_rates` values from `rate_min` to `rate_max`.
    pub fn rates(&self) -> Vec<f64> {
        linspace(self.rate_min, self.rate_max, self.num_rates)
    }
}

/// Population values indexed by (generation, rate).
///
/// Stored as a `num_gens x num_rates` matrix whose columns follow the sweep
/// order, next to the ordered list of rate keys. nalgebra keeps matrices
/// column-major, so each rate's trajectory is one contiguous slice.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryTable {
    rates: Vec<f64>,
    values: DMatrix<f64>,
}

impl TrajectoryTable {
    /// Builds a table from rate keys and a matrix with one column per rate.
    /// Returns `None` unless the keys match the columns and there is at least
    /// one generation.
    pub fn from_columns(rates: Vec<f64>, values: DMatrix<f64>) -> Option<Self> {
        (rates.len() == values.ncols() && values.nrows() > 0).then_some(Self { rates, values })
    }

    pub fn num_gens(&self) -> usize {
        self.values.nrows()
    }

    pub fn num_rates(&self) -> usize {
        self.values.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.shape()
    }

    pub fn rates(&self) -> &[f64] {
        &self.rates
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn get(&self, generation: usize, rate_index: usize) -> Option<f64> {
        self.values.get((generation, rate_index)).copied()
    }

    /// The trajectory recorded for sweep entry `rate_index`, or `None` past
    /// the end of the sweep.
    pub fn column(&self, rate_index: usize) -> Option<&[f64]> {
        let n = self.num_gens();
        let start = rate_index.checked_mul(n)?;
        self.values.as_slice().get(start..start.checked_add(n)?)
    }

    /// `(rate, trajectory)` for every sweep entry, in sweep order.
    pub fn columns(&self) -> impl Iterator<Item = (f64, &[f64])> + '_ {
        self.rates
            .iter()
            .copied()
            .zip(self.values.as_slice().chunks_exact(self.num_gens()))
    }

    /// Population values at one generation across the whole sweep.
    pub fn row(&self, generation: usize) -> Vec<f64> {
        self.values.row(generation).iter().copied().collect()
    }

    /// All cells, column after column.
    pub fn as_column_major(&self) -> &[f64] {
        self.values.as_slice()
    }

    pub fn into_parts(self) -> (Vec<f64>, DMatrix<f64>) {
        (self.rates, self.values)
    }
}

/// Runs `map` over the rate sweep and returns the kept generations.
///
/// Argument order mirrors the usual command-line and notebook usage. Uses
/// the parallel backend; see [`simulate_with`] to pick one.
pub fn simulate<M>(
    map: &M,
    num_gens: usize,
    rate_min: f64,
    rate_max: f64,
    num_rates: usize,
    num_discard: usize,
    initial_pop: f64,
) -> Result<TrajectoryTable, SimulationError>
where
    M: IteratedMap + Sync + ?Sized,
{
    let settings = SimulationSettings {
        num_gens,
        rate_min,
        rate_max,
        num_rates,
        num_discard,
        initial_pop,
        backend: ExecutionBackend::Parallel,
    };
    simulate_with(map, &settings)
}

pub fn simulate_with<M>(
    map: &M,
    settings: &SimulationSettings,
) -> Result<TrajectoryTable, SimulationError>
where
    M: IteratedMap + Sync + ?Sized,
{
    settings.validate()?;

    let num_gens = settings.num_gens;
    let rates = settings.rates();
    debug!(
        num_gens,
        num_rates = settings.num_rates,
        num_discard = settings.num_discard,
        rate_min = settings.rate_min,
        rate_max = settings.rate_max,
        backend = ?settings.backend,
        "simulating rate sweep"
    );

    let mut values = DMatrix::<f64>::zeros(num_gens, rates.len());
    let columns = values.as_mut_slice();
    match settings.backend {
        ExecutionBackend::Serial => {
            for (column, &rate) in columns.chunks_exact_mut(num_gens).zip(&rates) {
                run_trajectory(map, rate, settings.num_discard, settings.initial_pop, column);
            }
        }
        ExecutionBackend::Parallel => {
            columns
                .par_chunks_exact_mut(num_gens)
                .zip(rates.par_iter())
                .for_each(|(column, &rate)| {
                    run_trajectory(map, rate, settings.num_discard, settings.initial_pop, column);
                });
        }
    }

    debug!(cells = values.len(), "rate sweep finished");
    Ok(TrajectoryTable { rates, values })
}

/// Burns in `num_discard` steps, then records the population before each of
/// the next `out.len()` applications.
#[inline]
pub fn run_trajectory<M>(map: &M, rate: f64, num_discard: usize, initial_pop: f64, out: &mut [f64])
where
    M: IteratedMap + ?Sized,
{
    let mut pop = initial_pop;
    for _ in 0..num_discard {
        pop = map.evaluate(pop, rate);
    }
    for slot in out.iter_mut() {
        *slot = pop;
        pop = map.evaluate(pop, rate);
    }
}

#[cfg(test)]
mod tests {
    use super::{
        run_trajectory, simulate, simulate_with, ExecutionBackend, SimulationSettings,
        TrajectoryTable,
    };
    use crate::error::SimulationError;
    use crate::maps::{logistic_map, BuiltinMap};
    use nalgebra::DMatrix;

    #[test]
    fn simulate_logistic_single_rate_matches_hand_iteration() {
        let table = simulate(&BuiltinMap::Logistic, 5, 3.0, 3.0, 1, 0, 0.5).expect("simulate");
        assert_eq!(table.shape(), (5, 1));
        assert_eq!(table.rates(), &[3.0]);

        let expected = [0.5, 0.75, 0.5625, 0.73828125, 0.5796661376953125];
        for (value, want) in table.column(0).expect("column").iter().zip(expected) {
            assert!((value - want).abs() < 1e-12, "expected {want}, got {value}");
        }
    }

    #[test]
    fn simulate_has_requested_shape() {
        let table = simulate(&BuiltinMap::Logistic, 200, 3.7, 3.9, 100, 100, 0.5).expect("simulate");
        assert_eq!(table.shape(), (200, 100));
        assert_eq!(table.num_gens(), 200);
        assert_eq!(table.num_rates(), 100);
        assert_eq!(table.rates().len(), 100);
        assert_eq!(table.as_column_major().len(), 200 * 100);
    }

    #[test]
    fn single_rate_sweep_uses_rate_min() {
        let table = simulate(&BuiltinMap::Cubic, 3, 1.5, 3.5, 1, 0, 0.2).expect("simulate");
        assert_eq!(table.rates(), &[1.5]);
    }

    #[test]
    fn serial_and_parallel_backends_are_bit_identical() {
        let mut settings = SimulationSettings {
            num_gens: 300,
            rate_min: 0.0,
            rate_max: 4.0,
            num_rates: 100,
            num_discard: 50,
            initial_pop: 0.5,
            backend: ExecutionBackend::Serial,
        };
        for map in BuiltinMap::ALL {
            settings.backend = ExecutionBackend::Serial;
            let serial = simulate_with(&map, &settings).expect("serial");
            settings.backend = ExecutionBackend::Parallel;
            let parallel = simulate_with(&map, &settings).expect("parallel");
            let serial_bits: Vec<u64> = serial.as_column_major().iter().map(|v| v.to_bits()).collect();
            let parallel_bits: Vec<u64> =
                parallel.as_column_major().iter().map(|v| v.to_bits()).collect();
            assert_eq!(serial_bits, parallel_bits, "backends diverged for {map}");
        }
    }

    #[test]
    fn discard_equals_restarting_from_burned_in_state() {
        let rate = 3.83;
        let discard = 17;
        let mut pop = 0.3;
        for _ in 0..discard {
            pop = logistic_map(pop, rate);
        }

        let warmed = simulate(&BuiltinMap::Logistic, 40, rate, rate, 1, discard, 0.3).expect("warmed");
        let restarted = simulate(&BuiltinMap::Logistic, 40, rate, rate, 1, 0, pop).expect("restart");
        assert_eq!(warmed, restarted);
    }

    #[test]
    fn simulate_accepts_closures_and_trait_objects() {
        let doubling = |pop: f64, rate: f64| pop * rate;
        let table = simulate(&doubling, 4, 2.0, 2.0, 1, 0, 1.0).expect("closure");
        assert_eq!(table.column(0), Some(&[1.0, 2.0, 4.0, 8.0][..]));

        let dynamic: &(dyn crate::traits::IteratedMap + Sync) = &BuiltinMap::Logistic;
        let table = simulate(dynamic, 2, 2.0, 2.0, 1, 0, 0.5).expect("dyn map");
        assert_eq!(table.column(0), Some(&[0.5, 0.5][..]));
    }

    #[test]
    fn divergent_trajectories_propagate_non_finite_values() {
        let table = simulate(&BuiltinMap::Logistic, 12, 4.0, 4.0, 1, 0, 3.0).expect("simulate");
        let last = table.column(0).expect("column")[11];
        assert!(last.is_infinite() && last < 0.0, "expected -inf, got {last}");
    }

    #[test]
    fn simulate_rejects_invalid_arguments() {
        let map = BuiltinMap::Logistic;
        assert_eq!(
            simulate(&map, 0, 0.5, 4.0, 8, 0, 0.5),
            Err(SimulationError::ZeroGenerations)
        );
        assert_eq!(
            simulate(&map, 10, 0.5, 4.0, 0, 0, 0.5),
            Err(SimulationError::ZeroRates)
        );
        assert_eq!(
            simulate(&map, 10, 4.0, 0.5, 8, 0, 0.5),
            Err(SimulationError::InvertedRange { min: 4.0, max: 0.5 })
        );
        assert!(matches!(
            simulate(&map, 10, f64::NAN, 0.5, 8, 0, 0.5),
            Err(SimulationError::NonFiniteRate { .. })
        ));
        assert!(matches!(
            simulate(&map, usize::MAX, 0.5, 4.0, 2, 0, 0.5),
            Err(SimulationError::TableTooLarge { .. })
        ));
    }

    #[test]
    fn tables_whose_byte_size_overflows_are_rejected_before_allocating() {
        let map = BuiltinMap::Logistic;
        // The cell count fits in usize but the bytes do not.
        assert_eq!(
            simulate(&map, usize::MAX / 4, 0.5, 4.0, 1, 0, 0.5),
            Err(SimulationError::TableTooLarge {
                num_gens: usize::MAX / 4,
                num_rates: 1,
            })
        );
        let settings = SimulationSettings {
            num_gens: isize::MAX as usize / 8 + 1,
            num_rates: 1,
            ..SimulationSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SimulationError::TableTooLarge { .. })
        ));
        let largest = SimulationSettings {
            num_gens: isize::MAX as usize / 8,
            ..settings
        };
        assert_eq!(largest.validate(), Ok(()));
    }

    #[test]
    fn simulation_settings_defaults_and_partial_deserialization() {
        let settings = SimulationSettings::default();
        assert_eq!(settings.num_gens, 50);
        assert_eq!(settings.num_rates, 8);
        assert_eq!(settings.rates().first(), Some(&0.5));
        assert_eq!(settings.rates().last(), Some(&4.0));

        let parsed: SimulationSettings =
            serde_json::from_str(r#"{"num_gens": 200, "backend": "serial"}"#).expect("json");
        assert_eq!(parsed.num_gens, 200);
        assert_eq!(parsed.backend, ExecutionBackend::Serial);
        assert_eq!(parsed.rate_max, 4.0);

        let negative = serde_json::from_str::<SimulationSettings>(r#"{"num_discard": -1}"#);
        assert!(negative.is_err());
    }

    #[test]
    fn run_trajectory_records_before_each_application() {
        let mut out = [0.0; 3];
        run_trajectory(&|pop: f64, _rate: f64| pop + 1.0, 0.0, 2, 10.0, &mut out);
        assert_eq!(out, [12.0, 13.0, 14.0]);
    }

    #[test]
    fn trajectory_table_accessors() {
        let matrix = DMatrix::from_column_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let table = TrajectoryTable::from_columns(vec![0.1, 0.2, 0.3], matrix).expect("table");
        assert_eq!(table.column(1), Some(&[3.0, 4.0][..]));
        assert_eq!(table.column(3), None);
        assert_eq!(table.column(usize::MAX), None);
        assert_eq!(table.column(usize::MAX / 2), None);
        assert_eq!(table.row(1), vec![2.0, 4.0, 6.0]);
        assert_eq!(table.get(0, 2), Some(5.0));
        assert_eq!(table.get(2, 0), None);
        let columns: Vec<(f64, Vec<f64>)> =
            table.columns().map(|(rate, col)| (rate, col.to_vec())).collect();
        assert_eq!(columns[2], (0.3, vec![5.0, 6.0]));

        let mismatched = TrajectoryTable::from_columns(vec![0.1], DMatrix::zeros(2, 3));
        assert!(mismatched.is_none());
        let empty = TrajectoryTable::from_columns(vec![0.1], DMatrix::zeros(0, 1));
        assert!(empty.is_none());
    }
}
