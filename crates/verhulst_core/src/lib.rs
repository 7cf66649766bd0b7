pub mod autodiff;
pub mod error;
pub mod expression;
pub mod lyapunov;
pub mod maps;
pub mod points;
pub mod simulate;
/// The `verhulst_core` crate is the simulation engine behind Verhulst's
/// bifurcation, phase and cobweb diagrams for one-dimensional iterated maps.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction) and `IteratedMap` (any `f(pop, rate)`).
/// - **Maps**: the logistic, cubic and singer maps, plus `ExpressionMap` for user formulas.
/// - **Simulate**: rate sweeps with transient discard into a `TrajectoryTable`.
/// - **Points**: bifurcation, delay-embedded phase, and cobweb point sets for rendering.
/// - **Lyapunov**: exponent sweeps using `Dual` number differentiation.
pub mod traits;
pub mod util;

pub use error::SimulationError;
pub use expression::ExpressionMap;
pub use maps::{cubic_map, logistic_map, singer_map, BuiltinMap};
pub use simulate::{simulate, simulate_with, ExecutionBackend, SimulationSettings, TrajectoryTable};
pub use traits::{IteratedMap, Scalar};
