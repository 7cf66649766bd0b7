use thiserror::Error;

/// Argument validation failures. Every operation checks its inputs before
/// doing any work, so an error always means nothing was computed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("num_gens must be at least 1")]
    ZeroGenerations,
    #[error("num_rates must be at least 1")]
    ZeroRates,
    #[error("rate bounds must be finite, got rate_min = {min}, rate_max = {max}")]
    NonFiniteRate { min: f64, max: f64 },
    #[error("rate_min ({min}) must not exceed rate_max ({max})")]
    InvertedRange { min: f64, max: f64 },
    #[error("a {num_gens} x {num_rates} trajectory table overflows usize")]
    TableTooLarge { num_gens: usize, num_rates: usize },
    #[error("phase embedding supports 2 or 3 dimensions, got {0}")]
    UnsupportedDimensions(usize),
}
