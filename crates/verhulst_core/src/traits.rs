use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in our maps.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// Lifts an `f64` literal into `T`. Every `Scalar` we ship converts losslessly;
/// a type that cannot represent the value yields NaN rather than panicking.
#[inline(always)]
pub fn lit<T: Scalar>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::nan)
}

/// A one-dimensional iterated map `pop_{n+1} = f(pop_n, rate)`.
///
/// Implementations must be pure: the same inputs always produce the same
/// output, and no input is rejected. Values outside `[0, 1]` and non-finite
/// results are returned as-is.
pub trait IteratedMap<T: Scalar = f64> {
    fn evaluate(&self, pop: T, rate: T) -> T;
}

impl<F> IteratedMap<f64> for F
where
    F: Fn(f64, f64) -> f64,
{
    #[inline(always)]
    fn evaluate(&self, pop: f64, rate: f64) -> f64 {
        self(pop, rate)
    }
}
