/// `count` evenly spaced values over `[start, end]`, both ends included.
///
/// Value `i` is `start + i * step` with the last value pinned to `end`, so
/// sweeps land exactly on their endpoints. A single value is `start`; zero
/// values is an empty vector.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            let mut values: Vec<f64> = (0..count).map(|i| start + step * i as f64).collect();
            values[count - 1] = end;
            values
        }
    }
}
