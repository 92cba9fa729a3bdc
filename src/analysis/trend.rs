use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub peak_pressure: u32,
    pub contact_area: f64,
}

/// Indices picked when thinning `len` points down to `max_points`.
///
/// Evenly spaced over `[0, len - 1]`, always including both ends. Ties
/// round to even.
pub fn sample_indices(len: usize, max_points: usize) -> Vec<usize> {
    if len <= max_points {
        return (0..len).collect();
    }

    match max_points {
        0 => Vec::new(),
        1 => vec![0],
        _ => {
            let step = (len - 1) as f64 / (max_points - 1) as f64;
            (0..max_points)
                .map(|i| ((i as f64 * step).round_ties_even() as usize).min(len - 1))
                .collect()
        }
    }
}

/// Order-preserving subsample of at most `max_points` items. No averaging:
/// every returned item is one of the inputs.
pub fn downsample<T: Clone>(points: &[T], max_points: usize) -> Vec<T> {
    sample_indices(points.len(), max_points)
        .into_iter()
        .map(|i| points[i].clone())
        .collect()
}
