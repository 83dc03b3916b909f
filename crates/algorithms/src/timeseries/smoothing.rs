//! Centered moving average

use vegtrend_core::{Error, Result};

/// Centered moving average with an odd `window`.
///
/// Element `i` is the mean of `values[i - h ..= i + h]` with `h = window / 2`.
/// The first and last `h` elements have no full window and are `None`.
pub fn moving_average(values: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    validate_window(window)?;

    let half = window / 2;
    let n = values.len();

    Ok((0..n)
        .map(|i| {
            if i < half || i + half >= n {
                return None;
            }
            let slice = &values[i - half..=i + half];
            Some(slice.iter().sum::<f64>() / window as f64)
        })
        .collect())
}

/// A smoothing window must be odd and at least 1.
pub fn validate_window(window: usize) -> Result<()> {
    if window == 0 || window % 2 == 0 {
        return Err(Error::InvalidParameter {
            name: "window",
            value: window.to_string(),
            reason: "moving-average window must be odd and >= 1".into(),
        });
    }
    Ok(())
}
