// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics.


use ndarray::prelude::*;

/// Arithmetic mean. Returns NaN for an empty slice.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance, i.e. the mean of squared deviations from the mean.
pub(crate) fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    mean(&values.iter().map(|v| (v - m).powi(2)).collect::<Vec<_>>())
}

/// The median of a set of values. For an even number of values, the mean of
/// the two central values is returned. Returns NaN for an empty slice.
pub(crate) fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Reduce a 2D array along its first axis (rows) with `f`, producing one value
/// per column.
pub(crate) fn reduce_rows<F>(array: ArrayView2<f64>, f: F) -> Array1<f64>
where
    F: Fn(&[f64]) -> f64,
{
    array
        .axis_iter(Axis(1))
        .map(|column| f(&column.to_vec()))
        .collect()
}

/// One-dimensional linear interpolation. `xp` must be ascending. Values of `x`
/// outside of `xp` are clamped to the edge values of `fp`, just like numpy's
/// `interp`.
pub(crate) fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    debug_assert_eq!(xp.len(), fp.len());
    if xp.is_empty() || x.is_nan() {
        return f64::NAN;
    }
    let last = xp.len() - 1;
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[last] {
        return fp[last];
    }
    // Index of the first element greater than x.
    let upper = xp.partition_point(|&v| v <= x);
    let lower = upper - 1;
    let (x0, x1) = (xp[lower], xp[upper]);
    let (y0, y1) = (fp[lower], fp[upper]);
    if x1 == x0 {
        return y0;
    }
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}

/// Round to a number of decimals (like numpy's `around`).
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}
