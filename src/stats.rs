//
// MVL Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Vector statistics / normalization.
//!
//! Min/max/center/scale and run-length statistics over a numeric column,
//! plus a rescaling pass mapping values into roughly `[1, 2]` for
//! downstream machine-learning use.

use crate::reader::ColumnView;

/// Summary statistics over a numeric vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VecStats {
    pub min: f64,
    pub max: f64,
    pub center: f64,
    pub scale: f64,
    pub nrepeat: u64,
    pub average_repeat_length: f64,
}

/// Computes `{min, max, center, scale, nrepeat, average_repeat_length}` over
/// `column`. An empty column returns the sentinel `{max: -1, min: 1, center:
/// 0, scale: 0}` rather than `NaN`s.
pub fn compute_vec_stats(column: &ColumnView) -> VecStats {
    let n = column.len();
    if n == 0 {
        return VecStats { min: 1.0, max: -1.0, center: 0.0, scale: 0.0, nrepeat: 0, average_repeat_length: 0.0 };
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut nrepeat = 0u64;
    let mut previous: Option<f64> = None;

    for i in 0..n {
        let value = column.as_double_default(i, 0.0);
        if value < min {
            min = value;
        }
        if value > max {
            max = value;
        }
        if previous != Some(value) {
            nrepeat += 1;
            previous = Some(value);
        }
    }

    let center = (min + max) / 2.0;
    let scale = if max > min { 2.0 / (max - min) } else { 0.0 };
    let average_repeat_length = n as f64 / nrepeat as f64;

    VecStats { min, max, center, scale, nrepeat, average_repeat_length }
}

/// Writes `out[k] = column[i0 + k] * (scale / 2) + (1.5 - center * (scale /
/// 2))` for `k` in `0..out.len()`. An index at or beyond the column's
/// length, or a non-numeric column, produces zero fill rather than an error.
pub fn normalize_vector(column: &ColumnView, stats: &VecStats, i0: u64, out: &mut [f64]) {
    let half_scale = stats.scale / 2.0;
    let offset = 1.5 - stats.center * half_scale;
    for (k, slot) in out.iter_mut().enumerate() {
        let idx = i0 + k as u64;
        *slot = match column.as_double(idx) {
            Some(value) => value * half_scale + offset,
            None => 0.0,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_vector_sentinel() {
        let values: [f64; 0] = [];
        let column = ColumnView::Double(&values);
        let stats = compute_vec_stats(&column);
        assert_eq!(stats, VecStats { min: 1.0, max: -1.0, center: 0.0, scale: 0.0, nrepeat: 0, average_repeat_length: 0.0 });
    }

    #[test]
    fn test_basic_stats() {
        let values = [1.0f64, 2.0, 3.0, 3.0, 3.0];
        let column = ColumnView::Double(&values);
        let stats = compute_vec_stats(&column);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
        assert_eq!(stats.center, 2.0);
        assert_eq!(stats.scale, 1.0);
        assert_eq!(stats.nrepeat, 3);
    }

    #[test]
    fn test_normalize_maps_min_and_max() {
        let values = [0.0f64, 10.0];
        let column = ColumnView::Double(&values);
        let stats = compute_vec_stats(&column);
        let mut out = [0.0f64; 2];
        normalize_vector(&column, &stats, 0, &mut out);
        assert!((out[0] - 1.0).abs() < 1e-9);
        assert!((out[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_out_of_range_is_zero() {
        let values = [1.0f64, 2.0];
        let column = ColumnView::Double(&values);
        let stats = compute_vec_stats(&column);
        let mut out = [0.0f64; 3];
        normalize_vector(&column, &stats, 0, &mut out);
        assert_eq!(out[2], 0.0);
    }
}
