//
// MVL Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Multi-key sort engine.
//!
//! Sorts an index array so the row it addresses is lexicographically
//! ordered over a list of column vectors of heterogeneous element type.
//! Columns are applied one at a time: each column's sort only needs to
//! break ties left by the columns before it, so the working set shrinks
//! to the still-tied runs as sorting proceeds (see `libMVL_sort.cc`'s
//! recursive partition refinement).

use std::cmp::Ordering;

use ordered_float::OrderedFloat;

use crate::reader::ColumnView;

/// Sorts a fresh `0..n` index array into row-lexicographic order over
/// `columns` (all of equal logical length). Ties remaining after every
/// column is exhausted are broken by raw index, ascending, which is also
/// what makes the overall sort stable.
pub fn sort_multi_key(columns: &[ColumnView], descending: bool) -> Vec<u64> {
    let n = columns.first().map(|c| c.len()).unwrap_or(0) as usize;
    let mut index: Vec<u64> = (0..n as u64).collect();
    if n < 2 {
        return index;
    }

    let mut partitions = vec![(0usize, n)];
    for column in columns {
        if partitions.is_empty() {
            break;
        }
        let mut next_partitions = Vec::new();
        for (start, end) in partitions {
            sort_run(column, &mut index[start..end], descending);
            split_into_runs(column, &index[start..end], start, &mut next_partitions);
        }
        partitions = next_partitions;
    }

    for (start, end) in partitions {
        index[start..end].sort_unstable();
    }
    index
}

/// Stably sorts `run` (a slice of row indices) by `column`'s value at each
/// index. Ties preserve the order the run arrived in, which is exactly the
/// property a multi-key sort needs: earlier columns' order survives into
/// later ones.
fn sort_run(column: &ColumnView, run: &mut [u64], descending: bool) {
    run.sort_by(|&a, &b| {
        let ord = compare_rows(column, a, b);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

/// Scans a freshly sorted run for maximal sub-runs of equal value, pushing
/// any with two or more members (genuine ties needing another column) into
/// `out` with their absolute position in the full index array.
fn split_into_runs(column: &ColumnView, run: &[u64], base: usize, out: &mut Vec<(usize, usize)>) {
    let mut run_start = 0;
    for i in 1..run.len() {
        if compare_rows(column, run[i - 1], run[i]) != Ordering::Equal {
            if i - run_start >= 2 {
                out.push((base + run_start, base + i));
            }
            run_start = i;
        }
    }
    if run.len() - run_start >= 2 {
        out.push((base + run_start, base + run.len()));
    }
}

/// Ascending comparison of row `a` against row `b` within a single column.
fn compare_rows(column: &ColumnView, a: u64, b: u64) -> Ordering {
    let (a, b) = (a as usize, b as usize);
    match column {
        ColumnView::Uint8(s) | ColumnView::CString(s) => s[a].cmp(&s[b]),
        ColumnView::Int32(s) => s[a].cmp(&s[b]),
        ColumnView::Int64(s) => s[a].cmp(&s[b]),
        ColumnView::Float(s) => OrderedFloat(s[a]).cmp(&OrderedFloat(s[b])),
        ColumnView::Double(s) => OrderedFloat(s[a]).cmp(&OrderedFloat(s[b])),
        ColumnView::Offset64(s) => s[a].cmp(&s[b]),
        ColumnView::PackedList { .. } => {
            let ea = column.packed_list_entry(a as u64).unwrap_or(&[]);
            let eb = column.packed_list_entry(b as u64).unwrap_or(&[]);
            ea.cmp(eb)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_column_ascending() {
        let values = [3i32, 1, 2, 1];
        let column = ColumnView::Int32(&values);
        let index = sort_multi_key(&[column], false);
        assert_eq!(index, vec![1, 3, 2, 0]);
    }

    #[test]
    fn test_single_column_descending() {
        let values = [3i32, 1, 2];
        let column = ColumnView::Int32(&values);
        let index = sort_multi_key(&[column], true);
        assert_eq!(index, vec![0, 2, 1]);
    }

    #[test]
    fn test_two_columns_breaks_ties() {
        let primary = [1i32, 1, 0];
        let secondary = [5i32, 2, 9];
        let columns = [ColumnView::Int32(&primary), ColumnView::Int32(&secondary)];
        let index = sort_multi_key(&columns, false);
        assert_eq!(index, vec![2, 1, 0]);
    }

    #[test]
    fn test_stable_on_full_ties() {
        let values = [7i32, 7, 7];
        let column = ColumnView::Int32(&values);
        let index = sort_multi_key(&[column], false);
        assert_eq!(index, vec![0, 1, 2]);
    }

    #[test]
    fn test_byte_like_column() {
        let values = [b'c', b'a', b'b'];
        let column = ColumnView::Uint8(&values);
        let index = sort_multi_key(&[column], false);
        assert_eq!(index, vec![1, 2, 0]);
    }
}
