//
// MVL Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Hash / join / group engine.
//!
//! Computes one 64-bit row hash per index over a set of columns, builds an
//! open-chained hash map over those hashes, and derives match-count,
//! first-match, JOIN-style pair enumeration and GROUP-BY refinement from it.

use crate::error::{Error, Result};
use crate::hash::{Flags, Hasher};
use crate::reader::ColumnView;

/// Sentinel meaning "empty bucket" / "end of chain", mirroring the format's
/// `~0` convention in a signed representation.
const EMPTY: i64 = -1;

/// Hashes row `idx` across every column in `columns`, widening `INT32`→`INT64`
/// and `FLOAT`→`DOUBLE` before folding their bytes so the contract in
/// `crate::hash` (value equivalence across representations) carries over to
/// whole rows, not just single values.
pub fn hash_row(columns: &[ColumnView], idx: u64) -> u64 {
    let idx = idx as usize;
    let mut hasher = Hasher::new(Flags::INIT);
    for column in columns {
        match column {
            ColumnView::Uint8(s) | ColumnView::CString(s) => hasher.write_u8(s[idx]),
            ColumnView::Int32(s) => hasher.write_bytes(&(s[idx] as i64).to_le_bytes()),
            ColumnView::Int64(s) => hasher.write_bytes(&s[idx].to_le_bytes()),
            ColumnView::Float(s) => hasher.write_bytes(&(s[idx] as f64).to_le_bytes()),
            ColumnView::Double(s) => hasher.write_bytes(&s[idx].to_le_bytes()),
            ColumnView::Offset64(s) => hasher.write_bytes(&s[idx].to_le_bytes()),
            ColumnView::PackedList { .. } => {
                hasher.write_bytes(column.packed_list_entry(idx as u64).unwrap_or(&[]))
            }
        }
    }
    hasher.finish(Flags::FINALIZE)
}

/// Hashes every index in `indices` against `columns`.
pub fn hash_indices(columns: &[ColumnView], indices: &[u64]) -> Vec<u64> {
    indices.iter().map(|&i| hash_row(columns, i)).collect()
}

/// Hashes the contiguous range `[i0, i1)` against `columns`.
pub fn hash_range(columns: &[ColumnView], i0: u64, i1: u64) -> Vec<u64> {
    (i0..i1).map(|i| hash_row(columns, i)).collect()
}

/// True if `columns_a[a]` and `columns_b[b]` are the same row under the
/// heterogeneous-widening value-equality predicate (`INT32`/`INT64` and
/// `FLOAT`/`DOUBLE` compare across type; everything else must match exactly).
pub fn row_equal(columns_a: &[ColumnView], a: u64, columns_b: &[ColumnView], b: u64) -> bool {
    if columns_a.len() != columns_b.len() {
        return false;
    }
    columns_a.iter().zip(columns_b.iter()).all(|(ca, cb)| value_equal(ca, a, cb, b))
}

fn as_byte_slice<'a>(column: &ColumnView<'a>) -> Option<&'a [u8]> {
    match column {
        ColumnView::Uint8(s) | ColumnView::CString(s) => Some(s),
        _ => None,
    }
}

fn value_equal(a: &ColumnView, ai: u64, b: &ColumnView, bi: u64) -> bool {
    let (ai, bi) = (ai as usize, bi as usize);
    if let (Some(x), Some(y)) = (as_byte_slice(a), as_byte_slice(b)) {
        return x[ai] == y[bi];
    }
    match (a, b) {
        (ColumnView::Int32(x), ColumnView::Int32(y)) => x[ai] == y[bi],
        (ColumnView::Int64(x), ColumnView::Int64(y)) => x[ai] == y[bi],
        (ColumnView::Int32(x), ColumnView::Int64(y)) => x[ai] as i64 == y[bi],
        (ColumnView::Int64(x), ColumnView::Int32(y)) => x[ai] == y[bi] as i64,
        (ColumnView::Float(x), ColumnView::Float(y)) => x[ai] == y[bi],
        (ColumnView::Double(x), ColumnView::Double(y)) => x[ai] == y[bi],
        (ColumnView::Float(x), ColumnView::Double(y)) => x[ai] as f64 == y[bi],
        (ColumnView::Double(x), ColumnView::Float(y)) => x[ai] == y[bi] as f64,
        (ColumnView::Offset64(x), ColumnView::Offset64(y)) => x[ai] == y[bi],
        (ColumnView::PackedList { .. }, ColumnView::PackedList { .. }) => {
            a.packed_list_entry(ai as u64) == b.packed_list_entry(bi as u64)
        }
        _ => false,
    }
}

fn bucket_count_for(n: usize) -> usize {
    let mut size = 1usize;
    while size < n.max(1) {
        size <<= 1;
    }
    size
}

/// Open-chained hash map over a precomputed array of row hashes.
pub struct HashMap64 {
    hash: Vec<u64>,
    buckets: Vec<i64>,
    next: Vec<i64>,
}

impl HashMap64 {
    /// Builds the bucket table and chains by walking `hash` in order and
    /// prepending each entry to its bucket's chain.
    pub fn build(hash: Vec<u64>) -> HashMap64 {
        let bucket_count = bucket_count_for(hash.len());
        let mask = bucket_count as u64 - 1;
        let mut buckets = vec![EMPTY; bucket_count];
        let mut next = vec![EMPTY; hash.len()];
        for (i, &h) in hash.iter().enumerate() {
            let k = (h & mask) as usize;
            next[i] = buckets[k];
            buckets[k] = i as i64;
        }
        HashMap64 { hash, buckets, next }
    }

    fn mask(&self) -> u64 {
        self.buckets.len() as u64 - 1
    }

    /// Consumes the map, returning its `(hash, buckets, next)` arrays —
    /// used when persisting a computed grouping as an `extent::ExtentIndex`.
    pub fn into_parts(self) -> (Vec<u64>, Vec<i64>, Vec<i64>) {
        (self.hash, self.buckets, self.next)
    }

    /// Total number of (key, stored) hash collisions across `key_hashes`,
    /// an upper bound on the number of pairs a JOIN would produce.
    pub fn count_matches(&self, key_hashes: &[u64]) -> u64 {
        let mask = self.mask();
        let mut count = 0u64;
        for &kh in key_hashes {
            let mut k = self.buckets[(kh & mask) as usize];
            while k != EMPTY {
                let ku = k as usize;
                if self.hash[ku] == kh {
                    count += 1;
                }
                k = self.next[ku];
            }
        }
        count
    }

    /// First chain position whose stored hash equals each key hash, or
    /// `None` if there is none.
    pub fn find_first(&self, key_hashes: &[u64]) -> Vec<Option<u64>> {
        let mask = self.mask();
        key_hashes
            .iter()
            .map(|&kh| {
                let mut k = self.buckets[(kh & mask) as usize];
                while k != EMPTY {
                    let ku = k as usize;
                    if self.hash[ku] == kh {
                        return Some(ku as u64);
                    }
                    k = self.next[ku];
                }
                None
            })
            .collect()
    }

    /// Enumerates every true-equality pair between `key_indices` (hashed as
    /// `key_hashes` over `key_columns`) and the indices this map was built
    /// over (`indices`, over `columns`).
    ///
    /// Returns `(key_match_indices, match_indices, key_last)`: the two
    /// parallel output arrays, and `key_last[i]` bounding the pair region
    /// belonging to key `i` (pairs for key `i` occupy
    /// `[key_last[i-1], key_last[i])`, with `key_last[-1] == 0`).
    ///
    /// `max_pairs`, when set, mirrors the source library's caller-sized
    /// output buffer: exceeding it fails with `Error::JoinBufferExhausted`
    /// rather than growing unbounded.
    pub fn find_matches(
        &self,
        key_indices: &[u64],
        key_hashes: &[u64],
        key_columns: &[ColumnView],
        indices: &[u64],
        columns: &[ColumnView],
        max_pairs: Option<u64>,
    ) -> Result<(Vec<u64>, Vec<u64>, Vec<u64>)> {
        let mask = self.mask();
        let mut key_match_indices = Vec::new();
        let mut match_indices = Vec::new();
        let mut key_last = Vec::with_capacity(key_indices.len());

        for (i, &kh) in key_hashes.iter().enumerate() {
            let mut k = self.buckets[(kh & mask) as usize];
            while k != EMPTY {
                let ku = k as usize;
                if self.hash[ku] == kh && row_equal(key_columns, key_indices[i], columns, indices[ku]) {
                    if let Some(max) = max_pairs {
                        if key_match_indices.len() as u64 >= max {
                            return Err(Error::JoinBufferExhausted);
                        }
                    }
                    key_match_indices.push(key_indices[i]);
                    match_indices.push(indices[ku]);
                }
                k = self.next[ku];
            }
            key_last.push(key_match_indices.len() as u64);
        }

        Ok((key_match_indices, match_indices, key_last))
    }

    /// Subdivides every hash-colliding bucket chain into exact
    /// row-equivalence classes, returning one `Vec` of original row indices
    /// (values from `indices`, not hash-array positions) per class.
    pub fn find_groups(&self, indices: &[u64], columns: &[ColumnView]) -> Vec<Vec<u64>> {
        let mut groups = Vec::new();
        let mut visited = vec![false; self.hash.len()];

        for &head in &self.buckets {
            let mut chain = Vec::new();
            let mut k = head;
            while k != EMPTY {
                chain.push(k as usize);
                k = self.next[k as usize];
            }

            for &start in &chain {
                if visited[start] {
                    continue;
                }
                visited[start] = true;
                let mut group = vec![indices[start]];
                for &other in &chain {
                    if other == start || visited[other] {
                        continue;
                    }
                    if self.hash[start] == self.hash[other]
                        && row_equal(columns, indices[start], columns, indices[other])
                    {
                        visited[other] = true;
                        group.push(indices[other]);
                    }
                }
                groups.push(group);
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_matches_and_find_first() {
        let main = [30i32, 10, 10, 40, 20];
        let main_col = [ColumnView::Int32(&main)];
        let indices: Vec<u64> = (0..main.len() as u64).collect();
        let hashes = hash_indices(&main_col, &indices);
        let hm = HashMap64::build(hashes);

        let keys = [10i32, 20, 30];
        let key_col = [ColumnView::Int32(&keys)];
        let key_indices: Vec<u64> = (0..keys.len() as u64).collect();
        let key_hashes = hash_indices(&key_col, &key_indices);

        assert_eq!(hm.count_matches(&key_hashes), 3);
        let first = hm.find_first(&key_hashes);
        assert!(first.iter().all(|f| f.is_some()));
    }

    #[test]
    fn test_find_matches_join() {
        let key = [10i32, 20, 30];
        let key_col = [ColumnView::Int32(&key)];
        let key_indices: Vec<u64> = (0..3).collect();
        let key_hashes = hash_indices(&key_col, &key_indices);

        let main = [30i32, 10, 10, 40, 20];
        let main_col = [ColumnView::Int32(&main)];
        let indices: Vec<u64> = (0..5).collect();
        let hashes = hash_indices(&main_col, &indices);
        let hm = HashMap64::build(hashes);

        let (key_match, matches, key_last) = hm
            .find_matches(&key_indices, &key_hashes, &key_col, &indices, &main_col, None)
            .unwrap();

        assert_eq!(key_last, vec![2, 3, 4]);
        let pairs: Vec<(u64, u64)> = key_match.into_iter().zip(matches.into_iter()).collect();
        assert_eq!(pairs.len(), 4);
        for (k, m) in &pairs {
            assert_eq!(key[*k as usize], main[*m as usize]);
        }
    }

    #[test]
    fn test_find_matches_respects_buffer_cap() {
        let key = [10i32];
        let key_col = [ColumnView::Int32(&key)];
        let key_indices = [0u64];
        let key_hashes = hash_indices(&key_col, &key_indices);

        let main = [10i32, 10, 10];
        let main_col = [ColumnView::Int32(&main)];
        let indices: Vec<u64> = (0..3).collect();
        let hashes = hash_indices(&main_col, &indices);
        let hm = HashMap64::build(hashes);

        let result = hm.find_matches(&key_indices, &key_hashes, &key_col, &indices, &main_col, Some(1));
        assert!(matches!(result, Err(Error::JoinBufferExhausted)));
    }

    #[test]
    fn test_find_groups() {
        let values: Vec<&[u8]> = vec![b"x", b"y", b"x", b"x", b"y"];
        let offsets: Vec<u64> = {
            let mut cur = 0u64;
            let mut v = vec![0u64];
            for e in &values {
                cur += e.len() as u64;
                v.push(cur);
            }
            v
        };
        let bytes: Vec<u8> = values.iter().flat_map(|e| e.iter().copied()).collect();
        let column = ColumnView::PackedList { offsets: &offsets, bytes: &bytes };
        let columns = [column];

        let indices: Vec<u64> = (0..5).collect();
        let hashes = hash_indices(&columns, &indices);
        let hm = HashMap64::build(hashes);
        let mut groups = hm.find_groups(&indices, &columns);
        for g in groups.iter_mut() {
            g.sort_unstable();
        }
        groups.sort_by_key(|g| g[0]);

        assert_eq!(groups, vec![vec![0, 2, 3], vec![1, 4]]);
    }
}
