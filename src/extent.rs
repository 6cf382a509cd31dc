//
// MVL Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Extent/partition index.
//!
//! Detects runs of equal rows over a set of columns and persists a
//! searchable index mapping a representative row hash to the extents that
//! share it — a precomputed, reusable alternative to `join::HashMap64` when
//! the same grouping is queried repeatedly.

use crate::attributes::CLASS_MVL_INDEX;
use crate::document::{ElementType, NO_METADATA};
use crate::error::{Error, Result};
use crate::join::{hash_row, row_equal, HashMap64};
use crate::reader::{ColumnView, Reader};
use crate::writer::Writer;

const TAG_INDEX_TYPE: &[u8] = b"index_type";
const TAG_PARTITION: &[u8] = b"partition";
const TAG_HASH: &[u8] = b"hash";
const TAG_NEXT: &[u8] = b"next";
const TAG_HASH_MAP: &[u8] = b"hash_map";
const TAG_VEC_TYPES: &[u8] = b"vec_types";

/// Index-type discriminant for the extent/partition kind of index.
const INDEX_TYPE_EXTENT: i32 = 1;

/// A monotonically non-decreasing list of offsets partitioning `[0, N]` into
/// runs of row-equal elements: `offsets[0] == 0`, `offsets[last] == N`, and
/// run `i` spans `[offsets[i], offsets[i + 1])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub offsets: Vec<u64>,
}

impl Partition {
    pub fn run_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn run(&self, i: usize) -> (u64, u64) {
        (self.offsets[i], self.offsets[i + 1])
    }
}

/// Scans `columns` row by row, producing the partition of maximal runs of
/// equal rows.
pub fn find_repeats(columns: &[ColumnView]) -> Partition {
    let n = columns.first().map(|c| c.len()).unwrap_or(0);
    let mut offsets = vec![0u64];
    let mut i = 0u64;
    while i < n {
        let mut j = i + 1;
        while j < n && row_equal(columns, i, columns, j) {
            j += 1;
        }
        offsets.push(j);
        i = j;
    }
    Partition { offsets }
}

/// Either a heap-owned array (built in memory) or one referencing the
/// mapped image directly (loaded from a file), mirroring the source
/// library's per-member ownership flags.
#[derive(Debug)]
pub enum Storage<'a, T> {
    Owned(Vec<T>),
    Borrowed(&'a [T]),
}

impl<'a, T> std::ops::Deref for Storage<'a, T> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        match self {
            Storage::Owned(v) => v,
            Storage::Borrowed(s) => s,
        }
    }
}

/// Persisted form of a grouping: the partition, one representative hash per
/// run, the chain/bucket arrays of a `join::HashMap64` over those hashes,
/// and the element types of the columns it was computed over.
#[derive(Debug)]
pub struct ExtentIndex<'a> {
    pub partition: Storage<'a, u64>,
    pub hash: Storage<'a, u64>,
    pub next: Storage<'a, i64>,
    pub hash_map: Storage<'a, i64>,
    pub vec_types: Storage<'a, i32>,
}

impl<'a> ExtentIndex<'a> {
    /// Computes the partition over `columns`, hashes one representative row
    /// per run, and builds a hash map over those run hashes.
    pub fn compute(columns: &[ColumnView]) -> ExtentIndex<'static> {
        let partition = find_repeats(columns);
        let run_count = partition.run_count();
        let hash: Vec<u64> = (0..run_count).map(|r| hash_row(columns, partition.offsets[r])).collect();
        let hm = HashMap64::build(hash.clone());
        let vec_types: Vec<i32> = columns.iter().map(|c| c.element_type().tag()).collect();
        let (_, buckets, next) = hm.into_parts();

        ExtentIndex {
            partition: Storage::Owned(partition.offsets),
            hash: Storage::Owned(hash),
            next: Storage::Owned(next),
            hash_map: Storage::Owned(buckets),
            vec_types: Storage::Owned(vec_types),
        }
    }

    /// Appends to `out` the `[start, end)` extent of every run whose stored
    /// hash equals `query_hash`. The caller still must confirm a candidate
    /// with a row-equality check, since distinct rows may collide.
    pub fn get_extents(&self, query_hash: u64, out: &mut Vec<(u64, u64)>) {
        if self.hash_map.is_empty() {
            return;
        }
        let mask = self.hash_map.len() as u64 - 1;
        let mut k = self.hash_map[(query_hash & mask) as usize];
        while k != -1 {
            let ku = k as usize;
            if self.hash[ku] == query_hash {
                out.push((self.partition[ku], self.partition[ku + 1]));
            }
            k = self.next[ku];
        }
    }

    /// Serializes this index as a named list of class `MVL_INDEX`.
    pub fn write<W>(&self, writer: &mut Writer<W>) -> Result<u64>
    where
        W: std::io::Write + std::io::Seek + crate::platform::Preallocate,
    {
        let partition: Vec<u64> = self.partition.to_vec();
        let hash: Vec<u64> = self.hash.to_vec();
        let next: Vec<i64> = self.next.to_vec();
        let hash_map: Vec<i64> = self.hash_map.to_vec();
        let vec_types: Vec<i32> = self.vec_types.to_vec();

        let index_type_offset = writer.write_vector(ElementType::Int32, &[INDEX_TYPE_EXTENT], NO_METADATA)?;
        let partition_offset = writer.write_vector(ElementType::Offset64, &partition, NO_METADATA)?;
        let hash_offset = writer.write_vector(ElementType::Offset64, &hash, NO_METADATA)?;
        let next_offset = writer.write_vector(ElementType::Int64, &next, NO_METADATA)?;
        let hash_map_offset = writer.write_vector(ElementType::Int64, &hash_map, NO_METADATA)?;
        let vec_types_offset = writer.write_vector(ElementType::Int32, &vec_types, NO_METADATA)?;

        writer.write_named_list(
            &[
                (TAG_INDEX_TYPE, index_type_offset),
                (TAG_PARTITION, partition_offset),
                (TAG_HASH, hash_offset),
                (TAG_NEXT, next_offset),
                (TAG_HASH_MAP, hash_map_offset),
                (TAG_VEC_TYPES, vec_types_offset),
            ],
            CLASS_MVL_INDEX,
        )
    }

    /// Reads the named list at `offset`, validating and referencing each
    /// member vector in place rather than copying it. A missing or
    /// malformed member fails with `Error::InvalidExtentIndex`.
    pub fn load(reader: &Reader<'a>, offset: u64) -> Result<ExtentIndex<'a>> {
        let list = reader.read_named_list(offset)?;

        let partition = read_member_u64(reader, &list, TAG_PARTITION)?;
        let hash = read_member_u64(reader, &list, TAG_HASH)?;
        let next = read_member_i64(reader, &list, TAG_NEXT)?;
        let hash_map = read_member_i64(reader, &list, TAG_HASH_MAP)?;
        let vec_types = read_member_i32(reader, &list, TAG_VEC_TYPES)?;

        Ok(ExtentIndex {
            partition: Storage::Borrowed(partition),
            hash: Storage::Borrowed(hash),
            next: Storage::Borrowed(next),
            hash_map: Storage::Borrowed(hash_map),
            vec_types: Storage::Borrowed(vec_types),
        })
    }
}

fn read_member_u64<'a>(reader: &Reader<'a>, list: &crate::list::NamedList, tag: &[u8]) -> Result<&'a [u64]> {
    let offset = list.find(tag).ok_or(Error::InvalidExtentIndex)?;
    match reader.vector_at(offset)?.view {
        ColumnView::Offset64(s) => Ok(s),
        _ => Err(Error::InvalidExtentIndex),
    }
}

fn read_member_i64<'a>(reader: &Reader<'a>, list: &crate::list::NamedList, tag: &[u8]) -> Result<&'a [i64]> {
    let offset = list.find(tag).ok_or(Error::InvalidExtentIndex)?;
    match reader.vector_at(offset)?.view {
        ColumnView::Int64(s) => Ok(s),
        _ => Err(Error::InvalidExtentIndex),
    }
}

fn read_member_i32<'a>(reader: &Reader<'a>, list: &crate::list::NamedList, tag: &[u8]) -> Result<&'a [i32]> {
    let offset = list.find(tag).ok_or(Error::InvalidExtentIndex)?;
    match reader.vector_at(offset)?.view {
        ColumnView::Int32(s) => Ok(s),
        _ => Err(Error::InvalidExtentIndex),
    }
}
