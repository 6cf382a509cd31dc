//
// MVL Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Attributes lists.
//!
//! An attributes list is a named list serialized as an `OFFSET64` vector of
//! length `2k`: the first `k` entries are offsets to tag strings (`UINT8`
//! vectors), the next `k` are the associated value offsets. It is used as
//! the `metadata` of a vector to carry `class`, `names`, `dim`, `row.names`.

/// Well-known attribute tags.
pub const TAG_CLASS: &[u8] = b"class";
pub const TAG_NAMES: &[u8] = b"names";
pub const TAG_DIM: &[u8] = b"dim";
pub const TAG_ROW_NAMES: &[u8] = b"row.names";
pub const TAG_MVL_LAYOUT: &[u8] = b"MVL_LAYOUT";

/// Well-known `class` values.
pub const CLASS_LIST: &[u8] = b"list";
pub const CLASS_DATA_FRAME: &[u8] = b"data.frame";
pub const CLASS_MVL_INDEX: &[u8] = b"MVL_INDEX";

/// Value of the `MVL_LAYOUT` attribute written on the current directory layout.
pub const LAYOUT_R: &[u8] = b"R";

/// A single `(tag, value offset)` pair pending serialization into an
/// attributes list. The tag is written as a (possibly cached) `CSTRING`
/// vector; the value is recorded verbatim.
#[derive(Debug, Clone)]
pub struct AttributeSpec {
    pub tag: Vec<u8>,
    pub value: u64,
}

impl AttributeSpec {
    pub fn new(tag: &[u8], value: u64) -> AttributeSpec {
        AttributeSpec { tag: tag.to_vec(), value }
    }
}

/// Whether a `names` attribute value refers to a packed-list vector (length
/// `N + 1`) or a plain `OFFSET64` vector of `CSTRING` offsets (length `N`).
/// Readers must check a names vector's own element type to tell which.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamesKind {
    PackedList,
    OffsetArray,
}

/// Checks a `names` vector's reported length against the collection's
/// logical element count `n`, per the kind of `names` representation used.
pub fn names_len_consistent(kind: NamesKind, names_len: u64, n: u64) -> bool {
    match kind {
        NamesKind::PackedList => names_len == n + 1,
        NamesKind::OffsetArray => names_len == n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_len_consistent_packed_list() {
        assert!(names_len_consistent(NamesKind::PackedList, 6, 5));
        assert!(!names_len_consistent(NamesKind::PackedList, 5, 5));
    }

    #[test]
    fn test_names_len_consistent_offset_array() {
        assert!(names_len_consistent(NamesKind::OffsetArray, 5, 5));
        assert!(!names_len_consistent(NamesKind::OffsetArray, 6, 5));
    }
}
