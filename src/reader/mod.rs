//
// MVL Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Reader context.
//!
//! Bound to a mapped byte range; validates offsets; exposes the directory,
//! attributes lists and named lists. Every dereference of an absolute
//! offset goes through `validate_vector`, so a corrupt or hostile image
//! cannot make a read path step outside the mapped range.

pub mod parser;

use std::cell::Cell;

use crate::attributes::{NamesKind, TAG_DIM, TAG_NAMES, TAG_ROW_NAMES};
use crate::document::{
    ElementType, NO_METADATA, POSTAMBLE_SIZE, POSTAMBLE_TYPE_CURRENT, POSTAMBLE_TYPE_LEGACY,
    PREAMBLE_SIZE, VECTOR_HEADER_SIZE,
};
use crate::error::{Error, Result};
use crate::list::NamedList;

/// Placeholder tag used for an attribute entry whose tag offset could not be
/// resolved; the read continues rather than aborting.
pub const CORRUPT_TAG: &[u8] = b"*CORRUPT*";

/// A dispatch over the closed element-type set, holding a zero-copy,
/// properly-typed slice view directly over the mapped payload bytes.
#[derive(Debug, Clone, Copy)]
pub enum ColumnView<'a> {
    Uint8(&'a [u8]),
    CString(&'a [u8]),
    Int32(&'a [i32]),
    Float(&'a [f32]),
    Int64(&'a [i64]),
    Double(&'a [f64]),
    Offset64(&'a [u64]),
    /// `offsets` is the `count` cumulative offsets (absolute, into the
    /// mapped image); `bytes` is the companion `UINT8` vector's payload.
    PackedList { offsets: &'a [u64], bytes: &'a [u8] },
}

impl<'a> ColumnView<'a> {
    /// The logical element type this view was dispatched from.
    pub fn element_type(&self) -> ElementType {
        match self {
            ColumnView::Uint8(_) => ElementType::Uint8,
            ColumnView::CString(_) => ElementType::CString,
            ColumnView::Int32(_) => ElementType::Int32,
            ColumnView::Float(_) => ElementType::Float,
            ColumnView::Int64(_) => ElementType::Int64,
            ColumnView::Double(_) => ElementType::Double,
            ColumnView::Offset64(_) => ElementType::Offset64,
            ColumnView::PackedList { .. } => ElementType::PackedList64,
        }
    }

    /// Logical element count (for a packed list, `N`, not the `N + 1` stored offsets).
    pub fn len(&self) -> u64 {
        match self {
            ColumnView::Uint8(s) => s.len() as u64,
            ColumnView::CString(s) => s.len() as u64,
            ColumnView::Int32(s) => s.len() as u64,
            ColumnView::Float(s) => s.len() as u64,
            ColumnView::Int64(s) => s.len() as u64,
            ColumnView::Double(s) => s.len() as u64,
            ColumnView::Offset64(s) => s.len() as u64,
            ColumnView::PackedList { offsets, .. } => offsets.len() as u64 - 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widens element `idx` to `f64`, mirroring the original library's
    /// `mvl_as_double`. Byte-like and packed-list columns are not numeric
    /// and yield `None`.
    pub fn as_double(&self, idx: u64) -> Option<f64> {
        let idx = idx as usize;
        match self {
            ColumnView::Uint8(s) => s.get(idx).map(|&v| v as f64),
            ColumnView::Int32(s) => s.get(idx).map(|&v| v as f64),
            ColumnView::Float(s) => s.get(idx).map(|&v| v as f64),
            ColumnView::Int64(s) => s.get(idx).map(|&v| v as f64),
            ColumnView::Double(s) => s.get(idx).copied(),
            ColumnView::CString(_) | ColumnView::Offset64(_) | ColumnView::PackedList { .. } => None,
        }
    }

    /// `as_double`, substituting `default` for an out-of-range index or a
    /// non-numeric column (mirrors `mvl_as_double_default`).
    pub fn as_double_default(&self, idx: u64, default: f64) -> f64 {
        self.as_double(idx).unwrap_or(default)
    }

    /// Element `idx` as an absolute offset, for `OFFSET64` columns only.
    pub fn as_offset(&self, idx: u64) -> Option<u64> {
        match self {
            ColumnView::Offset64(s) => s.get(idx as usize).copied(),
            _ => None,
        }
    }

    /// The byte range of packed-list entry `idx`, for `PackedList` views only.
    pub fn packed_list_entry(&self, idx: u64) -> Option<&'a [u8]> {
        match self {
            ColumnView::PackedList { offsets, bytes } => {
                let idx = idx as usize;
                if idx + 1 >= offsets.len() {
                    return None;
                }
                let base = offsets[0];
                let start = (offsets[idx] - base) as usize;
                let end = (offsets[idx + 1] - base) as usize;
                bytes.get(start..end)
            }
            _ => None,
        }
    }

    pub fn packed_list_entry_bytelength(&self, idx: u64) -> Option<u64> {
        self.packed_list_entry(idx).map(|e| e.len() as u64)
    }
}

/// A validated vector: its absolute offset, raw metadata offset, and typed view.
#[derive(Debug, Clone, Copy)]
pub struct Vector<'a> {
    pub offset: u64,
    pub metadata: u64,
    pub view: ColumnView<'a>,
}

impl<'a> Vector<'a> {
    pub fn len(&self) -> u64 {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    pub fn element_type(&self) -> ElementType {
        self.view.element_type()
    }
}

/// Reader context bound to a mapped (or otherwise borrowed) byte range.
pub struct Reader<'a> {
    data: &'a [u8],
    /// `None` disables bounds checking, mirroring the format's `~0` sentinel
    /// length for legacy in-memory scenarios where the extent isn't tracked.
    length: Option<u64>,
    alignment: u32,
    directory: NamedList,
    last_error: Cell<Option<&'static str>>,
}

impl<'a> Reader<'a> {
    /// Validates the preamble and postamble in `data`, reads the directory
    /// (accepting both the legacy parallel-array and current named-list
    /// layouts), and builds its hash side-index.
    pub fn load_image(data: &'a [u8]) -> Result<Reader<'a>> {
        let length = data.len() as u64;
        if length < (PREAMBLE_SIZE + POSTAMBLE_SIZE) as u64 {
            return Err(Error::FailPreamble);
        }

        let (_, preamble) = parser::preamble(&data[0..PREAMBLE_SIZE])
            .map_err(|_| Error::InvalidSignature)?;
        if preamble.endianness_probe != crate::document::ENDIANNESS_PROBE {
            return Err(Error::WrongEndianness);
        }
        if !crate::document::is_valid_alignment(preamble.alignment) {
            return Err(Error::FailPreamble);
        }

        let postamble_start = (length - POSTAMBLE_SIZE as u64) as usize;
        let (_, postamble) = parser::postamble(&data[postamble_start..])
            .map_err(|_| Error::CorruptPostamble)?;

        let mut reader = Reader {
            data,
            length: Some(length),
            alignment: preamble.alignment,
            directory: NamedList::create(0),
            last_error: Cell::new(None),
        };

        let directory = match postamble.postamble_type {
            t if t == POSTAMBLE_TYPE_CURRENT => reader.read_named_list(postamble.directory_offset)?,
            t if t == POSTAMBLE_TYPE_LEGACY => reader.read_legacy_directory(postamble.directory_offset)?,
            _ => return Err(Error::CorruptPostamble),
        };
        reader.directory = directory;
        reader.directory.rebuild_hash();
        Ok(reader)
    }

    /// Same as `load_image`, but with bounds checking disabled entirely
    /// (the `~0` sentinel length). Only appropriate when `data` is known
    /// good and the caller accepts the risk of reading outside `data`.
    pub fn load_image_unchecked(data: &'a [u8]) -> Result<Reader<'a>> {
        let mut reader = Reader::load_image(data)?;
        reader.length = None;
        Ok(reader)
    }

    fn in_bounds(&self, end: u64) -> bool {
        match self.length {
            Some(length) => end <= length,
            None => true,
        }
    }

    /// Alignment recorded in the preamble.
    pub fn alignment(&self) -> u32 {
        self.alignment
    }

    /// The last non-fatal corruption noted while degrading gracefully
    /// (e.g. a bad tag offset inside an attributes list).
    pub fn last_error(&self) -> Option<&'static str> {
        self.last_error.get()
    }

    fn note_corruption(&self, message: &'static str) {
        log::warn!("{}", message);
        self.last_error.set(Some(message));
    }

    /// Validates the header at `offset`: every byte of its header and
    /// payload lies within the mapped range, its type is known, and (for
    /// `PACKED_LIST64`) its companion `UINT8` vector is itself valid and
    /// covers every stored offset.
    pub fn validate_vector(&self, offset: u64) -> Result<parser::RawHeader> {
        if offset == 0 {
            return Err(Error::InvalidOffset);
        }
        let header_end = offset + VECTOR_HEADER_SIZE as u64;
        if !self.in_bounds(header_end) {
            self.note_corruption("vector header out of bounds");
            return Err(Error::InvalidOffset);
        }

        let start = offset as usize;
        let (_, raw) = parser::vector_header(&self.data[start..start + VECTOR_HEADER_SIZE])
            .map_err(|_| Error::InvalidOffset)?;
        let element_type = raw.element_type().ok_or(Error::UnknownType)?;

        let payload_end = header_end + raw.count * element_type.element_size() as u64;
        if !self.in_bounds(payload_end) {
            self.note_corruption("vector payload out of bounds");
            return Err(Error::InvalidOffset);
        }

        if element_type == ElementType::PackedList64 {
            if raw.count < 1 {
                return Err(Error::CorruptPackedList);
            }
            let payload_start = header_end as usize;
            let offsets: &[u64] = bytemuck::cast_slice(
                &self.data[payload_start..payload_start + raw.count as usize * 8],
            );
            let first = offsets[0];
            let last = offsets[offsets.len() - 1];
            if first < VECTOR_HEADER_SIZE as u64 {
                return Err(Error::CorruptPackedList);
            }
            let companion_offset = first - VECTOR_HEADER_SIZE as u64;
            let companion = self.validate_vector(companion_offset)?;
            if companion.element_type() != Some(ElementType::Uint8) {
                return Err(Error::CorruptPackedList);
            }
            let companion_end =
                companion_offset + VECTOR_HEADER_SIZE as u64 + companion.count;
            if last > companion_end {
                return Err(Error::CorruptPackedList);
            }
        }

        Ok(raw)
    }

    /// Validates and dereferences `offset` as a typed vector view.
    pub fn vector_at(&self, offset: u64) -> Result<Vector<'a>> {
        let raw = self.validate_vector(offset)?;
        let element_type = raw.element_type().ok_or(Error::UnknownType)?;
        let payload_start = offset as usize + VECTOR_HEADER_SIZE;
        let payload_len = raw.count as usize * element_type.element_size();
        let payload = &self.data[payload_start..payload_start + payload_len];

        let view = match element_type {
            ElementType::Uint8 => ColumnView::Uint8(payload),
            ElementType::CString => ColumnView::CString(payload),
            ElementType::Int32 => ColumnView::Int32(bytemuck::cast_slice(payload)),
            ElementType::Float => ColumnView::Float(bytemuck::cast_slice(payload)),
            ElementType::Int64 => ColumnView::Int64(bytemuck::cast_slice(payload)),
            ElementType::Double => ColumnView::Double(bytemuck::cast_slice(payload)),
            ElementType::Offset64 => ColumnView::Offset64(bytemuck::cast_slice(payload)),
            ElementType::PackedList64 => {
                let offsets: &[u64] = bytemuck::cast_slice(payload);
                let base = offsets[0];
                let companion_offset = (base - VECTOR_HEADER_SIZE as u64) as usize;
                let companion = self.validate_vector(companion_offset as u64)?;
                let companion_start = companion_offset + VECTOR_HEADER_SIZE;
                let companion_bytes = &self.data[companion_start..companion_start + companion.count as usize];
                ColumnView::PackedList { offsets, bytes: companion_bytes }
            }
        };

        Ok(Vector { offset, metadata: raw.metadata, view })
    }

    /// Reads the attributes list referenced by `metadata_offset`. A
    /// `NO_METADATA` offset yields an empty list. A corrupt individual tag
    /// offset degrades to a `*CORRUPT*` placeholder entry rather than
    /// aborting the whole read.
    pub fn read_attributes_list(&self, metadata_offset: u64) -> Result<NamedList> {
        if metadata_offset == NO_METADATA {
            return Ok(NamedList::create(0));
        }

        let carrier = self.vector_at(metadata_offset)?;
        let offsets = match carrier.view {
            ColumnView::Offset64(s) => s,
            _ => return Err(Error::InvalidAttrList),
        };
        if offsets.len() % 2 != 0 {
            return Err(Error::InvalidAttrList);
        }
        let k = offsets.len() / 2;

        let mut list = NamedList::create(k);
        for i in 0..k {
            let tag_offset = offsets[i];
            let value = offsets[k + i];
            match self.vector_at(tag_offset) {
                Ok(tag_vec) => match tag_vec.view {
                    ColumnView::CString(bytes) | ColumnView::Uint8(bytes) => list.append(bytes, value),
                    _ => {
                        self.note_corruption("attribute tag is not a byte vector");
                        list.append(CORRUPT_TAG, value);
                    }
                },
                Err(_) => {
                    self.note_corruption("attribute tag offset is invalid");
                    list.append(CORRUPT_TAG, value);
                }
            }
        }
        list.rebuild_hash();
        Ok(list)
    }

    /// Traverses the `OFFSET64` carrier vector at `offset` and its
    /// `names` attribute (a packed list or an `OFFSET64` array of `CSTRING`
    /// offsets) into a fresh, hash-indexed named list.
    pub fn read_named_list(&self, offset: u64) -> Result<NamedList> {
        let carrier = self.vector_at(offset)?;
        let values = match carrier.view {
            ColumnView::Offset64(s) => s,
            _ => return Err(Error::InvalidDirectory),
        };
        let n = values.len() as u64;

        let attrs = self.read_attributes_list(carrier.metadata)?;
        let names_offset = attrs.find(TAG_NAMES).ok_or(Error::InvalidAttrList)?;
        let names_vec = self.vector_at(names_offset)?;

        let mut list = NamedList::create(values.len());
        match names_vec.view {
            ColumnView::PackedList { .. } => {
                if !crate::attributes::names_len_consistent(
                    NamesKind::PackedList,
                    names_vec.len() + 1,
                    n,
                ) {
                    return Err(Error::InvalidDirectory);
                }
                for i in 0..values.len() as u64 {
                    let tag = names_vec.view.packed_list_entry(i).ok_or(Error::InvalidDirectory)?;
                    list.append(tag, values[i as usize]);
                }
            }
            ColumnView::Offset64(tag_offsets) => {
                if !crate::attributes::names_len_consistent(NamesKind::OffsetArray, tag_offsets.len() as u64, n) {
                    return Err(Error::InvalidDirectory);
                }
                for (i, &tag_offset) in tag_offsets.iter().enumerate() {
                    let tag_vec = self.vector_at(tag_offset)?;
                    let bytes = match tag_vec.view {
                        ColumnView::CString(b) | ColumnView::Uint8(b) => b,
                        _ => return Err(Error::InvalidDirectory),
                    };
                    list.append(bytes, values[i]);
                }
            }
            _ => return Err(Error::InvalidDirectory),
        }

        list.rebuild_hash();
        Ok(list)
    }

    fn read_legacy_directory(&self, offset: u64) -> Result<NamedList> {
        let carrier = self.vector_at(offset)?;
        let values = match carrier.view {
            ColumnView::Offset64(s) => s,
            _ => return Err(Error::InvalidDirectory),
        };
        if values.len() % 2 != 0 {
            return Err(Error::InvalidDirectory);
        }
        let k = values.len() / 2;

        let mut list = NamedList::create(k);
        for i in 0..k {
            let tag_offset = values[i];
            let value = values[k + i];
            let tag_vec = self.vector_at(tag_offset)?;
            let bytes = match tag_vec.view {
                ColumnView::CString(b) | ColumnView::Uint8(b) => b,
                _ => return Err(Error::InvalidDirectory),
            };
            list.append(bytes, value);
        }
        list.rebuild_hash();
        Ok(list)
    }

    /// Looks up `tag` in the top-level directory.
    pub fn find_directory_entry(&self, tag: &[u8]) -> Option<u64> {
        self.directory.find(tag)
    }

    /// The top-level directory, in insertion (on-disk) order.
    pub fn directory(&self) -> &NamedList {
        &self.directory
    }

    /// Reads the `{nrows, ncols}` pair out of a data frame vector's `dim`
    /// attribute (a 2-element `INT32` vector).
    pub fn data_frame_dim(&self, frame_offset: u64) -> Result<(u64, u64)> {
        let vector = self.vector_at(frame_offset)?;
        let attrs = self.read_attributes_list(vector.metadata)?;
        let nrows = attrs.get_double(self, TAG_DIM, 0);
        let ncols = attrs.get_double(self, TAG_DIM, 1);
        Ok((nrows as u64, ncols as u64))
    }

    /// The offset of a data frame vector's `row.names` attribute, if it has one.
    pub fn data_frame_row_names(&self, frame_offset: u64) -> Result<Option<u64>> {
        let vector = self.vector_at(frame_offset)?;
        let attrs = self.read_attributes_list(vector.metadata)?;
        Ok(attrs.find(TAG_ROW_NAMES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OnError;
    use crate::writer::Writer;
    use std::io::Cursor;

    fn build_image(f: impl FnOnce(&mut Writer<Cursor<Vec<u8>>>)) -> Vec<u8> {
        let mut writer = Writer::create_default(Cursor::new(Vec::new()), OnError::Return).unwrap();
        f(&mut writer);
        writer.close().unwrap();
        writer.into_inner().into_inner()
    }

    #[test]
    fn test_roundtrip_double_vector() {
        let data = (0..1000u64).map(|i| (i * i) as f64).collect::<Vec<_>>();
        let bytes = build_image(|w| {
            let off = w.write_vector(ElementType::Double, &data, NO_METADATA).unwrap();
            w.add_directory_entry(off, b"squares");
        });

        let reader = Reader::load_image(&bytes).unwrap();
        let offset = reader.find_directory_entry(b"squares").unwrap();
        let vec = reader.vector_at(offset).unwrap();
        match vec.view {
            ColumnView::Double(values) => {
                assert_eq!(values.len(), 1000);
                assert_eq!(values[100], 10000.0);
                assert_eq!(values[999], 998001.0);
            }
            _ => panic!("expected double vector"),
        }
    }

    #[test]
    fn test_packed_string_list() {
        let bytes = build_image(|w| {
            let entries: [&[u8]; 4] = [b"a", b"b", b"a", b"b"];
            let off = w.write_packed_list(&entries, NO_METADATA).unwrap();
            w.add_directory_entry(off, b"letters");
        });

        let reader = Reader::load_image(&bytes).unwrap();
        let offset = reader.find_directory_entry(b"letters").unwrap();
        let vec = reader.vector_at(offset).unwrap();
        assert_eq!(vec.len(), 4);
        assert_eq!(vec.view.packed_list_entry(2), Some(&b"a"[..]));
        match vec.view {
            ColumnView::PackedList { bytes, .. } => assert_eq!(bytes.len(), 4),
            _ => panic!("expected packed list"),
        }
    }

    #[test]
    fn test_wrong_endianness_rejected() {
        let mut bytes = build_image(|w| {
            let off = w.write_vector(ElementType::Int32, &[1i32], NO_METADATA).unwrap();
            w.add_directory_entry(off, b"x");
        });
        bytes[4..8].copy_from_slice(&0xDEADBEEFu32.to_le_bytes());
        assert!(matches!(Reader::load_image(&bytes), Err(Error::WrongEndianness)));
    }

    #[test]
    fn test_truncated_file_fails_postamble() {
        let bytes = build_image(|w| {
            let off = w.write_vector(ElementType::Int32, &[1i32], NO_METADATA).unwrap();
            w.add_directory_entry(off, b"x");
        });
        let truncated = &bytes[..bytes.len() - 5];
        assert!(matches!(Reader::load_image(truncated), Err(Error::CorruptPostamble)));
    }

    #[test]
    fn test_directory_last_insertion_wins() {
        let bytes = build_image(|w| {
            let a = w.write_vector(ElementType::Int32, &[1i32], NO_METADATA).unwrap();
            let b = w.write_vector(ElementType::Int32, &[2i32], NO_METADATA).unwrap();
            w.add_directory_entry(a, b"dup");
            w.add_directory_entry(b, b"dup");
        });
        let reader = Reader::load_image(&bytes).unwrap();
        let offset = reader.find_directory_entry(b"dup").unwrap();
        let vec = reader.vector_at(offset).unwrap();
        match vec.view {
            ColumnView::Int32(v) => assert_eq!(v[0], 2),
            _ => panic!("expected int32"),
        }
    }

    #[test]
    fn test_data_frame_dim_and_row_names_roundtrip() {
        let mut frame_offset = 0u64;
        let bytes = build_image(|w| {
            let row_names = w.write_packed_list(&[b"r0".as_slice(), b"r1"], NO_METADATA).unwrap();
            let col_a = w.write_vector(ElementType::Int32, &[1i32, 2], NO_METADATA).unwrap();
            frame_offset = w.write_data_frame(&[(b"a".as_slice(), col_a)], 2, Some(row_names)).unwrap();
            w.add_directory_entry(frame_offset, b"frame");
        });

        let reader = Reader::load_image(&bytes).unwrap();
        let offset = reader.find_directory_entry(b"frame").unwrap();
        assert_eq!(reader.data_frame_dim(offset).unwrap(), (2, 1));
        let row_names_offset = reader.data_frame_row_names(offset).unwrap();
        assert!(row_names_offset.is_some());
        let row_names_vec = reader.vector_at(row_names_offset.unwrap()).unwrap();
        assert_eq!(row_names_vec.view.packed_list_entry(1), Some(&b"r1"[..]));
    }
}
