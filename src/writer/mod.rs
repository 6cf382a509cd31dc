//
// MVL Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Writer context.
//!
//! Owns an output stream; appends aligned typed vectors; caches interned
//! strings; collects top-level directory entries.
//!
//! ```text
//! NEW -> OPEN(preamble written) -> [WRITE_VECTOR | ADD_DIR_ENTRY]* -> DIRECTORY_WRITTEN -> CLOSED
//!                                         ^____________________|
//! ```
//! No operation may follow `close()`. `start_write_vector` marks a region
//! that may be targeted by `rewrite_vector` at any time until closed.

use std::io::{self, Seek, SeekFrom, Write};

use crate::attributes::{
    AttributeSpec, CLASS_DATA_FRAME, CLASS_LIST, LAYOUT_R, TAG_CLASS, TAG_DIM, TAG_MVL_LAYOUT,
    TAG_NAMES, TAG_ROW_NAMES,
};
use crate::document::{
    self, align_up, is_valid_alignment, ElementType, DEFAULT_ALIGNMENT, NO_METADATA,
    POSTAMBLE_SIZE, POSTAMBLE_TYPE_CURRENT, PREAMBLE_SIZE, VECTOR_HEADER_SIZE,
};
use crate::error::{Error, OnError, Result};
use crate::list::NamedList;
use crate::platform::Preallocate;

/// Writer context bound to an output stream.
pub struct Writer<W> {
    stream: W,
    alignment: u32,
    on_error: OnError,
    directory: NamedList,
    string_cache: NamedList,
    character_class_offset: Option<u64>,
    closed: bool,
}

impl<W> Writer<W>
where
    W: Write + Seek + Preallocate,
{
    /// Opens a writer over `stream`, writing the preamble at the stream's
    /// current position. `alignment` must be a power of two, at least 8.
    pub fn create(stream: W, alignment: u32, on_error: OnError) -> Result<Writer<W>> {
        let mut writer = Writer {
            stream,
            alignment,
            on_error,
            directory: NamedList::create(16),
            string_cache: NamedList::create(64),
            character_class_offset: None,
            closed: false,
        };
        let result = writer.write_preamble();
        on_error.apply(result)?;
        Ok(writer)
    }

    /// Convenience constructor using the format's default alignment (32).
    pub fn create_default(stream: W, on_error: OnError) -> Result<Writer<W>> {
        Writer::create(stream, DEFAULT_ALIGNMENT, on_error)
    }

    fn write_preamble(&mut self) -> Result<()> {
        if !is_valid_alignment(self.alignment) {
            return Err(Error::InvalidParameter);
        }
        let mut buf = [0u8; PREAMBLE_SIZE];
        buf[0..4].copy_from_slice(&document::SIGNATURE);
        buf[4..8].copy_from_slice(&document::ENDIANNESS_PROBE.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.alignment.to_ne_bytes());
        self.stream.write_all(&buf).map_err(|_| Error::FailPreamble)?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::FailVector)
        } else {
            Ok(())
        }
    }

    fn tell(&mut self) -> Result<u64> {
        self.stream.stream_position().map_err(|_| Error::FtellFailed)
    }

    fn write_header(&mut self, count: u64, element_type: ElementType, metadata: u64) -> Result<()> {
        let mut buf = [0u8; VECTOR_HEADER_SIZE];
        buf[0..8].copy_from_slice(&count.to_ne_bytes());
        buf[8..12].copy_from_slice(&element_type.tag().to_ne_bytes());
        buf[56..64].copy_from_slice(&metadata.to_ne_bytes());
        self.stream.write_all(&buf).map_err(|_| Error::IncompleteWrite)
    }

    fn write_padding(&mut self, unpadded_len: u64) -> Result<()> {
        let padded_len = align_up(unpadded_len, self.alignment);
        let pad = (padded_len - unpadded_len) as usize;
        if pad > 0 {
            let zeros = vec![0u8; pad];
            self.stream.write_all(&zeros).map_err(|_| Error::IncompleteWrite)?;
        }
        Ok(())
    }

    /// Writes a vector of raw bytes (`count * element_type.element_size()`
    /// bytes, already in native byte order) as a new, aligned, header-plus-
    /// payload-plus-padding record. Returns the header's absolute offset.
    pub fn write_raw_vector(
        &mut self,
        element_type: ElementType,
        count: u64,
        payload: &[u8],
        metadata: u64,
    ) -> Result<u64> {
        self.ensure_open()?;
        if payload.len() as u64 != count * element_type.element_size() as u64 {
            return Err(Error::InvalidLength);
        }

        let offset = self.tell()?;
        self.write_header(count, element_type, metadata)?;
        self.stream.write_all(payload).map_err(|_| Error::IncompleteWrite)?;
        self.write_padding(VECTOR_HEADER_SIZE as u64 + payload.len() as u64)?;
        log::debug!("wrote vector type={:?} count={} at offset={}", element_type, count, offset);
        Ok(offset)
    }

    /// Typed convenience over `write_raw_vector` for `bytemuck::Pod` element
    /// types (`i32`, `f32`, `i64`, `f64`, `u64`); the on-disk payload is
    /// exactly the slice's native-endian byte representation, which is what
    /// makes the container directly mmap-able without byte-swapping.
    pub fn write_vector<T: bytemuck::Pod>(
        &mut self,
        element_type: ElementType,
        data: &[T],
        metadata: u64,
    ) -> Result<u64> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        self.write_raw_vector(element_type, data.len() as u64, bytes, metadata)
    }

    /// Reserves space for `expected_count` elements, writes the first
    /// `initial_count` contiguously, then seeks past the unwritten region
    /// (which `rewrite_vector` may target later) and writes trailing
    /// padding. The header's element count is `expected_count` from the
    /// start, so a reader that maps the file before the vector is fully
    /// filled sees a complete, zero-filled tail rather than a truncated one.
    pub fn start_write_vector(
        &mut self,
        element_type: ElementType,
        expected_count: u64,
        initial_data: &[u8],
        metadata: u64,
    ) -> Result<u64> {
        self.ensure_open()?;
        let elem_size = element_type.element_size() as u64;
        let initial_count = initial_data.len() as u64 / elem_size;
        if initial_count > expected_count {
            return Err(Error::InvalidParameter);
        }

        let offset = self.tell()?;
        self.write_header(expected_count, element_type, metadata)?;
        self.stream.write_all(initial_data).map_err(|_| Error::IncompleteWrite)?;

        let remaining_bytes = (expected_count - initial_count) * elem_size;
        self.stream.preallocate(remaining_bytes)?;
        if remaining_bytes > 0 {
            self.stream
                .seek(SeekFrom::Current(remaining_bytes as i64))
                .map_err(|_| Error::FtellFailed)?;
        }
        let total_payload = expected_count * elem_size;
        self.write_padding(VECTOR_HEADER_SIZE as u64 + total_payload)?;
        Ok(offset)
    }

    /// Re-enters the middle of an already-started vector at `base_offset`
    /// and overwrites `data.len() / element_size` elements starting at
    /// element `index`. The stream's write position is restored afterwards.
    pub fn rewrite_vector(
        &mut self,
        element_type: ElementType,
        base_offset: u64,
        index: u64,
        data: &[u8],
    ) -> Result<()> {
        self.ensure_open()?;
        let saved = self.tell()?;
        let elem_size = element_type.element_size() as u64;
        let target = base_offset + VECTOR_HEADER_SIZE as u64 + index * elem_size;

        self.stream.seek(SeekFrom::Start(target)).map_err(|_| Error::FtellFailed)?;
        let result = self.stream.write_all(data).map_err(|_| Error::IncompleteWrite);
        self.stream.seek(SeekFrom::Start(saved)).map_err(|_| Error::FtellFailed)?;
        result
    }

    /// Writes one vector whose payload is the concatenation of `buffers`,
    /// with a single header and a single trailing pad.
    pub fn write_concat_vectors(
        &mut self,
        element_type: ElementType,
        buffers: &[&[u8]],
        metadata: u64,
    ) -> Result<u64> {
        self.ensure_open()?;
        let elem_size = element_type.element_size() as u64;
        let total_bytes: usize = buffers.iter().map(|b| b.len()).sum();
        if total_bytes as u64 % elem_size != 0 {
            return Err(Error::InvalidLength);
        }
        let count = total_bytes as u64 / elem_size;

        let offset = self.tell()?;
        self.write_header(count, element_type, metadata)?;
        for buffer in buffers {
            self.stream.write_all(buffer).map_err(|_| Error::IncompleteWrite)?;
        }
        self.write_padding(VECTOR_HEADER_SIZE as u64 + total_bytes as u64)?;
        Ok(offset)
    }

    /// Writes a `CSTRING` vector. `bytes` is the string payload verbatim
    /// (no implicit NUL terminator is appended; callers wanting one include
    /// it in `bytes`).
    pub fn write_string(&mut self, bytes: &[u8], metadata: u64) -> Result<u64> {
        self.write_raw_vector(ElementType::CString, bytes.len() as u64, bytes, metadata)
    }

    /// Writes `bytes` as a `CSTRING` vector, first consulting the
    /// interned-string cache; repeated calls with the same bytes return the
    /// same offset and emit only one vector.
    pub fn write_cached_string(&mut self, bytes: &[u8]) -> Result<u64> {
        if let Some(offset) = self.string_cache.find(bytes) {
            return Ok(offset);
        }
        let offset = self.write_string(bytes, NO_METADATA)?;
        self.string_cache.append(bytes, offset);
        Ok(offset)
    }

    /// Emits the concatenated `UINT8` payload for `entries`, then the
    /// `PACKED_LIST64` vector of `entries.len() + 1` cumulative offsets into
    /// it. Returns the packed-list vector's offset.
    pub fn write_packed_list(&mut self, entries: &[&[u8]], metadata: u64) -> Result<u64> {
        self.ensure_open()?;
        let mut payload = Vec::new();
        for entry in entries {
            payload.extend_from_slice(entry);
        }
        let uint8_offset = self.write_raw_vector(
            ElementType::Uint8,
            payload.len() as u64,
            &payload,
            NO_METADATA,
        )?;
        let payload_start = uint8_offset + VECTOR_HEADER_SIZE as u64;

        let mut offsets = Vec::with_capacity(entries.len() + 1);
        offsets.push(payload_start);
        let mut cursor = payload_start;
        for entry in entries {
            cursor += entry.len() as u64;
            offsets.push(cursor);
        }

        self.write_vector(ElementType::PackedList64, &offsets, metadata)
    }

    /// Serializes `specs` as an attributes list: writes each tag as a
    /// (cached) `CSTRING` vector, then an `OFFSET64` vector of length `2k`
    /// holding `[tag_offset_0..tag_offset_k, value_0..value_k]`.
    pub fn write_attributes_list(&mut self, specs: &[AttributeSpec]) -> Result<u64> {
        self.ensure_open()?;
        let mut combined = Vec::with_capacity(specs.len() * 2);
        for spec in specs {
            combined.push(self.write_cached_string(&spec.tag)?);
        }
        for spec in specs {
            combined.push(spec.value);
        }
        self.write_vector(ElementType::Offset64, &combined, NO_METADATA)
    }

    /// Lazily writes (once per context) a small attributes list
    /// `{class: "character"}` used to mark a `CSTRING` column in an
    /// R-compatible way, returning its cached offset on every call.
    pub fn character_class_offset(&mut self) -> Result<u64> {
        if let Some(offset) = self.character_class_offset {
            return Ok(offset);
        }
        let class_offset = self.write_cached_string(CLASS_LIST)?;
        let offset = self.write_attributes_list(&[AttributeSpec::new(TAG_CLASS, class_offset)])?;
        self.character_class_offset = Some(offset);
        Ok(offset)
    }

    /// Appends `(offset, tag)` to the pending directory.
    pub fn add_directory_entry(&mut self, offset: u64, tag: &[u8]) {
        self.directory.append(tag, offset);
    }

    /// Writes a standalone named list of class `class`: a packed list of
    /// `entries`' tags, an attributes list carrying `class` and `names`, and
    /// the `OFFSET64` carrier vector of `entries`' values. Unlike
    /// `write_directory`, this does not touch the context's own directory or
    /// assume the current layout's `MVL_LAYOUT` attribute — it is the
    /// general building block extent indices and other ad hoc collections
    /// serialize through.
    pub fn write_named_list(&mut self, entries: &[(&[u8], u64)], class: &[u8]) -> Result<u64> {
        self.ensure_open()?;
        let tags: Vec<&[u8]> = entries.iter().map(|(tag, _)| *tag).collect();
        let values: Vec<u64> = entries.iter().map(|(_, value)| *value).collect();

        let names_offset = self.write_packed_list(&tags, NO_METADATA)?;
        let class_offset = self.write_cached_string(class)?;
        let attrs_offset = self.write_attributes_list(&[
            AttributeSpec::new(TAG_CLASS, class_offset),
            AttributeSpec::new(TAG_NAMES, names_offset),
        ])?;

        self.write_vector(ElementType::Offset64, &values, attrs_offset)
    }

    /// Writes `entries` (columns assumed to all share `nrows` elements) as a
    /// named list of class `"data.frame"`, carrying a `dim` attribute of
    /// `[nrows, ncols]` and, if given, a `row.names` attribute pointing at a
    /// previously written row-names vector.
    pub fn write_data_frame(
        &mut self,
        entries: &[(&[u8], u64)],
        nrows: u32,
        row_names: Option<u64>,
    ) -> Result<u64> {
        self.ensure_open()?;
        let tags: Vec<&[u8]> = entries.iter().map(|(tag, _)| *tag).collect();
        let values: Vec<u64> = entries.iter().map(|(_, value)| *value).collect();

        let names_offset = self.write_packed_list(&tags, NO_METADATA)?;
        let class_offset = self.write_cached_string(CLASS_DATA_FRAME)?;
        let dim_offset = self.write_vector(ElementType::Int32, &[nrows as i32, entries.len() as i32], NO_METADATA)?;

        let mut specs = vec![
            AttributeSpec::new(TAG_CLASS, class_offset),
            AttributeSpec::new(TAG_NAMES, names_offset),
            AttributeSpec::new(TAG_DIM, dim_offset),
        ];
        if let Some(row_names) = row_names {
            specs.push(AttributeSpec::new(TAG_ROW_NAMES, row_names));
        }
        let attrs_offset = self.write_attributes_list(&specs)?;

        self.write_vector(ElementType::Offset64, &values, attrs_offset)
    }

    /// Serializes the pending directory as a named list of class `"list"`
    /// (the current layout) and records its offset. Fails with
    /// `EmptyDirectory` if no entries were ever added.
    pub fn write_directory(&mut self) -> Result<u64> {
        self.ensure_open()?;
        if self.directory.is_empty() {
            return Err(Error::EmptyDirectory);
        }

        let tags_owned: Vec<Vec<u8>> =
            (0..self.directory.len()).map(|i| self.directory.tag_at(i).to_vec()).collect();
        let values: Vec<u64> = (0..self.directory.len()).map(|i| self.directory.value_at(i)).collect();
        let tags: Vec<&[u8]> = tags_owned.iter().map(|t| t.as_slice()).collect();

        let names_offset = self.write_packed_list(&tags, NO_METADATA)?;
        let class_offset = self.write_cached_string(CLASS_LIST)?;
        let layout_offset = self.write_cached_string(LAYOUT_R)?;
        let attrs_offset = self.write_attributes_list(&[
            AttributeSpec::new(TAG_MVL_LAYOUT, layout_offset),
            AttributeSpec::new(TAG_CLASS, class_offset),
            AttributeSpec::new(TAG_NAMES, names_offset),
        ])?;

        log::debug!("writing directory with {} entries", values.len());
        self.write_vector(ElementType::Offset64, &values, attrs_offset)
    }

    fn write_postamble(&mut self, directory_offset: u64) -> Result<()> {
        let mut buf = [0u8; POSTAMBLE_SIZE];
        buf[0..8].copy_from_slice(&directory_offset.to_ne_bytes());
        buf[8..12].copy_from_slice(&POSTAMBLE_TYPE_CURRENT.to_ne_bytes());
        self.stream.write_all(&buf).map_err(|_| Error::FailPostamble)
    }

    /// Writes the directory, then the postamble, then flushes the stream.
    /// No further writes may follow.
    pub fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        let directory_offset = self.write_directory()?;
        self.write_postamble(directory_offset)?;
        self.stream.flush().map_err(Error::from)?;
        self.closed = true;
        Ok(())
    }

    /// Returns the wrapped stream, which must already be closed.
    pub fn into_inner(self) -> W {
        self.stream
    }
}
