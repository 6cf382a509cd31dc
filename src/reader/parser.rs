//
// MVL Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! nom parsers for the format's fixed-size records: preamble, postamble and
//! vector header. Bulk vector payloads are not parsed here — once a header
//! has been validated, its payload is exposed as an aligned, zero-copy
//! typed slice directly over the mapped bytes (see `reader::Vector`).

use nom::{
    bytes::complete::{tag, take},
    combinator::map,
    number::complete::{f32, i32, u32, u64},
    number::Endianness,
    sequence::tuple,
    IResult,
};

use crate::document::{ElementType, SIGNATURE};

/// Parsed preamble fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preamble {
    pub endianness_probe: f32,
    pub alignment: u32,
}

/// Parses the 64-byte preamble: 4-byte magic, endianness probe, alignment,
/// 52 bytes reserved.
pub fn preamble(input: &[u8]) -> IResult<&[u8], Preamble> {
    map(
        tuple((tag(SIGNATURE), f32(Endianness::Native), u32(Endianness::Native), take(52usize))),
        |(_, endianness_probe, alignment, _)| Preamble { endianness_probe, alignment },
    )(input)
}

/// Parsed postamble fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Postamble {
    pub directory_offset: u64,
    pub postamble_type: i32,
}

/// Parses the 64-byte postamble: directory offset, type tag, 52 bytes reserved.
pub fn postamble(input: &[u8]) -> IResult<&[u8], Postamble> {
    map(
        tuple((u64(Endianness::Native), i32(Endianness::Native), take(52usize))),
        |(directory_offset, postamble_type, _)| Postamble { directory_offset, postamble_type },
    )(input)
}

/// Raw (not-yet-validated) fields of a vector header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawHeader {
    pub count: u64,
    pub type_tag: i32,
    pub metadata: u64,
}

/// Parses the 64-byte vector header: count, type tag, 44 bytes reserved, metadata.
pub fn vector_header(input: &[u8]) -> IResult<&[u8], RawHeader> {
    map(
        tuple((u64(Endianness::Native), i32(Endianness::Native), take(44usize), u64(Endianness::Native))),
        |(count, type_tag, _, metadata)| RawHeader { count, type_tag, metadata },
    )(input)
}

impl RawHeader {
    /// Resolves `type_tag` against the closed element-type set.
    pub fn element_type(&self) -> Option<ElementType> {
        ElementType::from_tag(self.type_tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ENDIANNESS_PROBE;

    fn sample_preamble_bytes() -> Vec<u8> {
        let mut buf = vec![0u8; 64];
        buf[0..4].copy_from_slice(b"MVL0");
        buf[4..8].copy_from_slice(&ENDIANNESS_PROBE.to_ne_bytes());
        buf[8..12].copy_from_slice(&32u32.to_ne_bytes());
        buf
    }

    #[test]
    fn test_preamble_parses() {
        let bytes = sample_preamble_bytes();
        let (residual, parsed) = preamble(&bytes).unwrap();
        assert_eq!(residual.len(), 0);
        assert_eq!(parsed.alignment, 32);
        assert_eq!(parsed.endianness_probe, 1.0f32);
    }

    #[test]
    fn test_preamble_rejects_bad_signature() {
        let mut bytes = sample_preamble_bytes();
        bytes[0] = b'X';
        assert!(preamble(&bytes).is_err());
    }

    #[test]
    fn test_postamble_roundtrip() {
        let mut buf = vec![0u8; 64];
        buf[0..8].copy_from_slice(&12345u64.to_ne_bytes());
        buf[8..12].copy_from_slice(&1001i32.to_ne_bytes());
        let (residual, parsed) = postamble(&buf).unwrap();
        assert_eq!(residual.len(), 0);
        assert_eq!(parsed.directory_offset, 12345);
        assert_eq!(parsed.postamble_type, 1001);
    }

    #[test]
    fn test_vector_header_roundtrip() {
        let mut buf = vec![0u8; 64];
        buf[0..8].copy_from_slice(&10u64.to_ne_bytes());
        buf[8..12].copy_from_slice(&100i32.to_ne_bytes());
        buf[56..64].copy_from_slice(&999u64.to_ne_bytes());
        let (residual, parsed) = vector_header(&buf).unwrap();
        assert_eq!(residual.len(), 0);
        assert_eq!(parsed.count, 10);
        assert_eq!(parsed.element_type(), Some(ElementType::Double));
        assert_eq!(parsed.metadata, 999);
    }
}
