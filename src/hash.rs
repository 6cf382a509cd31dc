//
// MVL Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Hash primitives.
//!
//! A single-value bit mixer (`mix64`) and an accumulating byte-at-a-time
//! hash (`Hasher`), plus an 8-stream lockstep variant for batch hashing.
//!
//! The defining contract of this module is *value equivalence across
//! representations*: an `i32` and an `i64` holding the same number hash
//! identically, and an `f32` hashes identically to the `f64` it promotes to.
//! See `hash_i32`/`hash_i64`/`hash_f32`/`hash_f64` below.

/// Fixed seed used when a hash accumulation is initialized (`Flags::INIT`).
pub const SEED: u64 = 0xabcdef;

const FOLD_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Folds one byte into an accumulator state.
#[inline]
fn fold_byte(state: u64, byte: u8) -> u64 {
    let s = state ^ (byte as u64);
    s.wrapping_mul(FOLD_PRIME) ^ (s >> 31)
}

/// Two-round multiply/xor-shift avalanche finalizer.
#[inline]
pub fn mix64(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51afd7ed558ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ceb9fe1a85ec53);
    x ^= x >> 33;
    x
}

/// Flags selecting which ends of an accumulation happen.
///
/// Multi-stage hashing across heterogeneous columns initializes once,
/// accumulates many values across many columns without finalizing, and
/// finalizes once at the very end; single-value convenience hashers use
/// both flags together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub init: bool,
    pub finalize: bool,
}

impl Flags {
    pub const NONE: Flags = Flags { init: false, finalize: false };
    pub const INIT: Flags = Flags { init: true, finalize: false };
    pub const FINALIZE: Flags = Flags { init: false, finalize: true };
    pub const BOTH: Flags = Flags { init: true, finalize: true };
}

/// Accumulates bytes into a running 64-bit hash state.
#[derive(Debug, Clone, Copy)]
pub struct Hasher {
    state: u64,
}

impl Hasher {
    /// Starts a new accumulation, seeding the state if `flags.init`.
    pub fn new(flags: Flags) -> Hasher {
        Hasher { state: if flags.init { SEED } else { 0 } }
    }

    /// Resumes an accumulation from a previously computed (non-finalized) state.
    pub fn resume(state: u64) -> Hasher {
        Hasher { state }
    }

    /// Folds a single byte into the state.
    #[inline]
    pub fn write_u8(&mut self, byte: u8) {
        self.state = fold_byte(self.state, byte);
    }

    /// Folds a byte slice into the state, in order.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_u8(b);
        }
    }

    /// Returns the current, non-finalized state (for multi-stage resumption).
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Consumes the hasher, applying the finalizer if `flags.finalize`.
    pub fn finish(self, flags: Flags) -> u64 {
        if flags.finalize {
            mix64(self.state)
        } else {
            self.state
        }
    }
}

/// One-shot hash of a raw byte slice (`UINT8`/`CSTRING` payload semantics).
pub fn hash_bytes(bytes: &[u8], flags: Flags) -> u64 {
    let mut h = Hasher::new(flags);
    h.write_bytes(bytes);
    h.finish(flags)
}

/// One-shot hash of a little-endian-encoded 64-bit value, used for `OFFSET64`
/// payloads (no value-equivalence contract across types applies here).
pub fn hash_offset(value: u64, flags: Flags) -> u64 {
    hash_bytes(&value.to_le_bytes(), flags)
}

/// Hashes a 32-bit signed integer by widening it to 64 bits first, so that
/// `hash_i32(100) == hash_i64(100)`.
pub fn hash_i32(value: i32, flags: Flags) -> u64 {
    hash_i64(value as i64, flags)
}

/// Hashes a 64-bit signed integer by its little-endian byte representation.
pub fn hash_i64(value: i64, flags: Flags) -> u64 {
    hash_bytes(&value.to_le_bytes(), flags)
}

/// Hashes a single-precision float by widening it to `f64` first, so that
/// `hash_f32(f) == hash_f64(f as f64)`. The converse does not hold: an
/// arbitrary `f64` may not be exactly representable as `f32`.
pub fn hash_f32(value: f32, flags: Flags) -> u64 {
    hash_f64(value as f64, flags)
}

/// Hashes a double-precision float by its little-endian byte representation.
pub fn hash_f64(value: f64, flags: Flags) -> u64 {
    hash_bytes(&value.to_le_bytes(), flags)
}

/// Hashes eight independent, equal-length byte streams in lockstep (byte `i`
/// of every stream is folded before byte `i+1` of any stream), which is
/// friendlier to SIMD-style batch hashing than eight sequential calls while
/// being observably equivalent to them.
pub fn hash_streams8(streams: [&[u8]; 8], flags: Flags) -> [u64; 8] {
    let len = streams[0].len();
    debug_assert!(streams.iter().all(|s| s.len() == len));

    let mut state = [0u64; 8];
    if flags.init {
        state = [SEED; 8];
    }
    for i in 0..len {
        for (lane, stream) in streams.iter().enumerate() {
            state[lane] = fold_byte(state[lane], stream[i]);
        }
    }
    if flags.finalize {
        for s in state.iter_mut() {
            *s = mix64(*s);
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int32_int64_value_equivalence() {
        for v in [0i32, 1, -1, 100, i32::MAX, i32::MIN] {
            assert_eq!(hash_i32(v, Flags::BOTH), hash_i64(v as i64, Flags::BOTH));
        }
    }

    #[test]
    fn test_float_double_value_equivalence() {
        for v in [0.0f32, 1.5, -3.25, 1e10, f32::MIN_POSITIVE] {
            assert_eq!(hash_f32(v, Flags::BOTH), hash_f64(v as f64, Flags::BOTH));
        }
    }

    #[test]
    fn test_deterministic() {
        let a = hash_bytes(b"hello", Flags::BOTH);
        let b = hash_bytes(b"hello", Flags::BOTH);
        assert_eq!(a, b);
        assert_ne!(a, hash_bytes(b"hellp", Flags::BOTH));
    }

    #[test]
    fn test_streams8_matches_sequential() {
        let streams = [
            &b"aaaa"[..], &b"bbbb"[..], &b"cccc"[..], &b"dddd"[..],
            &b"eeee"[..], &b"ffff"[..], &b"gggg"[..], &b"hhhh"[..],
        ];
        let batched = hash_streams8(streams, Flags::BOTH);
        for (lane, stream) in streams.iter().enumerate() {
            assert_eq!(batched[lane], hash_bytes(stream, Flags::BOTH));
        }
    }

    #[test]
    fn test_resume_then_finish_equals_one_shot() {
        let mut h = Hasher::new(Flags::INIT);
        h.write_bytes(b"part-one");
        let mid = h.state();
        let mut h2 = Hasher::resume(mid);
        h2.write_bytes(b"part-two");
        let combined = h2.finish(Flags::FINALIZE);

        let mut one_shot = Hasher::new(Flags::INIT);
        one_shot.write_bytes(b"part-one");
        one_shot.write_bytes(b"part-two");
        assert_eq!(combined, one_shot.finish(Flags::FINALIZE));
    }
}
