//
// MVL Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use std::fmt::{self, Display};

pub type Result<T> = std::result::Result<T, Error>;

/// Closed set of error conditions surfaced by a writer or reader context.
///
/// One variant per error code in the format's external interface, plus an
/// `Io` variant carrying the underlying platform error for failures that
/// originate below the container format itself.
#[derive(Debug)]
pub enum Error {
    /// No error occurred; not normally constructed, kept for symmetry with
    /// the closed error-code table the format specifies.
    NoError,
    /// The preamble is missing, too short, or carries an unrecognized signature.
    FailPreamble,
    /// The postamble is missing, too short, or not located at `length - 64`.
    FailPostamble,
    /// A vector header names a type tag outside the closed element-type set.
    UnknownType,
    /// A vector could not be written (short write, invalid parameters at the point of writing).
    FailVector,
    /// A write did not transfer as many bytes as requested.
    IncompleteWrite,
    /// The preamble's 4-byte magic signature does not match `MVL0`.
    InvalidSignature,
    /// The preamble's endianness probe is not the IEEE-754 value `1.0`.
    WrongEndianness,
    /// `write_directory` was called with an empty pending directory.
    EmptyDirectory,
    /// The on-disk directory failed structural validation.
    InvalidDirectory,
    /// A platform `tell`-style position query failed.
    FtellFailed,
    /// The postamble's embedded type tag is neither 1000 nor 1001.
    CorruptPostamble,
    /// An attributes-list vector failed structural validation.
    InvalidAttrList,
    /// A single attribute entry (tag or value offset) is invalid.
    InvalidAttr,
    /// An absolute offset read from the file falls outside `[0, length)` or misaligned.
    InvalidOffset,
    /// A caller-supplied parameter violates a precondition (e.g. `initial_count > expected_count`).
    InvalidParameter,
    /// A length field is inconsistent with the surrounding structure.
    InvalidLength,
    /// An extent index failed structural validation on load.
    InvalidExtentIndex,
    /// A `PACKED_LIST64` vector's offsets are not monotonically consistent with its companion bytes.
    CorruptPackedList,
    /// `find_matches` exhausted its caller-sized output buffer (sentinel `-1000` in the original library).
    JoinBufferExhausted,
    /// Wraps a lower-level I/O failure (open, seek, write, preallocate).
    Io(std::io::Error),
}

impl Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NoError => formatter.write_str("no error"),
            Error::FailPreamble => formatter.write_str("failed to read or write preamble"),
            Error::FailPostamble => formatter.write_str("failed to read or write postamble"),
            Error::UnknownType => formatter.write_str("unknown vector element type"),
            Error::FailVector => formatter.write_str("failed to write vector"),
            Error::IncompleteWrite => formatter.write_str("incomplete write"),
            Error::InvalidSignature => formatter.write_str("invalid MVL signature"),
            Error::WrongEndianness => formatter.write_str("wrong endianness"),
            Error::EmptyDirectory => formatter.write_str("directory is empty"),
            Error::InvalidDirectory => formatter.write_str("invalid directory"),
            Error::FtellFailed => formatter.write_str("ftell failed"),
            Error::CorruptPostamble => formatter.write_str("corrupt postamble"),
            Error::InvalidAttrList => formatter.write_str("invalid attributes list"),
            Error::InvalidAttr => formatter.write_str("invalid attribute"),
            Error::InvalidOffset => formatter.write_str("invalid offset"),
            Error::InvalidParameter => formatter.write_str("invalid parameter"),
            Error::InvalidLength => formatter.write_str("invalid length"),
            Error::InvalidExtentIndex => formatter.write_str("invalid extent index"),
            Error::CorruptPackedList => formatter.write_str("corrupt packed list"),
            Error::JoinBufferExhausted => formatter.write_str("join output buffer exhausted"),
            Error::Io(err) => write!(formatter, "i/o error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// Policy controlling how a context reacts when an operation fails.
///
/// Mirrors the source library's "abort on error" context flag, but expressed
/// as an explicit choice rather than a process-global: `Return` propagates a
/// `Result` to the caller, `Abort` logs at `error` level and terminates the
/// process, which is convenient for short scripts that would otherwise have
/// to thread error handling through every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnError {
    /// Propagate the error to the caller as a `Result::Err`.
    Return,
    /// Log the error and abort the process.
    Abort,
}

impl OnError {
    /// Applies the policy to a result: on `Return`, passes it through; on
    /// `Abort`, logs and terminates the process when `result` is an error.
    pub fn apply<T>(self, result: Result<T>) -> Result<T> {
        if let (OnError::Abort, Err(ref err)) = (self, &result) {
            log::error!("aborting: {}", err);
            std::process::abort();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_error_code_name() {
        assert_eq!(Error::WrongEndianness.to_string(), "wrong endianness");
        assert!(Error::CorruptPostamble.to_string().contains("postamble"));
    }

    #[test]
    fn test_io_error_wraps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: Error = io.into();
        assert!(std::error::Error::source(&err).is_some());
    }
}
