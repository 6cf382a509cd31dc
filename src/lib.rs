//
// MVL Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # mvl
//!
//! A native Rust reader and writer for MVL, a self-describing,
//! memory-mappable binary container of typed numeric and string vectors
//! organized into named, tree-shaped collections ("data frames" and
//! "lists"). Once a file is mapped read-only, every vector is directly
//! usable as a properly aligned array with no parsing, copying, or
//! deserialization step.
//!
//! ```no_run
//! use std::fs::File;
//! use mvl::{document::ElementType, error::OnError, Reader, Writer};
//!
//! # fn main() -> mvl::error::Result<()> {
//! let file = File::create("example.mvl")?;
//! let mut writer = Writer::create_default(file, OnError::Return)?;
//! let offset = writer.write_vector(ElementType::Double, &[1.0, 2.0, 3.0], mvl::document::NO_METADATA)?;
//! writer.add_directory_entry(offset, b"values");
//! writer.close()?;
//!
//! let file = File::open("example.mvl")?;
//! let mmap = unsafe { memmap2::Mmap::map(&file)? };
//! let reader = Reader::load_image(&mmap)?;
//! let offset = reader.find_directory_entry(b"values").unwrap();
//! let vector = reader.vector_at(offset)?;
//! # let _ = vector;
//! # std::fs::remove_file("example.mvl").ok();
//! # Ok(())
//! # }
//! ```
//!
//! Concurrent *writers* to the same file, cross-endianness portability, and
//! in-band compression are explicitly out of scope; the container format
//! detects an endianness mismatch and refuses to read rather than
//! byte-swapping.

pub mod attributes;
pub mod document;
pub mod error;
pub mod extent;
pub mod hash;
pub mod join;
pub mod list;
pub mod platform;
pub mod reader;
pub mod sort;
pub mod stats;
pub mod writer;

pub use document::ElementType;
pub use error::{Error, OnError, Result};
pub use extent::ExtentIndex;
pub use list::NamedList;
pub use reader::{ColumnView, Reader, Vector};
pub use writer::Writer;
