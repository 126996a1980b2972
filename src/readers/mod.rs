//! Library of readers and common functions for the GMV format
//!
//! The layers build on each other:
//!
//! - [parsers] holds the `nom` parsers for ASCII tokens
//! - [Decoder] reads primitive values in any encoding
//! - [header] validates a file and detects its byte order
//! - [StreamStack] follows `fromfile` redirections
//! - [GmvReader] is the keyword state machine on top of it all

// internal modules
use crate::error::Result;
use crate::mesh::Mesh;

// standard library
use std::path::Path;

// files under the readers module
mod decoder;
mod fromfile;
mod gmv_file;
pub mod header;
mod keywords;
mod options;
pub mod parsers;

// inline important the reader-related modules for a nice API
#[doc(inline)]
pub use crate::readers::decoder::{swap_bytes, Decoder, Encoding, Primitive, Source};

#[doc(inline)]
pub use crate::readers::fromfile::StreamStack;

#[doc(inline)]
pub use crate::readers::gmv_file::{Counts, Gmv, GmvReader};

#[doc(inline)]
pub use crate::readers::keywords::Keyword;

#[doc(inline)]
pub use crate::readers::options::ReaderOptions;

/// Read every record of a GMV file
///
/// Returns all records in file order, plus the assembled [Mesh] when the
/// file describes a topology that can be assembled.
///
/// - `path` - Path to the GMV file, can be [&str], [String], [Path], etc...
///
/// Example
/// ```rust,no_run
/// let gmv = gmvread::read_gmv("path/to/file.gmv").unwrap();
/// println!("{} records", gmv.records.len());
/// ```
pub fn read_gmv<P: AsRef<Path>>(path: P) -> Result<Gmv> {
    let mut reader = GmvReader::new();
    reader.open(path)?;
    reader.read_all()
}

/// Read only the assembled mesh of a GMV file
///
/// Fails if the file has no nodes and topology, or is an AMR grid.
///
/// Example
/// ```rust,no_run
/// let mesh = gmvread::read_gmv_mesh("path/to/file.gmv").unwrap();
/// println!("{mesh}");
/// ```
pub fn read_gmv_mesh<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let mut reader = GmvReader::new();
    reader.open(path)?;
    while !reader.next_record()?.is_end() {}
    reader.build_mesh()
}
