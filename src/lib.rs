//! # The gmvread crate
//!
//! A streaming reader for GMV (General Mesh Viewer) files
//!
//! ## Installation
//!
//! Direct install from github:
//!
//! ```shell
//! cargo install --git https://github.com/repositony/gmvread.git
//! ```
//!
//! ## Overview
//!
//! GMV files are self-describing, keyword driven mesh files. A file holds
//! nodes, one of several cell/face topologies, and any number of per-node,
//! per-cell and per-face fields such as materials, velocities, variables and
//! flags.
//!
//! | Command line | Description                                          |
//! | ------------ | ---------------------------------------------------- |
//! | `gmvinfo`    | Summarise the contents of a GMV file, optionally JSON |
//!
//! ### Supported encodings
//!
//! | File type                | Integers | Reals  | Names    |
//! | ------------------------ | -------- | ------ | -------- |
//! | `ascii`                  | text     | text   | text     |
//! | `ieee`, `ieeei4r4`       | 32-bit   | 32-bit | 8 bytes  |
//! | `ieeei4r8`               | 32-bit   | 64-bit | 8 bytes  |
//! | `ieeei8r4`               | 64-bit   | 32-bit | 8 bytes  |
//! | `ieeei8r8`               | 64-bit   | 64-bit | 8 bytes  |
//! | `iecxi4r4` ... `iecxi8r8` | as above | as above | 32 bytes |
//!
//! Binary files written on a machine of the opposite endianness are
//! detected from their node count and swapped on the fly.
//!
//! ## Advanced use
//!
//! Read a whole file in one go:
//!
//! ```rust,no_run
//! // every record plus the assembled mesh
//! let gmv = gmvread::read_gmv("./data/tet.gmv").unwrap();
//!
//! // or just the mesh
//! let mesh = gmvread::read_gmv_mesh("./data/tet.gmv").unwrap();
//! println!("{mesh}");
//! ```
//!
//! Or stream it one record at a time with a [GmvReader], which is useful
//! for large files where only a few fields are of interest.
//!
//! ```rust
//! use gmvread::{GmvReader, Record};
//!
//! let text = "gmvinput ascii
//! nodes 3  0 1 0  0 0 1  0 0 0
//! cells 1  tri 3 1 2 3
//! variable  temperature 1  300 310 320  endvars
//! endgmv
//! ";
//!
//! let mut reader = GmvReader::new();
//! reader.open_bytes(text.as_bytes().to_vec(), ".").unwrap();
//!
//! let mut names = Vec::new();
//! loop {
//!     match reader.next_record().unwrap() {
//!         Record::Variable(v) => names.push(v.name),
//!         Record::End => break,
//!         _ => (),
//!     }
//! }
//! assert_eq!(names, vec!["temperature"]);
//!
//! let mesh = reader.build_mesh().unwrap();
//! assert_eq!(mesh.ncells, 1);
//! ```
//!
//! As an overview:
//! - The [readers] module holds the decoder, byte-order detection,
//!   `fromfile` redirection and the [GmvReader] state machine.
//! - The [record] module defines the [Record] type produced for every step.
//! - The [mesh] module assembles the topology into a [Mesh].
//! - The [writer] module writes GMV files in any encoding, mostly for tests
//!   and fixtures.
//!
//! In the background, the `nom` parser combinator library handles ASCII
//! tokens, `clap` is used for the command line interface, and `serde`
//! provides JSON summaries.

// Public facing modules
pub mod error;
pub mod mesh;
pub mod record;
pub mod utils;
pub mod writer;

// note that docs are hidden to prevent confusing the current simple API
pub mod readers;

// Re-exports of useful data structures
#[doc(inline)]
pub use crate::error::{GmvError, Result};

#[doc(inline)]
pub use crate::mesh::{Mesh, MeshKind};

#[doc(inline)]
pub use crate::readers::{read_gmv, read_gmv_mesh, Encoding, Gmv, GmvReader, ReaderOptions};

#[doc(inline)]
pub use crate::record::Record;

#[doc(inline)]
pub use crate::writer::GmvWriter;
