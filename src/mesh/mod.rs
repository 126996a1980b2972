//! Core mesh library
//!
//! # Overview
//!
//! Module for storing the assembled topology of a GMV file. Whatever way the
//! file describes its cells (fixed shapes, general polyhedra, explicit faces,
//! vfaces or an implicit structured grid), the result is always the same
//! [Mesh] type with 0-based cell to face and face to vertex indexing.
//!
//! ```rust,no_run
//! // Assemble the mesh of a file in one go
//! let mesh = gmvread::read_gmv_mesh("./data/tet.gmv").unwrap();
//! println!("{mesh}");
//! ```
//!
//! The [MeshBuilder] is normally driven by the
//! [GmvReader](crate::GmvReader), but can be fed records directly. This is
//! useful when records are filtered or modified before assembly.
//!
//! ```rust
//! use gmvread::mesh::{CellShape, MeshBuilder};
//! use gmvread::record::{Cell, CellKind, Nodes};
//!
//! let mut builder = MeshBuilder::new();
//! builder.set_nodes(&Nodes::Unstructured {
//!     x: vec![0.0, 1.0, 0.0, 0.0],
//!     y: vec![0.0, 0.0, 1.0, 0.0],
//!     z: vec![0.0, 0.0, 0.0, 1.0],
//! });
//! builder
//!     .add_cell(&Cell {
//!         index: 0,
//!         total: 1,
//!         kind: CellKind::Regular {
//!             shape: CellShape::Tet,
//!             vertices: vec![1, 2, 3, 4],
//!         },
//!     })
//!     .unwrap();
//!
//! let mesh = builder.build().unwrap();
//! assert_eq!(mesh.nfaces(), 4);
//! assert_eq!(mesh.cell_offsets, vec![0, 4]);
//! ```

// Split into subfiles for development, but anything important is re-exported
mod builder;
mod core;
mod shapes;
pub mod structured;

// inline important the mesh-related modules for a nice public API
#[doc(inline)]
pub use crate::mesh::core::{Coordinates, Mesh, MeshKind};

#[doc(inline)]
pub use crate::mesh::shapes::{cell_faces, CellShape};

#[doc(inline)]
pub use crate::mesh::builder::MeshBuilder;

#[doc(inline)]
pub use crate::readers::{read_gmv, read_gmv_mesh};
