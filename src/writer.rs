//! Writer for GMV files in any encoding
//!
//! The [GmvWriter] mirrors the decoder: it knows the width of every field
//! for each encoding and can byte swap binary output to imitate a file from
//! a machine of the opposite endianness. Blocks are written with the same
//! layouts the reader expects.
//!
//! ```rust
//! use gmvread::{Encoding, GmvReader, GmvWriter};
//! use gmvread::record::Nodes;
//!
//! let mut w = GmvWriter::new(Encoding::IeeeI4R8);
//! w.nodes(&Nodes::Unstructured {
//!     x: vec![0.0, 1.0, 0.0],
//!     y: vec![0.0, 0.0, 1.0],
//!     z: vec![0.0; 3],
//! });
//! w.cells(&[gmvread::record::CellKind::Regular {
//!     shape: gmvread::mesh::CellShape::Tri,
//!     vertices: vec![1, 2, 3],
//! }]);
//! w.end();
//!
//! let mut reader = GmvReader::new();
//! reader.open_bytes(w.into_bytes(), ".").unwrap();
//! let gmv = reader.read_all().unwrap();
//! assert_eq!(gmv.mesh.unwrap().ncells, 1);
//! ```

// internal modules
use crate::error::Result;
use crate::readers::{swap_bytes, Encoding, Primitive};
use crate::record::*;
use crate::utils::f;

// standard library
use std::path::Path;

// external crates
use log::debug;

/// Width of a unit string in binary `units` blocks
const UNIT_WIDTH: usize = 16;

/// In-memory GMV file builder
#[derive(Debug, Clone)]
pub struct GmvWriter {
    buffer: Vec<u8>,
    encoding: Encoding,
    swap: bool,
    name_width: usize,
}

/// Setup and output
impl GmvWriter {
    /// Start a file, writing the header straight away
    pub fn new(encoding: Encoding) -> Self {
        Self::with_layout(encoding, false, false)
    }

    /// Start a file with explicit byte order and name width
    ///
    /// - `swap` - write binary values in the opposite byte order
    /// - `wide_names` - use the `iecx` file types with 32-byte names
    pub fn with_layout(encoding: Encoding, swap: bool, wide_names: bool) -> Self {
        let mut writer = Self {
            buffer: Vec::new(),
            encoding,
            swap: swap && !encoding.is_ascii(),
            name_width: if wide_names && !encoding.is_ascii() {
                32
            } else {
                8
            },
        };
        writer.buffer.extend_from_slice(b"gmvinput");
        match encoding {
            Encoding::Ascii => writer.buffer.extend_from_slice(b" ascii\n"),
            e => {
                let name = match wide_names {
                    true => e.type_name().replace("ieee", "iecx"),
                    false => e.type_name().to_string(),
                };
                writer.field(&name, 8);
            }
        }
        writer
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Bytes written so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Write everything to `path`
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        debug!("Writing {} bytes to {}", self.buffer.len(), path.as_ref().display());
        std::fs::write(path, &self.buffer)?;
        Ok(())
    }
}

/// Primitive values
impl GmvWriter {
    /// Fixed-width text field in binary, a token in ASCII
    pub fn field(&mut self, text: &str, width: usize) {
        if self.encoding.is_ascii() {
            self.buffer.extend_from_slice(text.as_bytes());
            self.buffer.push(b' ');
            return;
        }
        let mut bytes = text.as_bytes().to_vec();
        bytes.resize(width, b' ');
        self.buffer.extend_from_slice(&bytes);
    }

    /// A top-level keyword, always 8 bytes in binary
    pub fn keyword(&mut self, keyword: &str) {
        if self.encoding.is_ascii() && !self.buffer.ends_with(b"\n") {
            self.buffer.push(b'\n');
        }
        self.field(keyword, 8);
    }

    /// A name using the file's name width
    pub fn name(&mut self, name: &str) {
        let width = self.name_width;
        self.field(name, width);
    }

    /// Counts, references and ids in the file's index width
    pub fn indices(&mut self, values: &[i64]) {
        let kind = self.encoding.index_kind();
        self.integers(values.iter().copied(), kind);
    }

    pub fn index(&mut self, value: i64) {
        self.indices(&[value]);
    }

    /// Datatype codes, material numbers and flags, always 32-bit
    pub fn codes(&mut self, values: &[i32]) {
        self.integers(values.iter().map(|&v| v as i64), Primitive::Int);
    }

    pub fn code(&mut self, value: i32) {
        self.codes(&[value]);
    }

    /// Coordinates and field values in the file's real width
    pub fn reals(&mut self, values: &[f64]) {
        let kind = self.encoding.real_kind();
        self.floats(values, kind);
    }

    /// Always 64-bit in binary
    pub fn double(&mut self, value: f64) {
        self.floats(&[value], Primitive::Double);
    }

    fn integers(&mut self, values: impl Iterator<Item = i64>, kind: Primitive) {
        if self.encoding.is_ascii() {
            for v in values {
                self.buffer.extend_from_slice(f!("{v} ").as_bytes());
            }
            return;
        }
        let start = self.buffer.len();
        for v in values {
            match kind {
                Primitive::LongLong => self.buffer.extend_from_slice(&v.to_ne_bytes()),
                _ => self.buffer.extend_from_slice(&(v as i32).to_ne_bytes()),
            }
        }
        self.finish_binary(start, kind);
    }

    fn floats(&mut self, values: &[f64], kind: Primitive) {
        if self.encoding.is_ascii() {
            for v in values {
                self.buffer.extend_from_slice(f!("{v:e} ").as_bytes());
            }
            return;
        }
        let start = self.buffer.len();
        for &v in values {
            match kind {
                Primitive::Double => self.buffer.extend_from_slice(&v.to_ne_bytes()),
                _ => self.buffer.extend_from_slice(&(v as f32).to_ne_bytes()),
            }
        }
        self.finish_binary(start, kind);
    }

    fn finish_binary(&mut self, start: usize, kind: Primitive) {
        if self.swap {
            swap_bytes(&mut self.buffer[start..], kind.size());
        }
    }

    /// Raw bytes, for deliberately malformed test files
    pub fn raw(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }
}

/// Keyword blocks, in the layouts the reader expects
impl GmvWriter {
    /// `keyword fromfile "path"`
    pub fn fromfile(&mut self, keyword: &str, path: &str) {
        self.keyword(keyword);
        self.keyword("fromfile");
        match self.encoding.is_ascii() {
            true => self.buffer.extend_from_slice(f!("\"{path}\"\n").as_bytes()),
            false => self.buffer.extend_from_slice(f!("\"{path}\"").as_bytes()),
        }
    }

    pub fn nodes(&mut self, nodes: &Nodes) {
        self.keyword("nodes");
        match nodes {
            Nodes::Unstructured { x, y, z } => {
                self.index(x.len() as i64);
                self.reals(x);
                self.reals(y);
                self.reals(z);
            }
            Nodes::Structured { dims, x, y, z } => {
                self.index(-1);
                self.dims(dims);
                self.reals(x);
                self.reals(y);
                self.reals(z);
            }
            Nodes::LogicallyStructured { dims, x, y, z } => {
                self.index(-2);
                self.dims(dims);
                self.reals(x);
                self.reals(y);
                self.reals(z);
            }
            Nodes::Amr {
                dims,
                origin,
                spacing,
            } => {
                self.index(-3);
                self.dims(dims);
                self.reals(origin);
                self.reals(spacing);
            }
        }
    }

    fn dims(&mut self, dims: &[usize; 3]) {
        let dims = dims.map(|d| d as i64);
        self.indices(&dims);
    }

    /// `nodev`, with the coordinates interleaved per node
    pub fn nodev(&mut self, x: &[f64], y: &[f64], z: &[f64]) {
        self.keyword("nodev");
        self.index(x.len() as i64);
        let xyz: Vec<f64> = x
            .iter()
            .zip(y)
            .zip(z)
            .flat_map(|((&x, &y), &z)| [x, y, z])
            .collect();
        self.reals(&xyz);
    }

    pub fn cells(&mut self, cells: &[CellKind]) {
        self.keyword("cells");
        self.index(cells.len() as i64);
        for cell in cells {
            match cell {
                CellKind::Regular { shape, vertices } => {
                    self.field(shape.name(), 8);
                    self.code(vertices.len() as i32);
                    self.indices(vertices);
                }
                CellKind::General {
                    face_vertex_counts,
                    vertices,
                } => {
                    self.field("general", 8);
                    self.code(face_vertex_counts.len() as i32);
                    self.codes(face_vertex_counts);
                    self.indices(vertices);
                }
                CellKind::VFace { three_d, faces } => {
                    self.field(if *three_d { "vface3d" } else { "vface2d" }, 8);
                    self.code(faces.len() as i32);
                    self.indices(faces);
                }
            }
        }
    }

    /// `cells n` following AMR nodes
    pub fn amr_cells(&mut self, cells: &AmrCells) {
        self.keyword("cells");
        self.index(cells.daughters.len() as i64);
        self.index(cells.numtop);
        self.indices(&cells.daughters);
    }

    /// `faces`, each face with its vertices and two cells (0 for none)
    pub fn faces(&mut self, ncells: usize, faces: &[(Vec<i64>, [i64; 2])]) {
        self.keyword("faces");
        self.index(faces.len() as i64);
        self.index(ncells as i64);
        for (vertices, cells) in faces {
            self.code(vertices.len() as i32);
            self.indices(vertices);
            self.indices(cells);
        }
    }

    pub fn vfaces(&mut self, faces: &[VFace]) {
        self.keyword("vfaces");
        self.index(faces.len() as i64);
        for face in faces {
            self.code(face.vertices.len() as i32);
            self.code(face.pe);
            self.index(face.opposite);
            self.code(face.opposite_pe);
            self.index(face.cell);
            self.indices(&face.vertices);
        }
    }

    pub fn xfaces(&mut self, faces: &[VFace]) {
        self.keyword("xfaces");
        let nverts: Vec<i64> = faces.iter().map(|f| f.vertices.len() as i64).collect();
        let vertices: Vec<i64> = faces.iter().flat_map(|f| f.vertices.clone()).collect();
        self.index(faces.len() as i64);
        self.index(vertices.len() as i64);
        self.indices(&nverts);
        self.indices(&vertices);
        let cells: Vec<i64> = faces.iter().map(|f| f.cell).collect();
        let opposite: Vec<i64> = faces.iter().map(|f| f.opposite).collect();
        let pe: Vec<i32> = faces.iter().map(|f| f.pe).collect();
        let opposite_pe: Vec<i32> = faces.iter().map(|f| f.opposite_pe).collect();
        self.indices(&cells);
        self.indices(&opposite);
        self.codes(&pe);
        self.codes(&opposite_pe);
    }

    pub fn material(&mut self, material: &Material) {
        self.keyword("material");
        self.code(material.names.len() as i32);
        self.code(material.centering.code());
        for name in &material.names {
            self.name(name);
        }
        self.codes(&material.ids);
    }

    pub fn velocity(&mut self, velocity: &Velocity) {
        self.keyword("velocity");
        self.code(velocity.centering.code());
        self.reals(&velocity.u);
        self.reals(&velocity.v);
        self.reals(&velocity.w);
    }

    pub fn variables(&mut self, fields: &[Field]) {
        self.keyword("variable");
        for field in fields {
            self.name(&field.name);
            self.code(field.centering.code());
            self.reals(&field.values);
        }
        self.name("endvars");
    }

    pub fn flags(&mut self, flags: &[Flag]) {
        self.keyword("flags");
        for flag in flags {
            self.name(&flag.name);
            self.code(flag.type_names.len() as i32);
            self.code(flag.centering.code());
            for name in &flag.type_names {
                self.name(name);
            }
            self.codes(&flag.values);
        }
        self.name("endflag");
    }

    pub fn polygons(&mut self, polygons: &[Polygon]) {
        self.keyword("polygons");
        for p in polygons {
            self.code(p.material);
            self.code(p.x.len() as i32);
            self.reals(&p.x);
            self.reals(&p.y);
            self.reals(&p.z);
        }
        self.keyword("endpoly");
    }

    pub fn tracers(&mut self, tracers: &Tracers, fields: &[TracerField]) {
        self.keyword("tracers");
        self.index(tracers.x.len() as i64);
        self.reals(&tracers.x);
        self.reals(&tracers.y);
        self.reals(&tracers.z);
        for field in fields {
            self.name(&field.name);
            self.reals(&field.values);
        }
        self.name("endtrace");
    }

    pub fn probtime(&mut self, time: f64) {
        self.keyword("probtime");
        self.double(time);
    }

    pub fn cycleno(&mut self, cycle: i32) {
        self.keyword("cycleno");
        self.code(cycle);
    }

    /// Any of the id keywords: `nodeids`, `cellids`, `faceids`, `traceids`,
    /// `surfids`
    pub fn ids(&mut self, keyword: &str, ids: &[i64]) {
        self.keyword(keyword);
        self.indices(ids);
    }

    pub fn surface(&mut self, facets: &[Vec<i64>]) {
        self.keyword("surface");
        self.index(facets.len() as i64);
        for facet in facets {
            self.code(facet.len() as i32);
            self.indices(facet);
        }
    }

    pub fn surfmats(&mut self, materials: &[i32]) {
        self.keyword("surfmats");
        self.codes(materials);
    }

    pub fn surfvel(&mut self, velocity: &Velocity) {
        self.keyword("surfvel");
        self.reals(&velocity.u);
        self.reals(&velocity.v);
        self.reals(&velocity.w);
    }

    pub fn surfvars(&mut self, fields: &[Field]) {
        self.keyword("surfvars");
        for field in fields {
            self.name(&field.name);
            self.reals(&field.values);
        }
        self.name("endsvar");
    }

    pub fn surfflag(&mut self, flags: &[Flag]) {
        self.keyword("surfflag");
        for flag in flags {
            self.name(&flag.name);
            self.code(flag.type_names.len() as i32);
            for name in &flag.type_names {
                self.name(name);
            }
            self.codes(&flag.values);
        }
        self.name("endsflag");
    }

    pub fn units(&mut self, units: &[Units]) {
        self.keyword("units");
        for entry in units {
            match entry {
                Units::Coordinates(unit) => {
                    self.name("xyz");
                    self.field(unit, UNIT_WIDTH);
                }
                Units::Velocity(unit) => {
                    self.name("velocity");
                    self.field(unit, UNIT_WIDTH);
                }
                Units::Fields { centering, pairs } => {
                    self.name(match centering {
                        Centering::Node => "nodes",
                        Centering::Face => "faces",
                        _ => "cells",
                    });
                    self.code(pairs.len() as i32);
                    for (field, unit) in pairs {
                        self.name(field);
                        self.field(unit, UNIT_WIDTH);
                    }
                }
            }
        }
        self.name("endunit");
    }

    pub fn vinfo(&mut self, tables: &[VInfo]) {
        self.keyword("vinfo");
        for table in tables {
            self.name(&table.name);
            self.code(table.nelem as i32);
            self.code(table.nlines as i32);
            self.reals(&table.values);
        }
        self.name("endvinfo");
    }

    pub fn groups(&mut self, groups: &[Group]) {
        self.keyword("groups");
        for group in groups {
            self.name(&group.name);
            self.code(group.centering.code());
            self.code(group.ids.len() as i32);
            self.indices(&group.ids);
        }
        self.name("endgrp");
    }

    /// `codename`, `codever` or `simdate`
    pub fn text(&mut self, keyword: &str, text: &str) {
        self.keyword(keyword);
        self.field(text, 8);
    }

    pub fn cellpes(&mut self, pes: &[i32]) {
        self.keyword("cellpes");
        self.codes(pes);
    }

    pub fn subvars(&mut self, subvars: &[SubVar]) {
        self.keyword("subvars");
        for sv in subvars {
            self.name(&sv.name);
            self.code(sv.centering.code());
            self.index(sv.ids.len() as i64);
            self.indices(&sv.ids);
            self.reals(&sv.values);
        }
        self.name("endsubv");
    }

    pub fn ghosts(&mut self, ghosts: &Ghosts) {
        self.keyword("ghosts");
        self.code(ghosts.centering.code());
        self.index(ghosts.ids.len() as i64);
        self.indices(&ghosts.ids);
    }

    pub fn vectors(&mut self, vectors: &[VectorField]) {
        self.keyword("vectors");
        for v in vectors {
            self.name(&v.name);
            self.code(v.centering.code());
            self.code(v.components.len() as i32);
            self.code(1);
            for name in &v.component_names {
                self.name(name);
            }
            for component in &v.components {
                self.reals(component);
            }
        }
        self.name("endvect");
    }

    /// Free text skipped by the reader
    pub fn comments(&mut self, text: &str) {
        self.keyword("comments");
        match self.encoding.is_ascii() {
            true => self.buffer.extend_from_slice(f!("\n{text}\n").as_bytes()),
            false => self.buffer.extend_from_slice(text.as_bytes()),
        }
        self.keyword("endcomm");
    }

    pub fn end(&mut self) {
        self.keyword("endgmv");
        if self.encoding.is_ascii() {
            self.buffer.push(b'\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::Decoder;
    use rstest::rstest;
    use std::io::Cursor;

    #[rstest]
    #[case(Encoding::Ascii, false, b"gmvinput ascii\n".to_vec())]
    #[case(Encoding::IeeeI4R4, false, b"gmvinputieeei4r4".to_vec())]
    #[case(Encoding::IeeeI8R8, true, b"gmvinputiecxi8r8".to_vec())]
    fn headers(#[case] encoding: Encoding, #[case] wide: bool, #[case] expected: Vec<u8>) {
        let w = GmvWriter::with_layout(encoding, false, wide);
        assert_eq!(w.as_bytes(), expected.as_slice());
    }

    #[test]
    fn swapped_integers() {
        let mut w = GmvWriter::with_layout(Encoding::IeeeI4R4, true, false);
        w.code(1);
        let mut expected = 1i32.to_ne_bytes();
        expected.reverse();
        assert_eq!(&w.as_bytes()[16..], &expected[..]);
    }

    #[test]
    fn reals_read_back() {
        let mut w = GmvWriter::with_layout(Encoding::IeeeI8R4, true, false);
        w.reals(&[1.5, -2.25]);
        w.index(9);
        let bytes = w.into_bytes()[16..].to_vec();
        let mut d = Decoder::new(Box::new(Cursor::new(bytes)), Encoding::IeeeI8R4, 8);
        d.set_swap(true);
        assert_eq!(d.read_reals(2, "values").unwrap(), vec![1.5, -2.25]);
        assert_eq!(d.read_index("index").unwrap(), 9);
    }
}
