//! Fixed cell shapes and their canonical faces
//!
//! Each shape maps positions in the cell's vertex list onto faces. Corner
//! ordering follows the GMV conventions: hexahedra list the bottom quad then
//! the top quad, prisms the bottom then top triangle, and the plain
//! `pyramid` puts its apex first while the patran `ppyrmd` shapes put it
//! last. Higher order shapes list corners first, then edge midpoints.
//!
//! Two dimensional shapes (lines, triangles, quads) are a single face.

// external crates
use serde::Serialize;

/// Every fixed shape accepted after the `cells` keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CellShape {
    Line,
    Tri,
    Quad,
    Tet,
    Hex,
    Prism,
    Pyramid,
    PHex8,
    PHex20,
    PHex27,
    PPyrmd5,
    PPyrmd13,
    PPrism6,
    PPrism15,
    PTet4,
    PTet10,
    Tri6,
    Quad8,
    Line3,
}

const LINE: &[&[usize]] = &[&[0, 1]];
const TRI: &[&[usize]] = &[&[0, 1, 2]];
const QUAD: &[&[usize]] = &[&[0, 1, 2, 3]];
const LINE3: &[&[usize]] = &[&[0, 2, 1]];
const TRI6: &[&[usize]] = &[&[0, 3, 1, 4, 2, 5]];
const QUAD8: &[&[usize]] = &[&[0, 4, 1, 5, 2, 6, 3, 7]];

const TET: &[&[usize]] = &[&[0, 1, 2], &[0, 3, 1], &[1, 3, 2], &[0, 2, 3]];

const HEX: &[&[usize]] = &[
    &[0, 1, 2, 3],
    &[4, 7, 6, 5],
    &[0, 4, 5, 1],
    &[1, 5, 6, 2],
    &[2, 6, 7, 3],
    &[0, 3, 7, 4],
];

const PRISM: &[&[usize]] = &[
    &[0, 1, 2],
    &[3, 5, 4],
    &[0, 3, 4, 1],
    &[1, 4, 5, 2],
    &[0, 2, 5, 3],
];

// apex first
const PYRAMID: &[&[usize]] = &[
    &[0, 1, 2],
    &[0, 2, 3],
    &[0, 3, 4],
    &[0, 4, 1],
    &[1, 4, 3, 2],
];

// apex last
const PPYRMD5: &[&[usize]] = &[
    &[0, 3, 2, 1],
    &[0, 1, 4],
    &[1, 2, 4],
    &[2, 3, 4],
    &[3, 0, 4],
];

// midpoints 5:(0,1) 6:(1,2) 7:(2,3) 8:(3,0) 9:(0,4) 10:(1,4) 11:(2,4) 12:(3,4)
const PPYRMD13: &[&[usize]] = &[
    &[0, 8, 3, 7, 2, 6, 1, 5],
    &[0, 5, 1, 10, 4, 9],
    &[1, 6, 2, 11, 4, 10],
    &[2, 7, 3, 12, 4, 11],
    &[3, 8, 0, 9, 4, 12],
];

// midpoints 4:(0,1) 5:(1,2) 6:(2,0) 7:(0,3) 8:(1,3) 9:(2,3)
const PTET10: &[&[usize]] = &[
    &[0, 4, 1, 5, 2, 6],
    &[0, 7, 3, 8, 1, 4],
    &[1, 8, 3, 9, 2, 5],
    &[0, 6, 2, 9, 3, 7],
];

// midpoints 6:(0,1) 7:(1,2) 8:(2,0) 9:(0,3) 10:(1,4) 11:(2,5) 12:(3,4)
// 13:(4,5) 14:(5,3)
const PPRISM15: &[&[usize]] = &[
    &[0, 8, 2, 7, 1, 6],
    &[3, 12, 4, 13, 5, 14],
    &[0, 6, 1, 10, 4, 12, 3, 9],
    &[1, 7, 2, 11, 5, 13, 4, 10],
    &[2, 8, 0, 9, 3, 14, 5, 11],
];

// midpoints 8:(0,1) 9:(1,2) 10:(2,3) 11:(3,0) 12:(0,4) 13:(1,5) 14:(2,6)
// 15:(3,7) 16:(4,5) 17:(5,6) 18:(6,7) 19:(7,4), the 27 node hex adds face
// and body centres which are not part of the face outlines
const PHEX20: &[&[usize]] = &[
    &[0, 11, 3, 10, 2, 9, 1, 8],
    &[4, 16, 5, 17, 6, 18, 7, 19],
    &[0, 8, 1, 13, 5, 16, 4, 12],
    &[1, 9, 2, 14, 6, 17, 5, 13],
    &[2, 10, 3, 15, 7, 18, 6, 14],
    &[3, 11, 0, 12, 4, 19, 7, 15],
];

const SHAPES: [(CellShape, &str, usize); 19] = [
    (CellShape::Line, "line", 2),
    (CellShape::Tri, "tri", 3),
    (CellShape::Quad, "quad", 4),
    (CellShape::Tet, "tet", 4),
    (CellShape::Hex, "hex", 8),
    (CellShape::Prism, "prism", 6),
    (CellShape::Pyramid, "pyramid", 5),
    (CellShape::PHex8, "phex8", 8),
    (CellShape::PHex20, "phex20", 20),
    (CellShape::PHex27, "phex27", 27),
    (CellShape::PPyrmd5, "ppyrmd5", 5),
    (CellShape::PPyrmd13, "ppyrmd13", 13),
    (CellShape::PPrism6, "pprism6", 6),
    (CellShape::PPrism15, "pprism15", 15),
    (CellShape::PTet4, "ptet4", 4),
    (CellShape::PTet10, "ptet10", 10),
    (CellShape::Tri6, "6tri", 6),
    (CellShape::Quad8, "8quad", 8),
    (CellShape::Line3, "3line", 3),
];

impl CellShape {
    /// Look up a shape from its name in the file
    ///
    /// ```rust
    /// # use gmvread::mesh::CellShape;
    /// assert_eq!(CellShape::from_name("phex20"), Some(CellShape::PHex20));
    /// assert_eq!(CellShape::from_name("general"), None);
    /// ```
    pub fn from_name(name: &str) -> Option<CellShape> {
        let name = name.to_ascii_lowercase();
        SHAPES.iter().find(|s| s.1 == name).map(|s| s.0)
    }

    pub fn name(&self) -> &'static str {
        SHAPES
            .iter()
            .find(|s| s.0 == *self)
            .map(|s| s.1)
            .unwrap_or("unknown")
    }

    /// Number of vertices the cell must declare
    pub fn vertex_count(&self) -> usize {
        SHAPES
            .iter()
            .find(|s| s.0 == *self)
            .map(|s| s.2)
            .unwrap_or(0)
    }

    /// Faces as positions into the cell's vertex list
    pub fn faces(&self) -> &'static [&'static [usize]] {
        match self {
            CellShape::Line => LINE,
            CellShape::Tri => TRI,
            CellShape::Quad => QUAD,
            CellShape::Tet | CellShape::PTet4 => TET,
            CellShape::Hex | CellShape::PHex8 => HEX,
            CellShape::Prism | CellShape::PPrism6 => PRISM,
            CellShape::Pyramid => PYRAMID,
            CellShape::PHex20 | CellShape::PHex27 => PHEX20,
            CellShape::PPyrmd5 => PPYRMD5,
            CellShape::PPyrmd13 => PPYRMD13,
            CellShape::PPrism15 => PPRISM15,
            CellShape::PTet10 => PTET10,
            CellShape::Tri6 => TRI6,
            CellShape::Quad8 => QUAD8,
            CellShape::Line3 => LINE3,
        }
    }

    /// Total face-vertex slots over all faces
    pub fn face_vertex_slots(&self) -> usize {
        self.faces().iter().map(|f| f.len()).sum()
    }
}

/// Map a cell onto its faces, collapsing anything degenerate
///
/// Consecutive repeats of a node on a face (including the wrap from last to
/// first) are merged. If that leaves a face with fewer than three vertices
/// the face is dropped. A cell with nothing left keeps a single face made of
/// its distinct vertices, so a cell squashed to a point has one single-vertex
/// face.
///
/// Cells without repeated nodes are mapped straight through the table.
pub fn cell_faces<T: Copy + PartialEq>(shape: CellShape, vertices: &[T]) -> Vec<Vec<T>> {
    let table = shape.faces();
    let degenerate = vertices
        .iter()
        .enumerate()
        .any(|(i, v)| vertices[..i].contains(v));

    if !degenerate {
        return table
            .iter()
            .map(|face| face.iter().map(|&p| vertices[p]).collect())
            .collect();
    }

    let mut faces: Vec<Vec<T>> = table
        .iter()
        .map(|face| collapse(face.iter().map(|&p| vertices[p])))
        .filter(|face| face.len() >= 3)
        .collect();

    if faces.is_empty() {
        let mut distinct: Vec<T> = Vec::new();
        for &v in vertices {
            if !distinct.contains(&v) {
                distinct.push(v);
            }
        }
        faces.push(distinct);
    }
    faces
}

/// Merge consecutive repeats, treating the face as a closed loop
fn collapse<T: Copy + PartialEq>(face: impl Iterator<Item = T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::new();
    for v in face {
        if out.last() != Some(&v) {
            out.push(v);
        }
    }
    while out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(CellShape::Line, 1, 2)]
    #[case(CellShape::Tri, 1, 3)]
    #[case(CellShape::Quad, 1, 4)]
    #[case(CellShape::Tet, 4, 12)]
    #[case(CellShape::Hex, 6, 24)]
    #[case(CellShape::Prism, 5, 18)]
    #[case(CellShape::Pyramid, 5, 16)]
    #[case(CellShape::PHex8, 6, 24)]
    #[case(CellShape::PHex20, 6, 48)]
    #[case(CellShape::PHex27, 6, 48)]
    #[case(CellShape::PPyrmd5, 5, 16)]
    #[case(CellShape::PPyrmd13, 5, 32)]
    #[case(CellShape::PPrism6, 5, 18)]
    #[case(CellShape::PPrism15, 5, 36)]
    #[case(CellShape::PTet4, 4, 12)]
    #[case(CellShape::PTet10, 4, 24)]
    #[case(CellShape::Tri6, 1, 6)]
    #[case(CellShape::Quad8, 1, 8)]
    #[case(CellShape::Line3, 1, 3)]
    fn shape_topology(#[case] shape: CellShape, #[case] nfaces: usize, #[case] slots: usize) {
        assert_eq!(shape.faces().len(), nfaces);
        assert_eq!(shape.face_vertex_slots(), slots);
        // every position must exist in the vertex list
        let max = shape.faces().iter().flat_map(|f| f.iter()).max().unwrap();
        assert!(*max < shape.vertex_count());
        assert_eq!(CellShape::from_name(shape.name()), Some(shape));
    }

    #[test]
    fn every_corner_is_used() {
        for (shape, _, n) in SHAPES {
            let used: Vec<usize> = shape.faces().iter().flat_map(|f| f.iter().copied()).collect();
            let expected = match shape {
                CellShape::PHex27 => 20,
                _ => n,
            };
            assert!((0..expected).all(|p| used.contains(&p)), "{shape:?}");
        }
    }

    #[test]
    fn regular_hex() {
        let faces = cell_faces(CellShape::Hex, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(faces.len(), 6);
        assert_eq!(faces[0], vec![1, 2, 3, 4]);
        assert_eq!(faces[1], vec![5, 8, 7, 6]);
    }

    #[test]
    fn repeated_corner_drops_a_vertex() {
        // corners 0 and 1 coincide
        let faces = cell_faces(CellShape::Hex, &[1, 1, 3, 4, 5, 6, 7, 8]);
        assert_eq!(faces.len(), 6);
        assert_eq!(faces[0], vec![1, 3, 4]);
        assert_eq!(faces[1].len(), 4);
        // the front face 0,4,5,1 wraps back onto its first vertex
        assert_eq!(faces[2], vec![1, 5, 6]);
    }

    #[test]
    fn collapsed_faces_are_dropped() {
        // hex squashed into a prism-like shape, top and bottom edges merged
        let faces = cell_faces(CellShape::Hex, &[1, 1, 2, 2, 3, 3, 4, 4]);
        assert!(faces.iter().all(|f| f.len() >= 3));
        assert_eq!(faces.len(), 2);
    }

    #[test]
    fn cell_collapsed_to_a_point() {
        let faces = cell_faces(CellShape::Tet, &[9, 9, 9, 9]);
        assert_eq!(faces, vec![vec![9]]);
    }
}
