// internal modules
use crate::error::{GmvError, Result};
use crate::utils::*;

// external crates
use itertools::izip;
use serde::Serialize;

/// How the topology of a [Mesh] was described in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MeshKind {
    /// Fixed-shape and general cells
    Unstructured,
    /// Explicit faces carrying their two cells
    FaceBased,
    /// Cells made of vfaces/xfaces with partition bookkeeping
    VFaceBased,
    /// Axis-aligned grid from three coordinate vectors
    Structured,
    /// Grid topology with explicit coordinates
    LogicallyStructured,
}

/// Node positions, kept compact for structured grids
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Coordinates {
    /// Coordinates given for every node
    Explicit { x: Vec<f64>, y: Vec<f64>, z: Vec<f64> },
    /// Axis vectors, node (i, j, k) is at (x\[i\], y\[j\], z\[k\])
    Rectilinear { x: Vec<f64>, y: Vec<f64>, z: Vec<f64> },
}

impl Coordinates {
    pub fn len(&self) -> usize {
        match self {
            Coordinates::Explicit { x, .. } => x.len(),
            Coordinates::Rectilinear { x, y, z } => x.len() * y.len() * z.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of node `index` (0-based), with x varying fastest on grids
    pub fn node(&self, index: usize) -> Option<[f64; 3]> {
        match self {
            Coordinates::Explicit { x, y, z } => {
                Some([*x.get(index)?, *y.get(index)?, *z.get(index)?])
            }
            Coordinates::Rectilinear { x, y, z } => {
                if index >= self.len() {
                    return None;
                }
                let i = index % x.len();
                let j = (index / x.len()) % y.len();
                let k = index / (x.len() * y.len());
                Some([x[i], y[j], z[k]])
            }
        }
    }

    /// Full per-node coordinate arrays, expanding axis vectors on demand
    pub fn expanded(&self) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        match self {
            Coordinates::Explicit { x, y, z } => (x.clone(), y.clone(), z.clone()),
            Coordinates::Rectilinear { .. } => {
                let n = self.len();
                let mut ex = Vec::with_capacity(n);
                let mut ey = Vec::with_capacity(n);
                let mut ez = Vec::with_capacity(n);
                for [px, py, pz] in (0..n).filter_map(|i| self.node(i)) {
                    ex.push(px);
                    ey.push(py);
                    ez.push(pz);
                }
                (ex, ey, ez)
            }
        }
    }

    /// Axis-aligned bounds as (min, max), `None` without any nodes
    pub fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        let (x, y, z) = match self {
            Coordinates::Explicit { x, y, z } | Coordinates::Rectilinear { x, y, z } => (x, y, z),
        };
        Some((
            [vec_f64_min(x)?, vec_f64_min(y)?, vec_f64_min(z)?],
            [vec_f64_max(x)?, vec_f64_max(y)?, vec_f64_max(z)?],
        ))
    }
}

/// Fully indexed mesh topology assembled from the cell/face records
///
/// All indices are 0-based. For cell `c` its faces are
/// `cell_faces[cell_offsets[c]..cell_offsets[c + 1]]`, and for face `f` its
/// vertices are `face_vertices[face_offsets[f]..face_offsets[f + 1]]`.
///
/// The face-to-cell arrays are always filled, `face_cell2` is `None` for
/// boundary faces and for faces that belong to a single cell. The partition
/// arrays (`face_pe`, `face_opposite`, `face_opposite_pe`) are filled for
/// vface input and for structured grids, and are otherwise empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mesh {
    pub kind: MeshKind,
    pub coordinates: Coordinates,
    /// Logical grid dimensions in nodes, structured grids only
    pub dims: Option<[usize; 3]>,
    pub ncells: usize,
    /// Prefix sums into `cell_faces`, length `ncells + 1`
    pub cell_offsets: Vec<usize>,
    pub cell_faces: Vec<usize>,
    /// Prefix sums into `face_vertices`, length `nfaces + 1`
    pub face_offsets: Vec<usize>,
    pub face_vertices: Vec<usize>,
    pub face_cell1: Vec<Option<usize>>,
    pub face_cell2: Vec<Option<usize>>,
    pub face_pe: Vec<i32>,
    pub face_opposite: Vec<Option<usize>>,
    pub face_opposite_pe: Vec<i32>,
}

impl Mesh {
    pub fn nnodes(&self) -> usize {
        self.coordinates.len()
    }

    pub fn nfaces(&self) -> usize {
        self.face_offsets.len().saturating_sub(1)
    }

    /// Faces of cell `c`
    pub fn faces_of(&self, c: usize) -> &[usize] {
        &self.cell_faces[self.cell_offsets[c]..self.cell_offsets[c + 1]]
    }

    /// Vertices of face `f`
    pub fn vertices_of(&self, f: usize) -> &[usize] {
        &self.face_vertices[self.face_offsets[f]..self.face_offsets[f + 1]]
    }

    /// Number of faces of cell `c`
    pub fn face_count(&self, c: usize) -> usize {
        self.cell_offsets[c + 1] - self.cell_offsets[c]
    }

    /// Verify that every index array is consistent with the others
    pub fn check_consistency(&self) -> Result<()> {
        let nfaces = self.nfaces();
        let nnodes = self.nnodes();

        check_offsets(&self.cell_offsets, self.ncells, self.cell_faces.len(), "cell")?;
        check_offsets(&self.face_offsets, nfaces, self.face_vertices.len(), "face")?;

        if let Some(f) = self.cell_faces.iter().find(|&&f| f >= nfaces) {
            return Err(GmvError::format(f!("cell references face {f} of {nfaces}")));
        }
        if let Some(v) = self.face_vertices.iter().find(|&&v| v >= nnodes) {
            return Err(GmvError::format(f!("face references node {v} of {nnodes}")));
        }
        if self.face_cell1.len() != nfaces || self.face_cell2.len() != nfaces {
            return Err(GmvError::format("face to cell arrays do not match faces"));
        }
        let bad_cell = izip!(&self.face_cell1, &self.face_cell2)
            .flat_map(|(a, b)| [a, b])
            .flatten()
            .find(|&&c| c >= self.ncells);
        if let Some(c) = bad_cell {
            return Err(GmvError::format(f!("face references cell {c} of {}", self.ncells)));
        }
        if !self.face_pe.is_empty()
            && (self.face_pe.len() != nfaces
                || self.face_opposite.len() != nfaces
                || self.face_opposite_pe.len() != nfaces)
        {
            return Err(GmvError::format("vface arrays do not match faces"));
        }
        Ok(())
    }
}

/// Prefix sums must start at zero, never decrease, and end at `total`
fn check_offsets(offsets: &[usize], n: usize, total: usize, what: &str) -> Result<()> {
    if offsets.len() != n + 1 || offsets.first() != Some(&0) || offsets.last() != Some(&total) {
        return Err(GmvError::format(f!("{what} offsets are inconsistent")));
    }
    if offsets.windows(2).any(|w| w[1] < w[0]) {
        return Err(GmvError::format(f!("{what} offsets decrease")));
    }
    Ok(())
}

impl std::fmt::Display for Mesh {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut s = f!("Mesh {{\n    kind: {:?}\n", self.kind);
        if let Some([nx, ny, nz]) = self.dims {
            s += &f!("    dims: {nx}x{ny}x{nz}\n");
        }
        s += &f!("    nodes: {}\n", self.nnodes());
        s += &f!("    cells: {}\n", self.ncells);
        s += &f!("    faces: {}\n", self.nfaces());
        s += &f!("    face vertices: {}\n", self.face_vertices.len());
        if let Some((lo, hi)) = self.coordinates.bounds() {
            s += &f!(
                "    bounds: [{}, {}, {}] -> [{}, {}, {}]\n",
                lo[0].sci(3, 2),
                lo[1].sci(3, 2),
                lo[2].sci(3, 2),
                hi[0].sci(3, 2),
                hi[1].sci(3, 2),
                hi[2].sci(3, 2)
            );
        }
        s += "}";
        write!(f, "{}", s)
    }
}
