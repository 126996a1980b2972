//! Implicit faces of structured and logically structured grids
//!
//! The file only gives node dimensions, so the faces are generated from the
//! (i, j, k) indexing. Faces shared by two neighbouring cells are generated
//! once, and both cells point at the same face. The cells on either side of
//! a face come from index arithmetic.
//!
//! Axes with a single node layer are collapsed. A grid flat in one axis is
//! made of quads whose faces are their four edges, a grid with one axis left
//! is made of line cells whose faces are their end points, and a lone node
//! is one cell with a single point face.
//!
//! Every grid lives on one partition, so the PE of every face is 0 and an
//! interior face is its own opposite.

// internal modules
use crate::error::{GmvError, Result};
use crate::utils::f;

/// Generated topology of a logical grid
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GridFaces {
    pub ncells: usize,
    pub cell_offsets: Vec<usize>,
    pub cell_faces: Vec<usize>,
    pub face_offsets: Vec<usize>,
    pub face_vertices: Vec<usize>,
    pub face_cell1: Vec<Option<usize>>,
    pub face_cell2: Vec<Option<usize>>,
    pub face_pe: Vec<i32>,
    pub face_opposite: Vec<Option<usize>>,
    pub face_opposite_pe: Vec<i32>,
}

impl GridFaces {
    fn with_cells(ncells: usize) -> Self {
        GridFaces {
            ncells,
            cell_offsets: vec![0],
            face_offsets: vec![0],
            ..Default::default()
        }
    }

    fn push_face(&mut self, vertices: &[usize], low: Option<usize>, high: Option<usize>) {
        let face = self.face_cell1.len();
        let shared = low.is_some() && high.is_some();
        self.face_vertices.extend_from_slice(vertices);
        self.face_offsets.push(self.face_vertices.len());
        self.face_cell1.push(low.or(high));
        self.face_cell2.push(low.and(high));
        self.face_pe.push(0);
        self.face_opposite.push(shared.then_some(face));
        self.face_opposite_pe.push(0);
    }

    fn push_cell(&mut self, faces: &[usize]) {
        self.cell_faces.extend_from_slice(faces);
        self.cell_offsets.push(self.cell_faces.len());
    }
}

/// Axes with more than one node layer, as (node count, node stride)
fn active_axes(dims: [usize; 3]) -> Result<Vec<(usize, usize)>> {
    let [nx, ny, nz] = dims;
    if nx == 0 || ny == 0 || nz == 0 {
        return Err(GmvError::format(f!(
            "cannot build faces for a {nx}x{ny}x{nz} grid"
        )));
    }
    let strides = [1, nx, nx * ny];
    Ok(dims
        .into_iter()
        .zip(strides)
        .filter(|&(n, _)| n > 1)
        .collect())
}

/// Generate all faces for a grid of `dims` nodes
pub fn grid_faces(dims: [usize; 3]) -> Result<GridFaces> {
    let grid = match active_axes(dims)?.as_slice() {
        [a, b, c] => faces_3d(*a, *b, *c),
        [a, b] => faces_2d(*a, *b),
        [a] => faces_1d(*a),
        _ => {
            let mut grid = GridFaces::with_cells(1);
            grid.push_face(&[0], Some(0), None);
            grid.push_cell(&[0]);
            grid
        }
    };
    Ok(grid)
}

/// Number of faces [grid_faces] would generate, without building them
pub fn face_count(dims: [usize; 3]) -> usize {
    let Ok(axes) = active_axes(dims) else {
        return 0;
    };
    match axes.as_slice() {
        [(nx, _), (ny, _), (nz, _)] => {
            let (cx, cy, cz) = (nx - 1, ny - 1, nz - 1);
            nx * cy * cz + cx * ny * cz + cx * cy * nz
        }
        [(nx, _), (ny, _)] => nx * (ny - 1) + (nx - 1) * ny,
        [(nx, _)] => *nx,
        _ => 1,
    }
}

type Axis = (usize, usize);

fn faces_3d((nx, sx): Axis, (ny, sy): Axis, (nz, sz): Axis) -> GridFaces {
    let (cx, cy, cz) = (nx - 1, ny - 1, nz - 1);
    let node = |i: usize, j: usize, k: usize| i * sx + j * sy + k * sz;
    let cell = |i: usize, j: usize, k: usize| i + cx * (j + cy * k);

    // faces normal to x, then y, then z
    let y_offset = nx * cy * cz;
    let z_offset = y_offset + cx * ny * cz;
    let xf = |i: usize, j: usize, k: usize| i + nx * (j + cy * k);
    let yf = |i: usize, j: usize, k: usize| y_offset + i + cx * (j + ny * k);
    let zf = |i: usize, j: usize, k: usize| z_offset + i + cx * (j + cy * k);

    let mut grid = GridFaces::with_cells(cx * cy * cz);

    for k in 0..cz {
        for j in 0..cy {
            for i in 0..nx {
                let low = (i > 0).then(|| cell(i - 1, j, k));
                let high = (i < cx).then(|| cell(i, j, k));
                let verts = [
                    node(i, j, k),
                    node(i, j + 1, k),
                    node(i, j + 1, k + 1),
                    node(i, j, k + 1),
                ];
                grid.push_face(&verts, low, high);
            }
        }
    }
    for k in 0..cz {
        for j in 0..ny {
            for i in 0..cx {
                let low = (j > 0).then(|| cell(i, j - 1, k));
                let high = (j < cy).then(|| cell(i, j, k));
                let verts = [
                    node(i, j, k),
                    node(i, j, k + 1),
                    node(i + 1, j, k + 1),
                    node(i + 1, j, k),
                ];
                grid.push_face(&verts, low, high);
            }
        }
    }
    for k in 0..nz {
        for j in 0..cy {
            for i in 0..cx {
                let low = (k > 0).then(|| cell(i, j, k - 1));
                let high = (k < cz).then(|| cell(i, j, k));
                let verts = [
                    node(i, j, k),
                    node(i + 1, j, k),
                    node(i + 1, j + 1, k),
                    node(i, j + 1, k),
                ];
                grid.push_face(&verts, low, high);
            }
        }
    }

    // same face order as the hex shape: bottom, top, front, right, back, left
    for k in 0..cz {
        for j in 0..cy {
            for i in 0..cx {
                grid.push_cell(&[
                    zf(i, j, k),
                    zf(i, j, k + 1),
                    yf(i, j, k),
                    xf(i + 1, j, k),
                    yf(i, j + 1, k),
                    xf(i, j, k),
                ]);
            }
        }
    }
    grid
}

fn faces_2d((nx, sx): Axis, (ny, sy): Axis) -> GridFaces {
    let (cx, cy) = (nx - 1, ny - 1);
    let node = |i: usize, j: usize| i * sx + j * sy;
    let cell = |i: usize, j: usize| i + cx * j;

    let y_offset = nx * cy;
    let xe = |i: usize, j: usize| i + nx * j;
    let ye = |i: usize, j: usize| y_offset + i + cx * j;

    let mut grid = GridFaces::with_cells(cx * cy);

    for j in 0..cy {
        for i in 0..nx {
            let low = (i > 0).then(|| cell(i - 1, j));
            let high = (i < cx).then(|| cell(i, j));
            grid.push_face(&[node(i, j), node(i, j + 1)], low, high);
        }
    }
    for j in 0..ny {
        for i in 0..cx {
            let low = (j > 0).then(|| cell(i, j - 1));
            let high = (j < cy).then(|| cell(i, j));
            grid.push_face(&[node(i, j), node(i + 1, j)], low, high);
        }
    }

    for j in 0..cy {
        for i in 0..cx {
            grid.push_cell(&[ye(i, j), xe(i + 1, j), ye(i, j + 1), xe(i, j)]);
        }
    }
    grid
}

fn faces_1d((nx, sx): Axis) -> GridFaces {
    let cx = nx - 1;
    let mut grid = GridFaces::with_cells(cx);
    for i in 0..nx {
        let low = (i > 0).then(|| i - 1);
        let high = (i < cx).then_some(i);
        grid.push_face(&[i * sx], low, high);
    }
    for i in 0..cx {
        grid.push_cell(&[i, i + 1]);
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case([2, 2, 2], 1, 6)]
    #[case([3, 2, 2], 2, 11)]
    #[case([3, 3, 3], 8, 36)]
    #[case([2, 2, 1], 1, 4)]
    #[case([3, 3, 1], 4, 12)]
    #[case([1, 4, 4], 9, 24)]
    #[case([4, 1, 3], 6, 17)]
    #[case([5, 1, 1], 4, 5)]
    #[case([1, 1, 1], 1, 1)]
    fn face_counts(#[case] dims: [usize; 3], #[case] ncells: usize, #[case] nfaces: usize) {
        let grid = grid_faces(dims).unwrap();
        assert_eq!(grid.ncells, ncells);
        assert_eq!(grid.face_offsets.len() - 1, nfaces);
        assert_eq!(grid.cell_offsets.len() - 1, ncells);
        assert_eq!(face_count(dims), nfaces);
    }

    #[test]
    fn shared_face_between_neighbours() {
        let grid = grid_faces([3, 2, 2]).unwrap();
        // right face of cell 0 is the left face of cell 1
        let right_of_0 = grid.cell_faces[3];
        let left_of_1 = grid.cell_faces[6 + 5];
        assert_eq!(right_of_0, left_of_1);
        assert_eq!(grid.face_cell1[right_of_0], Some(0));
        assert_eq!(grid.face_cell2[right_of_0], Some(1));
        // boundary faces have one cell
        let left_of_0 = grid.cell_faces[5];
        assert_eq!(grid.face_cell1[left_of_0], Some(0));
        assert_eq!(grid.face_cell2[left_of_0], None);
    }

    #[test]
    fn single_hex_faces_match_node_layout() {
        let grid = grid_faces([2, 2, 2]).unwrap();
        let bottom = grid.cell_faces[0];
        let verts = &grid.face_vertices[grid.face_offsets[bottom]..grid.face_offsets[bottom + 1]];
        assert_eq!(verts, &[0, 1, 3, 2]);
        let top = grid.cell_faces[1];
        let verts = &grid.face_vertices[grid.face_offsets[top]..grid.face_offsets[top + 1]];
        assert_eq!(verts, &[4, 5, 7, 6]);
    }

    #[test]
    fn flat_in_x_is_a_quad_grid() {
        let grid = grid_faces([1, 4, 4]).unwrap();
        // first cell spans nodes 0, 1, 4, 5 of the y-z plane
        assert_eq!(grid.cell_faces[..4], [12, 1, 13, 0]);
        let verts: Vec<&[usize]> = grid.cell_faces[..4]
            .iter()
            .map(|&f| &grid.face_vertices[grid.face_offsets[f]..grid.face_offsets[f + 1]])
            .collect();
        assert_eq!(verts, vec![&[0, 1][..], &[1, 5], &[4, 5], &[0, 4]]);
    }

    #[test]
    fn line_grid_has_point_faces() {
        let grid = grid_faces([5, 1, 1]).unwrap();
        assert_eq!(grid.ncells, 4);
        assert_eq!(grid.face_vertices, vec![0, 1, 2, 3, 4]);
        assert_eq!(grid.cell_faces[2..4], [1, 2]);
        assert_eq!(grid.face_cell1, vec![Some(0), Some(0), Some(1), Some(2), Some(3)]);
        assert_eq!(grid.face_cell2, vec![None, Some(1), Some(2), Some(3), None]);

        // a column along z uses the z stride
        let grid = grid_faces([1, 1, 3]).unwrap();
        assert_eq!(grid.face_vertices, vec![0, 1, 2]);
    }

    #[test]
    fn interior_faces_are_their_own_opposite() {
        let grid = grid_faces([3, 2, 2]).unwrap();
        let shared = grid.cell_faces[3];
        assert_eq!(grid.face_opposite[shared], Some(shared));
        assert_eq!(grid.face_opposite[grid.cell_faces[5]], None);
        assert!(grid.face_pe.iter().chain(&grid.face_opposite_pe).all(|&pe| pe == 0));
        assert_eq!(grid.face_pe.len(), grid.face_cell1.len());
    }

    #[test]
    fn zero_dims_rejected() {
        assert!(grid_faces([5, 5, 0]).is_err());
        assert!(grid_faces([0, 1, 1]).is_err());
        assert_eq!(face_count([0, 1, 1]), 0);
    }
}
