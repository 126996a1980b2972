//! Topology assembly from streamed cell and face records
//!
//! The [MeshBuilder] is fed one record at a time by the reader and keeps
//! growing flat buffers. Once the topology keywords are complete,
//! [MeshBuilder::build] produces a [Mesh] with 0-based indices and checks
//! it for consistency.
//!
//! There are four ways a file can describe its topology:
//!
//! - `cells` with fixed shapes or general polyhedra, faces are expanded per
//!   cell and never shared
//! - `faces`, where each face names its cells and the cell to face lists
//!   are derived
//! - `cells` made of `vface2d`/`vface3d` entries, paired with a `vfaces` or
//!   `xfaces` block
//! - an `xfaces` block on its own
//!
//! Structured grids have no topology in the file at all, see
//! [grid_faces](crate::mesh::structured::grid_faces).

// internal modules
use crate::error::{zeroed, GmvError, Result};
use crate::mesh::core::{Coordinates, Mesh, MeshKind};
use crate::mesh::shapes::cell_faces;
use crate::mesh::structured::grid_faces;
use crate::record::{Cell, CellKind, Face, Nodes, VFace};
use crate::utils::f;

// external crates
use log::{debug, trace};

/// Incremental assembler of mesh topology
#[derive(Debug, Default)]
pub struct MeshBuilder {
    coordinates: Option<Coordinates>,
    dims: Option<[usize; 3]>,
    kind: Option<MeshKind>,
    amr: bool,
    nnodes: usize,

    /// Cells declared by the current topology block
    ncells: usize,
    cells_seen: usize,
    cell_offsets: Vec<usize>,
    cell_faces: Vec<usize>,

    /// Faces declared by the current `faces`/`vfaces`/`xfaces` block
    nfaces: usize,
    faces_seen: usize,
    face_offsets: Vec<usize>,
    face_vertices: Vec<usize>,
    face_cell1: Vec<Option<usize>>,
    face_cell2: Vec<Option<usize>>,

    /// Raw partition bookkeeping, opposite faces still 1-based
    face_pe: Vec<i32>,
    face_opposite: Vec<i64>,
    face_opposite_pe: Vec<i32>,
    vface_cells: bool,
    vfaces: bool,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything, ready for a new file
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Has any topology keyword been consumed yet
    pub fn has_topology(&self) -> bool {
        self.kind.is_some() || self.amr
    }

    pub fn nnodes(&self) -> usize {
        self.nnodes
    }

    /// Number of faces assembled so far
    pub fn nfaces(&self) -> usize {
        self.face_cell1.len()
    }

    pub fn is_amr(&self) -> bool {
        self.amr
    }

    /// Number of cells declared so far, derived for face-only input
    pub fn ncells(&self) -> usize {
        self.ncells
    }

    /// Register the node block, replacing any previous one
    pub fn set_nodes(&mut self, nodes: &Nodes) {
        self.reset();
        self.nnodes = nodes.count();
        match nodes {
            Nodes::Unstructured { x, y, z } => {
                self.coordinates = Some(Coordinates::Explicit {
                    x: x.clone(),
                    y: y.clone(),
                    z: z.clone(),
                });
            }
            Nodes::Structured { dims, x, y, z } => {
                self.coordinates = Some(Coordinates::Rectilinear {
                    x: x.clone(),
                    y: y.clone(),
                    z: z.clone(),
                });
                self.dims = Some(*dims);
                self.kind = Some(MeshKind::Structured);
            }
            Nodes::LogicallyStructured { dims, x, y, z } => {
                self.coordinates = Some(Coordinates::Explicit {
                    x: x.clone(),
                    y: y.clone(),
                    z: z.clone(),
                });
                self.dims = Some(*dims);
                self.kind = Some(MeshKind::LogicallyStructured);
            }
            Nodes::Amr { .. } => self.amr = true,
        }
        debug!("Builder has {} nodes", self.nnodes);
    }

    /// Structured grids only need the node dimensions, cells are implicit
    pub fn set_structured_cells(&mut self, dims: [usize; 3]) {
        self.ncells = dims.iter().map(|d| d.saturating_sub(1).max(1)).product();
    }

    /// A `cells` block that declares no cells at all
    pub fn add_empty_cells(&mut self) -> Result<()> {
        match self.kind {
            None | Some(MeshKind::Unstructured) => {
                self.kind = Some(MeshKind::Unstructured);
                self.ncells = 0;
                self.cells_seen = 0;
                self.cell_offsets = vec![0];
                self.cell_faces.clear();
                self.clear_faces();
                Ok(())
            }
            Some(other) => Err(GmvError::format(f!(
                "cells cannot be added to a {other:?} mesh"
            ))),
        }
    }

    /// Add a single cell of a `cells` block
    pub fn add_cell(&mut self, cell: &Cell) -> Result<()> {
        if cell.index == 0 {
            self.start_cells(cell)?;
        }
        if self.vface_cells != matches!(cell.kind, CellKind::VFace { .. }) {
            return Err(GmvError::format(f!(
                "cell {} mixes vface and vertex cells",
                cell.index + 1
            )));
        }
        match &cell.kind {
            CellKind::Regular { shape, vertices } => {
                let vertices = self.node_refs(vertices)?;
                for face in cell_faces(*shape, &vertices) {
                    self.push_owned_face(&face, cell.index)?;
                }
            }
            CellKind::General {
                face_vertex_counts,
                vertices,
            } => {
                let vertices = self.node_refs(vertices)?;
                self.reserve_projected(vertices.len(), face_vertex_counts.len())?;
                let mut start = 0;
                for &count in face_vertex_counts {
                    let end = start + count.max(0) as usize;
                    let face = vertices.get(start..end).ok_or_else(|| {
                        GmvError::format(f!("general cell {} is short of vertices", cell.index + 1))
                    })?;
                    self.push_owned_face(face, cell.index)?;
                    start = end;
                }
            }
            CellKind::VFace { faces, .. } => {
                for &id in faces {
                    let face = to_index(id, usize::MAX, "vface")?;
                    self.cell_faces.try_reserve(1).map_err(memory("cell faces"))?;
                    self.cell_faces.push(face);
                }
            }
        }
        self.cell_offsets.push(self.cell_faces.len());
        self.cells_seen += 1;
        trace!("Cell {}/{} assembled", cell.index + 1, cell.total);
        Ok(())
    }

    fn start_cells(&mut self, cell: &Cell) -> Result<()> {
        let vface = matches!(cell.kind, CellKind::VFace { .. });
        self.kind = match self.kind {
            None | Some(MeshKind::Unstructured) | Some(MeshKind::VFaceBased) if vface => {
                Some(MeshKind::VFaceBased)
            }
            None | Some(MeshKind::Unstructured) | Some(MeshKind::VFaceBased) => {
                Some(MeshKind::Unstructured)
            }
            Some(other) => {
                return Err(GmvError::format(f!(
                    "cells cannot be added to a {other:?} mesh"
                )))
            }
        };
        self.vface_cells = vface;
        self.ncells = cell.total;
        self.cells_seen = 0;
        self.cell_offsets.clear();
        self.cell_offsets
            .try_reserve_exact(cell.total + 1)
            .map_err(memory("cell offsets"))?;
        self.cell_offsets.push(0);
        self.cell_faces.clear();
        if !(vface && self.vfaces) {
            self.clear_faces();
        }
        Ok(())
    }

    /// Add a face of a `faces` block
    pub fn add_face(&mut self, face: &Face) -> Result<()> {
        if face.index == 0 {
            match self.kind {
                None | Some(MeshKind::FaceBased) => self.kind = Some(MeshKind::FaceBased),
                Some(other) => {
                    return Err(GmvError::format(f!(
                        "faces cannot be added to a {other:?} mesh"
                    )))
                }
            }
            self.ncells = face.ncells;
            self.start_faces(face.total)?;
        }

        let vertices = self.node_refs(&face.vertices)?;
        let [a, b] = face.cells;
        let a = optional_index(a, self.ncells, "cell")?;
        let b = optional_index(b, self.ncells, "cell")?;
        self.push_face(&vertices, a.or(b), a.and(b))?;
        self.faces_seen += 1;
        Ok(())
    }

    /// Add a face of a `vfaces` or `xfaces` block
    pub fn add_vface(&mut self, face: &VFace) -> Result<()> {
        if face.index == 0 {
            match self.kind {
                None => self.kind = Some(MeshKind::VFaceBased),
                Some(MeshKind::VFaceBased) => {}
                Some(other) => {
                    return Err(GmvError::format(f!(
                        "vfaces cannot be added to a {other:?} mesh"
                    )))
                }
            }
            self.start_faces(face.total)?;
            self.vfaces = true;
        }

        let vertices = self.node_refs(&face.vertices)?;
        let limit = match self.vface_cells {
            true => self.ncells,
            false => usize::MAX,
        };
        let cell = optional_index(face.cell, limit, "cell")?;
        self.push_face(&vertices, cell, None)?;
        self.face_pe.push(face.pe);
        self.face_opposite.push(face.opposite);
        self.face_opposite_pe.push(face.opposite_pe);
        self.faces_seen += 1;
        Ok(())
    }

    fn start_faces(&mut self, total: usize) -> Result<()> {
        self.clear_faces();
        self.nfaces = total;
        self.face_offsets
            .try_reserve_exact(total + 1)
            .map_err(memory("face offsets"))?;
        self.face_offsets.push(0);
        for v in [&mut self.face_cell1, &mut self.face_cell2] {
            v.try_reserve_exact(total).map_err(memory("face cells"))?;
        }
        Ok(())
    }

    fn clear_faces(&mut self) {
        self.nfaces = 0;
        self.faces_seen = 0;
        self.face_offsets.clear();
        self.face_vertices.clear();
        self.face_cell1.clear();
        self.face_cell2.clear();
        self.face_pe.clear();
        self.face_opposite.clear();
        self.face_opposite_pe.clear();
        self.vfaces = false;
    }

    /// Faces created while expanding a cell belong to that cell only
    fn push_owned_face(&mut self, vertices: &[usize], cell: usize) -> Result<()> {
        let index = self.face_cell1.len();
        if self.face_offsets.is_empty() {
            self.face_offsets.push(0);
        }
        self.push_face(vertices, Some(cell), None)?;
        self.cell_faces.try_reserve(1).map_err(memory("cell faces"))?;
        self.cell_faces.push(index);
        Ok(())
    }

    fn push_face(
        &mut self,
        vertices: &[usize],
        cell1: Option<usize>,
        cell2: Option<usize>,
    ) -> Result<()> {
        self.face_vertices
            .try_reserve(vertices.len())
            .map_err(memory("face vertices"))?;
        self.face_vertices.extend_from_slice(vertices);
        self.face_offsets.try_reserve(1).map_err(memory("face offsets"))?;
        self.face_offsets.push(self.face_vertices.len());
        self.face_cell1.try_reserve(1).map_err(memory("face cells"))?;
        self.face_cell1.push(cell1);
        self.face_cell2.try_reserve(1).map_err(memory("face cells"))?;
        self.face_cell2.push(cell2);
        Ok(())
    }

    /// Grow the face buffers of general cells from the average seen so far
    ///
    /// The remaining cells are assumed to need as much room as the mean of
    /// the cells already added, so the buffers are resized a handful of times
    /// rather than once per cell.
    fn reserve_projected(&mut self, vertices: usize, faces: usize) -> Result<()> {
        let needed_vertices = self.face_vertices.len() + vertices;
        let needed_faces = self.face_offsets.len() + faces;
        if needed_vertices <= self.face_vertices.capacity()
            && needed_faces <= self.face_offsets.capacity()
        {
            return Ok(());
        }

        let done = self.cells_seen + 1;
        let remaining = self.ncells.saturating_sub(done);
        let project = |used: usize| used + (used / done) * remaining;
        let target_vertices = project(needed_vertices).max(needed_vertices);
        let target_faces = project(needed_faces).max(needed_faces);
        trace!("Projecting {target_vertices} face vertices over {target_faces} faces");

        self.face_vertices
            .try_reserve(target_vertices - self.face_vertices.len())
            .map_err(memory("face vertices"))?;
        self.face_offsets
            .try_reserve(target_faces - self.face_offsets.len())
            .map_err(memory("face offsets"))?;
        let extra = target_faces.saturating_sub(self.face_cell1.len());
        self.face_cell1.try_reserve(extra).map_err(memory("face cells"))?;
        self.face_cell2.try_reserve(extra).map_err(memory("face cells"))?;
        self.cell_faces.try_reserve(extra).map_err(memory("cell faces"))?;
        Ok(())
    }

    /// Convert 1-based node references, rejecting anything out of range
    fn node_refs(&self, refs: &[i64]) -> Result<Vec<usize>> {
        refs.iter()
            .map(|&r| to_index(r, self.nnodes, "node"))
            .collect()
    }
}

/// Final assembly
impl MeshBuilder {
    /// Assemble the mesh from everything consumed so far
    pub fn build(&self) -> Result<Mesh> {
        if self.amr {
            return Err(GmvError::format(
                "AMR grids cannot be assembled into a face topology",
            ));
        }
        let coordinates = self
            .coordinates
            .clone()
            .ok_or_else(|| GmvError::format("no nodes have been read"))?;

        let mesh = match self.kind {
            None => return Err(GmvError::format("no cells, faces or xfaces have been read")),
            Some(MeshKind::Structured) | Some(MeshKind::LogicallyStructured) => {
                self.build_grid(coordinates)?
            }
            Some(MeshKind::Unstructured) => {
                self.check_complete_cells()?;
                let offsets = self.cell_offsets.clone();
                self.assemble(MeshKind::Unstructured, coordinates, offsets, self.cell_faces.clone())?
            }
            Some(MeshKind::FaceBased) => {
                self.check_complete_faces()?;
                let (offsets, faces) = self.derive_cell_faces(self.ncells, &self.face_cell2)?;
                self.assemble(MeshKind::FaceBased, coordinates, offsets, faces)?
            }
            Some(MeshKind::VFaceBased) => self.build_vfaces(coordinates)?,
        };

        mesh.check_consistency()?;
        debug!(
            "Built {:?} mesh: {} nodes, {} cells, {} faces",
            mesh.kind,
            mesh.nnodes(),
            mesh.ncells,
            mesh.nfaces()
        );
        Ok(mesh)
    }

    fn build_grid(&self, coordinates: Coordinates) -> Result<Mesh> {
        let dims = self
            .dims
            .ok_or_else(|| GmvError::format("structured grid without dimensions"))?;
        let grid = grid_faces(dims)?;
        Ok(Mesh {
            kind: self.kind.unwrap_or(MeshKind::Structured),
            coordinates,
            dims: Some(dims),
            ncells: grid.ncells,
            cell_offsets: grid.cell_offsets,
            cell_faces: grid.cell_faces,
            face_offsets: grid.face_offsets,
            face_vertices: grid.face_vertices,
            face_cell1: grid.face_cell1,
            face_cell2: grid.face_cell2,
            face_pe: grid.face_pe,
            face_opposite: grid.face_opposite,
            face_opposite_pe: grid.face_opposite_pe,
        })
    }

    fn build_vfaces(&self, coordinates: Coordinates) -> Result<Mesh> {
        if !self.vfaces {
            return Err(GmvError::format("vface cells without a vfaces or xfaces block"));
        }
        self.check_complete_faces()?;

        let nfaces = self.face_cell1.len();
        let mut face_opposite: Vec<Option<usize>> = zeroed(nfaces, "opposite faces")?;
        let mut face_cell2: Vec<Option<usize>> = zeroed(nfaces, "face cells")?;
        for f in 0..nfaces {
            let opposite = optional_index(self.face_opposite[f], usize::MAX, "opposite face")?;
            face_opposite[f] = opposite;
            // the second cell is only known when the opposite face is local
            if let Some(o) = opposite {
                if self.face_opposite_pe[f] == self.face_pe[f] {
                    let cell = self.face_cell1.get(o).ok_or_else(|| {
                        GmvError::format(f!("face {} has opposite face {} of {nfaces}", f + 1, o + 1))
                    })?;
                    face_cell2[f] = *cell;
                }
            }
        }

        let (ncells, cell_offsets, cell_faces) = if self.vface_cells {
            self.check_complete_cells()?;
            (self.ncells, self.cell_offsets.clone(), self.cell_faces.clone())
        } else {
            // xfaces on their own, the cell count comes from the highest owner
            let ncells = self
                .face_cell1
                .iter()
                .chain(face_cell2.iter())
                .flatten()
                .max()
                .map_or(0, |c| c + 1);
            let (offsets, faces) = self.derive_cell_faces(ncells, &face_cell2)?;
            (ncells, offsets, faces)
        };

        Ok(Mesh {
            kind: MeshKind::VFaceBased,
            coordinates,
            dims: None,
            ncells,
            cell_offsets,
            cell_faces,
            face_offsets: self.face_offsets.clone(),
            face_vertices: self.face_vertices.clone(),
            face_cell1: self.face_cell1.clone(),
            face_cell2,
            face_pe: self.face_pe.clone(),
            face_opposite,
            face_opposite_pe: self.face_opposite_pe.clone(),
        })
    }

    fn assemble(
        &self,
        kind: MeshKind,
        coordinates: Coordinates,
        cell_offsets: Vec<usize>,
        cell_faces: Vec<usize>,
    ) -> Result<Mesh> {
        let face_cell2 = match kind {
            MeshKind::FaceBased => self.face_cell2.clone(),
            _ => zeroed(self.face_cell1.len(), "face cells")?,
        };
        Ok(Mesh {
            kind,
            coordinates,
            dims: None,
            ncells: self.ncells,
            cell_offsets,
            cell_faces,
            face_offsets: match self.face_offsets.is_empty() {
                true => vec![0],
                false => self.face_offsets.clone(),
            },
            face_vertices: self.face_vertices.clone(),
            face_cell1: self.face_cell1.clone(),
            face_cell2,
            face_pe: Vec::new(),
            face_opposite: Vec::new(),
            face_opposite_pe: Vec::new(),
        })
    }

    /// Bucket faces by the cells on either side of them
    ///
    /// Counts faces per cell, turns the counts into offsets, then fills each
    /// cell's bucket in face order.
    fn derive_cell_faces(
        &self,
        ncells: usize,
        face_cell2: &[Option<usize>],
    ) -> Result<(Vec<usize>, Vec<usize>)> {
        let mut offsets: Vec<usize> = zeroed(ncells + 1, "cell offsets")?;
        let owners = || {
            self.face_cell1
                .iter()
                .zip(face_cell2)
                .enumerate()
                .flat_map(|(f, (a, b))| [a.map(|c| (c, f)), b.map(|c| (c, f))])
                .flatten()
        };

        for (c, _) in owners() {
            let slot = offsets.get_mut(c + 1).ok_or_else(|| {
                GmvError::format(f!("face references cell {} of {ncells}", c + 1))
            })?;
            *slot += 1;
        }
        for c in 0..ncells {
            offsets[c + 1] += offsets[c];
        }

        let mut next = offsets.clone();
        let mut faces: Vec<usize> = zeroed(offsets[ncells], "cell faces")?;
        for (c, f) in owners() {
            faces[next[c]] = f;
            next[c] += 1;
        }
        Ok((offsets, faces))
    }

    fn check_complete_cells(&self) -> Result<()> {
        if self.cells_seen != self.ncells {
            return Err(GmvError::format(f!(
                "cells block incomplete, {} of {} cells read",
                self.cells_seen,
                self.ncells
            )));
        }
        Ok(())
    }

    fn check_complete_faces(&self) -> Result<()> {
        if self.faces_seen != self.nfaces {
            return Err(GmvError::format(f!(
                "faces block incomplete, {} of {} faces read",
                self.faces_seen,
                self.nfaces
            )));
        }
        Ok(())
    }
}

/// 1-based reference to a 0-based index below `limit`
fn to_index(reference: i64, limit: usize, what: &str) -> Result<usize> {
    optional_index(reference, limit, what)?
        .ok_or_else(|| GmvError::format(f!("{what} reference {reference} is not 1-based")))
}

/// Like [to_index] but 0 means "none"
fn optional_index(reference: i64, limit: usize, what: &str) -> Result<Option<usize>> {
    match reference {
        0 => Ok(None),
        r if r > 0 && (r as u64) <= limit as u64 => Ok(Some(r as usize - 1)),
        r => Err(GmvError::format(f!(
            "{what} reference {r} is out of range 1..={limit}"
        ))),
    }
}

fn memory(what: &'static str) -> impl Fn(std::collections::TryReserveError) -> GmvError {
    move |e| GmvError::Memory(f!("{what}: {e}"))
}
