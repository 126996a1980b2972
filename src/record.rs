//! Records produced by the GMV record stream
//!
//! Every call to [GmvReader::next_record](crate::GmvReader::next_record)
//! produces exactly one [Record]. The record owns all of its data, so it can
//! be kept for as long as the caller likes.
//!
//! Indices are kept exactly as written in the file, i.e. 1-based node, cell
//! and face references. The assembled [Mesh](crate::mesh::Mesh) converts
//! them to 0-based.

// internal modules
use crate::error::{GmvError, Result};
use crate::mesh::CellShape;
use crate::readers::Keyword;
use crate::utils::f;

// external crates
use serde::Serialize;

/// One logical unit of a GMV file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Record {
    /// Node coordinates of any grid type
    Nodes(Nodes),
    /// A single unstructured cell
    Cell(Cell),
    /// Implicit cells of a structured or logically structured grid
    StructuredCells { dims: [usize; 3] },
    /// AMR cell tree
    AmrCells(AmrCells),
    /// A single face of a `faces` block
    Face(Face),
    /// A single face of a `vfaces` block
    VFace(VFace),
    /// A single face of an `xfaces` block
    XFace(VFace),
    Material(Material),
    Velocity(Velocity),
    Variable(Field),
    Flag(Flag),
    Polygon(Polygon),
    /// Tracer particle positions
    Tracers(Tracers),
    /// A named value per tracer
    TracerField(TracerField),
    ProbTime(f64),
    CycleNo(i32),
    NodeIds(Vec<i64>),
    CellIds(Vec<i64>),
    FaceIds(Vec<i64>),
    TraceIds(Vec<i64>),
    /// A single surface facet
    Surface(SurfaceFacet),
    SurfMats(Vec<i32>),
    SurfVel(Velocity),
    SurfVar(Field),
    SurfFlag(Flag),
    SurfIds(Vec<i64>),
    Units(Units),
    VInfo(VInfo),
    Group(Group),
    CodeName(String),
    CodeVer(String),
    SimDate(String),
    CellPes(Vec<i32>),
    SubVar(SubVar),
    Ghosts(Ghosts),
    Vector(VectorField),
    /// The block started by this keyword is complete
    EndOfBlock(Keyword),
    /// `endgmv` was read and the file closed
    End,
}

impl Record {
    /// The keyword that produced this record
    ///
    /// [Record::End] reports [Keyword::EndGmv].
    pub fn keyword(&self) -> Keyword {
        match self {
            Record::Nodes(_) => Keyword::Nodes,
            Record::Cell(_) | Record::StructuredCells { .. } | Record::AmrCells(_) => {
                Keyword::Cells
            }
            Record::Face(_) => Keyword::Faces,
            Record::VFace(_) => Keyword::VFaces,
            Record::XFace(_) => Keyword::XFaces,
            Record::Material(_) => Keyword::Material,
            Record::Velocity(_) => Keyword::Velocity,
            Record::Variable(_) => Keyword::Variable,
            Record::Flag(_) => Keyword::Flags,
            Record::Polygon(_) => Keyword::Polygons,
            Record::Tracers(_) | Record::TracerField(_) => Keyword::Tracers,
            Record::ProbTime(_) => Keyword::ProbTime,
            Record::CycleNo(_) => Keyword::CycleNo,
            Record::NodeIds(_) => Keyword::NodeIds,
            Record::CellIds(_) => Keyword::CellIds,
            Record::FaceIds(_) => Keyword::FaceIds,
            Record::TraceIds(_) => Keyword::TraceIds,
            Record::Surface(_) => Keyword::Surface,
            Record::SurfMats(_) => Keyword::SurfMats,
            Record::SurfVel(_) => Keyword::SurfVel,
            Record::SurfVar(_) => Keyword::SurfVars,
            Record::SurfFlag(_) => Keyword::SurfFlag,
            Record::SurfIds(_) => Keyword::SurfIds,
            Record::Units(_) => Keyword::Units,
            Record::VInfo(_) => Keyword::VInfo,
            Record::Group(_) => Keyword::Groups,
            Record::CodeName(_) => Keyword::CodeName,
            Record::CodeVer(_) => Keyword::CodeVer,
            Record::SimDate(_) => Keyword::SimDate,
            Record::CellPes(_) => Keyword::CellPes,
            Record::SubVar(_) => Keyword::SubVars,
            Record::Ghosts(_) => Keyword::Ghosts,
            Record::Vector(_) => Keyword::Vectors,
            Record::EndOfBlock(k) => *k,
            Record::End => Keyword::EndGmv,
        }
    }

    /// Name carried by the record, for named fields and groups
    pub fn name(&self) -> Option<&str> {
        match self {
            Record::Variable(v) | Record::SurfVar(v) => Some(&v.name),
            Record::Flag(v) | Record::SurfFlag(v) => Some(&v.name),
            Record::TracerField(v) => Some(&v.name),
            Record::VInfo(v) => Some(&v.name),
            Record::Group(v) => Some(&v.name),
            Record::SubVar(v) => Some(&v.name),
            Record::Vector(v) => Some(&v.name),
            Record::CodeName(s) | Record::CodeVer(s) | Record::SimDate(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Record::End)
    }
}

/// What a block of values is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Centering {
    Cell,
    Node,
    Face,
    Surface,
}

impl Centering {
    /// Decode the datatype code used in the file (0 cell, 1 node, 2 face,
    /// 3 surface facet)
    pub fn from_code(code: i32) -> Result<Centering> {
        match code {
            0 => Ok(Centering::Cell),
            1 => Ok(Centering::Node),
            2 => Ok(Centering::Face),
            3 => Ok(Centering::Surface),
            _ => Err(GmvError::format(f!("invalid datatype code {code}"))),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Centering::Cell => 0,
            Centering::Node => 1,
            Centering::Face => 2,
            Centering::Surface => 3,
        }
    }
}

/// Node coordinates, one variant per grid type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Nodes {
    /// Explicit coordinates for every node
    Unstructured { x: Vec<f64>, y: Vec<f64>, z: Vec<f64> },
    /// Three axis vectors of length nx, ny, nz
    Structured {
        dims: [usize; 3],
        x: Vec<f64>,
        y: Vec<f64>,
        z: Vec<f64>,
    },
    /// Explicit coordinates on an nx*ny*nz logical grid
    LogicallyStructured {
        dims: [usize; 3],
        x: Vec<f64>,
        y: Vec<f64>,
        z: Vec<f64>,
    },
    /// Cell counts, origin and spacing of the coarsest AMR level
    Amr {
        dims: [usize; 3],
        origin: [f64; 3],
        spacing: [f64; 3],
    },
}

impl Nodes {
    /// Number of nodes, AMR grids have none until refined so report zero
    pub fn count(&self) -> usize {
        match self {
            Nodes::Unstructured { x, .. } => x.len(),
            Nodes::Structured { dims, .. } | Nodes::LogicallyStructured { dims, .. } => {
                dims.iter().product()
            }
            Nodes::Amr { .. } => 0,
        }
    }
}

/// Vertex lists of a single cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CellKind {
    /// One of the fixed shapes, with its vertices in shape order
    Regular {
        shape: CellShape,
        vertices: Vec<i64>,
    },
    /// Explicit polyhedron: a vertex count per face, then all vertices
    General {
        face_vertex_counts: Vec<i32>,
        vertices: Vec<i64>,
    },
    /// Cell made of faces defined later by `vfaces`/`xfaces`
    VFace { three_d: bool, faces: Vec<i64> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    /// 0-based position within the `cells` block
    pub index: usize,
    /// Number of cells declared for the block
    pub total: usize,
    pub kind: CellKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmrCells {
    pub numtop: i64,
    /// Daughter index per cell, 0 for a leaf
    pub daughters: Vec<i64>,
}

/// A face of a `faces` block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Face {
    pub index: usize,
    pub total: usize,
    /// Number of cells declared in the `faces` header
    pub ncells: usize,
    pub vertices: Vec<i64>,
    /// Owning cells, 0 when there is no cell on that side
    pub cells: [i64; 2],
}

/// A face carrying partition bookkeeping, from `vfaces` or `xfaces`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VFace {
    pub index: usize,
    pub total: usize,
    pub vertices: Vec<i64>,
    /// Processing element the face belongs to
    pub pe: i32,
    /// Matching face on the other side, 0 when none
    pub opposite: i64,
    pub opposite_pe: i32,
    /// Owning cell
    pub cell: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Material {
    pub centering: Centering,
    pub names: Vec<String>,
    pub ids: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Velocity {
    pub centering: Centering,
    pub u: Vec<f64>,
    pub v: Vec<f64>,
    pub w: Vec<f64>,
}

/// Named scalar per cell/node/face (or per facet for surface variables)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub centering: Centering,
    pub values: Vec<f64>,
}

/// Named integer flag with its type names
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flag {
    pub name: String,
    pub centering: Centering,
    pub type_names: Vec<String>,
    pub values: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polygon {
    pub material: i32,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tracers {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TracerField {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceFacet {
    pub index: usize,
    pub total: usize,
    pub vertices: Vec<i64>,
}

/// One entry of a `units` block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Units {
    Coordinates(String),
    Velocity(String),
    /// (field name, unit) pairs for node, cell or face fields
    Fields {
        centering: Centering,
        pairs: Vec<(String, String)>,
    },
}

/// Free-form variable information table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VInfo {
    pub name: String,
    pub nelem: usize,
    pub nlines: usize,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub name: String,
    pub centering: Centering,
    pub ids: Vec<i64>,
}

/// Variable defined on a subset of elements
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubVar {
    pub name: String,
    pub centering: Centering,
    pub ids: Vec<i64>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ghosts {
    pub centering: Centering,
    pub ids: Vec<i64>,
}

/// Multi-component field, one values vector per component
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorField {
    pub name: String,
    pub centering: Centering,
    pub component_names: Vec<String>,
    pub components: Vec<Vec<f64>>,
}
