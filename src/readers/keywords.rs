//! Top-level keyword vocabulary of the GMV format

use serde::Serialize;

/// Section identifiers that may appear at the top level of a GMV file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Keyword {
    Nodes,
    NodeV,
    Cells,
    Faces,
    VFaces,
    XFaces,
    Material,
    Velocity,
    Variable,
    Flags,
    Polygons,
    Tracers,
    ProbTime,
    CycleNo,
    NodeIds,
    CellIds,
    FaceIds,
    Surface,
    SurfMats,
    SurfVel,
    SurfVars,
    SurfFlag,
    SurfIds,
    Units,
    VInfo,
    TraceIds,
    Groups,
    CodeName,
    CodeVer,
    SimDate,
    CellPes,
    SubVars,
    Ghosts,
    Vectors,
    Comments,
    EndGmv,
}

/// Every keyword alongside its spelling in the file
const VOCABULARY: [(Keyword, &str); 36] = [
    (Keyword::Nodes, "nodes"),
    (Keyword::NodeV, "nodev"),
    (Keyword::Cells, "cells"),
    (Keyword::Faces, "faces"),
    (Keyword::VFaces, "vfaces"),
    (Keyword::XFaces, "xfaces"),
    (Keyword::Material, "material"),
    (Keyword::Velocity, "velocity"),
    (Keyword::Variable, "variable"),
    (Keyword::Flags, "flags"),
    (Keyword::Polygons, "polygons"),
    (Keyword::Tracers, "tracers"),
    (Keyword::ProbTime, "probtime"),
    (Keyword::CycleNo, "cycleno"),
    (Keyword::NodeIds, "nodeids"),
    (Keyword::CellIds, "cellids"),
    (Keyword::FaceIds, "faceids"),
    (Keyword::Surface, "surface"),
    (Keyword::SurfMats, "surfmats"),
    (Keyword::SurfVel, "surfvel"),
    (Keyword::SurfVars, "surfvars"),
    (Keyword::SurfFlag, "surfflag"),
    (Keyword::SurfIds, "surfids"),
    (Keyword::Units, "units"),
    (Keyword::VInfo, "vinfo"),
    (Keyword::TraceIds, "traceids"),
    (Keyword::Groups, "groups"),
    (Keyword::CodeName, "codename"),
    (Keyword::CodeVer, "codever"),
    (Keyword::SimDate, "simdate"),
    (Keyword::CellPes, "cellpes"),
    (Keyword::SubVars, "subvars"),
    (Keyword::Ghosts, "ghosts"),
    (Keyword::Vectors, "vectors"),
    (Keyword::Comments, "comments"),
    (Keyword::EndGmv, "endgmv"),
];

impl Keyword {
    /// Look up a keyword from its spelling, ignoring case
    ///
    /// ```rust
    /// # use gmvread::readers::Keyword;
    /// assert_eq!(Keyword::from_token("CELLS"), Some(Keyword::Cells));
    /// assert_eq!(Keyword::from_token("cell"), None);
    /// ```
    pub fn from_token(token: &str) -> Option<Keyword> {
        let token = token.to_ascii_lowercase();
        VOCABULARY
            .iter()
            .find(|(_, name)| *name == token)
            .map(|(k, _)| *k)
    }

    /// Spelling used in the file
    pub fn as_str(&self) -> &'static str {
        VOCABULARY
            .iter()
            .find(|(k, _)| k == self)
            .map(|(_, name)| *name)
            .unwrap_or("unknown")
    }

    /// Terminator closing a block of named sub-records
    pub fn end_marker(&self) -> Option<&'static str> {
        match self {
            Keyword::Variable => Some("endvars"),
            Keyword::Flags => Some("endflag"),
            Keyword::Polygons => Some("endpoly"),
            Keyword::Tracers => Some("endtrace"),
            Keyword::SurfVars => Some("endsvar"),
            Keyword::SurfFlag => Some("endsflag"),
            Keyword::Units => Some("endunit"),
            Keyword::VInfo => Some("endvinfo"),
            Keyword::Groups => Some("endgrp"),
            Keyword::SubVars => Some("endsubv"),
            Keyword::Vectors => Some("endvect"),
            Keyword::Comments => Some("endcomm"),
            _ => None,
        }
    }

    /// Whether the keyword data may be redirected with `fromfile "path"`
    pub fn accepts_fromfile(&self) -> bool {
        !matches!(
            self,
            Keyword::Comments
                | Keyword::EndGmv
                | Keyword::CodeName
                | Keyword::CodeVer
                | Keyword::SimDate
                | Keyword::ProbTime
                | Keyword::CycleNo
        )
    }

    /// Keywords that may appear before `nodes`
    pub fn allowed_before_nodes(&self) -> bool {
        matches!(
            self,
            Keyword::Nodes
                | Keyword::NodeV
                | Keyword::CodeName
                | Keyword::CodeVer
                | Keyword::SimDate
                | Keyword::Comments
        )
    }

    /// Keywords carrying per-cell or per-face data, needing cells/faces first
    pub fn needs_cells(&self) -> bool {
        matches!(
            self,
            Keyword::VFaces
                | Keyword::Material
                | Keyword::Velocity
                | Keyword::Variable
                | Keyword::Flags
                | Keyword::Polygons
                | Keyword::CellIds
                | Keyword::FaceIds
                | Keyword::Surface
                | Keyword::SurfMats
                | Keyword::SurfVel
                | Keyword::SurfVars
                | Keyword::SurfFlag
                | Keyword::SurfIds
                | Keyword::Groups
                | Keyword::CellPes
                | Keyword::SubVars
                | Keyword::Ghosts
                | Keyword::Vectors
        )
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
