// internal modules
use crate::error::{GmvError, Result};
use crate::mesh::structured::face_count;
use crate::mesh::{CellShape, Mesh, MeshBuilder};
use crate::readers::decoder::{Decoder, Encoding, Source};
use crate::readers::fromfile::StreamStack;
use crate::readers::header;
use crate::readers::keywords::Keyword;
use crate::readers::options::ReaderOptions;
use crate::record::*;
use crate::utils::*;

// standard library
use std::fs::File;
use std::io::{BufReader, Cursor, ErrorKind};
use std::path::{Path, PathBuf};

// external crates
use kdam::{Bar, BarBuilder, BarExt};
use log::{debug, error, trace};
use serde::Serialize;

/// Width of a unit string in binary `units` blocks
const UNIT_WIDTH: usize = 16;

/// Streaming reader for GMV files of any encoding
///
/// The reader is a state machine advanced by [GmvReader::next_record]. Each
/// call returns exactly one [Record]: a whole block for simple keywords, or a
/// single element (one cell, one face, one named variable, ...) for the
/// iterative keywords, which finish with [Record::EndOfBlock].
///
/// Cell and face records are also fed to an internal [MeshBuilder], so once
/// the topology keywords have been read the assembled mesh is available from
/// [GmvReader::build_mesh].
///
/// Any error is terminal. The reader logs it, closes the file, and every
/// later call returns [GmvError::NotOpen] until the next `open`.
///
/// Example:
/// ```rust,no_run
/// use gmvread::{GmvReader, Record};
///
/// let mut reader = GmvReader::new();
/// reader.open("./data/tet.gmv").unwrap();
/// loop {
///     match reader.next_record().unwrap() {
///         Record::End => break,
///         record => println!("{:?}", record.keyword()),
///     }
/// }
/// let mesh = reader.build_mesh().unwrap();
/// ```
#[derive(Debug)]
pub struct GmvReader {
    options: ReaderOptions,
    /// Top-level stream plus any `fromfile` redirection
    streams: Option<StreamStack>,
    state: State,
    builder: MeshBuilder,
    /// Grid type of the last `nodes` block
    layout: Option<NodeLayout>,
    /// Element counts that size the per-element arrays
    counts: Counts,
    has_nodes: bool,
    has_cells: bool,
    encoding: Option<Encoding>,
    name_width: Option<usize>,
    swapped: bool,
}

/// Everything read from a file by [GmvReader::read_all]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gmv {
    pub encoding: Encoding,
    pub swapped: bool,
    pub records: Vec<Record>,
    /// Assembled topology, if the file had any that can be assembled
    pub mesh: Option<Mesh>,
}

/// Number of each kind of element declared so far
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub nodes: usize,
    pub cells: usize,
    pub faces: usize,
    pub surface: usize,
    pub tracers: usize,
}

#[derive(Debug)]
enum State {
    Closed,
    AwaitingKeyword,
    InBlock(Block),
    Finished,
    Failed,
}

/// Sub-state of an iterative keyword
#[derive(Debug)]
enum Block {
    Cells { next: usize, total: usize },
    Faces { next: usize, total: usize, ncells: usize },
    VFaces { next: usize, total: usize },
    XFaces(XFaceTable),
    Surface { next: usize, total: usize },
    /// Named sub-records up to the keyword's end marker
    Named(Keyword),
}

impl Block {
    fn keyword(&self) -> Keyword {
        match self {
            Block::Cells { .. } => Keyword::Cells,
            Block::Faces { .. } => Keyword::Faces,
            Block::VFaces { .. } => Keyword::VFaces,
            Block::XFaces(_) => Keyword::XFaces,
            Block::Surface { .. } => Keyword::Surface,
            Block::Named(k) => *k,
        }
    }
}

/// An `xfaces` block is stored as parallel arrays, so it is read in one go
/// and handed out a face at a time
#[derive(Debug)]
struct XFaceTable {
    next: usize,
    offsets: Vec<usize>,
    vertices: Vec<i64>,
    cells: Vec<i64>,
    opposite: Vec<i64>,
    pe: Vec<i32>,
    opposite_pe: Vec<i32>,
}

impl XFaceTable {
    fn len(&self) -> usize {
        self.cells.len()
    }

    fn face(&self, i: usize) -> VFace {
        VFace {
            index: i,
            total: self.len(),
            vertices: self.vertices[self.offsets[i]..self.offsets[i + 1]].to_vec(),
            pe: self.pe[i],
            opposite: self.opposite[i],
            opposite_pe: self.opposite_pe[i],
            cell: self.cells[i],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeLayout {
    Unstructured,
    Structured([usize; 3]),
    LogicallyStructured([usize; 3]),
    Amr,
}

impl Default for GmvReader {
    fn default() -> Self {
        Self::with_options(ReaderOptions::default())
    }
}

/// High level methods
impl GmvReader {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_options(options: ReaderOptions) -> Self {
        Self {
            options,
            streams: None,
            state: State::Closed,
            builder: MeshBuilder::new(),
            layout: None,
            counts: Counts::default(),
            has_nodes: false,
            has_cells: false,
            encoding: None,
            name_width: None,
            swapped: false,
        }
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Options take effect from the next `open`
    pub fn set_options(&mut self, options: ReaderOptions) {
        self.options = options;
    }

    /// Open a GMV file, validating its header and trailer
    ///
    /// Relative `fromfile` paths are resolved against the file's directory.
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.close();
        let path = path.as_ref();
        debug!("Opening {}", path.display());
        let result = File::open(path).map_err(GmvError::from).and_then(|file| {
            let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            self.start(
                Box::new(BufReader::new(file)),
                Some(path.to_path_buf()),
                base_dir,
            )
        });
        if let Err(e) = &result {
            error!("{e}");
        }
        result
    }

    /// Read a GMV file held in memory
    ///
    /// Relative `fromfile` paths are resolved against `base_dir`.
    pub fn open_bytes<P: AsRef<Path>>(&mut self, bytes: Vec<u8>, base_dir: P) -> Result<()> {
        self.close();
        let result = self.start(
            Box::new(Cursor::new(bytes)),
            None,
            base_dir.as_ref().to_path_buf(),
        );
        if let Err(e) = &result {
            error!("{e}");
        }
        result
    }

    /// Release the file and forget everything read so far
    pub fn close(&mut self) {
        self.streams = None;
        self.state = State::Closed;
        self.builder.reset();
        self.layout = None;
        self.counts = Counts::default();
        self.has_nodes = false;
        self.has_cells = false;
        self.encoding = None;
        self.name_width = None;
        self.swapped = false;
    }

    /// Advance the state machine by one record
    pub fn next_record(&mut self) -> Result<Record> {
        let result = match self.state {
            State::Closed | State::Finished | State::Failed => return Err(GmvError::NotOpen),
            State::AwaitingKeyword => self.read_keyword_record(),
            State::InBlock(_) => self.continue_block(),
        };
        match &result {
            Ok(_) => {
                if let Some(streams) = self.streams.as_mut() {
                    self.swapped = streams.current().is_swapped();
                }
            }
            Err(e) => self.fail(e),
        }
        result
    }

    /// Assemble the topology read so far
    ///
    /// Requires `nodes` followed by a complete `cells`, `faces` or `xfaces`
    /// sequence. Structured grids only need their `nodes`.
    pub fn build_mesh(&self) -> Result<Mesh> {
        match self.state {
            State::Closed | State::Failed => Err(GmvError::NotOpen),
            _ => self.builder.build(),
        }
    }

    /// Read every remaining record, then assemble the mesh if there is one
    pub fn read_all(&mut self) -> Result<Gmv> {
        let encoding = self.encoding.ok_or(GmvError::NotOpen)?;
        let mut progress_bar = self.init_progress_bar()?;
        if self.options.shows_progress() {
            progress_bar.refresh()?;
        }

        let mut records = Vec::new();
        loop {
            let record = self.next_record()?;
            progress_bar.update(1)?;
            let end = record.is_end();
            records.push(record);
            if end {
                break;
            }
        }

        // need an extra line for clean spacing if the progress bar is printed
        if self.options.shows_progress() {
            eprintln!()
        }

        let mesh = match self.builder.has_topology() && !self.builder.is_amr() {
            true => Some(self.build_mesh()?),
            false => None,
        };
        Ok(Gmv {
            encoding,
            swapped: self.swapped,
            records,
            mesh,
        })
    }

    /// Encoding of the open file
    pub fn encoding(&self) -> Option<Encoding> {
        self.encoding
    }

    /// Whether binary values are being byte swapped
    pub fn is_swapped(&self) -> bool {
        self.swapped
    }

    /// Width of binary names, 8 or 32 bytes
    pub fn name_width(&self) -> Option<usize> {
        self.name_width
    }

    /// Element counts declared so far
    pub fn counts(&self) -> Counts {
        self.counts
    }
}

/// State machine internals
impl GmvReader {
    fn start(&mut self, source: Box<dyn Source>, path: Option<PathBuf>, base_dir: PathBuf) -> Result<()> {
        let decoder = header::open_stream(source, self.options.requires_endgmv())?;
        self.encoding = Some(decoder.encoding());
        self.name_width = Some(decoder.name_width());
        self.streams = Some(StreamStack::new(decoder, path, base_dir));
        self.state = State::AwaitingKeyword;
        Ok(())
    }

    fn fail(&mut self, e: &GmvError) {
        error!("{e}");
        self.streams = None;
        self.state = State::Failed;
    }

    fn init_progress_bar(&self) -> Result<Bar> {
        BarBuilder::default()
            .delay(0.0)
            .unit(" records")
            .unit_scale(true)
            .disable(!self.options.shows_progress())
            .build()
            .map_err(GmvError::Format)
    }

    /// Read the next keyword and dispatch to its handler
    fn read_keyword_record(&mut self) -> Result<Record> {
        loop {
            let word = current(&mut self.streams)?.read_keyword()?.ok_or_else(|| {
                GmvError::Io(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "end of file before endgmv",
                ))
            })?;
            let keyword = Keyword::from_token(&word)
                .ok_or_else(|| GmvError::format(f!("unknown keyword \"{word}\"")))?;
            debug!("Keyword {keyword}");
            self.check_order(keyword)?;

            if keyword == Keyword::Comments {
                current(&mut self.streams)?.skip_comments()?;
                continue;
            }

            let keyword = match keyword.accepts_fromfile() {
                true => self.redirect(keyword)?,
                false => keyword,
            };
            return self.dispatch(keyword);
        }
    }

    /// Ordering rules: nodes first, cells or faces before per-element data
    fn check_order(&self, keyword: Keyword) -> Result<()> {
        if !self.has_nodes && !keyword.allowed_before_nodes() {
            return Err(GmvError::format(f!("{keyword} found before nodes")));
        }
        if keyword.needs_cells() && !self.has_cells {
            return Err(GmvError::format(f!(
                "{keyword} found before cells, faces or xfaces"
            )));
        }
        Ok(())
    }

    /// Switch to an included file if the data is `fromfile "path"`
    fn redirect(&mut self, keyword: Keyword) -> Result<Keyword> {
        let Some(path) = current(&mut self.streams)?.peek_fromfile()? else {
            return Ok(keyword);
        };
        let require_endgmv = self.options.requires_endgmv();
        let streams = self.streams.as_mut().ok_or(GmvError::NotOpen)?;
        streams.push(&path, keyword, require_endgmv)
    }

    /// The keyword's data is complete, leave any included file
    fn end_block(&mut self) {
        if let Some(streams) = self.streams.as_mut() {
            streams.pop();
        }
    }

    fn dispatch(&mut self, keyword: Keyword) -> Result<Record> {
        let record = match keyword {
            Keyword::Nodes | Keyword::NodeV => self.read_nodes(keyword)?,
            Keyword::Cells => return self.read_cells(),
            Keyword::Faces => return self.read_faces(),
            Keyword::VFaces => {
                let d = current(&mut self.streams)?;
                let total = to_count(d.read_index("vfaces count")?, "vfaces count")?;
                self.counts.faces = total;
                return self.start_block(Block::VFaces { next: 0, total });
            }
            Keyword::XFaces => return self.read_xfaces(),
            Keyword::Surface => {
                let d = current(&mut self.streams)?;
                let total = to_count(d.read_index("surface count")?, "surface count")?;
                self.counts.surface = total;
                return self.start_block(Block::Surface { next: 0, total });
            }
            Keyword::Tracers => return self.read_tracers(),
            Keyword::Variable
            | Keyword::Flags
            | Keyword::Polygons
            | Keyword::SurfVars
            | Keyword::SurfFlag
            | Keyword::Units
            | Keyword::VInfo
            | Keyword::Groups
            | Keyword::SubVars
            | Keyword::Vectors => return self.start_block(Block::Named(keyword)),
            Keyword::Material => self.read_material()?,
            Keyword::Velocity => {
                let d = current(&mut self.streams)?;
                let centering = Centering::from_code(d.read_code("velocity datatype")?)?;
                let n = self.counts.of(centering);
                Record::Velocity(read_velocity(d, centering, n)?)
            }
            Keyword::SurfVel => {
                let d = current(&mut self.streams)?;
                Record::SurfVel(read_velocity(d, Centering::Surface, self.counts.surface)?)
            }
            Keyword::ProbTime => {
                Record::ProbTime(current(&mut self.streams)?.read_double("probtime")?)
            }
            Keyword::CycleNo => Record::CycleNo(current(&mut self.streams)?.read_code("cycleno")?),
            Keyword::NodeIds => {
                let n = self.counts.nodes;
                Record::NodeIds(current(&mut self.streams)?.read_indices(n, "node ids")?)
            }
            Keyword::CellIds => {
                let n = self.counts.cells;
                Record::CellIds(current(&mut self.streams)?.read_indices(n, "cell ids")?)
            }
            Keyword::FaceIds => {
                let n = self.counts.faces;
                Record::FaceIds(current(&mut self.streams)?.read_indices(n, "face ids")?)
            }
            Keyword::TraceIds => {
                let n = self.counts.tracers;
                Record::TraceIds(current(&mut self.streams)?.read_indices(n, "tracer ids")?)
            }
            Keyword::SurfIds => {
                let n = self.counts.surface;
                Record::SurfIds(current(&mut self.streams)?.read_indices(n, "surface ids")?)
            }
            Keyword::SurfMats => {
                let n = self.counts.surface;
                Record::SurfMats(current(&mut self.streams)?.read_codes(n, "surface materials")?)
            }
            Keyword::CellPes => {
                let n = self.counts.cells;
                Record::CellPes(current(&mut self.streams)?.read_codes(n, "cell pes")?)
            }
            Keyword::Ghosts => {
                let d = current(&mut self.streams)?;
                let centering = Centering::from_code(d.read_code("ghosts datatype")?)?;
                let n = to_count(d.read_index("ghost count")?, "ghost count")?;
                let ids = d.read_indices(n, "ghost ids")?;
                Record::Ghosts(Ghosts { centering, ids })
            }
            Keyword::CodeName => Record::CodeName(current(&mut self.streams)?.read_text(8, "codename")?),
            Keyword::CodeVer => Record::CodeVer(current(&mut self.streams)?.read_text(8, "codever")?),
            Keyword::SimDate => Record::SimDate(current(&mut self.streams)?.read_text(8, "simdate")?),
            Keyword::EndGmv => {
                debug!("End of file reached");
                if let Some(streams) = self.streams.as_mut() {
                    self.swapped = streams.current().is_swapped();
                }
                self.streams = None;
                self.state = State::Finished;
                return Ok(Record::End);
            }
            Keyword::Comments => {
                return Err(GmvError::format("comments must be skipped before dispatch"))
            }
        };
        self.end_block();
        Ok(record)
    }

    fn start_block(&mut self, block: Block) -> Result<Record> {
        self.state = State::InBlock(block);
        self.continue_block()
    }

    fn continue_block(&mut self) -> Result<Record> {
        let State::InBlock(mut block) = std::mem::replace(&mut self.state, State::AwaitingKeyword)
        else {
            return Err(GmvError::NotOpen);
        };
        match self.next_element(&mut block)? {
            Some(record) => {
                self.state = State::InBlock(block);
                Ok(record)
            }
            None => {
                let keyword = block.keyword();
                trace!("End of {keyword} block");
                self.end_block();
                Ok(Record::EndOfBlock(keyword))
            }
        }
    }

    /// Read one element of an iterative block, `None` once it is complete
    fn next_element(&mut self, block: &mut Block) -> Result<Option<Record>> {
        match block {
            Block::Cells { next, total } => {
                if *next == *total {
                    return Ok(None);
                }
                let cell = read_cell(current(&mut self.streams)?, *next, *total)?;
                self.builder.add_cell(&cell)?;
                self.counts.faces = self.builder.nfaces();
                *next += 1;
                Ok(Some(Record::Cell(cell)))
            }
            Block::Faces {
                next,
                total,
                ncells,
            } => {
                if *next == *total {
                    return Ok(None);
                }
                let d = current(&mut self.streams)?;
                let face = read_face(d, *next, *total, *ncells)?;
                self.builder.add_face(&face)?;
                *next += 1;
                Ok(Some(Record::Face(face)))
            }
            Block::VFaces { next, total } => {
                if *next == *total {
                    return Ok(None);
                }
                let face = read_vface(current(&mut self.streams)?, *next, *total)?;
                self.builder.add_vface(&face)?;
                *next += 1;
                Ok(Some(Record::VFace(face)))
            }
            Block::XFaces(table) => {
                if table.next == table.len() {
                    return Ok(None);
                }
                let face = table.face(table.next);
                self.builder.add_vface(&face)?;
                table.next += 1;
                Ok(Some(Record::XFace(face)))
            }
            Block::Surface { next, total } => {
                if *next == *total {
                    return Ok(None);
                }
                let d = current(&mut self.streams)?;
                let n = to_count(d.read_code("facet vertex count")? as i64, "facet vertex count")?;
                let vertices = d.read_indices(n, "facet vertices")?;
                let facet = SurfaceFacet {
                    index: *next,
                    total: *total,
                    vertices,
                };
                *next += 1;
                Ok(Some(Record::Surface(facet)))
            }
            Block::Named(keyword) => self.read_named(*keyword),
        }
    }
}

/// Keyword handlers
impl GmvReader {
    fn read_nodes(&mut self, keyword: Keyword) -> Result<Record> {
        let threshold = self.options.probe_threshold();
        let d = current(&mut self.streams)?;
        let mut raw = d.read_index("node count")?;
        if header::detect_swap(d, raw, threshold)? {
            d.set_swap(true);
            raw = header::swap_count(raw, d.encoding().index_kind());
            debug!("Byte swapping enabled, node count is {raw}");
        }

        let (nodes, layout) = match raw {
            -1 | -2 | -3 if keyword == Keyword::NodeV => {
                return Err(GmvError::format("nodev only supports unstructured nodes"))
            }
            -1 => {
                let dims = read_dims(d)?;
                let x = d.read_reals(dims[0], "x axis")?;
                let y = d.read_reals(dims[1], "y axis")?;
                let z = d.read_reals(dims[2], "z axis")?;
                (Nodes::Structured { dims, x, y, z }, NodeLayout::Structured(dims))
            }
            -2 => {
                let dims = read_dims(d)?;
                let n = node_total(dims)?;
                let x = d.read_reals(n, "x coordinates")?;
                let y = d.read_reals(n, "y coordinates")?;
                let z = d.read_reals(n, "z coordinates")?;
                (
                    Nodes::LogicallyStructured { dims, x, y, z },
                    NodeLayout::LogicallyStructured(dims),
                )
            }
            -3 => {
                let dims = read_dims(d)?;
                let origin = d.read_reals(3, "amr origin")?;
                let spacing = d.read_reals(3, "amr spacing")?;
                let nodes = Nodes::Amr {
                    dims,
                    origin: [origin[0], origin[1], origin[2]],
                    spacing: [spacing[0], spacing[1], spacing[2]],
                };
                (nodes, NodeLayout::Amr)
            }
            n if n >= 0 && keyword == Keyword::NodeV => {
                let n = to_count(n, "node count")?;
                let total = n
                    .checked_mul(3)
                    .ok_or_else(|| GmvError::Memory(f!("{n} interleaved nodes")))?;
                let xyz = d.read_reals(total, "node coordinates")?;
                let mut x = Vec::with_capacity(n);
                let mut y = Vec::with_capacity(n);
                let mut z = Vec::with_capacity(n);
                for p in xyz.chunks_exact(3) {
                    x.push(p[0]);
                    y.push(p[1]);
                    z.push(p[2]);
                }
                (Nodes::Unstructured { x, y, z }, NodeLayout::Unstructured)
            }
            n if n >= 0 => {
                let n = to_count(n, "node count")?;
                let x = d.read_reals(n, "x coordinates")?;
                let y = d.read_reals(n, "y coordinates")?;
                let z = d.read_reals(n, "z coordinates")?;
                (Nodes::Unstructured { x, y, z }, NodeLayout::Unstructured)
            }
            n => return Err(GmvError::format(f!("invalid node count {n}"))),
        };

        debug!("{:?} nodes: {}", layout, nodes.count());
        self.builder.set_nodes(&nodes);
        self.layout = Some(layout);
        self.counts = Counts {
            nodes: nodes.count(),
            ..Default::default()
        };
        self.has_nodes = true;
        self.has_cells = false;
        Ok(Record::Nodes(nodes))
    }

    fn read_cells(&mut self) -> Result<Record> {
        let layout = self.layout.ok_or_else(|| GmvError::format("cells found before nodes"))?;
        let d = current(&mut self.streams)?;
        let n = to_count(d.read_index("cell count")?, "cell count")?;
        self.has_cells = true;

        let record = match layout {
            NodeLayout::Amr => {
                let numtop = d.read_index("amr numtop")?;
                let daughters = d.read_indices(n, "amr daughters")?;
                self.counts.cells = n;
                Record::AmrCells(AmrCells { numtop, daughters })
            }
            NodeLayout::Structured(dims) | NodeLayout::LogicallyStructured(dims) => {
                trace!("Ignoring cell count {n} of a structured grid");
                self.builder.set_structured_cells(dims);
                self.counts.cells = self.builder.ncells();
                self.counts.faces = face_count(dims);
                Record::StructuredCells { dims }
            }
            NodeLayout::Unstructured => {
                self.counts.cells = n;
                if n == 0 {
                    self.builder.add_empty_cells()?;
                }
                return self.start_block(Block::Cells { next: 0, total: n });
            }
        };
        self.end_block();
        Ok(record)
    }

    fn read_faces(&mut self) -> Result<Record> {
        let d = current(&mut self.streams)?;
        let total = to_count(d.read_index("face count")?, "face count")?;
        let ncells = to_count(d.read_index("face cell count")?, "face cell count")?;
        self.has_cells = true;
        self.counts.faces = total;
        self.counts.cells = ncells;
        self.start_block(Block::Faces {
            next: 0,
            total,
            ncells,
        })
    }

    fn read_xfaces(&mut self) -> Result<Record> {
        let d = current(&mut self.streams)?;
        let nfaces = to_count(d.read_index("xfaces count")?, "xfaces count")?;
        let totverts = to_count(d.read_index("xfaces vertex total")?, "xfaces vertex total")?;
        let nverts = d.read_indices(nfaces, "xfaces vertex counts")?;
        let vertices = d.read_indices(totverts, "xfaces vertices")?;
        let cells = d.read_indices(nfaces, "xfaces cells")?;
        let opposite = d.read_indices(nfaces, "xfaces opposite faces")?;
        let pe = d.read_codes(nfaces, "xfaces pes")?;
        let opposite_pe = d.read_codes(nfaces, "xfaces opposite pes")?;

        let mut offsets = Vec::with_capacity(nfaces + 1);
        offsets.push(0);
        for &n in &nverts {
            let n = to_count(n, "xfaces vertex count")?;
            offsets.push(offsets[offsets.len() - 1] + n);
        }
        if offsets[nfaces] != totverts {
            return Err(GmvError::format(f!(
                "xfaces vertex counts sum to {} but {totverts} vertices were declared",
                offsets[nfaces]
            )));
        }

        if !self.has_cells {
            let highest = cells.iter().copied().max().unwrap_or(0);
            self.counts.cells = to_count(highest, "xfaces cell")?;
        }
        self.has_cells = true;
        self.counts.faces = nfaces;
        self.start_block(Block::XFaces(XFaceTable {
            next: 0,
            offsets,
            vertices,
            cells,
            opposite,
            pe,
            opposite_pe,
        }))
    }

    fn read_material(&mut self) -> Result<Record> {
        let d = current(&mut self.streams)?;
        let nmats = to_count(d.read_code("material count")? as i64, "material count")?;
        let centering = Centering::from_code(d.read_code("material datatype")?)?;
        let names = read_names(d, nmats, "material name")?;
        let ids = d.read_codes(self.counts.of(centering), "material ids")?;
        Ok(Record::Material(Material {
            centering,
            names,
            ids,
        }))
    }

    fn read_tracers(&mut self) -> Result<Record> {
        let d = current(&mut self.streams)?;
        let n = to_count(d.read_index("tracer count")?, "tracer count")?;
        let x = d.read_reals(n, "tracer x")?;
        let y = d.read_reals(n, "tracer y")?;
        let z = d.read_reals(n, "tracer z")?;
        self.counts.tracers = n;
        // the named fields follow until endtrace
        self.state = State::InBlock(Block::Named(Keyword::Tracers));
        Ok(Record::Tracers(Tracers { x, y, z }))
    }

    /// One named sub-record of a block closed by an end marker
    fn read_named(&mut self, keyword: Keyword) -> Result<Option<Record>> {
        let counts = self.counts;
        let d = current(&mut self.streams)?;

        if keyword == Keyword::Polygons {
            if at_marker(d, "endpoly")? {
                return Ok(None);
            }
            let material = d.read_code("polygon material")?;
            let n = to_count(d.read_code("polygon vertex count")? as i64, "polygon vertex count")?;
            let x = d.read_reals(n, "polygon x")?;
            let y = d.read_reals(n, "polygon y")?;
            let z = d.read_reals(n, "polygon z")?;
            return Ok(Some(Record::Polygon(Polygon { material, x, y, z })));
        }

        let marker = keyword
            .end_marker()
            .ok_or_else(|| GmvError::format(f!("{keyword} has no end marker")))?;
        let name = d.read_name("name")?;
        if name.eq_ignore_ascii_case(marker) {
            return Ok(None);
        }
        trace!("{keyword} {name}");

        let record = match keyword {
            Keyword::Variable => {
                let centering = Centering::from_code(d.read_code("variable datatype")?)?;
                let values = d.read_reals(counts.of(centering), "variable values")?;
                Record::Variable(Field {
                    name,
                    centering,
                    values,
                })
            }
            Keyword::Flags => {
                let ntypes = to_count(d.read_code("flag type count")? as i64, "flag type count")?;
                let centering = Centering::from_code(d.read_code("flag datatype")?)?;
                let type_names = read_names(d, ntypes, "flag type name")?;
                let values = d.read_codes(counts.of(centering), "flag values")?;
                Record::Flag(Flag {
                    name,
                    centering,
                    type_names,
                    values,
                })
            }
            Keyword::Tracers => {
                let values = d.read_reals(counts.tracers, "tracer values")?;
                Record::TracerField(TracerField { name, values })
            }
            Keyword::SurfVars => {
                let values = d.read_reals(counts.surface, "surface variable values")?;
                Record::SurfVar(Field {
                    name,
                    centering: Centering::Surface,
                    values,
                })
            }
            Keyword::SurfFlag => {
                let ntypes = to_count(d.read_code("flag type count")? as i64, "flag type count")?;
                let type_names = read_names(d, ntypes, "flag type name")?;
                let values = d.read_codes(counts.surface, "surface flag values")?;
                Record::SurfFlag(Flag {
                    name,
                    centering: Centering::Surface,
                    type_names,
                    values,
                })
            }
            Keyword::Units => Record::Units(read_units(d, &name)?),
            Keyword::VInfo => {
                let nelem = to_count(d.read_code("vinfo element count")? as i64, "vinfo element count")?;
                let nlines = to_count(d.read_code("vinfo line count")? as i64, "vinfo line count")?;
                let total = nelem
                    .checked_mul(nlines)
                    .ok_or_else(|| GmvError::Memory(f!("vinfo {nelem}x{nlines}")))?;
                let values = d.read_reals(total, "vinfo values")?;
                Record::VInfo(VInfo {
                    name,
                    nelem,
                    nlines,
                    values,
                })
            }
            Keyword::Groups => {
                let centering = Centering::from_code(d.read_code("group datatype")?)?;
                let n = to_count(d.read_code("group size")? as i64, "group size")?;
                let ids = d.read_indices(n, "group ids")?;
                Record::Group(Group {
                    name,
                    centering,
                    ids,
                })
            }
            Keyword::SubVars => {
                let centering = Centering::from_code(d.read_code("subvars datatype")?)?;
                let n = to_count(d.read_index("subvars count")?, "subvars count")?;
                let ids = d.read_indices(n, "subvars ids")?;
                let values = d.read_reals(n, "subvars values")?;
                Record::SubVar(SubVar {
                    name,
                    centering,
                    ids,
                    values,
                })
            }
            Keyword::Vectors => Record::Vector(read_vector(d, name, counts)?),
            other => return Err(GmvError::format(f!("{other} is not a named block"))),
        };
        Ok(Some(record))
    }
}

impl Counts {
    /// Number of values for data attached to `centering`
    pub fn of(&self, centering: Centering) -> usize {
        match centering {
            Centering::Cell => self.cells,
            Centering::Node => self.nodes,
            Centering::Face => self.faces,
            Centering::Surface => self.surface,
        }
    }
}

/// Active decoder, borrowing only the stream field
fn current(streams: &mut Option<StreamStack>) -> Result<&mut Decoder> {
    streams
        .as_mut()
        .map(StreamStack::current)
        .ok_or(GmvError::NotOpen)
}

/// Non-negative count from the file
fn to_count(value: i64, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| GmvError::format(f!("invalid {what} {value}")))
}

fn read_dims(d: &mut Decoder) -> Result<[usize; 3]> {
    let raw = d.read_indices(3, "grid dimensions")?;
    let mut dims = [0usize; 3];
    for (dim, &value) in dims.iter_mut().zip(&raw) {
        *dim = to_count(value, "grid dimension")?;
        if *dim == 0 {
            return Err(GmvError::format(f!("grid dimension of zero in {raw:?}")));
        }
    }
    Ok(dims)
}

fn node_total(dims: [usize; 3]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| GmvError::Memory(f!("grid of {dims:?} nodes")))
}

fn read_names(d: &mut Decoder, n: usize, what: &str) -> Result<Vec<String>> {
    (0..n).map(|_| d.read_name(what)).collect()
}

/// Consume `marker` if it is next, otherwise leave the stream untouched
fn at_marker(d: &mut Decoder, marker: &str) -> Result<bool> {
    let start = d.position()?;
    match d.read_keyword()? {
        Some(word) if word == marker => Ok(true),
        _ => {
            d.seek(start)?;
            Ok(false)
        }
    }
}

fn read_velocity(d: &mut Decoder, centering: Centering, n: usize) -> Result<Velocity> {
    let u = d.read_reals(n, "velocity u")?;
    let v = d.read_reals(n, "velocity v")?;
    let w = d.read_reals(n, "velocity w")?;
    Ok(Velocity { centering, u, v, w })
}

fn read_cell(d: &mut Decoder, index: usize, total: usize) -> Result<Cell> {
    let name = d.read_text(8, "cell type")?.to_ascii_lowercase();
    let kind = match name.as_str() {
        "general" => {
            let nfaces = to_count(d.read_code("general face count")? as i64, "general face count")?;
            let face_vertex_counts = d.read_codes(nfaces, "general vertex counts")?;
            let mut nverts = 0usize;
            for &count in &face_vertex_counts {
                nverts += to_count(count as i64, "general vertex count")?;
            }
            let vertices = d.read_indices(nverts, "general vertices")?;
            CellKind::General {
                face_vertex_counts,
                vertices,
            }
        }
        "vface2d" | "vface3d" => {
            let nfaces = to_count(d.read_code("vface count")? as i64, "vface count")?;
            let faces = d.read_indices(nfaces, "vface ids")?;
            CellKind::VFace {
                three_d: name == "vface3d",
                faces,
            }
        }
        _ => {
            let shape = CellShape::from_name(&name)
                .ok_or_else(|| GmvError::format(f!("unknown cell type \"{name}\"")))?;
            let n = d.read_code("cell vertex count")?;
            if n as i64 != shape.vertex_count() as i64 {
                return Err(GmvError::format(f!(
                    "{name} cell {} has {n} vertices, expected {}",
                    index + 1,
                    shape.vertex_count()
                )));
            }
            let vertices = d.read_indices(shape.vertex_count(), "cell vertices")?;
            CellKind::Regular { shape, vertices }
        }
    };
    trace!("Cell {}/{total}: {name}", index + 1);
    Ok(Cell { index, total, kind })
}

fn read_face(d: &mut Decoder, index: usize, total: usize, ncells: usize) -> Result<Face> {
    let n = to_count(d.read_code("face vertex count")? as i64, "face vertex count")?;
    let vertices = d.read_indices(n, "face vertices")?;
    let cells = d.read_indices(2, "face cells")?;
    Ok(Face {
        index,
        total,
        ncells,
        vertices,
        cells: [cells[0], cells[1]],
    })
}

fn read_vface(d: &mut Decoder, index: usize, total: usize) -> Result<VFace> {
    let n = to_count(d.read_code("vface vertex count")? as i64, "vface vertex count")?;
    let pe = d.read_code("vface pe")?;
    let opposite = d.read_index("vface opposite face")?;
    let opposite_pe = d.read_code("vface opposite pe")?;
    let cell = d.read_index("vface cell")?;
    let vertices = d.read_indices(n, "vface vertices")?;
    Ok(VFace {
        index,
        total,
        vertices,
        pe,
        opposite,
        opposite_pe,
        cell,
    })
}

/// One entry of a `units` block, `selector` already read
fn read_units(d: &mut Decoder, selector: &str) -> Result<Units> {
    let selector = selector.to_ascii_lowercase();
    let units = match selector.as_str() {
        "xyz" => Units::Coordinates(d.read_text(UNIT_WIDTH, "coordinate unit")?),
        "velocity" => Units::Velocity(d.read_text(UNIT_WIDTH, "velocity unit")?),
        "nodes" | "cells" | "faces" => {
            let centering = match selector.as_str() {
                "nodes" => Centering::Node,
                "cells" => Centering::Cell,
                _ => Centering::Face,
            };
            let n = to_count(d.read_code("unit count")? as i64, "unit count")?;
            let mut pairs = Vec::with_capacity(n.min(1024));
            for _ in 0..n {
                let field = d.read_name("unit field")?;
                let unit = d.read_text(UNIT_WIDTH, "unit")?;
                pairs.push((field, unit));
            }
            Units::Fields { centering, pairs }
        }
        other => return Err(GmvError::format(f!("unknown units entry \"{other}\""))),
    };
    Ok(units)
}

fn read_vector(d: &mut Decoder, name: String, counts: Counts) -> Result<VectorField> {
    let centering = Centering::from_code(d.read_code("vector datatype")?)?;
    let ncomp = to_count(d.read_code("vector components")? as i64, "vector components")?;
    let named = d.read_code("vector component name flag")? != 0;
    let component_names = match named {
        true => read_names(d, ncomp, "vector component name")?,
        false => (1..=ncomp).map(|i| i.to_string()).collect(),
    };
    let n = counts.of(centering);
    let total = n
        .checked_mul(ncomp)
        .ok_or_else(|| GmvError::Memory(f!("{ncomp} components of {n} values")))?;
    let values = d.read_reals(total, "vector values")?;
    let components = match n {
        0 => vec![Vec::new(); ncomp],
        _ => values.chunks(n).map(<[f64]>::to_vec).collect(),
    };
    Ok(VectorField {
        name,
        centering,
        component_names,
        components,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(text: &str) -> GmvReader {
        let mut r = GmvReader::new();
        r.open_bytes(text.as_bytes().to_vec(), ".").unwrap();
        r
    }

    fn records(text: &str) -> Result<Vec<Record>> {
        let mut r = reader(text);
        let mut out = Vec::new();
        loop {
            let record = r.next_record()?;
            let end = record.is_end();
            out.push(record);
            if end {
                return Ok(out);
            }
        }
    }

    const TET: &str = "gmvinput ascii
nodes 4
0 1 0 0
0 0 1 0
0 0 0 1
cells 1
tet 4 1 2 3 4
endgmv
";

    #[test]
    fn minimal_tet() {
        let mut r = reader(TET);
        assert!(matches!(r.next_record().unwrap(), Record::Nodes(_)));
        assert!(matches!(r.next_record().unwrap(), Record::Cell(_)));
        assert_eq!(
            r.next_record().unwrap(),
            Record::EndOfBlock(Keyword::Cells)
        );
        assert_eq!(r.next_record().unwrap(), Record::End);
        assert!(matches!(r.next_record(), Err(GmvError::NotOpen)));

        let mesh = r.build_mesh().unwrap();
        assert_eq!(mesh.nnodes(), 4);
        assert_eq!(mesh.ncells, 1);
        assert_eq!(mesh.nfaces(), 4);
        assert_eq!(mesh.face_vertices.len(), 12);
        assert_eq!(mesh.cell_offsets, vec![0, 4]);
    }

    #[test]
    fn material_before_nodes_fails() {
        let mut r = reader("gmvinput ascii\nmaterial 1 0 steel 1\nendgmv\n");
        assert!(matches!(r.next_record(), Err(GmvError::Format(_))));
        assert!(matches!(r.next_record(), Err(GmvError::NotOpen)));
        assert!(matches!(r.build_mesh(), Err(GmvError::NotOpen)));
    }

    #[test]
    fn file_without_nodes_fails() {
        let mut r = reader("gmvinput ascii\ncodename gmvread\nendgmv\n");
        assert!(matches!(r.next_record(), Ok(Record::CodeName(_))));
        assert!(matches!(r.next_record(), Err(GmvError::Format(_))));
        assert!(matches!(r.next_record(), Err(GmvError::NotOpen)));
    }

    #[test]
    fn variables_before_cells_fail() {
        let text = "gmvinput ascii\nnodes 1 0 0 0\nvariable p 1 2.0 endvars\nendgmv\n";
        assert!(matches!(records(text), Err(GmvError::Format(_))));
    }

    #[test]
    fn named_blocks_and_comments() {
        let text = "gmvinput ascii
codename demo
nodes 4
0 1 0 0
0 0 1 0
0 0 0 1
comments
 free text, nodes 12
 endcomm
cells 1
tet 4 1 2 3 4
variable
pressure 0 1.5
temp 1 1 2 3 4
endvars
flags
region 2 0 inner outer 2
endflag
probtime 0.25
cycleno 12
endgmv
";
        let all = records(text).unwrap();
        let names: Vec<&str> = all.iter().filter_map(Record::name).collect();
        assert_eq!(names, vec!["demo", "pressure", "temp", "region"]);
        assert!(all.contains(&Record::ProbTime(0.25)));
        assert!(all.contains(&Record::CycleNo(12)));
        assert!(all.contains(&Record::EndOfBlock(Keyword::Variable)));
        let temp = all.iter().find(|r| r.name() == Some("temp")).unwrap();
        match temp {
            Record::Variable(f) => {
                assert_eq!(f.centering, Centering::Node);
                assert_eq!(f.values, vec![1.0, 2.0, 3.0, 4.0]);
            }
            _ => panic!("not a variable"),
        }
    }

    #[test]
    fn polygons_and_tracers() {
        let text = "gmvinput ascii
nodes 1 0 0 0
cells 0
polygons
2 3 0 1 0 0 0 1 0 0 0
endpoly
tracers 2 0 1 0 1 0 1
speed 5 6
endtrace
traceids 7 8
endgmv
";
        let all = records(text).unwrap();
        assert!(all.iter().any(|r| matches!(r, Record::Polygon(p) if p.material == 2)));
        assert!(all.contains(&Record::TraceIds(vec![7, 8])));
        assert!(all.contains(&Record::EndOfBlock(Keyword::Tracers)));
        assert!(all.iter().any(|r| r.name() == Some("speed")));
    }

    #[test]
    fn wrong_vertex_count() {
        let text = "gmvinput ascii\nnodes 4 0 1 0 0 0 0 1 0 0 0 0 1\ncells 1\ntet 3 1 2 3\nendgmv\n";
        assert!(matches!(records(text), Err(GmvError::Format(_))));
    }

    #[test]
    fn missing_endgmv_is_eof() {
        let mut r = GmvReader::with_options(ReaderOptions::new().require_endgmv(false));
        r.open_bytes(b"gmvinput ascii\nnodes 1 0 0 0\n".to_vec(), ".").unwrap();
        r.next_record().unwrap();
        assert!(matches!(r.next_record(), Err(GmvError::Io(_))));
    }

    #[test]
    fn unknown_keyword() {
        let text = "gmvinput ascii\nnodes 1 0 0 0\nbogus 1\nendgmv\n";
        assert!(matches!(records(text), Err(GmvError::Format(_))));
    }

    #[test]
    fn close_resets() {
        let mut r = reader(TET);
        r.next_record().unwrap();
        r.close();
        assert!(matches!(r.next_record(), Err(GmvError::NotOpen)));
        assert_eq!(r.encoding(), None);
        r.open_bytes(TET.as_bytes().to_vec(), ".").unwrap();
        let gmv = r.read_all().unwrap();
        assert_eq!(gmv.records.len(), 4);
        assert_eq!(gmv.mesh.map(|m| m.ncells), Some(1));
    }
}
