//! Reading whole files: redirection, ordering, byte order and topology

use gmvread::mesh::CellShape;
use gmvread::readers::Keyword;
use gmvread::record::*;
use gmvread::{Encoding, GmvError, GmvReader, GmvWriter, MeshKind, ReaderOptions};
use rstest::rstest;

const TET: &str = "gmvinput ascii
nodes 4
0 1 0 0
0 0 1 0
0 0 0 1
cells 1
tet 4 1 2 3 4
endgmv
";

fn open(bytes: Vec<u8>) -> GmvReader {
    let mut reader = GmvReader::new();
    reader.open_bytes(bytes, ".").unwrap();
    reader
}

fn drain(reader: &mut GmvReader) -> Vec<Record> {
    let mut records = Vec::new();
    loop {
        let record = reader.next_record().unwrap();
        let end = record.is_end();
        records.push(record);
        if end {
            return records;
        }
    }
}

fn square_nodes() -> Nodes {
    Nodes::Unstructured {
        x: vec![0.0, 1.0, 1.0, 0.0],
        y: vec![0.0, 0.0, 1.0, 1.0],
        z: vec![0.0; 4],
    }
}

#[test]
fn ascii_tet() {
    let mut reader = open(TET.as_bytes().to_vec());
    let records = drain(&mut reader);
    assert_eq!(records.len(), 4);
    assert_eq!(records[2], Record::EndOfBlock(Keyword::Cells));
    assert!(matches!(reader.next_record(), Err(GmvError::NotOpen)));

    let mesh = reader.build_mesh().unwrap();
    assert_eq!(mesh.nnodes(), 4);
    assert_eq!(mesh.ncells, 1);
    assert_eq!(mesh.nfaces(), 4);
    assert_eq!(mesh.face_vertices.len(), 12);
    assert_eq!(mesh.cell_offsets, vec![0, 4]);
    assert!(mesh.face_cell1.iter().all(|&c| c == Some(0)));
    assert!(mesh.face_cell2.iter().all(Option::is_none));
}

#[test]
fn read_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tet.gmv");
    std::fs::write(&path, TET).unwrap();

    let gmv = gmvread::read_gmv(&path).unwrap();
    assert_eq!(gmv.encoding, Encoding::Ascii);
    assert_eq!(gmv.mesh.unwrap().ncells, 1);

    let mesh = gmvread::read_gmv_mesh(&path).unwrap();
    assert_eq!(mesh.kind, MeshKind::Unstructured);

    let json = serde_json::to_string(&gmvread::read_gmv(&path).unwrap()).unwrap();
    assert!(json.contains("\"encoding\":\"Ascii\""));
}

#[rstest]
#[case(Encoding::Ascii)]
#[case(Encoding::IeeeI4R4)]
#[case(Encoding::IeeeI8R8)]
fn cells_from_another_file(#[case] encoding: Encoding) {
    let dir = tempfile::tempdir().unwrap();
    let cell = CellKind::Regular {
        shape: CellShape::Quad,
        vertices: vec![1, 2, 3, 4],
    };

    // the included file is a complete file of its own
    let mut included = GmvWriter::new(encoding);
    included.nodes(&square_nodes());
    included.cells(std::slice::from_ref(&cell));
    included.end();
    included.write_to(dir.path().join("cells.gmv")).unwrap();

    let field = Field {
        name: "p".into(),
        centering: Centering::Cell,
        values: vec![2.0],
    };
    let mut w = GmvWriter::new(encoding);
    w.nodes(&square_nodes());
    w.fromfile("cells", "cells.gmv");
    w.variables(std::slice::from_ref(&field));
    w.end();
    let path = dir.path().join("main.gmv");
    w.write_to(&path).unwrap();

    let mut reader = GmvReader::new();
    reader.open(&path).unwrap();
    let records = drain(&mut reader);
    assert_eq!(
        records,
        vec![
            Record::Nodes(square_nodes()),
            Record::Cell(Cell {
                index: 0,
                total: 1,
                kind: cell,
            }),
            Record::EndOfBlock(Keyword::Cells),
            Record::Variable(field),
            Record::EndOfBlock(Keyword::Variable),
            Record::End,
        ]
    );
    let mesh = reader.build_mesh().unwrap();
    assert_eq!(mesh.ncells, 1);
    assert_eq!(mesh.nfaces(), 1);
}

#[test]
fn missing_included_file() {
    let dir = tempfile::tempdir().unwrap();
    let text = "gmvinput ascii\nnodes 1 0 0 0\ncells fromfile \"nowhere.gmv\"\nendgmv\n";
    let path = dir.path().join("main.gmv");
    std::fs::write(&path, text).unwrap();

    let mut reader = GmvReader::new();
    reader.open(&path).unwrap();
    assert!(matches!(reader.next_record(), Ok(Record::Nodes(_))));
    assert!(matches!(reader.next_record(), Err(GmvError::Format(_))));
    assert!(matches!(reader.next_record(), Err(GmvError::NotOpen)));
}

#[test]
fn ordering_violation_is_terminal() {
    let text = "gmvinput ascii
nodes 3  0 1 0  0 0 1  0 0 0
variable  t 1  1 2 3  endvars
endgmv
";
    let mut reader = open(text.as_bytes().to_vec());
    assert!(matches!(reader.next_record(), Ok(Record::Nodes(_))));
    assert!(matches!(reader.next_record(), Err(GmvError::Format(_))));
    assert!(matches!(reader.next_record(), Err(GmvError::NotOpen)));
    assert!(matches!(reader.build_mesh(), Err(GmvError::NotOpen)));
}

#[test]
fn missing_trailer() {
    let text = "gmvinput ascii\nnodes 3  0 1 0  0 0 1  0 0 0\n";

    let mut reader = GmvReader::new();
    let r = reader.open_bytes(text.as_bytes().to_vec(), ".");
    assert!(matches!(r, Err(GmvError::Format(_))));

    // tolerated when asked, but the file still ends too early
    let mut reader = GmvReader::with_options(ReaderOptions::new().require_endgmv(false));
    reader.open_bytes(text.as_bytes().to_vec(), ".").unwrap();
    assert!(matches!(reader.next_record(), Ok(Record::Nodes(_))));
    assert!(matches!(reader.next_record(), Err(GmvError::Io(_))));
}

#[rstest]
#[case(Encoding::IeeeI4R4)]
#[case(Encoding::IeeeI8R8)]
fn swapped_file_detected(#[case] encoding: Encoding) {
    let mut w = GmvWriter::with_layout(encoding, true, false);
    w.nodes(&square_nodes());
    w.cells(&[CellKind::Regular {
        shape: CellShape::Quad,
        vertices: vec![1, 2, 3, 4],
    }]);
    w.end();

    let mut reader = open(w.into_bytes());
    assert!(!reader.is_swapped());
    assert_eq!(reader.next_record().unwrap(), Record::Nodes(square_nodes()));
    assert!(reader.is_swapped());
    drain(&mut reader);
    assert_eq!(reader.build_mesh().unwrap().ncells, 1);
}

#[rstest]
fn swapped_multiple_of_256_nodes(
    #[values(Encoding::IeeeI4R4, Encoding::IeeeI4R8)] encoding: Encoding,
    #[values(256, 4096)] n: usize,
) {
    let nodes = Nodes::Unstructured {
        x: (0..n).map(|i| i as f64).collect(),
        y: vec![0.5; n],
        z: vec![0.0; n],
    };
    let mut w = GmvWriter::with_layout(encoding, true, false);
    w.nodes(&nodes);
    w.cells(&[CellKind::Regular {
        shape: CellShape::Tri,
        vertices: vec![1, 2, 3],
    }]);
    w.end();

    let mut reader = open(w.into_bytes());
    assert_eq!(reader.next_record().unwrap(), Record::Nodes(nodes));
    assert!(reader.is_swapped());
    drain(&mut reader);
    let mesh = reader.build_mesh().unwrap();
    assert_eq!(mesh.nnodes(), n);
    assert_eq!(mesh.ncells, 1);
}

#[test]
fn large_count_confirmed_by_next_keyword() {
    // a low threshold makes four nodes look suspicious
    let mut w = GmvWriter::new(Encoding::IeeeI4R4);
    w.nodes(&square_nodes());
    w.cells(&[CellKind::Regular {
        shape: CellShape::Quad,
        vertices: vec![1, 2, 3, 4],
    }]);
    w.end();

    let options = ReaderOptions::new().swap_probe_threshold(2);
    let mut reader = GmvReader::with_options(options);
    reader.open_bytes(w.into_bytes(), ".").unwrap();
    assert_eq!(reader.next_record().unwrap(), Record::Nodes(square_nodes()));
    assert!(!reader.is_swapped());
}

#[test]
fn empty_and_degenerate_cells() {
    let text = "gmvinput ascii\nnodes 3  0 1 0  0 0 1  0 0 0\ncells 0\nendgmv\n";
    let mut reader = open(text.as_bytes().to_vec());
    drain(&mut reader);
    let mesh = reader.build_mesh().unwrap();
    assert_eq!(mesh.ncells, 0);
    assert_eq!(mesh.nfaces(), 0);

    // two corners of the tet coincide, leaving two real triangles
    let text = "gmvinput ascii\nnodes 3  0 1 0  0 0 1  0 0 0\ncells 1 tet 4 1 1 2 3\nendgmv\n";
    let mut reader = open(text.as_bytes().to_vec());
    drain(&mut reader);
    let mesh = reader.build_mesh().unwrap();
    assert_eq!(mesh.ncells, 1);
    assert_eq!(mesh.nfaces(), 2);
    assert_eq!(mesh.vertices_of(0), &[0, 2, 1]);
    assert_eq!(mesh.vertices_of(1), &[0, 1, 2]);

    // and squashed to a point only one single-vertex face is left
    let text = "gmvinput ascii\nnodes 3  0 1 0  0 0 1  0 0 0\ncells 1 tet 4 2 2 2 2\nendgmv\n";
    let mut reader = open(text.as_bytes().to_vec());
    drain(&mut reader);
    let mesh = reader.build_mesh().unwrap();
    assert_eq!(mesh.nfaces(), 1);
    assert_eq!(mesh.vertices_of(0), &[1]);
}

#[test]
fn structured_grid() {
    let mut w = GmvWriter::new(Encoding::IeeeI4R8);
    w.nodes(&Nodes::Structured {
        dims: [3, 2, 2],
        x: vec![0.0, 1.0, 2.0],
        y: vec![0.0, 1.0],
        z: vec![0.0, 1.0],
    });
    w.cells(&[]);
    w.variables(&[Field {
        name: "rho".into(),
        centering: Centering::Cell,
        values: vec![1.0, 2.0],
    }]);
    w.end();

    let mut reader = open(w.into_bytes());
    let records = drain(&mut reader);
    assert_eq!(records[1], Record::StructuredCells { dims: [3, 2, 2] });
    assert_eq!(reader.counts().cells, 2);

    let mesh = reader.build_mesh().unwrap();
    assert_eq!(mesh.kind, MeshKind::Structured);
    assert_eq!(mesh.nnodes(), 12);
    assert_eq!(mesh.ncells, 2);
    assert_eq!(mesh.nfaces(), 11);
    assert_eq!(mesh.coordinates.node(11), Some([2.0, 1.0, 1.0]));
}

#[rstest]
#[case([5, 1, 1], 4, 5)]
#[case([1, 4, 4], 9, 24)]
fn flat_structured_grid(#[case] dims: [usize; 3], #[case] ncells: usize, #[case] nfaces: usize) {
    let axis = |n: usize| (0..n).map(|i| i as f64).collect::<Vec<f64>>();
    let mut w = GmvWriter::new(Encoding::Ascii);
    w.nodes(&Nodes::Structured {
        dims,
        x: axis(dims[0]),
        y: axis(dims[1]),
        z: axis(dims[2]),
    });
    w.end();

    let gmv = open(w.into_bytes()).read_all().unwrap();
    let mesh = gmv.mesh.unwrap();
    assert_eq!(mesh.kind, MeshKind::Structured);
    assert_eq!(mesh.ncells, ncells);
    assert_eq!(mesh.nfaces(), nfaces);
}

#[test]
fn amr_grid_has_no_mesh() {
    let mut w = GmvWriter::new(Encoding::IeeeI4R4);
    w.nodes(&Nodes::Amr {
        dims: [2, 2, 2],
        origin: [0.0; 3],
        spacing: [1.0; 3],
    });
    w.amr_cells(&AmrCells {
        numtop: 8,
        daughters: vec![0; 8],
    });
    w.end();

    let mut reader = open(w.into_bytes());
    let gmv = reader.read_all().unwrap();
    assert!(gmv.mesh.is_none());
    assert!(matches!(gmv.records[1], Record::AmrCells(_)));
    assert!(matches!(reader.build_mesh(), Err(GmvError::Format(_))));
}

#[rstest]
#[case(Encoding::Ascii)]
#[case(Encoding::IeeeI8R4)]
fn vface_cells(#[case] encoding: Encoding) {
    // two triangles sharing the diagonal from node 1 to node 3
    let face = |cell: i64, opposite: i64, vertices: [i64; 2]| VFace {
        index: 0,
        total: 6,
        vertices: vertices.to_vec(),
        pe: 0,
        opposite,
        opposite_pe: 0,
        cell,
    };
    let faces = vec![
        face(1, 0, [1, 2]),
        face(1, 0, [2, 3]),
        face(1, 4, [3, 1]),
        face(2, 3, [1, 3]),
        face(2, 0, [3, 4]),
        face(2, 0, [4, 1]),
    ];

    let mut w = GmvWriter::new(encoding);
    w.nodes(&square_nodes());
    w.cells(&[
        CellKind::VFace {
            three_d: false,
            faces: vec![1, 2, 3],
        },
        CellKind::VFace {
            three_d: false,
            faces: vec![4, 5, 6],
        },
    ]);
    w.vfaces(&faces);
    w.end();

    let mut reader = open(w.into_bytes());
    drain(&mut reader);
    let mesh = reader.build_mesh().unwrap();
    assert_eq!(mesh.kind, MeshKind::VFaceBased);
    assert_eq!(mesh.ncells, 2);
    assert_eq!(mesh.nfaces(), 6);
    assert_eq!(mesh.faces_of(1), &[3, 4, 5]);
    assert_eq!(mesh.face_cell2[2], Some(1));
    assert_eq!(mesh.face_cell2[3], Some(0));
    assert_eq!(mesh.face_opposite[2], Some(3));
    assert_eq!(mesh.face_cell2[0], None);
}

#[test]
fn xfaces_alone() {
    let face = |cell: i64, opposite: i64, opposite_pe: i32, vertices: Vec<i64>| VFace {
        index: 0,
        total: 3,
        vertices,
        pe: 1,
        opposite,
        opposite_pe,
        cell,
    };
    let faces = vec![
        face(1, 0, 1, vec![1, 2, 3]),
        face(2, 0, 1, vec![1, 3, 4]),
        face(2, 9, 5, vec![2, 3, 4]),
    ];

    let mut w = GmvWriter::new(Encoding::IeeeI4R4);
    w.nodes(&square_nodes());
    w.xfaces(&faces);
    w.end();

    let mut reader = open(w.into_bytes());
    let records = drain(&mut reader);
    let read: Vec<&VFace> = records
        .iter()
        .filter_map(|r| match r {
            Record::XFace(f) => Some(f),
            _ => None,
        })
        .collect();
    assert_eq!(read.len(), 3);
    assert_eq!(read[2].opposite_pe, 5);
    assert_eq!(read[1].vertices, vec![1, 3, 4]);

    let mesh = reader.build_mesh().unwrap();
    assert_eq!(mesh.ncells, 2);
    assert_eq!(mesh.faces_of(1), &[1, 2]);
    // opposite face on another partition leaves the neighbour unknown
    assert_eq!(mesh.face_cell2[2], None);
    assert_eq!(mesh.face_opposite[2], Some(8));
}

#[test]
fn explicit_faces() {
    let mut w = GmvWriter::new(Encoding::Ascii);
    w.nodes(&square_nodes());
    w.faces(
        2,
        &[
            (vec![1, 2], [1, 0]),
            (vec![2, 3], [1, 0]),
            (vec![3, 1], [1, 2]),
            (vec![3, 4], [2, 0]),
            (vec![4, 1], [2, 0]),
        ],
    );
    w.end();

    let mut reader = open(w.into_bytes());
    drain(&mut reader);
    let mesh = reader.build_mesh().unwrap();
    assert_eq!(mesh.kind, MeshKind::FaceBased);
    assert_eq!(mesh.ncells, 2);
    assert_eq!(mesh.faces_of(0), &[0, 1, 2]);
    assert_eq!(mesh.faces_of(1), &[2, 3, 4]);
    assert_eq!(mesh.face_cell2[2], Some(1));
}
