//! Every record kind written in every encoding and read back

use gmvread::mesh::CellShape;
use gmvread::record::*;
use gmvread::{Encoding, GmvReader, GmvWriter, MeshKind};
use rstest::rstest;

fn tet_nodes() -> Nodes {
    Nodes::Unstructured {
        x: vec![0.0, 1.0, 0.0, 0.0],
        y: vec![0.0, 0.0, 1.0, 0.0],
        z: vec![0.0, 0.0, 0.0, 1.0],
    }
}

fn tet_cell() -> CellKind {
    CellKind::Regular {
        shape: CellShape::Tet,
        vertices: vec![1, 2, 3, 4],
    }
}

/// A tet with one of everything attached to it, and the records expected back
fn sample(w: &mut GmvWriter) -> Vec<Record> {
    let material = Material {
        centering: Centering::Cell,
        names: vec!["steel".into(), "water".into()],
        ids: vec![2],
    };
    let velocity = Velocity {
        centering: Centering::Node,
        u: vec![1.0, 2.0, 3.0, 4.0],
        v: vec![0.5; 4],
        w: vec![-0.25; 4],
    };
    let fields = vec![
        Field {
            name: "temp".into(),
            centering: Centering::Node,
            values: vec![300.0, 310.0, 320.0, 330.0],
        },
        Field {
            name: "dens".into(),
            centering: Centering::Cell,
            values: vec![7.5],
        },
        Field {
            name: "flux".into(),
            centering: Centering::Face,
            values: vec![0.0, 1.0, 2.0, 3.0],
        },
    ];
    let flag = Flag {
        name: "state".into(),
        centering: Centering::Cell,
        type_names: vec!["on".into(), "off".into()],
        values: vec![1],
    };
    let polygon = Polygon {
        material: 1,
        x: vec![0.0, 1.0, 0.0],
        y: vec![0.0, 0.0, 1.0],
        z: vec![0.0; 3],
    };
    let tracers = Tracers {
        x: vec![0.25, 0.5],
        y: vec![0.125, 0.0],
        z: vec![0.0, 0.0],
    };
    let age = TracerField {
        name: "age".into(),
        values: vec![1.0, 2.0],
    };
    let units = vec![
        Units::Coordinates("m".into()),
        Units::Velocity("m/s".into()),
        Units::Fields {
            centering: Centering::Node,
            pairs: vec![("temp".into(), "K".into())],
        },
    ];
    let group = Group {
        name: "top".into(),
        centering: Centering::Face,
        ids: vec![1, 2],
    };
    let vinfo = VInfo {
        name: "table".into(),
        nelem: 2,
        nlines: 2,
        values: vec![1.0, 2.0, 3.0, 4.0],
    };
    let vector = VectorField {
        name: "disp".into(),
        centering: Centering::Node,
        component_names: vec!["dx".into(), "dy".into()],
        components: vec![vec![0.0, 0.5, 1.0, 1.5], vec![2.0; 4]],
    };
    let subvar = SubVar {
        name: "heat".into(),
        centering: Centering::Node,
        ids: vec![1, 3],
        values: vec![0.5, 1.5],
    };
    let ghosts = Ghosts {
        centering: Centering::Cell,
        ids: vec![1],
    };

    w.text("codename", "gmvread");
    w.comments("written for the round trip");
    w.nodes(&tet_nodes());
    w.cells(&[tet_cell()]);
    w.material(&material);
    w.velocity(&velocity);
    w.variables(&fields);
    w.flags(std::slice::from_ref(&flag));
    w.polygons(std::slice::from_ref(&polygon));
    w.tracers(&tracers, std::slice::from_ref(&age));
    w.ids("traceids", &[7, 8]);
    w.probtime(1.25);
    w.cycleno(42);
    w.ids("nodeids", &[10, 20, 30, 40]);
    w.ids("cellids", &[5]);
    w.cellpes(&[3]);
    w.units(&units);
    w.vinfo(std::slice::from_ref(&vinfo));
    w.groups(std::slice::from_ref(&group));
    w.vectors(std::slice::from_ref(&vector));
    w.subvars(std::slice::from_ref(&subvar));
    w.ghosts(&ghosts);
    w.end();

    let mut expected = vec![
        Record::CodeName("gmvread".into()),
        Record::Nodes(tet_nodes()),
        Record::Cell(Cell {
            index: 0,
            total: 1,
            kind: tet_cell(),
        }),
        Record::Material(material),
        Record::Velocity(velocity),
    ];
    expected.extend(fields.into_iter().map(Record::Variable));
    expected.extend([
        Record::Flag(flag),
        Record::Polygon(polygon),
        Record::Tracers(tracers),
        Record::TracerField(age),
        Record::TraceIds(vec![7, 8]),
        Record::ProbTime(1.25),
        Record::CycleNo(42),
        Record::NodeIds(vec![10, 20, 30, 40]),
        Record::CellIds(vec![5]),
        Record::CellPes(vec![3]),
    ]);
    expected.extend(units.into_iter().map(Record::Units));
    expected.extend([
        Record::VInfo(vinfo),
        Record::Group(group),
        Record::Vector(vector),
        Record::SubVar(subvar),
        Record::Ghosts(ghosts),
        Record::End,
    ]);
    expected
}

#[rstest]
#[case(Encoding::Ascii, false)]
#[case(Encoding::IeeeI4R4, false)]
#[case(Encoding::IeeeI4R8, false)]
#[case(Encoding::IeeeI8R4, false)]
#[case(Encoding::IeeeI8R8, false)]
#[case(Encoding::IeeeI4R4, true)]
#[case(Encoding::IeeeI4R8, true)]
#[case(Encoding::IeeeI8R4, true)]
#[case(Encoding::IeeeI8R8, true)]
fn every_encoding(#[case] encoding: Encoding, #[case] wide_names: bool) {
    let mut w = GmvWriter::with_layout(encoding, false, wide_names);
    let expected = sample(&mut w);

    let mut reader = GmvReader::new();
    reader.open_bytes(w.into_bytes(), ".").unwrap();
    assert_eq!(reader.encoding(), Some(encoding));
    assert_eq!(
        reader.name_width(),
        Some(if wide_names { 32 } else { 8 })
    );

    let gmv = reader.read_all().unwrap();
    let records: Vec<Record> = gmv
        .records
        .into_iter()
        .filter(|r| !matches!(r, Record::EndOfBlock(_)))
        .collect();
    assert_eq!(records, expected);

    let mesh = gmv.mesh.unwrap();
    assert_eq!(mesh.kind, MeshKind::Unstructured);
    assert_eq!(mesh.ncells, 1);
    assert_eq!(mesh.nfaces(), 4);
    assert!(!gmv.swapped);
}

#[rstest]
fn swapped_encodings(
    #[values(Encoding::IeeeI4R4, Encoding::IeeeI4R8, Encoding::IeeeI8R4, Encoding::IeeeI8R8)]
    encoding: Encoding,
) {
    let mut w = GmvWriter::with_layout(encoding, true, false);
    let expected = sample(&mut w);

    let mut reader = GmvReader::new();
    reader.open_bytes(w.into_bytes(), ".").unwrap();
    let gmv = reader.read_all().unwrap();
    assert!(gmv.swapped);

    let records: Vec<Record> = gmv
        .records
        .into_iter()
        .filter(|r| !matches!(r, Record::EndOfBlock(_)))
        .collect();
    assert_eq!(records, expected);
    assert_eq!(gmv.mesh.unwrap().nnodes(), 4);
}

#[test]
fn long_names_need_wide_files() {
    let field = Field {
        name: "temperature_celsius".into(),
        centering: Centering::Node,
        values: vec![1.0; 4],
    };

    let mut w = GmvWriter::with_layout(Encoding::IeeeI4R8, false, true);
    w.nodes(&tet_nodes());
    w.cells(&[tet_cell()]);
    w.variables(std::slice::from_ref(&field));
    w.end();
    let gmv = read(w);
    assert!(gmv.records.contains(&Record::Variable(field)));

    // 8-byte names are cut short
    let mut w = GmvWriter::with_layout(Encoding::IeeeI4R8, false, false);
    w.nodes(&tet_nodes());
    w.cells(&[tet_cell()]);
    w.keyword("variable");
    w.name("temperature_celsius");
    w.code(1);
    w.reals(&[1.0; 4]);
    w.name("endvars");
    w.end();
    let names: Vec<String> = read(w)
        .records
        .iter()
        .filter_map(|r| r.name().map(str::to_string))
        .collect();
    assert_eq!(names, vec!["temperat".to_string()]);
}

fn read(w: GmvWriter) -> gmvread::Gmv {
    let mut reader = GmvReader::new();
    reader.open_bytes(w.into_bytes(), ".").unwrap();
    reader.read_all().unwrap()
}
