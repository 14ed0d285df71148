//! End-to-end load/save round trips through the file type registry.

use std::path::Path;
use std::sync::Arc;

use voxio::attributes::{AttributeValue, ValueMap};
use voxio::bridge::FlatImage;
use voxio::dataset::{
    CollectionData, DataSet, DataSetData, DataSetKind, ImageData, MeshData, FILE_NAME_KEY,
};
use voxio::dispatch::ScalarType;
use voxio::io::{raw, registry, FileIoError, Operation};
use voxio::progress::Progress;

fn volume(dims: [usize; 3], spacing: [f64; 3]) -> DataSet {
    let voxels: Vec<u16> = (0..dims.iter().product::<usize>())
        .map(|index| (index * 7 % 1000) as u16)
        .collect();
    let flat = FlatImage::new(
        dims,
        spacing,
        [0.0; 3],
        ScalarType::UInt16,
        1,
        bytemuck::cast_slice(&voxels).to_vec(),
    )
    .unwrap();
    DataSet::new(DataSetData::Image(ImageData::from_flat(flat)))
}

fn flat_buffer(data_set: &mut DataSet) -> Vec<u8> {
    data_set
        .as_image_mut()
        .unwrap()
        .bridge_mut()
        .flat()
        .unwrap()
        .buffer()
        .to_vec()
}

fn raw_load_values(dims: [usize; 3]) -> ValueMap {
    let mut values = ValueMap::new();
    values.insert(
        raw::SIZE.to_string(),
        AttributeValue::Vector3i([dims[0] as i32, dims[1] as i32, dims[2] as i32]),
    );
    values.insert(
        raw::DATA_TYPE.to_string(),
        AttributeValue::from(ScalarType::UInt16.readable_name().unwrap()),
    );
    values
}

#[test]
fn raw_round_trip_stamps_metadata() {
    registry::setup_default_file_types();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("block.raw");
    let dims = [4, 3, 2];

    let mut original = volume(dims, [1.0; 3]);
    let saver = registry::create_io(&path, Operation::Save).unwrap();
    saver
        .save(&path, &mut original, &ValueMap::new(), &Progress::none())
        .unwrap();
    assert_eq!(
        original.metadata().get(FILE_NAME_KEY),
        Some(&AttributeValue::String(path.display().to_string()))
    );

    let loader = registry::create_io(&path, Operation::Load).unwrap();
    // Spacing, Origin, Headersize and Byte Order fall back to their declared defaults
    let mut loaded = loader
        .load(&path, &raw_load_values(dims), &Progress::none())
        .unwrap();
    assert_eq!(loaded.kind(), DataSetKind::Volume);
    assert_eq!(loaded.name(), "block");
    assert_eq!(loaded.as_image().unwrap().dims(), dims);
    assert_eq!(
        loaded.metadata().get(raw::HEADERSIZE),
        Some(&AttributeValue::Int(0))
    );
    assert_eq!(flat_buffer(&mut loaded), flat_buffer(&mut original));
}

#[test]
fn raw_byte_order_swaps_consistently() {
    registry::setup_default_file_types();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("swapped.raw");
    let dims = [2, 2, 1];

    let mut original = volume(dims, [1.0; 3]);
    let mut save_values = ValueMap::new();
    save_values.insert(
        raw::BYTE_ORDER.to_string(),
        AttributeValue::from(voxio::io::BYTE_ORDER_BIG),
    );
    let io = registry::create_io(&path, Operation::Save).unwrap();
    io.save(&path, &mut original, &save_values, &Progress::none())
        .unwrap();

    let mut load_values = raw_load_values(dims);
    load_values.insert(
        raw::BYTE_ORDER.to_string(),
        AttributeValue::from(voxio::io::BYTE_ORDER_BIG),
    );
    let loader = registry::create_io(&path, Operation::Load).unwrap();
    let mut loaded = loader.load(&path, &load_values, &Progress::none()).unwrap();
    assert_eq!(flat_buffer(&mut loaded), flat_buffer(&mut original));

    // reading the same file as little-endian yields byte-swapped voxels
    let mut wrong_order = loader
        .load(&path, &raw_load_values(dims), &Progress::none())
        .unwrap();
    assert_ne!(flat_buffer(&mut wrong_order), flat_buffer(&mut original));
}

#[test]
fn raw_truncated_file_fails() {
    registry::setup_default_file_types();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.raw");
    std::fs::write(&path, [0_u8; 10]).unwrap();

    let loader = registry::create_io(&path, Operation::Load).unwrap();
    let err = loader
        .load(&path, &raw_load_values([4, 4, 4]), &Progress::none())
        .unwrap_err();
    assert!(matches!(err, FileIoError::MalformedFile { .. }));
}

#[test]
fn meta_image_round_trip_with_sibling_payload() {
    registry::setup_default_file_types();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chamber.mhd");

    let mut original = volume([3, 2, 2], [0.5, 0.5, 2.0]);
    let io = registry::create_io(&path, Operation::Save).unwrap();
    io.save(&path, &mut original, &ValueMap::new(), &Progress::none())
        .unwrap();
    assert!(dir.path().join("chamber.raw").is_file());

    let mut loaded = io.load(&path, &ValueMap::new(), &Progress::none()).unwrap();
    let image = loaded.as_image().unwrap();
    assert_eq!(image.dims(), [3, 2, 2]);
    assert_eq!(image.spacing(), [0.5, 0.5, 2.0]);
    assert_eq!(image.scalar_type(), ScalarType::UInt16);
    assert_eq!(flat_buffer(&mut loaded), flat_buffer(&mut original));
}

#[test]
fn meta_image_local_payload_round_trip() {
    registry::setup_default_file_types();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chamber.mha");

    let mut original = volume([2, 2, 2], [1.0; 3]);
    let io = registry::create_io(&path, Operation::Save).unwrap();
    io.save(&path, &mut original, &ValueMap::new(), &Progress::none())
        .unwrap();

    let mut loaded = io.load(&path, &ValueMap::new(), &Progress::none()).unwrap();
    assert_eq!(flat_buffer(&mut loaded), flat_buffer(&mut original));
}

#[test]
fn stl_round_trip_merges_corners() {
    registry::setup_default_file_types();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plate.stl");

    let mesh = MeshData::with_normals(
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ],
        vec![[0, 1, 2], [0, 2, 3]],
        vec![[0.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
    );
    let mut original = DataSet::new(DataSetData::Mesh(mesh.clone()));
    let io = registry::create_io(&path, Operation::Save).unwrap();
    io.save(&path, &mut original, &ValueMap::new(), &Progress::none())
        .unwrap();

    let loaded = io.load(&path, &ValueMap::new(), &Progress::none()).unwrap();
    assert_eq!(loaded.as_mesh().unwrap(), &mesh);
}

#[test]
fn graph_loads_through_registry_with_defaults() {
    registry::setup_default_file_types();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fibers.txt");
    std::fs::write(
        &path,
        "%% exported fibers\nid\tx\ty\tz\tcolor\n1\t1\t2\t3\t#102030\n2\t4\t5\t6\t#405060\n\
$$\nid\tVert_1\tVert_2\tcolor\n1\t1\t2\t#ffffff\n",
    )
    .unwrap();

    let io = registry::create_io(&path, Operation::Load).unwrap();
    let loaded = io.load(&path, &ValueMap::new(), &Progress::none()).unwrap();
    let graph = loaded.as_graph().unwrap();
    assert_eq!(graph.vertices().len(), 2);
    assert_eq!(graph.edges().len(), 1);
    // the default spacing was stamped into the metadata
    assert_eq!(
        loaded.metadata().get("Spacing"),
        Some(&AttributeValue::Vector3([1.0, 1.0, 1.0]))
    );
    assert!(registry::create_io(&path, Operation::Save).is_err());
}

#[test]
fn project_round_trip_reproduces_member_load() {
    registry::setup_default_file_types();
    let dir = tempfile::tempdir().unwrap();
    let child_path = dir.path().join("child.raw");
    let project_path = dir.path().join("scan.iaproj");
    let dims = [4, 2, 2];

    let mut child = volume(dims, [1.0; 3]);
    let saver = registry::create_io(&child_path, Operation::Save).unwrap();
    saver
        .save(&child_path, &mut child, &ValueMap::new(), &Progress::none())
        .unwrap();
    let loader = registry::create_io(&child_path, Operation::Load).unwrap();
    let mut child = loader
        .load(&child_path, &raw_load_values(dims), &Progress::none())
        .unwrap();
    let child_bytes = flat_buffer(&mut child);

    let mut project = DataSet::new(DataSetData::Collection(CollectionData::new(vec![
        Arc::new(child),
    ])));
    let io = registry::create_io(&project_path, Operation::Save).unwrap();
    io.save(&project_path, &mut project, &ValueMap::new(), &Progress::none())
        .unwrap();

    // the stored parameter values travel as text and are coerced back on the nested load
    let loaded = io
        .load(&project_path, &ValueMap::new(), &Progress::none())
        .unwrap();
    let collection = loaded.as_collection().unwrap();
    assert_eq!(collection.len(), 1);
    assert_eq!(collection.settings_file(), Some(project_path.as_path()));
    assert_eq!(collection.data_sets()[0].name(), "child");
    let mut member = (*collection.data_sets()[0]).clone();
    assert_eq!(member.as_image().unwrap().dims(), dims);
    assert_eq!(flat_buffer(&mut member), child_bytes);
}

#[test]
fn project_version_gate_returns_no_partial_collection() {
    registry::setup_default_file_types();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.iaproj");
    std::fs::write(&path, "FileVersion=9.9\n[DataSet0]\nFile=missing.raw\n").unwrap();

    let io = registry::create_io(&path, Operation::Load).unwrap();
    let err = io
        .load(&path, &ValueMap::new(), &Progress::none())
        .unwrap_err();
    assert!(matches!(err, FileIoError::VersionMismatch { .. }));
}

#[test]
fn project_save_requires_child_provenance() {
    registry::setup_default_file_types();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unsaved.iaproj");

    // this child was never loaded from or saved to a file
    let child = DataSet::new(DataSetData::Mesh(MeshData::default()));
    let mut project = DataSet::new(DataSetData::Collection(CollectionData::new(vec![
        Arc::new(child),
    ])));
    let io = registry::create_io(&path, Operation::Save).unwrap();
    let err = io
        .save(&path, &mut project, &ValueMap::new(), &Progress::none())
        .unwrap_err();
    assert!(matches!(err, FileIoError::CannotReference { .. }));
    assert!(!path.exists());
}

#[test]
fn unknown_extension_has_no_io() {
    registry::setup_default_file_types();
    let err = registry::create_io(Path::new("notes.csv"), Operation::Load).unwrap_err();
    assert!(matches!(err, FileIoError::NoRegisteredIo { .. }));
}
