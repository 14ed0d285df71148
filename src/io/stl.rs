//! STL triangle meshes (`.stl`), binary and ASCII variants.
//!
//! STL stores each triangle with its own three corner positions; loading merges exactly
//! coincident corners into shared vertices so downstream code sees a connected mesh. Saving
//! always writes the binary variant.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::attributes::{AttributeSet, ValueMap};
use crate::dataset::{DataSet, DataSetData, DataSetKinds, MeshData};
use crate::io::{FileIoError, FileIoTraits, Operation};
use crate::progress::Progress;

const BINARY_HEADER_LEN: usize = 80;
const TRIANGLE_RECORD_LEN: usize = 50;

/// The STL mesh format.
#[derive(Clone, Debug)]
pub struct StlFileIo {
    no_params: AttributeSet,
}

impl StlFileIo {
    /// Create the plugin; the format declares no parameters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            no_params: AttributeSet::new(),
        }
    }
}

impl Default for StlFileIo {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulates triangles while merging exactly coincident corners.
#[derive(Default)]
struct MeshBuilder {
    vertices: Vec<[f32; 3]>,
    triangles: Vec<[u32; 3]>,
    normals: Vec<[f32; 3]>,
    index: HashMap<[u32; 3], u32>,
}

impl MeshBuilder {
    fn vertex(&mut self, position: [f32; 3]) -> u32 {
        let key = [
            position[0].to_bits(),
            position[1].to_bits(),
            position[2].to_bits(),
        ];
        if let Some(&index) = self.index.get(&key) {
            return index;
        }
        #[allow(clippy::cast_possible_truncation)]
        let index = self.vertices.len() as u32;
        self.vertices.push(position);
        self.index.insert(key, index);
        index
    }

    fn triangle(&mut self, corners: [[f32; 3]; 3], normal: [f32; 3]) {
        let triangle = [
            self.vertex(corners[0]),
            self.vertex(corners[1]),
            self.vertex(corners[2]),
        ];
        self.triangles.push(triangle);
        self.normals.push(normal);
    }

    fn finish(self) -> MeshData {
        MeshData::with_normals(self.vertices, self.triangles, self.normals)
    }
}

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    let mut raw = [0_u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    f32::from_le_bytes(raw)
}

fn read_vector(bytes: &[u8], offset: usize) -> [f32; 3] {
    [
        read_f32(bytes, offset),
        read_f32(bytes, offset + 4),
        read_f32(bytes, offset + 8),
    ]
}

fn load_binary(bytes: &[u8], triangle_count: usize, progress: &Progress) -> MeshData {
    let mut builder = MeshBuilder::default();
    for index in 0..triangle_count {
        let record = BINARY_HEADER_LEN + 4 + index * TRIANGLE_RECORD_LEN;
        let normal = read_vector(bytes, record);
        let corners = [
            read_vector(bytes, record + 12),
            read_vector(bytes, record + 24),
            read_vector(bytes, record + 36),
        ];
        builder.triangle(corners, normal);
        progress.emit_fraction(index + 1, triangle_count);
    }
    builder.finish()
}

fn parse_ascii_vector(path: &Path, line: &str, skip: usize) -> Result<[f32; 3], FileIoError> {
    let components: Vec<f32> = line
        .split_whitespace()
        .skip(skip)
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|_| FileIoError::malformed(path, format!("invalid coordinates in '{line}'")))?;
    if components.len() == 3 {
        Ok([components[0], components[1], components[2]])
    } else {
        Err(FileIoError::malformed(
            path,
            format!("expected three coordinates in '{line}'"),
        ))
    }
}

fn load_ascii(path: &Path, text: &str, progress: &Progress) -> Result<MeshData, FileIoError> {
    let mut builder = MeshBuilder::default();
    let mut normal = [0.0_f32; 3];
    let mut corners: Vec<[f32; 3]> = Vec::with_capacity(3);
    let total = text.len().max(1);
    let mut consumed = 0;
    for line in text.lines() {
        consumed += line.len() + 1;
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("facet normal") {
            normal = parse_ascii_vector(path, rest, 0)?;
            corners.clear();
        } else if line.starts_with("vertex") {
            corners.push(parse_ascii_vector(path, line, 1)?);
        } else if line == "endfacet" {
            if corners.len() != 3 {
                return Err(FileIoError::malformed(
                    path,
                    format!("facet with {} corners instead of 3", corners.len()),
                ));
            }
            builder.triangle([corners[0], corners[1], corners[2]], normal);
            progress.emit_fraction(consumed, total);
        }
    }
    Ok(builder.finish())
}

impl FileIoTraits for StlFileIo {
    fn name(&self) -> &'static str {
        "STL mesh"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["stl"]
    }

    fn parameters(&self, _operation: Operation) -> &AttributeSet {
        &self.no_params
    }

    fn supported_kinds(&self, _operation: Operation) -> DataSetKinds {
        DataSetKinds::MESH
    }

    fn load_data(
        &self,
        path: &Path,
        _values: &ValueMap,
        progress: &Progress,
    ) -> Result<DataSet, FileIoError> {
        let bytes = std::fs::read(path).map_err(|source| FileIoError::io(path, source))?;
        // a binary file is recognized by its exact record-count size, any other content must
        // be the ASCII variant
        let binary_count = (bytes.len() >= BINARY_HEADER_LEN + 4).then(|| {
            let mut raw = [0_u8; 4];
            raw.copy_from_slice(&bytes[BINARY_HEADER_LEN..BINARY_HEADER_LEN + 4]);
            u32::from_le_bytes(raw) as usize
        });
        let mesh = match binary_count {
            Some(count)
                if bytes.len() == BINARY_HEADER_LEN + 4 + count * TRIANGLE_RECORD_LEN =>
            {
                load_binary(&bytes, count, progress)
            }
            _ => {
                let text = core::str::from_utf8(&bytes).map_err(|_| {
                    FileIoError::malformed(path, "neither a binary nor an ASCII STL file")
                })?;
                if !text.trim_start().starts_with("solid") {
                    return Err(FileIoError::malformed(
                        path,
                        "neither a binary nor an ASCII STL file",
                    ));
                }
                load_ascii(path, text, progress)?
            }
        };
        if !mesh.indices_valid() {
            return Err(FileIoError::malformed(path, "inconsistent triangle indices"));
        }
        Ok(DataSet::new(DataSetData::Mesh(mesh)))
    }

    fn save_data(
        &self,
        path: &Path,
        data_set: &mut DataSet,
        _values: &ValueMap,
        progress: &Progress,
    ) -> Result<(), FileIoError> {
        let mesh = data_set
            .as_mesh()
            .ok_or_else(|| FileIoError::Parameter("dataset holds no mesh".to_string()))?;
        if !mesh.indices_valid() {
            return Err(FileIoError::Parameter(
                "mesh triangles reference missing vertices".to_string(),
            ));
        }
        let file = File::create(path).map_err(|source| FileIoError::io(path, source))?;
        let mut writer = BufWriter::new(file);
        let io_err = |source| FileIoError::io(path, source);

        let mut header = [0_u8; BINARY_HEADER_LEN];
        let banner = b"voxio binary STL";
        header[..banner.len()].copy_from_slice(banner);
        writer.write_all(&header).map_err(io_err)?;
        let count = u32::try_from(mesh.triangle_count()).map_err(|_| {
            FileIoError::Parameter(format!(
                "{} triangles exceed the STL limit",
                mesh.triangle_count()
            ))
        })?;
        writer.write_all(&count.to_le_bytes()).map_err(io_err)?;

        for (index, triangle) in mesh.triangles().iter().enumerate() {
            let normal = mesh.normals().get(index).copied().unwrap_or([0.0; 3]);
            let mut record = [0_u8; TRIANGLE_RECORD_LEN];
            let mut offset = 0;
            for component in normal {
                record[offset..offset + 4].copy_from_slice(&component.to_le_bytes());
                offset += 4;
            }
            for &corner in triangle {
                for component in mesh.vertices()[corner as usize] {
                    record[offset..offset + 4].copy_from_slice(&component.to_le_bytes());
                    offset += 4;
                }
            }
            writer.write_all(&record).map_err(io_err)?;
            progress.emit_fraction(index + 1, mesh.triangle_count());
        }
        writer.flush().map_err(io_err)
    }
}
