//! MetaImage volumes (`.mhd` header + sibling payload, or all-in-one `.mha`).
//!
//! The text header is a sequence of `Key = Value` lines terminated by the `ElementDataFile`
//! key, which names either `LOCAL` (payload follows the header) or a sibling file holding
//! the voxel data.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::attributes::{AttributeSet, ValueMap};
use crate::bridge::FlatImage;
use crate::dataset::{DataSet, DataSetData, DataSetKinds, ImageData};
use crate::dispatch::ScalarType;
use crate::io::raw::swap_scalar_bytes;
use crate::io::{FileIoError, FileIoTraits, Operation};
use crate::progress::Progress;

const ELEMENT_TYPES: [(ScalarType, &str); 12] = [
    (ScalarType::Int8, "MET_CHAR"),
    (ScalarType::UInt8, "MET_UCHAR"),
    (ScalarType::Int16, "MET_SHORT"),
    (ScalarType::UInt16, "MET_USHORT"),
    (ScalarType::Int32, "MET_INT"),
    (ScalarType::UInt32, "MET_UINT"),
    (ScalarType::Int32, "MET_LONG"),
    (ScalarType::UInt32, "MET_ULONG"),
    (ScalarType::Int64, "MET_LONG_LONG"),
    (ScalarType::UInt64, "MET_ULONG_LONG"),
    (ScalarType::Float32, "MET_FLOAT"),
    (ScalarType::Float64, "MET_DOUBLE"),
];

fn element_type(name: &str) -> Option<ScalarType> {
    ELEMENT_TYPES
        .iter()
        .find(|(_, met)| *met == name)
        .map(|(scalar_type, _)| *scalar_type)
}

fn element_type_name(scalar_type: ScalarType) -> Option<&'static str> {
    ELEMENT_TYPES
        .iter()
        .find(|(candidate, _)| *candidate == scalar_type)
        .map(|(_, met)| *met)
}

#[derive(Debug, Default)]
struct Header {
    dims: Option<[usize; 3]>,
    spacing: [f64; 3],
    origin: [f64; 3],
    scalar_type: Option<ScalarType>,
    components: usize,
    big_endian: bool,
    header_size: Option<i64>,
    data_file: Option<String>,
}

/// The MetaImage volume format.
#[derive(Clone, Debug)]
pub struct MetaImageFileIo {
    no_params: AttributeSet,
}

impl MetaImageFileIo {
    /// Create the plugin; the format is self-describing and declares no parameters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            no_params: AttributeSet::new(),
        }
    }
}

impl Default for MetaImageFileIo {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_triple<T: std::str::FromStr + Copy>(
    path: &Path,
    key: &str,
    value: &str,
) -> Result<[T; 3], FileIoError> {
    let parsed: Vec<T> = value
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|_| {
            FileIoError::malformed(path, format!("'{value}' is not a valid value for {key}"))
        })?;
    if parsed.len() == 3 {
        Ok([parsed[0], parsed[1], parsed[2]])
    } else {
        Err(FileIoError::malformed(
            path,
            format!("{key} needs three values, got '{value}'"),
        ))
    }
}

fn parse_header(path: &Path, bytes: &[u8]) -> Result<(Header, usize), FileIoError> {
    let mut header = Header {
        spacing: [1.0; 3],
        components: 1,
        ..Header::default()
    };
    let mut offset = 0;
    while offset < bytes.len() {
        let line_end = bytes[offset..]
            .iter()
            .position(|&byte| byte == b'\n')
            .map_or(bytes.len(), |position| offset + position);
        let line = core::str::from_utf8(&bytes[offset..line_end])
            .map_err(|_| FileIoError::malformed(path, "header is not valid UTF-8"))?
            .trim_end_matches('\r');
        offset = line_end + 1;

        let Some((key, value)) = line.split_once('=') else {
            if line.trim().is_empty() {
                continue;
            }
            return Err(FileIoError::malformed(
                path,
                format!("header line '{line}' is not a 'Key = Value' pair"),
            ));
        };
        let (key, value) = (key.trim(), value.trim());
        match key {
            "ObjectType" => {
                if value != "Image" {
                    return Err(FileIoError::malformed(
                        path,
                        format!("object type '{value}' is not an image"),
                    ));
                }
            }
            "NDims" => {
                if value != "3" {
                    return Err(FileIoError::malformed(
                        path,
                        format!("{value}-dimensional images are not supported"),
                    ));
                }
            }
            "DimSize" => header.dims = Some(parse_triple(path, key, value)?),
            "ElementSpacing" | "ElementSize" => {
                header.spacing = parse_triple(path, key, value)?;
            }
            "Offset" | "Origin" | "Position" => {
                header.origin = parse_triple(path, key, value)?;
            }
            "ElementType" => {
                header.scalar_type = Some(element_type(value).ok_or_else(|| {
                    FileIoError::malformed(path, format!("unknown element type '{value}'"))
                })?);
            }
            "ElementNumberOfChannels" => {
                header.components = value.parse().map_err(|_| {
                    FileIoError::malformed(path, format!("invalid channel count '{value}'"))
                })?;
            }
            "ElementByteOrderMSB" | "BinaryDataByteOrderMSB" => {
                header.big_endian = value.eq_ignore_ascii_case("true");
            }
            "CompressedData" => {
                if value.eq_ignore_ascii_case("true") {
                    return Err(FileIoError::malformed(
                        path,
                        "compressed element data is not supported",
                    ));
                }
            }
            "BinaryData" => {
                if value.eq_ignore_ascii_case("false") {
                    return Err(FileIoError::malformed(
                        path,
                        "ASCII element data is not supported",
                    ));
                }
            }
            "HeaderSize" => {
                header.header_size = Some(value.parse().map_err(|_| {
                    FileIoError::malformed(path, format!("invalid header size '{value}'"))
                })?);
            }
            "ElementDataFile" => {
                header.data_file = Some(value.to_string());
                return Ok((header, offset));
            }
            // remaining MetaIO keys (TransformMatrix, AnatomicalOrientation, ...) carry no
            // information this representation keeps
            _ => log::debug!("{}: ignoring header key '{}'", path.display(), key),
        }
    }
    Err(FileIoError::malformed(
        path,
        "header ends without an ElementDataFile key",
    ))
}

impl FileIoTraits for MetaImageFileIo {
    fn name(&self) -> &'static str {
        "MetaImage"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["mhd", "mha"]
    }

    fn parameters(&self, _operation: Operation) -> &AttributeSet {
        &self.no_params
    }

    fn supported_kinds(&self, _operation: Operation) -> DataSetKinds {
        DataSetKinds::VOLUME
    }

    fn load_data(
        &self,
        path: &Path,
        _values: &ValueMap,
        progress: &Progress,
    ) -> Result<DataSet, FileIoError> {
        let bytes = std::fs::read(path).map_err(|source| FileIoError::io(path, source))?;
        let (header, data_offset) = parse_header(path, &bytes)?;
        let dims = header
            .dims
            .ok_or_else(|| FileIoError::malformed(path, "header declares no DimSize"))?;
        let scalar_type = header
            .scalar_type
            .ok_or_else(|| FileIoError::malformed(path, "header declares no ElementType"))?;
        let data_file = header
            .data_file
            .ok_or_else(|| FileIoError::malformed(path, "header declares no ElementDataFile"))?;
        if data_file == "LIST" {
            return Err(FileIoError::malformed(
                path,
                "per-slice element data files are not supported",
            ));
        }
        let total_bytes = scalar_type
            .size()
            .checked_mul(header.components)
            .and_then(|bytes| {
                dims.iter()
                    .try_fold(bytes, |bytes, &extent| bytes.checked_mul(extent))
            })
            .ok_or_else(|| {
                FileIoError::malformed(
                    path,
                    format!(
                        "a {} x {} x {} volume exceeds the addressable size",
                        dims[0], dims[1], dims[2]
                    ),
                )
            })?;
        progress.emit(10);

        let mut buffer = if data_file == "LOCAL" {
            data_offset
                .checked_add(total_bytes)
                .and_then(|end| bytes.get(data_offset..end))
                .ok_or_else(|| {
                    FileIoError::malformed(
                        path,
                        format!("{total_bytes} payload bytes expected after the header"),
                    )
                })?
                .to_vec()
        } else {
            let sibling = path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(&data_file);
            let payload =
                std::fs::read(&sibling).map_err(|source| FileIoError::io(&sibling, source))?;
            let skip = match header.header_size {
                // -1 means the payload sits at the end of the data file
                Some(-1) => payload.len().saturating_sub(total_bytes),
                Some(size) => usize::try_from(size).map_err(|_| {
                    FileIoError::malformed(path, format!("invalid header size {size}"))
                })?,
                None => 0,
            };
            skip.checked_add(total_bytes)
                .and_then(|end| payload.get(skip..end))
                .ok_or_else(|| {
                    FileIoError::malformed(
                        &sibling,
                        format!("{total_bytes} payload bytes expected at offset {skip}"),
                    )
                })?
                .to_vec()
        };
        if header.big_endian {
            swap_scalar_bytes(&mut buffer, scalar_type.size());
        }
        progress.emit(90);

        let flat = FlatImage::new(
            dims,
            header.spacing,
            header.origin,
            scalar_type,
            header.components,
            buffer,
        )?;
        Ok(DataSet::new(DataSetData::Image(ImageData::from_flat(flat))))
    }

    fn save_data(
        &self,
        path: &Path,
        data_set: &mut DataSet,
        _values: &ValueMap,
        progress: &Progress,
    ) -> Result<(), FileIoError> {
        let image = data_set
            .as_image_mut()
            .ok_or_else(|| FileIoError::Parameter("dataset holds no image".to_string()))?;
        let flat = image.bridge_mut().flat()?;
        let met_type = element_type_name(flat.scalar_type()).ok_or_else(|| {
            FileIoError::Parameter(format!(
                "scalar type {} has no MetaImage element type",
                flat.scalar_type()
            ))
        })?;
        let local = path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("mha"));
        let data_file: PathBuf = if local {
            PathBuf::from("LOCAL")
        } else {
            path.with_extension("raw")
                .file_name()
                .map(PathBuf::from)
                .ok_or_else(|| FileIoError::Parameter("path has no file name".to_string()))?
        };

        let [x, y, z] = flat.dims();
        let [sx, sy, sz] = flat.spacing();
        let [ox, oy, oz] = flat.origin();
        let mut header = String::new();
        header.push_str("ObjectType = Image\n");
        header.push_str("NDims = 3\n");
        header.push_str("BinaryData = True\n");
        header.push_str("BinaryDataByteOrderMSB = False\n");
        header.push_str("CompressedData = False\n");
        header.push_str(&format!("DimSize = {x} {y} {z}\n"));
        header.push_str(&format!("ElementSpacing = {sx} {sy} {sz}\n"));
        header.push_str(&format!("Offset = {ox} {oy} {oz}\n"));
        if flat.components() > 1 {
            header.push_str(&format!(
                "ElementNumberOfChannels = {}\n",
                flat.components()
            ));
        }
        header.push_str(&format!("ElementType = {met_type}\n"));
        header.push_str(&format!("ElementDataFile = {}\n", data_file.display()));

        let file = File::create(path).map_err(|source| FileIoError::io(path, source))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(header.as_bytes())
            .map_err(|source| FileIoError::io(path, source))?;
        progress.emit(10);
        if local {
            writer
                .write_all(flat.buffer())
                .map_err(|source| FileIoError::io(path, source))?;
            writer
                .flush()
                .map_err(|source| FileIoError::io(path, source))?;
        } else {
            writer
                .flush()
                .map_err(|source| FileIoError::io(path, source))?;
            let sibling = path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(&data_file);
            std::fs::write(&sibling, flat.buffer())
                .map_err(|source| FileIoError::io(&sibling, source))?;
        }
        progress.emit(95);
        Ok(())
    }
}
