//! Headerless raw binary volumes (`.raw`, `.vol`, `.rec`, `.pro`).
//!
//! The file carries nothing but (optionally header-prefixed) voxel data; geometry and element
//! type arrive entirely through parameters, with the element type named by the readable-name
//! table of [`ScalarType`].

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::attributes::{AttributeDescriptor, AttributeSet, AttributeValue, ValueKind, ValueMap};
use crate::bridge::FlatImage;
use crate::dataset::{DataSet, DataSetData, DataSetKinds, ImageData};
use crate::dispatch::ScalarType;
use crate::io::{
    param_int, param_str, param_vector3, param_vector3i, FileIoError, FileIoTraits, Operation,
    BYTE_ORDER_BIG, BYTE_ORDER_LITTLE,
};
use crate::progress::Progress;

/// Parameter name for the volume dimensions.
pub const SIZE: &str = "Size";
/// Parameter name for the voxel spacing.
pub const SPACING: &str = "Spacing";
/// Parameter name for the volume origin.
pub const ORIGIN: &str = "Origin";
/// Parameter name for the number of bytes to skip before the voxel data.
pub const HEADERSIZE: &str = "Headersize";
/// Parameter name for the element type (a readable name from the [`ScalarType`] table).
pub const DATA_TYPE: &str = "Data Type";
/// Parameter name for the stored byte order.
pub const BYTE_ORDER: &str = "Byte Order";

fn byte_order_attr() -> AttributeDescriptor {
    // categorical constructors only fail for a selection outside the options
    AttributeDescriptor::new_categorical(
        BYTE_ORDER,
        vec![BYTE_ORDER_LITTLE.to_string(), BYTE_ORDER_BIG.to_string()],
        BYTE_ORDER_LITTLE,
    )
    .unwrap_or_else(|_| {
        AttributeDescriptor::new(BYTE_ORDER, ValueKind::String, BYTE_ORDER_LITTLE.into())
    })
}

/// The raw binary volume format.
#[derive(Clone, Debug)]
pub struct RawFileIo {
    load_params: AttributeSet,
    save_params: AttributeSet,
}

impl RawFileIo {
    /// Create the plugin with its declared parameters.
    ///
    /// # Panics
    ///
    /// Panics if [`ScalarType::UInt16`] has no readable name, which cannot happen.
    #[must_use]
    pub fn new() -> Self {
        let mut load_params = AttributeSet::new();
        load_params.add(AttributeDescriptor::new(
            SIZE,
            ValueKind::Vector3i,
            AttributeValue::Vector3i([1, 1, 1]),
        ));
        load_params.add(AttributeDescriptor::new(
            SPACING,
            ValueKind::Vector3,
            AttributeValue::Vector3([1.0, 1.0, 1.0]),
        ));
        load_params.add(AttributeDescriptor::new(
            ORIGIN,
            ValueKind::Vector3,
            AttributeValue::Vector3([0.0, 0.0, 0.0]),
        ));
        if let Ok(headersize) = AttributeDescriptor::new_bounded(
            HEADERSIZE,
            ValueKind::Discrete,
            AttributeValue::Int(0),
            0.0,
            f64::INFINITY,
        ) {
            load_params.add(headersize);
        }
        let default_type = ScalarType::UInt16
            .readable_name()
            .expect("every concrete scalar type has a readable name");
        if let Ok(data_type) = AttributeDescriptor::new_categorical(
            DATA_TYPE,
            ScalarType::readable_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            default_type,
        ) {
            load_params.add(data_type);
        }
        load_params.add(byte_order_attr());

        let mut save_params = AttributeSet::new();
        save_params.add(byte_order_attr());
        Self {
            load_params,
            save_params,
        }
    }
}

impl Default for RawFileIo {
    fn default() -> Self {
        Self::new()
    }
}

impl FileIoTraits for RawFileIo {
    fn name(&self) -> &'static str {
        "Raw binary"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["raw", "vol", "rec", "pro"]
    }

    fn parameters(&self, operation: Operation) -> &AttributeSet {
        match operation {
            Operation::Load => &self.load_params,
            Operation::Save => &self.save_params,
        }
    }

    fn supported_kinds(&self, _operation: Operation) -> DataSetKinds {
        DataSetKinds::VOLUME
    }

    fn load_data(
        &self,
        path: &Path,
        values: &ValueMap,
        progress: &Progress,
    ) -> Result<DataSet, FileIoError> {
        let size = param_vector3i(values, SIZE)?;
        let spacing = param_vector3(values, SPACING)?;
        let origin = param_vector3(values, ORIGIN)?;
        let headersize = param_int(values, HEADERSIZE)?;
        let scalar_type = ScalarType::from_readable_name(param_str(values, DATA_TYPE)?)
            .ok_or_else(|| {
                FileIoError::Parameter(format!(
                    "'{}' names no known data type",
                    values[DATA_TYPE]
                ))
            })?;
        let big_endian = param_str(values, BYTE_ORDER)? == BYTE_ORDER_BIG;

        if size.iter().any(|&extent| extent <= 0) {
            return Err(FileIoError::Parameter(format!(
                "invalid volume size {} x {} x {}",
                size[0], size[1], size[2]
            )));
        }
        let dims = [size[0] as usize, size[1] as usize, size[2] as usize];
        let oversized = || {
            FileIoError::Parameter(format!(
                "a {} x {} x {} volume exceeds the addressable size",
                size[0], size[1], size[2]
            ))
        };
        let slice_bytes = dims[0]
            .checked_mul(dims[1])
            .and_then(|pixels| pixels.checked_mul(scalar_type.size()))
            .ok_or_else(oversized)?;
        let total_bytes = slice_bytes.checked_mul(dims[2]).ok_or_else(oversized)?;
        let headersize =
            u64::try_from(headersize).map_err(|_| missing_header(headersize))?;
        let required = headersize
            .checked_add(total_bytes as u64)
            .ok_or_else(oversized)?;

        let file = File::open(path).map_err(|source| FileIoError::io(path, source))?;
        let file_size = file
            .metadata()
            .map_err(|source| FileIoError::io(path, source))?
            .len();
        if file_size < required {
            return Err(FileIoError::malformed(
                path,
                format!(
                    "{file_size} bytes are too few for {total_bytes} voxel bytes after a {headersize} byte header"
                ),
            ));
        }
        let mut reader = BufReader::new(file);
        reader
            .seek(SeekFrom::Start(headersize))
            .map_err(|source| FileIoError::io(path, source))?;

        let mut buffer = vec![0_u8; total_bytes];
        for z in 0..dims[2] {
            reader
                .read_exact(&mut buffer[z * slice_bytes..(z + 1) * slice_bytes])
                .map_err(|source| FileIoError::io(path, source))?;
            progress.emit_fraction(z + 1, dims[2]);
        }
        if big_endian {
            swap_scalar_bytes(&mut buffer, scalar_type.size());
        }

        let flat = FlatImage::new(dims, spacing, origin, scalar_type, 1, buffer)?;
        Ok(DataSet::new(DataSetData::Image(ImageData::from_flat(flat))))
    }

    fn save_data(
        &self,
        path: &Path,
        data_set: &mut DataSet,
        values: &ValueMap,
        progress: &Progress,
    ) -> Result<(), FileIoError> {
        let big_endian = param_str(values, BYTE_ORDER)? == BYTE_ORDER_BIG;
        let image = data_set
            .as_image_mut()
            .ok_or_else(|| FileIoError::Parameter("dataset holds no image".to_string()))?;
        let flat = image.bridge_mut().flat()?;
        let scalar_size = flat.scalar_type().size();
        let dims = flat.dims();
        let slice_bytes = dims[0] * dims[1] * flat.components() * scalar_size;

        let file = File::create(path).map_err(|source| FileIoError::io(path, source))?;
        let mut writer = BufWriter::new(file);
        let mut slice = Vec::new();
        for z in 0..dims[2] {
            let bytes = &flat.buffer()[z * slice_bytes..(z + 1) * slice_bytes];
            let bytes = if big_endian {
                slice.clear();
                slice.extend_from_slice(bytes);
                swap_scalar_bytes(&mut slice, scalar_size);
                slice.as_slice()
            } else {
                bytes
            };
            writer
                .write_all(bytes)
                .map_err(|source| FileIoError::io(path, source))?;
            progress.emit_fraction(z + 1, dims[2]);
        }
        writer
            .flush()
            .map_err(|source| FileIoError::io(path, source))
    }
}

fn missing_header(headersize: i64) -> FileIoError {
    FileIoError::Parameter(format!("invalid header size {headersize}"))
}

/// Reverses the byte order of each scalar in an interleaved buffer.
pub(crate) fn swap_scalar_bytes(buffer: &mut [u8], scalar_size: usize) {
    if scalar_size > 1 {
        for scalar in buffer.chunks_exact_mut(scalar_size) {
            scalar.reverse();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{combine_attributes_with_values, extract_values};

    #[test]
    fn oversized_volume_parameters_are_rejected() {
        let io = RawFileIo::new();
        let mut values = ValueMap::new();
        values.insert(
            SIZE.to_string(),
            AttributeValue::Vector3i([i32::MAX, i32::MAX, i32::MAX]),
        );
        let resolved = extract_values(&combine_attributes_with_values(
            io.parameters(Operation::Load),
            &values,
        ));
        // the size check fires before the file is ever opened
        let err = io
            .load_data(Path::new("missing.raw"), &resolved, &Progress::none())
            .unwrap_err();
        assert!(matches!(err, FileIoError::Parameter(_)));
    }

    #[test]
    fn byte_swapping() {
        let mut buffer = vec![1, 2, 3, 4];
        swap_scalar_bytes(&mut buffer, 2);
        assert_eq!(buffer, [2, 1, 4, 3]);
        swap_scalar_bytes(&mut buffer, 1);
        assert_eq!(buffer, [2, 1, 4, 3]);
    }

    #[test]
    fn declared_parameters_survive_text_serialization() {
        let io = RawFileIo::new();
        let params = io.parameters(Operation::Load);
        // the readable data type names contain commas and parentheses
        let reparsed = AttributeSet::from_text(&params.to_text()).unwrap();
        assert_eq!(&reparsed, params);
    }

    #[test]
    fn declared_parameters() {
        let io = RawFileIo::new();
        let params = io.parameters(Operation::Load);
        assert_eq!(params.len(), 6);
        let data_type = params.find(DATA_TYPE).unwrap();
        assert_eq!(
            data_type.selected_option(),
            ScalarType::UInt16.readable_name()
        );
        assert_eq!(io.parameters(Operation::Save).len(), 1);
    }
}
