use num::NumCast;

use crate::bridge::{BridgeError, FlatImage, ImageBridge, TypedImage};
use crate::dispatch::{Pixel, PixelLayout, ScalarType};
use crate::typed_call;

/// A volumetric image payload.
///
/// The voxel data lives in an [`ImageBridge`]; geometry and type descriptors are available
/// without triggering a representation conversion.
#[derive(Clone, Debug)]
pub struct ImageData {
    bridge: ImageBridge,
}

impl ImageData {
    /// Create an image payload over `bridge`.
    #[must_use]
    pub const fn new(bridge: ImageBridge) -> Self {
        Self { bridge }
    }

    /// Create an image payload over an erased image.
    #[must_use]
    pub fn from_flat(flat: FlatImage) -> Self {
        Self::new(ImageBridge::from_flat(flat))
    }

    /// Create an image payload over a typed image.
    #[must_use]
    pub fn from_typed(typed: TypedImage) -> Self {
        Self::new(ImageBridge::from_typed(typed))
    }

    /// The representation bridge.
    pub fn bridge_mut(&mut self) -> &mut ImageBridge {
        &mut self.bridge
    }

    /// The dimensions in `[x, y, z]` order.
    #[must_use]
    pub fn dims(&self) -> [usize; 3] {
        self.bridge.dims()
    }

    /// The voxel spacing in `[x, y, z]` order.
    #[must_use]
    pub fn spacing(&self) -> [f64; 3] {
        self.bridge.spacing()
    }

    /// The position of the first voxel in `[x, y, z]` order.
    #[must_use]
    pub fn origin(&self) -> [f64; 3] {
        self.bridge.origin()
    }

    /// The scalar type of one voxel component.
    #[must_use]
    pub const fn scalar_type(&self) -> ScalarType {
        self.bridge.scalar_type()
    }

    /// The number of interleaved components per voxel.
    #[must_use]
    pub const fn components(&self) -> usize {
        self.bridge.components()
    }

    /// The number of voxels.
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.dims().iter().product()
    }

    /// The minimum and maximum component value.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError`] if the erased representation has to be refreshed and the
    /// conversion fails, or if the scalar type is unknown.
    pub fn scalar_range(&mut self) -> Result<[f64; 2], BridgeError> {
        let flat = self.bridge.flat()?;
        let mut range = [f64::INFINITY, f64::NEG_INFINITY];
        // components share one range, so the buffer is scanned component-wise
        typed_call!(
            component_range,
            flat.scalar_type(),
            PixelLayout::Scalar,
            flat.buffer(),
            &mut range
        )?;
        Ok(range)
    }

    /// A human-readable summary of geometry and voxel type.
    #[must_use]
    pub fn info(&self) -> String {
        let [x, y, z] = self.dims();
        let [sx, sy, sz] = self.spacing();
        let [ox, oy, oz] = self.origin();
        format!(
            "Size: {x} x {y} x {z}\nSpacing: {sx} x {sy} x {sz}\nOrigin: {ox}, {oy}, {oz}\nData type: {}\nComponents: {}",
            self.scalar_type(),
            self.components()
        )
    }
}

fn component_range<P: Pixel>(buffer: &[u8], range: &mut [f64; 2]) {
    for value in bytemuck::pod_collect_to_vec::<u8, P::Scalar>(buffer) {
        let Some(value) = <f64 as NumCast>::from(value) else {
            continue;
        };
        if value < range[0] {
            range[0] = value;
        }
        if value > range[1] {
            range[1] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_range_scans_all_components() {
        let buffer = bytemuck::cast_slice(&[3_i16, -7, 120, 0, 5, 5]).to_vec();
        let flat = FlatImage::new(
            [2, 1, 1],
            [1.0; 3],
            [0.0; 3],
            ScalarType::Int16,
            3,
            buffer,
        )
        .unwrap();
        let mut image = ImageData::from_flat(flat);
        assert_eq!(image.scalar_range().unwrap(), [-7.0, 120.0]);
    }

    #[test]
    fn scalar_range_fails_for_unknown_type() {
        let flat = FlatImage::new(
            [1, 1, 1],
            [1.0; 3],
            [0.0; 3],
            ScalarType::Unknown,
            1,
            vec![0],
        )
        .unwrap();
        let mut image = ImageData::from_flat(flat);
        assert!(image.scalar_range().is_err());
    }

    #[test]
    fn info_summarizes_geometry() {
        let flat = FlatImage::new(
            [4, 2, 1],
            [0.5, 0.5, 2.0],
            [0.0; 3],
            ScalarType::UInt16,
            1,
            vec![0; 16],
        )
        .unwrap();
        let image = ImageData::from_flat(flat);
        let info = image.info();
        assert!(info.contains("Size: 4 x 2 x 1"));
        assert!(info.contains("Data type: uint16"));
        assert_eq!(image.voxel_count(), 8);
    }
}
