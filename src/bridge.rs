//! Dual-representation image storage.
//!
//! Voxel data lives in one of two forms: a [`FlatImage`] (the erased, interleaved byte buffer
//! that file plugins read and write) and a [`TypedImage`] (an n-dimensional array with a
//! concrete element type that algorithms index). An [`ImageBridge`] owns both, converts
//! lazily on access through the [`typed_call!`](crate::typed_call) dispatch, and caches the
//! result so repeated reads of the same representation perform no further conversions.
//!
//! Accessors take `&mut self`: a mutable borrow is the signal to refresh the requested
//! representation, and the `*_mut` accessors invalidate the opposite one. The number of
//! conversions performed is observable through [`ImageBridge::conversions`].

use ndarray::{ArrayD, IxDyn};
use thiserror::Error;

use crate::dispatch::{DispatchError, Pixel, PixelLayout, PixelScalar, ScalarType};
use crate::typed_call;

/// A bridging failure.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The scalar type or component count matched no specialization.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// The byte buffer does not match the declared geometry.
    #[error("buffer of {actual} bytes does not match the expected {expected} bytes")]
    BufferSize {
        /// Bytes required by dimensions, components and scalar size.
        expected: usize,
        /// Bytes actually supplied.
        actual: usize,
    },
    /// The array shape is not `[z, y, x]` or `[z, y, x, c]` with 3 or 4 components.
    #[error("array shape {_0:?} is not a supported image shape")]
    Shape(Vec<usize>),
    /// The bridge holds no representation.
    #[error("image bridge holds no representation")]
    Empty,
}

/// An erased image: an interleaved byte buffer plus the geometry to interpret it.
///
/// Dimensions, spacing and origin are in `[x, y, z]` order; the buffer is x-fastest with
/// components interleaved per pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct FlatImage {
    dims: [usize; 3],
    spacing: [f64; 3],
    origin: [f64; 3],
    scalar_type: ScalarType,
    components: usize,
    buffer: Vec<u8>,
}

impl FlatImage {
    /// Create an erased image over `buffer`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::BufferSize`] if the buffer length does not match
    /// `dims × components × scalar size`. Images with [`ScalarType::Unknown`] carry an
    /// unverifiable element size and skip the check.
    pub fn new(
        dims: [usize; 3],
        spacing: [f64; 3],
        origin: [f64; 3],
        scalar_type: ScalarType,
        components: usize,
        buffer: Vec<u8>,
    ) -> Result<Self, BridgeError> {
        if scalar_type != ScalarType::Unknown {
            let expected = dims.iter().product::<usize>() * components * scalar_type.size();
            if buffer.len() != expected {
                return Err(BridgeError::BufferSize {
                    expected,
                    actual: buffer.len(),
                });
            }
        }
        Ok(Self {
            dims,
            spacing,
            origin,
            scalar_type,
            components,
            buffer,
        })
    }

    /// The dimensions in `[x, y, z]` order.
    #[must_use]
    pub const fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// The voxel spacing in `[x, y, z]` order.
    #[must_use]
    pub const fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    /// The position of the first voxel in `[x, y, z]` order.
    #[must_use]
    pub const fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// The scalar type of one component.
    #[must_use]
    pub const fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    /// The number of interleaved components per pixel.
    #[must_use]
    pub const fn components(&self) -> usize {
        self.components
    }

    /// The component layout derived from the component count.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnsupportedComponentCount`] for component counts other than
    /// 1, 3 and 4.
    pub fn layout(&self) -> Result<PixelLayout, DispatchError> {
        PixelLayout::from_components(self.components)
    }

    /// The number of pixels.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.dims.iter().product()
    }

    /// The interleaved byte buffer.
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// The interleaved byte buffer, mutably.
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }
}

/// A typed n-dimensional array: one variant per supported scalar type.
///
/// The shape is `[z, y, x]` for single-component images and `[z, y, x, c]` for interleaved
/// multi-component images.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedArray {
    /// `int8` elements.
    Int8(ArrayD<i8>),
    /// `uint8` elements.
    UInt8(ArrayD<u8>),
    /// `int16` elements.
    Int16(ArrayD<i16>),
    /// `uint16` elements.
    UInt16(ArrayD<u16>),
    /// `int32` elements.
    Int32(ArrayD<i32>),
    /// `uint32` elements.
    UInt32(ArrayD<u32>),
    /// `int64` elements.
    Int64(ArrayD<i64>),
    /// `uint64` elements.
    UInt64(ArrayD<u64>),
    /// `float32` elements.
    Float32(ArrayD<f32>),
    /// `float64` elements.
    Float64(ArrayD<f64>),
}

macro_rules! typed_array_delegate {
    ($value:expr, $array:ident => $body:expr) => {
        match $value {
            TypedArray::Int8($array) => $body,
            TypedArray::UInt8($array) => $body,
            TypedArray::Int16($array) => $body,
            TypedArray::UInt16($array) => $body,
            TypedArray::Int32($array) => $body,
            TypedArray::UInt32($array) => $body,
            TypedArray::Int64($array) => $body,
            TypedArray::UInt64($array) => $body,
            TypedArray::Float32($array) => $body,
            TypedArray::Float64($array) => $body,
        }
    };
}

impl TypedArray {
    /// The scalar type of the elements.
    #[must_use]
    pub const fn scalar_type(&self) -> ScalarType {
        match self {
            Self::Int8(_) => ScalarType::Int8,
            Self::UInt8(_) => ScalarType::UInt8,
            Self::Int16(_) => ScalarType::Int16,
            Self::UInt16(_) => ScalarType::UInt16,
            Self::Int32(_) => ScalarType::Int32,
            Self::UInt32(_) => ScalarType::UInt32,
            Self::Int64(_) => ScalarType::Int64,
            Self::UInt64(_) => ScalarType::UInt64,
            Self::Float32(_) => ScalarType::Float32,
            Self::Float64(_) => ScalarType::Float64,
        }
    }

    /// The array shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        typed_array_delegate!(self, array => array.shape())
    }

    /// The number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        typed_array_delegate!(self, array => array.len())
    }

    /// Returns true if the array holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn to_bytes(&self) -> Vec<u8> {
        typed_array_delegate!(self, array => {
            let elements = array.iter().copied().collect::<Vec<_>>();
            bytemuck::cast_slice(&elements).to_vec()
        })
    }
}

/// A scalar type that [`TypedArray`] has a variant for.
///
/// Implemented exactly for the ten concrete [`PixelScalar`] types.
pub trait TypedElement: PixelScalar {
    /// Wraps an array of this element type in the matching [`TypedArray`] variant.
    fn wrap(array: ArrayD<Self>) -> TypedArray;

    /// Borrows the array out of the matching [`TypedArray`] variant.
    fn unwrap(array: &TypedArray) -> Option<&ArrayD<Self>>;

    /// Borrows the array out of the matching [`TypedArray`] variant, mutably.
    fn unwrap_mut(array: &mut TypedArray) -> Option<&mut ArrayD<Self>>;
}

macro_rules! impl_typed_element {
    ($($t:ty => $variant:ident),* $(,)?) => {$(
        impl TypedElement for $t {
            fn wrap(array: ArrayD<Self>) -> TypedArray {
                TypedArray::$variant(array)
            }

            fn unwrap(array: &TypedArray) -> Option<&ArrayD<Self>> {
                match array {
                    TypedArray::$variant(array) => Some(array),
                    _ => None,
                }
            }

            fn unwrap_mut(array: &mut TypedArray) -> Option<&mut ArrayD<Self>> {
                match array {
                    TypedArray::$variant(array) => Some(array),
                    _ => None,
                }
            }
        }
    )*};
}

impl_typed_element!(
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
);

/// A typed image: a [`TypedArray`] plus the physical geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct TypedImage {
    array: TypedArray,
    spacing: [f64; 3],
    origin: [f64; 3],
}

impl TypedImage {
    /// Create a typed image over `array`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Shape`] unless the shape is `[z, y, x]` or `[z, y, x, c]` with
    /// `c` of 3 or 4.
    pub fn new(
        array: TypedArray,
        spacing: [f64; 3],
        origin: [f64; 3],
    ) -> Result<Self, BridgeError> {
        let shape = array.shape();
        let valid = match shape.len() {
            3 => true,
            4 => matches!(shape[3], 3 | 4),
            _ => false,
        };
        if !valid {
            return Err(BridgeError::Shape(shape.to_vec()));
        }
        Ok(Self {
            array,
            spacing,
            origin,
        })
    }

    /// The element array.
    #[must_use]
    pub const fn array(&self) -> &TypedArray {
        &self.array
    }

    /// The element array, mutably.
    pub fn array_mut(&mut self) -> &mut TypedArray {
        &mut self.array
    }

    /// Borrows the elements as a concretely typed array, [`None`] if `T` does not match.
    #[must_use]
    pub fn array_of<T: TypedElement>(&self) -> Option<&ArrayD<T>> {
        T::unwrap(&self.array)
    }

    /// The dimensions in `[x, y, z]` order.
    #[must_use]
    pub fn dims(&self) -> [usize; 3] {
        let shape = self.array.shape();
        [shape[2], shape[1], shape[0]]
    }

    /// The voxel spacing in `[x, y, z]` order.
    #[must_use]
    pub const fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    /// The position of the first voxel in `[x, y, z]` order.
    #[must_use]
    pub const fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// The scalar type of the elements.
    #[must_use]
    pub const fn scalar_type(&self) -> ScalarType {
        self.array.scalar_type()
    }

    /// The number of interleaved components per pixel.
    #[must_use]
    pub fn components(&self) -> usize {
        let shape = self.array.shape();
        if shape.len() == 4 {
            shape[3]
        } else {
            1
        }
    }

    fn to_flat(&self) -> Result<FlatImage, BridgeError> {
        FlatImage::new(
            self.dims(),
            self.spacing,
            self.origin,
            self.scalar_type(),
            self.components(),
            self.array.to_bytes(),
        )
    }
}

fn decode_pixels<P: Pixel>(flat: &FlatImage) -> Result<TypedArray, BridgeError>
where
    P::Scalar: TypedElement,
{
    let expected =
        flat.pixel_count() * P::COMPONENTS * core::mem::size_of::<P::Scalar>();
    if flat.buffer().len() != expected {
        return Err(BridgeError::BufferSize {
            expected,
            actual: flat.buffer().len(),
        });
    }
    // pod_collect_to_vec copies, so the byte buffer's alignment does not matter
    let elements = bytemuck::pod_collect_to_vec::<u8, P::Scalar>(flat.buffer());
    let [x, y, z] = flat.dims();
    let mut shape = vec![z, y, x];
    if P::COMPONENTS > 1 {
        shape.push(P::COMPONENTS);
    }
    let array = ArrayD::from_shape_vec(IxDyn(&shape), elements).map_err(|_| {
        BridgeError::BufferSize {
            expected,
            actual: flat.buffer().len(),
        }
    })?;
    Ok(P::Scalar::wrap(array))
}

/// Lazily synchronized owner of the flat and typed representations of one image.
#[derive(Clone, Debug)]
pub struct ImageBridge {
    flat: Option<FlatImage>,
    typed: Option<TypedImage>,
    scalar_type: ScalarType,
    components: usize,
    conversions: usize,
    modified: bool,
}

impl ImageBridge {
    /// Create a bridge holding an erased image.
    #[must_use]
    pub fn from_flat(flat: FlatImage) -> Self {
        Self {
            scalar_type: flat.scalar_type(),
            components: flat.components(),
            flat: Some(flat),
            typed: None,
            conversions: 0,
            modified: false,
        }
    }

    /// Create a bridge holding a typed image.
    #[must_use]
    pub fn from_typed(typed: TypedImage) -> Self {
        Self {
            scalar_type: typed.scalar_type(),
            components: typed.components(),
            flat: None,
            typed: Some(typed),
            conversions: 0,
            modified: false,
        }
    }

    /// The scalar type, without triggering a conversion.
    #[must_use]
    pub const fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    /// The number of interleaved components per pixel, without triggering a conversion.
    #[must_use]
    pub const fn components(&self) -> usize {
        self.components
    }

    /// The component layout derived from the component count.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnsupportedComponentCount`] for component counts other than
    /// 1, 3 and 4.
    pub fn layout(&self) -> Result<PixelLayout, DispatchError> {
        PixelLayout::from_components(self.components)
    }

    /// The dimensions in `[x, y, z]` order, without triggering a conversion.
    #[must_use]
    pub fn dims(&self) -> [usize; 3] {
        match (&self.flat, &self.typed) {
            (Some(flat), _) => flat.dims(),
            (None, Some(typed)) => typed.dims(),
            (None, None) => [0; 3],
        }
    }

    /// The voxel spacing in `[x, y, z]` order, without triggering a conversion.
    #[must_use]
    pub fn spacing(&self) -> [f64; 3] {
        match (&self.flat, &self.typed) {
            (Some(flat), _) => flat.spacing(),
            (None, Some(typed)) => typed.spacing(),
            (None, None) => [1.0; 3],
        }
    }

    /// The position of the first voxel in `[x, y, z]` order, without triggering a conversion.
    #[must_use]
    pub fn origin(&self) -> [f64; 3] {
        match (&self.flat, &self.typed) {
            (Some(flat), _) => flat.origin(),
            (None, Some(typed)) => typed.origin(),
            (None, None) => [0.0; 3],
        }
    }

    /// The erased representation, converting from the typed one if necessary.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError`] if a required conversion fails; the representation already
    /// held stays valid.
    pub fn flat(&mut self) -> Result<&FlatImage, BridgeError> {
        self.refresh_flat()?;
        self.flat.as_ref().ok_or(BridgeError::Empty)
    }

    /// The typed representation, converting from the erased one if necessary.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError`] if a required conversion fails (an image carrying
    /// [`ScalarType::Unknown`] cannot be typed); the representation already held stays valid.
    pub fn typed(&mut self) -> Result<&TypedImage, BridgeError> {
        self.refresh_typed()?;
        self.typed.as_ref().ok_or(BridgeError::Empty)
    }

    /// The erased representation for writing; invalidates the typed one.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError`] if a required conversion fails; the representation already
    /// held stays valid.
    pub fn flat_mut(&mut self) -> Result<&mut FlatImage, BridgeError> {
        self.refresh_flat()?;
        self.typed = None;
        self.modified = true;
        self.flat.as_mut().ok_or(BridgeError::Empty)
    }

    /// The typed representation for writing; invalidates the erased one.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError`] if a required conversion fails; the representation already
    /// held stays valid.
    pub fn typed_mut(&mut self) -> Result<&mut TypedImage, BridgeError> {
        self.refresh_typed()?;
        self.flat = None;
        self.modified = true;
        self.typed.as_mut().ok_or(BridgeError::Empty)
    }

    /// Replaces the image with an erased one, discarding the typed representation.
    pub fn set_flat(&mut self, flat: FlatImage) {
        self.scalar_type = flat.scalar_type();
        self.components = flat.components();
        self.flat = Some(flat);
        self.typed = None;
        self.modified = true;
    }

    /// Replaces the image with a typed one, discarding the erased representation.
    pub fn set_typed(&mut self, typed: TypedImage) {
        self.scalar_type = typed.scalar_type();
        self.components = typed.components();
        self.typed = Some(typed);
        self.flat = None;
        self.modified = true;
    }

    /// Returns true if the image was written to since loading (or since
    /// [`clear_modified`](Self::clear_modified)).
    #[must_use]
    pub const fn modified(&self) -> bool {
        self.modified
    }

    /// Marks the image as saved.
    pub fn clear_modified(&mut self) {
        self.modified = false;
    }

    /// The number of representation conversions performed so far.
    #[must_use]
    pub const fn conversions(&self) -> usize {
        self.conversions
    }

    fn refresh_flat(&mut self) -> Result<(), BridgeError> {
        if self.flat.is_none() {
            let typed = self.typed.as_ref().ok_or(BridgeError::Empty)?;
            self.flat = Some(typed.to_flat()?);
            self.conversions += 1;
        }
        Ok(())
    }

    fn refresh_typed(&mut self) -> Result<(), BridgeError> {
        if self.typed.is_none() {
            let flat = self.flat.as_ref().ok_or(BridgeError::Empty)?;
            let layout = flat.layout()?;
            let array = typed_call!(decode_pixels, flat.scalar_type(), layout, flat)??;
            self.typed = Some(TypedImage {
                array,
                spacing: flat.spacing(),
                origin: flat.origin(),
            });
            self.conversions += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_flat() -> FlatImage {
        let buffer: Vec<u8> = bytemuck::cast_slice(&[1_u16, 2, 3, 4, 5, 6, 7, 8]).to_vec();
        FlatImage::new(
            [2, 2, 2],
            [0.5, 0.5, 1.0],
            [0.0, 0.0, 0.0],
            ScalarType::UInt16,
            1,
            buffer,
        )
        .unwrap()
    }

    #[test]
    fn flat_to_typed_preserves_order_and_geometry() {
        let mut bridge = ImageBridge::from_flat(small_flat());
        let typed = bridge.typed().unwrap();
        let array = typed.array_of::<u16>().unwrap();
        assert_eq!(array.shape(), [2, 2, 2]);
        // buffer is x-fastest, array is indexed [z, y, x]
        assert_eq!(array[[0, 0, 1]], 2);
        assert_eq!(array[[0, 1, 0]], 3);
        assert_eq!(array[[1, 0, 0]], 5);
        assert_eq!(typed.dims(), [2, 2, 2]);
        assert_eq!(typed.spacing(), [0.5, 0.5, 1.0]);
    }

    #[test]
    fn repeated_reads_convert_once() {
        let mut bridge = ImageBridge::from_flat(small_flat());
        bridge.typed().unwrap();
        bridge.typed().unwrap();
        bridge.flat().unwrap();
        assert_eq!(bridge.conversions(), 1);
        // the flat representation was never dropped, so reading it back needs no conversion
        let round_tripped = bridge.flat().unwrap().clone();
        assert_eq!(round_tripped, small_flat());
    }

    #[test]
    fn mutable_access_invalidates_the_other_side() {
        let mut bridge = ImageBridge::from_flat(small_flat());
        bridge.typed().unwrap();
        assert!(!bridge.modified());

        let typed = bridge.typed_mut().unwrap();
        if let Some(array) = u16::unwrap_mut(typed.array_mut()) {
            array[[0, 0, 0]] = 100;
        }
        assert!(bridge.modified());

        // the stale flat buffer was dropped; reading it forces a fresh conversion
        assert_eq!(bridge.conversions(), 1);
        let flat = bridge.flat().unwrap();
        assert_eq!(bytemuck::pod_collect_to_vec::<u8, u16>(flat.buffer())[0], 100);
        assert_eq!(bridge.conversions(), 2);
    }

    #[test]
    fn multi_component_round_trip() {
        let buffer: Vec<u8> = vec![1, 2, 3, 4, 5, 6];
        let flat = FlatImage::new(
            [2, 1, 1],
            [1.0; 3],
            [0.0; 3],
            ScalarType::UInt8,
            3,
            buffer,
        )
        .unwrap();
        let mut bridge = ImageBridge::from_flat(flat.clone());
        let typed = bridge.typed().unwrap();
        let array = typed.array_of::<u8>().unwrap();
        assert_eq!(array.shape(), [1, 1, 2, 3]);
        assert_eq!(array[[0, 0, 1, 0]], 4);

        let mut back = ImageBridge::from_typed(typed.clone());
        assert_eq!(back.flat().unwrap(), &flat);
    }

    #[test]
    fn unknown_scalar_type_fails_but_keeps_flat_side() {
        let flat = FlatImage::new(
            [2, 1, 1],
            [1.0; 3],
            [0.0; 3],
            ScalarType::Unknown,
            1,
            vec![0, 0],
        )
        .unwrap();
        let mut bridge = ImageBridge::from_flat(flat);
        assert!(matches!(
            bridge.typed(),
            Err(BridgeError::Dispatch(DispatchError::UnknownScalarType(
                ScalarType::Unknown
            )))
        ));
        assert_eq!(bridge.conversions(), 0);
        // the erased representation is still intact
        assert_eq!(bridge.flat().unwrap().buffer(), [0, 0]);
    }

    #[test]
    fn buffer_size_is_validated() {
        let result = FlatImage::new(
            [2, 2, 2],
            [1.0; 3],
            [0.0; 3],
            ScalarType::UInt16,
            1,
            vec![0; 15],
        );
        assert!(matches!(
            result,
            Err(BridgeError::BufferSize {
                expected: 16,
                actual: 15
            })
        ));
    }

    #[test]
    fn typed_image_shape_is_validated() {
        let array = TypedArray::UInt8(ArrayD::zeros(IxDyn(&[2, 2])));
        assert!(matches!(
            TypedImage::new(array, [1.0; 3], [0.0; 3]),
            Err(BridgeError::Shape(_))
        ));
        let array = TypedArray::UInt8(ArrayD::zeros(IxDyn(&[2, 2, 2, 2])));
        assert!(matches!(
            TypedImage::new(array, [1.0; 3], [0.0; 3]),
            Err(BridgeError::Shape(_))
        ));
    }
}
