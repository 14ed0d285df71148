//! Numeric pixel-type dispatch.
//!
//! Image pixel data arrives from files with an erased scalar type (one of the ten types in
//! [`ScalarType`]) and an erased component layout (one of the three in [`PixelLayout`]).
//! Pixel-level algorithms are written once as a generic function parameterized by a [`Pixel`]
//! type; the [`typed_call!`](crate::typed_call) macro expands the closed two-level match
//! (outer on layout, inner on scalar type) that instantiates and invokes the one matching
//! specialization.
//!
//! The set of `(scalar, layout)` combinations is closed and the match is exhaustive: an
//! unknown tag fails with a [`DispatchError`] carrying the offending value, it never falls
//! through to a wrong type.

use thiserror::Error;

/// The scalar type of one pixel component.
///
/// [`ScalarType::Unknown`] is the sentinel carried by images whose element type could not be
/// identified; dispatching on it fails with a [`DispatchError`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ScalarType {
    /// `int8` Integer in `[-2^7, 2^7-1]`.
    Int8,
    /// `uint8` Integer in `[0, 2^8-1]`.
    UInt8,
    /// `int16` Integer in `[-2^15, 2^15-1]`.
    Int16,
    /// `uint16` Integer in `[0, 2^16-1]`.
    UInt16,
    /// `int32` Integer in `[-2^31, 2^31-1]`.
    Int32,
    /// `uint32` Integer in `[0, 2^32-1]`.
    UInt32,
    /// `int64` Integer in `[-2^63, 2^63-1]`.
    Int64,
    /// `uint64` Integer in `[0, 2^64-1]`.
    UInt64,
    /// `float32` IEEE 754 single-precision floating point.
    Float32,
    /// `float64` IEEE 754 double-precision floating point.
    Float64,
    /// An unidentified scalar type.
    Unknown,
}

/// The readable-name table for scalar types, as presented in raw-format parameters.
///
/// The order here is the order offered in `Data Type` categorical attributes.
const READABLE_NAMES: [(ScalarType, &str); 10] = [
    (
        ScalarType::UInt8,
        "8 bit unsigned integer (0 to 255, unsigned char)",
    ),
    (ScalarType::Int8, "8 bit signed integer (-128 to 127, char)"),
    (
        ScalarType::UInt16,
        "16 bit unsigned integer (0 to 65,535, unsigned short)",
    ),
    (
        ScalarType::Int16,
        "16 bit signed integer (-32,768 to 32,767, short)",
    ),
    (
        ScalarType::UInt32,
        "32 bit unsigned integer (0 to 4,294,967,295, unsigned int)",
    ),
    (
        ScalarType::Int32,
        "32 bit signed integer (-2,147,483,648 to 2,147,483,647, int)",
    ),
    (
        ScalarType::UInt64,
        "64 bit unsigned integer (0 to (2^64)-1, unsigned long long)",
    ),
    (
        ScalarType::Int64,
        "64 bit signed integer (-2^63 to (2^63)-1, long long)",
    ),
    (
        ScalarType::Float32,
        "32 bit floating point number (7 digits, float)",
    ),
    (
        ScalarType::Float64,
        "64 bit floating point number (15 digits, double)",
    ),
];

impl ScalarType {
    /// Returns the identifier, e.g. `uint16`.
    #[must_use]
    pub const fn identifier(&self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Unknown => "unknown",
        }
    }

    /// Returns the size of one scalar in bytes, `0` for [`ScalarType::Unknown`].
    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
            Self::Unknown => 0,
        }
    }

    /// Returns the human-readable name used in file parameters, [`None`] for
    /// [`ScalarType::Unknown`].
    #[must_use]
    pub fn readable_name(&self) -> Option<&'static str> {
        READABLE_NAMES
            .iter()
            .find(|(scalar_type, _)| scalar_type == self)
            .map(|(_, name)| *name)
    }

    /// Maps a human-readable data type name back to a scalar type.
    #[must_use]
    pub fn from_readable_name(name: &str) -> Option<Self> {
        READABLE_NAMES
            .iter()
            .find(|(_, readable)| *readable == name)
            .map(|(scalar_type, _)| *scalar_type)
    }

    /// Returns the readable names of all supported scalar types, in presentation order.
    #[must_use]
    pub fn readable_names() -> Vec<&'static str> {
        READABLE_NAMES.iter().map(|(_, name)| *name).collect()
    }
}

impl core::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

/// The component layout of one pixel.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PixelLayout {
    /// One component per pixel.
    Scalar,
    /// Three interleaved components per pixel.
    Rgb,
    /// Four interleaved components per pixel.
    Rgba,
}

impl PixelLayout {
    /// Derive the layout from a component count.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnsupportedComponentCount`] for component counts other than
    /// 1, 3 and 4.
    pub fn from_components(components: usize) -> Result<Self, DispatchError> {
        match components {
            1 => Ok(Self::Scalar),
            3 => Ok(Self::Rgb),
            4 => Ok(Self::Rgba),
            _ => Err(DispatchError::UnsupportedComponentCount(components)),
        }
    }

    /// Returns the number of components per pixel.
    #[must_use]
    pub const fn components(&self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

impl core::fmt::Display for PixelLayout {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar"),
            Self::Rgb => write!(f, "rgb"),
            Self::Rgba => write!(f, "rgba"),
        }
    }
}

/// A typed dispatch error.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The scalar type tag matched no specialization.
    #[error("typed call: unknown scalar type ({_0})")]
    UnknownScalarType(ScalarType),
    /// The component count maps to no supported pixel layout.
    #[error("typed call: unsupported component count ({_0})")]
    UnsupportedComponentCount(usize),
}

/// A concrete pixel component type.
///
/// Implemented exactly for the ten scalar types enumerated by [`ScalarType`].
pub trait PixelScalar:
    bytemuck::Pod + PartialOrd + num::NumCast + core::fmt::Debug + Send + Sync + 'static
{
    /// The matching runtime tag.
    const SCALAR_TYPE: ScalarType;

    /// Reverses the byte order of the value.
    #[must_use]
    fn swap_bytes(self) -> Self;
}

macro_rules! impl_pixel_scalar_int {
    ($($t:ty => $tag:ident),* $(,)?) => {$(
        impl PixelScalar for $t {
            const SCALAR_TYPE: ScalarType = ScalarType::$tag;

            fn swap_bytes(self) -> Self {
                <$t>::swap_bytes(self)
            }
        }
    )*};
}

impl_pixel_scalar_int!(
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
);

impl PixelScalar for f32 {
    const SCALAR_TYPE: ScalarType = ScalarType::Float32;

    fn swap_bytes(self) -> Self {
        Self::from_bits(self.to_bits().swap_bytes())
    }
}

impl PixelScalar for f64 {
    const SCALAR_TYPE: ScalarType = ScalarType::Float64;

    fn swap_bytes(self) -> Self {
        Self::from_bits(self.to_bits().swap_bytes())
    }
}

/// A three-component pixel.
#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(transparent)]
pub struct Rgb<T>(pub [T; 3]);

/// A four-component pixel.
#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(transparent)]
pub struct Rgba<T>(pub [T; 4]);

// [T; N] of a Pod scalar has no padding, so the transparent wrappers are Pod as well.
unsafe impl<T: PixelScalar> bytemuck::Zeroable for Rgb<T> {}
unsafe impl<T: PixelScalar> bytemuck::Pod for Rgb<T> {}
unsafe impl<T: PixelScalar> bytemuck::Zeroable for Rgba<T> {}
unsafe impl<T: PixelScalar> bytemuck::Pod for Rgba<T> {}

/// A concrete pixel type: a [`PixelScalar`], [`Rgb`] or [`Rgba`].
///
/// This is the type parameter of functions invoked through
/// [`typed_call!`](crate::typed_call).
pub trait Pixel: bytemuck::Pod + core::fmt::Debug + Send + Sync + 'static {
    /// The component type.
    type Scalar: PixelScalar;

    /// The matching runtime layout tag.
    const LAYOUT: PixelLayout;

    /// The number of components per pixel.
    const COMPONENTS: usize;
}

impl<T: PixelScalar> Pixel for T {
    type Scalar = T;
    const LAYOUT: PixelLayout = PixelLayout::Scalar;
    const COMPONENTS: usize = 1;
}

impl<T: PixelScalar> Pixel for Rgb<T> {
    type Scalar = T;
    const LAYOUT: PixelLayout = PixelLayout::Rgb;
    const COMPONENTS: usize = 3;
}

impl<T: PixelScalar> Pixel for Rgba<T> {
    type Scalar = T;
    const LAYOUT: PixelLayout = PixelLayout::Rgba;
    const COMPONENTS: usize = 4;
}

#[doc(hidden)]
#[macro_export]
macro_rules! __pixel_scalar {
    ($t:ty) => {
        $t
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __pixel_rgb {
    ($t:ty) => {
        $crate::dispatch::Rgb<$t>
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __pixel_rgba {
    ($t:ty) => {
        $crate::dispatch::Rgba<$t>
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __typed_call_scalars {
    ($function:ident, $scalar:expr, $wrap:ident $(, $arg:expr)*) => {
        match $scalar {
            $crate::dispatch::ScalarType::Int8 => {
                ::core::result::Result::Ok($function::<$crate::$wrap!(i8)>($($arg),*))
            }
            $crate::dispatch::ScalarType::UInt8 => {
                ::core::result::Result::Ok($function::<$crate::$wrap!(u8)>($($arg),*))
            }
            $crate::dispatch::ScalarType::Int16 => {
                ::core::result::Result::Ok($function::<$crate::$wrap!(i16)>($($arg),*))
            }
            $crate::dispatch::ScalarType::UInt16 => {
                ::core::result::Result::Ok($function::<$crate::$wrap!(u16)>($($arg),*))
            }
            $crate::dispatch::ScalarType::Int32 => {
                ::core::result::Result::Ok($function::<$crate::$wrap!(i32)>($($arg),*))
            }
            $crate::dispatch::ScalarType::UInt32 => {
                ::core::result::Result::Ok($function::<$crate::$wrap!(u32)>($($arg),*))
            }
            $crate::dispatch::ScalarType::Int64 => {
                ::core::result::Result::Ok($function::<$crate::$wrap!(i64)>($($arg),*))
            }
            $crate::dispatch::ScalarType::UInt64 => {
                ::core::result::Result::Ok($function::<$crate::$wrap!(u64)>($($arg),*))
            }
            $crate::dispatch::ScalarType::Float32 => {
                ::core::result::Result::Ok($function::<$crate::$wrap!(f32)>($($arg),*))
            }
            $crate::dispatch::ScalarType::Float64 => {
                ::core::result::Result::Ok($function::<$crate::$wrap!(f64)>($($arg),*))
            }
            other => ::core::result::Result::Err(
                $crate::dispatch::DispatchError::UnknownScalarType(other),
            ),
        }
    };
}

/// Invokes the specialization of a generic function matching runtime scalar-type and
/// pixel-layout tags.
///
/// `function` must name a function generic over one [`Pixel`] parameter; bring it into scope
/// before the call. All of its specializations must share one dispatch-independent signature,
/// so outputs are communicated through `&mut` parameters (or a uniform return type such as
/// `Result<(), E>`), never through a pixel-typed return value.
///
/// Evaluates to `Result<R, DispatchError>` where `R` is the function's return type; unknown
/// tags yield the error without invoking anything.
///
/// ```
/// use voxio::dispatch::{Pixel, PixelLayout, ScalarType};
/// use voxio::typed_call;
///
/// fn element_size<P: Pixel>(out: &mut usize) {
///     *out = std::mem::size_of::<P>();
/// }
///
/// let mut size = 0;
/// typed_call!(element_size, ScalarType::UInt16, PixelLayout::Rgb, &mut size).unwrap();
/// assert_eq!(size, 6);
/// ```
#[macro_export]
macro_rules! typed_call {
    ($function:ident, $scalar:expr, $layout:expr $(, $arg:expr)* $(,)?) => {
        match $layout {
            $crate::dispatch::PixelLayout::Scalar => {
                $crate::__typed_call_scalars!($function, $scalar, __pixel_scalar $(, $arg)*)
            }
            $crate::dispatch::PixelLayout::Rgb => {
                $crate::__typed_call_scalars!($function, $scalar, __pixel_rgb $(, $arg)*)
            }
            $crate::dispatch::PixelLayout::Rgba => {
                $crate::__typed_call_scalars!($function, $scalar, __pixel_rgba $(, $arg)*)
            }
        }
    };
}
