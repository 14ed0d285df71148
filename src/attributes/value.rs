use derive_more::From;
use itertools::Itertools;
use thiserror::Error;

/// The kind of value an attribute holds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ValueKind {
    /// An integer with optional bounds.
    Discrete,
    /// A floating point number with optional bounds.
    Continuous,
    /// One selection from an ordered list of named options.
    Categorical,
    /// A boolean flag.
    Boolean,
    /// Free-form text.
    String,
    /// A file name.
    FileName,
    /// Two floating point components.
    Vector2,
    /// Three floating point components.
    Vector3,
    /// Three integer components.
    Vector3i,
}

impl ValueKind {
    /// Returns the serialized kind token.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Discrete => "Discrete",
            Self::Continuous => "Continuous",
            Self::Categorical => "Categorical",
            Self::Boolean => "Boolean",
            Self::String => "String",
            Self::FileName => "FileName",
            Self::Vector2 => "Vector2",
            Self::Vector3 => "Vector3",
            Self::Vector3i => "Vector3i",
        }
    }

    /// Parses a serialized kind token.
    #[must_use]
    pub fn from_str_token(token: &str) -> Option<Self> {
        match token {
            "Discrete" => Some(Self::Discrete),
            "Continuous" => Some(Self::Continuous),
            "Categorical" => Some(Self::Categorical),
            "Boolean" => Some(Self::Boolean),
            "String" => Some(Self::String),
            "FileName" => Some(Self::FileName),
            "Vector2" => Some(Self::Vector2),
            "Vector3" => Some(Self::Vector3),
            "Vector3i" => Some(Self::Vector3i),
            _ => None,
        }
    }

    /// Returns true for kinds carrying numeric bounds.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Discrete | Self::Continuous)
    }
}

impl core::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One untyped attribute value exchanged between callers and plugins.
#[derive(Clone, Debug, PartialEq, From)]
pub enum AttributeValue {
    /// An integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A boolean.
    Bool(bool),
    /// Text (also carries categorical selections and file names).
    String(String),
    /// Two floating point components.
    Vector2([f64; 2]),
    /// Three floating point components.
    Vector3([f64; 3]),
    /// Three integer components.
    Vector3i([i32; 3]),
}

/// A value parse failure.
#[derive(Debug, Error)]
#[error("cannot parse '{input}' as {kind}")]
pub struct ValueParseError {
    kind: ValueKind,
    input: String,
}

impl ValueParseError {
    pub(crate) fn new(kind: ValueKind, input: &str) -> Self {
        Self {
            kind,
            input: input.to_string(),
        }
    }
}

impl AttributeValue {
    /// Parses the serialized form of a value of the given kind.
    ///
    /// This is the exact inverse of the [`Display`](core::fmt::Display) representation.
    ///
    /// # Errors
    ///
    /// Returns a [`ValueParseError`] if `input` is not a valid serialization for `kind`.
    pub fn parse_as(kind: ValueKind, input: &str) -> Result<Self, ValueParseError> {
        let err = || ValueParseError {
            kind,
            input: input.to_string(),
        };
        match kind {
            ValueKind::Discrete => input.parse::<i64>().map(Self::Int).map_err(|_| err()),
            ValueKind::Continuous => input.parse::<f64>().map(Self::Float).map_err(|_| err()),
            ValueKind::Boolean => match input {
                "true" | "1" => Ok(Self::Bool(true)),
                "false" | "0" => Ok(Self::Bool(false)),
                _ => Err(err()),
            },
            ValueKind::Categorical | ValueKind::String | ValueKind::FileName => {
                Ok(Self::String(input.to_string()))
            }
            ValueKind::Vector2 => {
                let (x, y) = input
                    .split_whitespace()
                    .map(|token| token.parse::<f64>().ok())
                    .collect_tuple()
                    .ok_or_else(err)?;
                Ok(Self::Vector2([x.ok_or_else(err)?, y.ok_or_else(err)?]))
            }
            ValueKind::Vector3 => {
                let (x, y, z) = input
                    .split_whitespace()
                    .map(|token| token.parse::<f64>().ok())
                    .collect_tuple()
                    .ok_or_else(err)?;
                Ok(Self::Vector3([
                    x.ok_or_else(err)?,
                    y.ok_or_else(err)?,
                    z.ok_or_else(err)?,
                ]))
            }
            ValueKind::Vector3i => {
                let (x, y, z) = input
                    .split_whitespace()
                    .map(|token| token.parse::<i32>().ok())
                    .collect_tuple()
                    .ok_or_else(err)?;
                Ok(Self::Vector3i([
                    x.ok_or_else(err)?,
                    y.ok_or_else(err)?,
                    z.ok_or_else(err)?,
                ]))
            }
        }
    }

    /// Returns true if the value's variant is a natural fit for `kind`.
    #[must_use]
    pub fn matches_kind(&self, kind: ValueKind) -> bool {
        matches!(
            (self, kind),
            (Self::Int(_), ValueKind::Discrete)
                | (Self::Int(_) | Self::Float(_), ValueKind::Continuous)
                | (Self::Bool(_), ValueKind::Boolean)
                | (
                    Self::String(_),
                    ValueKind::Categorical | ValueKind::String | ValueKind::FileName
                )
                | (Self::Vector2(_), ValueKind::Vector2)
                | (Self::Vector3(_), ValueKind::Vector3)
                | (Self::Vector3i(_), ValueKind::Vector3i)
        )
    }

    /// The value as an integer, if it is one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// The value as a float; integers widen.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// The value as a boolean, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// The value as a string slice, if it is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// The value as two float components, if it is a [`AttributeValue::Vector2`].
    #[must_use]
    pub fn as_vector2(&self) -> Option<[f64; 2]> {
        match self {
            Self::Vector2(value) => Some(*value),
            _ => None,
        }
    }

    /// The value as three float components, if it is a [`AttributeValue::Vector3`].
    #[must_use]
    pub fn as_vector3(&self) -> Option<[f64; 3]> {
        match self {
            Self::Vector3(value) => Some(*value),
            _ => None,
        }
    }

    /// The value as three integer components, if it is a [`AttributeValue::Vector3i`].
    #[must_use]
    pub fn as_vector3i(&self) -> Option<[i32; 3]> {
        match self {
            Self::Vector3i(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl core::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "{value}"),
            Self::Vector2([x, y]) => write!(f, "{x} {y}"),
            Self::Vector3([x, y, z]) => write!(f, "{x} {y} {z}"),
            Self::Vector3i([x, y, z]) => write!(f, "{x} {y} {z}"),
        }
    }
}
