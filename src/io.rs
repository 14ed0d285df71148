//! File I/O plugins and their registry.
//!
//! Each file format is implemented by one plugin: an object implementing [`FileIoTraits`],
//! wrapped in a [`FileIo`] whose [`load`](FileIo::load) / [`save`](FileIo::save) entry points
//! add the format-independent behaviour (parameter resolution, progress bracketing, timing,
//! metadata stamping). The [`registry`] maps file extensions to plugin factories.
//!
//! Built-in plugins: [`raw`] (headerless binary volumes), [`meta_image`] (MetaImage volumes),
//! [`stl`] (triangle meshes), [`graph`] (spatial graphs, load-only) and [`project`]
//! (collections of datasets referencing their member files).

mod plugin;

pub mod graph;
pub mod meta_image;
pub mod project;
pub mod raw;
pub mod registry;
pub mod stl;

pub use plugin::{FileIo, FileIoTraits};

use std::path::PathBuf;

use thiserror::Error;

use crate::attributes::ValueMap;
use crate::bridge::BridgeError;
use crate::dataset::DataSetKind;
use crate::dispatch::DispatchError;

/// The byte-order option naming little-endian storage.
pub const BYTE_ORDER_LITTLE: &str = "Little Endian";
/// The byte-order option naming big-endian storage.
pub const BYTE_ORDER_BIG: &str = "Big Endian";

/// The direction of a file operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Operation {
    /// Reading a dataset from a file.
    Load,
    /// Writing a dataset to a file.
    Save,
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Load => write!(f, "load"),
            Self::Save => write!(f, "save"),
        }
    }
}

/// A file load or save failure.
#[derive(Debug, Error)]
pub enum FileIoError {
    /// The operating system reported an I/O failure.
    #[error("i/o failure on '{path}': {source}")]
    Io {
        /// The file being accessed.
        path: PathBuf,
        /// The underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// The file contents do not follow the expected format.
    #[error("malformed file '{path}': {reason}")]
    MalformedFile {
        /// The file being parsed.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },
    /// The file declares a format version newer than this implementation supports.
    #[error("'{path}' has file version {found}, only versions up to {supported} are supported")]
    VersionMismatch {
        /// The file being parsed.
        path: PathBuf,
        /// The version the file declares.
        found: String,
        /// The newest supported version.
        supported: String,
    },
    /// No registered file type matches the path for the requested operation.
    #[error("no file type registered to {operation} '{path}'")]
    NoRegisteredIo {
        /// The file requested.
        path: PathBuf,
        /// The requested operation.
        operation: Operation,
    },
    /// The plugin does not handle datasets of this kind.
    #[error("'{name}' cannot {operation} a {kind} dataset")]
    UnsupportedDataSet {
        /// The plugin name.
        name: &'static str,
        /// The requested operation.
        operation: Operation,
        /// The kind of the offending dataset.
        kind: DataSetKind,
    },
    /// A dataset without file provenance cannot be referenced from a project file.
    #[error("dataset '{data_set}' has no stored file name, it cannot be referenced from '{path}'")]
    CannotReference {
        /// The project file being written.
        path: PathBuf,
        /// The name of the offending dataset.
        data_set: String,
    },
    /// A parameter required by the format semantics is missing or carries an unusable value.
    #[error("parameter error: {0}")]
    Parameter(String),
    /// A pixel-type dispatch failure.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// A representation-bridge failure.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl FileIoError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedFile {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

fn missing(name: &str) -> FileIoError {
    FileIoError::Parameter(format!("missing or mistyped parameter '{name}'"))
}

pub(crate) fn param_str<'a>(values: &'a ValueMap, name: &str) -> Result<&'a str, FileIoError> {
    values
        .get(name)
        .and_then(crate::attributes::AttributeValue::as_str)
        .ok_or_else(|| missing(name))
}

pub(crate) fn param_int(values: &ValueMap, name: &str) -> Result<i64, FileIoError> {
    values
        .get(name)
        .and_then(crate::attributes::AttributeValue::as_int)
        .ok_or_else(|| missing(name))
}

pub(crate) fn param_bool(values: &ValueMap, name: &str) -> Result<bool, FileIoError> {
    values
        .get(name)
        .and_then(crate::attributes::AttributeValue::as_bool)
        .ok_or_else(|| missing(name))
}

pub(crate) fn param_vector3(values: &ValueMap, name: &str) -> Result<[f64; 3], FileIoError> {
    values
        .get(name)
        .and_then(crate::attributes::AttributeValue::as_vector3)
        .ok_or_else(|| missing(name))
}

pub(crate) fn param_vector3i(values: &ValueMap, name: &str) -> Result<[i32; 3], FileIoError> {
    values
        .get(name)
        .and_then(crate::attributes::AttributeValue::as_vector3i)
        .ok_or_else(|| missing(name))
}
