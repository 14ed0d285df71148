//! Project files (`.iaproj`, legacy `.mod`): collections referencing their member files.
//!
//! The format is INI-like text. A mandatory top-level `FileVersion` guards compatibility;
//! each group `[DataSet<N>]` (legacy `[Modality<N>]`) holds at least a `File` key naming the
//! member file (relative paths resolve against the project directory) plus arbitrary
//! parameter keys forwarded into the member's own load. Rendering-related keys written by
//! older tools are skipped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::attributes::{AttributeSet, AttributeValue, ValueMap};
use crate::dataset::{
    CollectionData, DataSet, DataSetData, DataSetKinds, FILE_NAME_KEY, NAME_KEY,
};
use crate::io::{registry, FileIoError, FileIoTraits, Operation};
use crate::progress::Progress;

/// The newest project file version this implementation reads and the version it writes.
pub const FILE_VERSION: f64 = 1.1;

const FILE_VERSION_KEY: &str = "FileVersion";
const FILE_KEY: &str = "File";

/// Keys written by rendering-capable tools; they carry no information for the I/O layer.
const RENDER_SETTING_KEYS: [&str; 17] = [
    "AmbientLighting",
    "CameraFocalPoint",
    "CameraPosition",
    "CameraViewUp",
    "Channel",
    "DiffuseLighting",
    "LinearInterpolation",
    "Orientation",
    "Position",
    "RenderFlags",
    "RenderMode",
    "SampleDistance",
    "ScalarOpacityUnitDistance",
    "Shading",
    "SpecularLighting",
    "SpecularPower",
    "TransferFunction",
];

/// The project/collection format.
#[derive(Clone, Debug)]
pub struct ProjectFileIo {
    no_params: AttributeSet,
}

impl ProjectFileIo {
    /// Create the plugin; the format declares no parameters of its own, member parameters
    /// travel inside the file.
    #[must_use]
    pub fn new() -> Self {
        Self {
            no_params: AttributeSet::new(),
        }
    }
}

impl Default for ProjectFileIo {
    fn default() -> Self {
        Self::new()
    }
}

struct Group<'a> {
    order: u64,
    name: Option<&'a str>,
    file: Option<&'a str>,
    parameters: Vec<(&'a str, &'a str)>,
}

/// Splits the group name of a `[DataSet<N>]` or legacy `[Modality<N>]` header into its
/// ordering number, or [`None`] for unrelated sections.
fn group_order(section: &str) -> Option<u64> {
    let number = section
        .strip_prefix("DataSet")
        .or_else(|| section.strip_prefix("Modality"))?;
    number.parse().ok()
}

fn parse_groups<'a>(path: &Path, text: &'a str) -> Result<Vec<Group<'a>>, FileIoError> {
    let mut version: Option<&str> = None;
    let mut groups: Vec<Group<'a>> = Vec::new();
    let mut current: Option<Group<'a>> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            if let Some(finished) = current.take() {
                groups.push(finished);
            }
            match group_order(section) {
                Some(order) => {
                    current = Some(Group {
                        order,
                        name: None,
                        file: None,
                        parameters: Vec::new(),
                    });
                }
                None => log::debug!("{}: skipping section '{}'", path.display(), section),
            }
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(FileIoError::malformed(
                path,
                format!("line '{line}' is neither a section nor a 'key=value' pair"),
            ));
        };
        let (key, value) = (key.trim(), value.trim());
        match &mut current {
            None => {
                if key == FILE_VERSION_KEY {
                    version = Some(value);
                } else if RENDER_SETTING_KEYS.contains(&key) {
                    log::debug!("{}: skipping render setting '{}'", path.display(), key);
                } else {
                    log::debug!("{}: skipping top-level key '{}'", path.display(), key);
                }
            }
            Some(group) => {
                if key == FILE_KEY {
                    group.file = Some(value);
                } else if key == NAME_KEY {
                    group.name = Some(value);
                } else if RENDER_SETTING_KEYS.contains(&key) {
                    log::debug!("{}: skipping render setting '{}'", path.display(), key);
                } else {
                    group.parameters.push((key, value));
                }
            }
        }
    }
    if let Some(finished) = current.take() {
        groups.push(finished);
    }

    let version =
        version.ok_or_else(|| FileIoError::malformed(path, "no FileVersion key found"))?;
    let parsed: f64 = version.parse().map_err(|_| {
        FileIoError::malformed(path, format!("invalid file version '{version}'"))
    })?;
    if parsed > FILE_VERSION {
        return Err(FileIoError::VersionMismatch {
            path: path.to_path_buf(),
            found: version.to_string(),
            supported: FILE_VERSION.to_string(),
        });
    }

    groups.sort_by_key(|group| group.order);
    Ok(groups)
}

impl FileIoTraits for ProjectFileIo {
    fn name(&self) -> &'static str {
        "Project"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["iaproj", "mod"]
    }

    fn parameters(&self, _operation: Operation) -> &AttributeSet {
        &self.no_params
    }

    fn supported_kinds(&self, _operation: Operation) -> DataSetKinds {
        DataSetKinds::COLLECTION
    }

    fn load_data(
        &self,
        path: &Path,
        _values: &ValueMap,
        progress: &Progress,
    ) -> Result<DataSet, FileIoError> {
        let text = std::fs::read_to_string(path).map_err(|source| FileIoError::io(path, source))?;
        let groups = parse_groups(path, &text)?;
        let project_dir = path.parent().unwrap_or_else(|| Path::new(""));

        let mut children = Vec::with_capacity(groups.len());
        for (index, group) in groups.iter().enumerate() {
            let file = group.file.ok_or_else(|| {
                FileIoError::malformed(path, format!("dataset entry {} has no File key", group.order))
            })?;
            let mut child_path = PathBuf::from(file);
            if child_path.is_relative() {
                child_path = project_dir.join(child_path);
            }
            let parameters: ValueMap = group
                .parameters
                .iter()
                .map(|&(key, value)| (key.to_string(), AttributeValue::from(value)))
                .collect();
            let io = registry::create_io(&child_path, Operation::Load)?;
            let mut child = io.load(&child_path, &parameters, &Progress::none())?;
            if let Some(name) = group.name {
                child.set_name(name);
            }
            children.push(Arc::new(child));
            progress.emit_fraction(index + 1, groups.len());
        }
        let mut collection = CollectionData::new(children);
        collection.set_settings_file(path);
        Ok(DataSet::new(DataSetData::Collection(collection)))
    }

    fn save_data(
        &self,
        path: &Path,
        data_set: &mut DataSet,
        _values: &ValueMap,
        progress: &Progress,
    ) -> Result<(), FileIoError> {
        let collection = data_set
            .as_collection()
            .ok_or_else(|| FileIoError::Parameter("dataset holds no collection".to_string()))?;
        let project_dir = path.parent().unwrap_or_else(|| Path::new(""));

        // assembled in memory first, so a refused child leaves no half-written project file
        let mut text = format!("{FILE_VERSION_KEY}={FILE_VERSION}\n");
        for (index, child) in collection.data_sets().iter().enumerate() {
            let file = child.file_name().ok_or_else(|| FileIoError::CannotReference {
                path: path.to_path_buf(),
                data_set: child.name().to_string(),
            })?;
            let file = pathdiff::diff_paths(&file, project_dir).unwrap_or(file);
            text.push_str(&format!("[DataSet{index}]\n"));
            text.push_str(&format!("{NAME_KEY}={}\n", child.name()));
            text.push_str(&format!("{FILE_KEY}={}\n", file.display()));
            for (key, value) in child.metadata() {
                if key != NAME_KEY && key != FILE_NAME_KEY {
                    text.push_str(&format!("{key}={value}\n"));
                }
            }
            progress.emit_fraction(index + 1, collection.len() + 1);
        }
        std::fs::write(path, text).map_err(|source| FileIoError::io(path, source))
    }
}
