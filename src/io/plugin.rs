use std::path::Path;
use std::time::Instant;

use derive_more::{Deref, From};

use crate::attributes::{
    combine_attributes_with_values, extract_values, AttributeSet, AttributeValue, ValueMap,
};
use crate::dataset::{DataSet, DataSetKinds, FILE_NAME_KEY, NAME_KEY};
use crate::io::{FileIoError, Operation};
use crate::progress::Progress;

/// The contract one file-format plugin implements.
///
/// Implementations hold no per-file state; one instance may serve any number of loads and
/// saves. The raw `load_data` / `save_data` hooks receive fully resolved parameter values,
/// the format-independent behaviour lives in [`FileIo`].
pub trait FileIoTraits: dyn_clone::DynClone + core::fmt::Debug + Send + Sync {
    /// The display name of the format.
    fn name(&self) -> &'static str;

    /// The file extensions claimed by the format, lower-case, without the leading dot.
    fn extensions(&self) -> &'static [&'static str];

    /// The parameters the format declares for `operation`.
    fn parameters(&self, operation: Operation) -> &AttributeSet;

    /// The dataset kinds the format can produce (load) or consume (save).
    ///
    /// An empty set means the operation is not available for this format.
    fn supported_kinds(&self, operation: Operation) -> DataSetKinds;

    /// Reads a dataset from `path`.
    ///
    /// `values` holds one entry per declared load parameter.
    ///
    /// # Errors
    ///
    /// Returns a [`FileIoError`] describing the failure; never a partial dataset.
    fn load_data(
        &self,
        path: &Path,
        values: &ValueMap,
        progress: &Progress,
    ) -> Result<DataSet, FileIoError>;

    /// Writes a dataset to `path`.
    ///
    /// `values` holds one entry per declared save parameter. The dataset is mutable because
    /// writing may refresh its erased image representation.
    ///
    /// # Errors
    ///
    /// Returns a [`FileIoError`] describing the failure.
    fn save_data(
        &self,
        path: &Path,
        data_set: &mut DataSet,
        values: &ValueMap,
        progress: &Progress,
    ) -> Result<(), FileIoError>;

    /// Per-dataset veto beyond the kind mask, consulted before a save.
    fn is_data_set_supported(&self, data_set: &DataSet, path: &Path) -> bool {
        let _ = (data_set, path);
        true
    }
}

dyn_clone::clone_trait_object!(FileIoTraits);

/// A file I/O plugin.
///
/// The public [`load`](Self::load) and [`save`](Self::save) entry points wrap the plugin's
/// raw hooks with parameter resolution, progress bracketing, timing and metadata stamping.
#[derive(Clone, Debug, Deref, From)]
pub struct FileIo(Box<dyn FileIoTraits>);

impl FileIo {
    /// Create a plugin handle from an implementation.
    #[must_use]
    pub fn new(io: impl FileIoTraits + 'static) -> Self {
        Self(Box::new(io))
    }

    /// Loads a dataset from `path`.
    ///
    /// Missing parameters are filled from the declared defaults with one logged warning
    /// each. On success the resolved parameters, the file name and a display name (the file
    /// stem, unless the plugin stamped one) are stored in the dataset's metadata, so a later
    /// save can reproduce the load.
    ///
    /// # Errors
    ///
    /// Returns the plugin's [`FileIoError`]; no partial dataset is produced.
    pub fn load(
        &self,
        path: &Path,
        values: &ValueMap,
        progress: &Progress,
    ) -> Result<DataSet, FileIoError> {
        let resolved = self.resolve_parameters(Operation::Load, values);
        progress.emit(0);
        let start = Instant::now();
        let mut data_set = self.0.load_data(path, &resolved, progress)?;
        log::debug!(
            "{} loaded '{}' in {} ms",
            self.0.name(),
            path.display(),
            start.elapsed().as_millis()
        );
        progress.emit(100);

        let metadata = data_set.metadata_mut();
        for (name, value) in resolved {
            metadata.insert(name, value);
        }
        metadata.insert(
            FILE_NAME_KEY.to_string(),
            AttributeValue::String(path.display().to_string()),
        );
        if !metadata.contains_key(NAME_KEY) {
            let name = path
                .file_stem()
                .map_or_else(|| path.display().to_string(), |stem| {
                    stem.to_string_lossy().to_string()
                });
            metadata.insert(NAME_KEY.to_string(), AttributeValue::String(name));
        }
        Ok(data_set)
    }

    /// Saves a dataset to `path` and re-stamps its file provenance.
    ///
    /// # Errors
    ///
    /// Returns [`FileIoError::UnsupportedDataSet`] if the dataset kind is outside the
    /// plugin's save mask or the plugin vetoes the dataset, otherwise the plugin's error.
    pub fn save(
        &self,
        path: &Path,
        data_set: &mut DataSet,
        values: &ValueMap,
        progress: &Progress,
    ) -> Result<(), FileIoError> {
        if !self.0.supported_kinds(Operation::Save).contains(data_set.kind())
            || !self.0.is_data_set_supported(data_set, path)
        {
            return Err(FileIoError::UnsupportedDataSet {
                name: self.0.name(),
                operation: Operation::Save,
                kind: data_set.kind(),
            });
        }
        let resolved = self.resolve_parameters(Operation::Save, values);
        progress.emit(0);
        let start = Instant::now();
        self.0.save_data(path, data_set, &resolved, progress)?;
        log::debug!(
            "{} saved '{}' in {} ms",
            self.0.name(),
            path.display(),
            start.elapsed().as_millis()
        );
        progress.emit(100);
        data_set.metadata_mut().insert(
            FILE_NAME_KEY.to_string(),
            AttributeValue::String(path.display().to_string()),
        );
        Ok(())
    }

    fn resolve_parameters(&self, operation: Operation, values: &ValueMap) -> ValueMap {
        let declared = self.0.parameters(operation);
        for descriptor in declared.iter() {
            if !values.contains_key(descriptor.name()) {
                log::warn!(
                    "{}: no value for parameter '{}', using default '{}'.",
                    self.0.name(),
                    descriptor.name(),
                    descriptor.default_value()
                );
            }
        }
        extract_values(&combine_attributes_with_values(declared, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttributeDescriptor, ValueKind};
    use crate::dataset::{DataSetData, DataSetKind, MeshData};

    #[derive(Clone, Debug)]
    struct RecordingIo {
        parameters: AttributeSet,
    }

    impl RecordingIo {
        fn new() -> Self {
            let mut parameters = AttributeSet::new();
            parameters.add(AttributeDescriptor::new(
                "Threshold",
                ValueKind::Continuous,
                AttributeValue::Float(0.5),
            ));
            Self { parameters }
        }
    }

    impl FileIoTraits for RecordingIo {
        fn name(&self) -> &'static str {
            "Recording"
        }

        fn extensions(&self) -> &'static [&'static str] {
            &["rec"]
        }

        fn parameters(&self, _operation: Operation) -> &AttributeSet {
            &self.parameters
        }

        fn supported_kinds(&self, operation: Operation) -> DataSetKinds {
            match operation {
                Operation::Load => DataSetKinds::MESH,
                Operation::Save => DataSetKinds::NONE,
            }
        }

        fn load_data(
            &self,
            _path: &Path,
            values: &ValueMap,
            _progress: &Progress,
        ) -> Result<DataSet, FileIoError> {
            // the wrapper must have filled the declared default in
            assert_eq!(
                values.get("Threshold"),
                Some(&AttributeValue::Float(0.5))
            );
            Ok(DataSet::new(DataSetData::Mesh(MeshData::default())))
        }

        fn save_data(
            &self,
            _path: &Path,
            _data_set: &mut DataSet,
            _values: &ValueMap,
            _progress: &Progress,
        ) -> Result<(), FileIoError> {
            Ok(())
        }
    }

    #[test]
    fn load_stamps_metadata() {
        let io = FileIo::new(RecordingIo::new());
        let data_set = io
            .load(
                Path::new("/data/scan_01.rec"),
                &ValueMap::new(),
                &Progress::none(),
            )
            .unwrap();
        assert_eq!(data_set.name(), "scan_01");
        assert_eq!(
            data_set.file_name(),
            Some(std::path::PathBuf::from("/data/scan_01.rec"))
        );
        assert_eq!(
            data_set.metadata().get("Threshold"),
            Some(&AttributeValue::Float(0.5))
        );
    }

    #[test]
    fn save_rejects_unsupported_kinds() {
        let io = FileIo::new(RecordingIo::new());
        let mut data_set = DataSet::new(DataSetData::Mesh(MeshData::default()));
        let err = io
            .save(
                Path::new("/data/out.rec"),
                &mut data_set,
                &ValueMap::new(),
                &Progress::none(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            FileIoError::UnsupportedDataSet {
                operation: Operation::Save,
                kind: DataSetKind::Mesh,
                ..
            }
        ));
    }

    #[test]
    fn progress_is_bracketed() {
        use std::sync::atomic::{AtomicU8, Ordering};
        use std::sync::Arc;

        let seen = Arc::new(AtomicU8::new(u8::MAX));
        let seen_in = seen.clone();
        let progress = Progress::new(move |percent| {
            seen_in.store(percent, Ordering::Relaxed);
        });
        let io = FileIo::new(RecordingIo::new());
        io.load(Path::new("in.rec"), &ValueMap::new(), &progress)
            .unwrap();
        assert_eq!(seen.load(Ordering::Relaxed), 100);
    }
}
