//! The process-wide file type registry.
//!
//! The registry maps file extensions to [`FileIo`] plugin factories. Registration is
//! first-wins per extension and operation: a later registration offering an operation some
//! earlier registration already offers for the same extension is logged and never shadows
//! the earlier one, but it may still serve the extension's other operation. The same
//! first-wins discipline applies to the default extension recorded per dataset kind.
//!
//! [`FileTypeRegistry`] is an ordinary value, so registry behaviour is testable on a local
//! instance; the free functions of this module operate on the shared process-wide instance
//! behind a [`RwLock`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::dataset::{DataSetKind, DataSetKinds};
use crate::io::{
    graph::GraphFileIo, meta_image::MetaImageFileIo, project::ProjectFileIo, raw::RawFileIo,
    stl::StlFileIo, FileIo, FileIoError, Operation,
};

/// One registered file type: the plugin factory plus the facts needed to pick it without
/// instantiating it.
#[derive(Clone, Debug)]
pub struct RegisteredFileType {
    factory: fn() -> FileIo,
    name: &'static str,
    extensions: &'static [&'static str],
    load_kinds: DataSetKinds,
    save_kinds: DataSetKinds,
}

impl RegisteredFileType {
    /// The display name of the format.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The extensions claimed by the format.
    #[must_use]
    pub const fn extensions(&self) -> &'static [&'static str] {
        self.extensions
    }

    /// The dataset kinds available for `operation`.
    #[must_use]
    pub const fn kinds(&self, operation: Operation) -> DataSetKinds {
        match operation {
            Operation::Load => self.load_kinds,
            Operation::Save => self.save_kinds,
        }
    }

    /// Instantiates the plugin.
    #[must_use]
    pub fn create(&self) -> FileIo {
        (self.factory)()
    }
}

/// A catalog of file type registrations and per-kind default extensions.
#[derive(Debug, Default)]
pub struct FileTypeRegistry {
    file_types: Vec<RegisteredFileType>,
    // claimants per lowercased extension, in registration order
    extension_index: BTreeMap<String, Vec<usize>>,
    default_extensions: Vec<(DataSetKind, String)>,
    defaults_registered: bool,
}

impl FileTypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a file type.
    ///
    /// The factory is invoked once to interrogate name, extensions and supported kinds.
    /// An extension and operation already claimed by an earlier registration stays with its
    /// first owner, with a logged warning; the new registration still serves whatever the
    /// earlier owners left unclaimed.
    pub fn register(&mut self, factory: fn() -> FileIo) {
        let io = factory();
        let record = RegisteredFileType {
            factory,
            name: io.name(),
            extensions: io.extensions(),
            load_kinds: io.supported_kinds(Operation::Load),
            save_kinds: io.supported_kinds(Operation::Save),
        };
        let index = self.file_types.len();
        for &extension in record.extensions {
            let extension = extension.to_lowercase();
            let claimants = self.extension_index.entry(extension.clone()).or_default();
            for operation in [Operation::Load, Operation::Save] {
                if record.kinds(operation).is_empty() {
                    continue;
                }
                if let Some(&owner) = claimants
                    .iter()
                    .find(|&&claimant| !self.file_types[claimant].kinds(operation).is_empty())
                {
                    log::warn!(
                        "Extension '{}' is already registered to {} for {}; {} will not be used for it.",
                        extension,
                        self.file_types[owner].name,
                        operation,
                        record.name
                    );
                }
            }
            claimants.push(index);
        }
        self.file_types.push(record);
    }

    /// Registers the built-in file types and default extensions once.
    ///
    /// Calling this again is a no-op.
    pub fn register_defaults(&mut self) {
        if self.defaults_registered {
            return;
        }
        self.defaults_registered = true;
        self.register(|| FileIo::new(MetaImageFileIo::new()));
        self.register(|| FileIo::new(RawFileIo::new()));
        self.register(|| FileIo::new(StlFileIo::new()));
        self.register(|| FileIo::new(GraphFileIo::new()));
        self.register(|| FileIo::new(ProjectFileIo::new()));
        self.add_default_extension(DataSetKind::Volume, "mhd");
        self.add_default_extension(DataSetKind::Mesh, "stl");
        self.add_default_extension(DataSetKind::Graph, "txt");
        self.add_default_extension(DataSetKind::Collection, "iaproj");
    }

    fn claimants(&self, path: &Path) -> Option<&[usize]> {
        let file_name = path.file_name()?.to_string_lossy().to_lowercase();
        let segments: Vec<&str> = file_name.split('.').collect();
        if segments.len() > 2 {
            let compound = format!("{}.{}", segments[segments.len() - 2], segments[segments.len() - 1]);
            if let Some(claimants) = self.extension_index.get(&compound) {
                return Some(claimants);
            }
        }
        segments
            .last()
            .filter(|_| segments.len() > 1)
            .and_then(|extension| self.extension_index.get(*extension))
            .map(Vec::as_slice)
    }

    /// The registration matching the extension of `path` and offering `operation`.
    ///
    /// Matching is case-insensitive and probes the two-segment compound suffix (for names
    /// like `scan.ome.tiff`) before falling back to the final segment. Among multiple
    /// claimants of the same extension, the first one registered for the operation wins.
    #[must_use]
    pub fn find(&self, path: &Path, operation: Operation) -> Option<&RegisteredFileType> {
        self.claimants(path)?
            .iter()
            .map(|&index| &self.file_types[index])
            .find(|record| !record.kinds(operation).is_empty())
    }

    /// Instantiates the plugin for `path` and `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`FileIoError::NoRegisteredIo`] if no registration claims the extension, or
    /// the claiming format does not offer the operation.
    pub fn create_io(&self, path: &Path, operation: Operation) -> Result<FileIo, FileIoError> {
        let no_io = || {
            log::warn!(
                "No file type registered to {} '{}'.",
                operation,
                path.display()
            );
            FileIoError::NoRegisteredIo {
                path: path.to_path_buf(),
                operation,
            }
        };
        let record = self.find(path, operation).ok_or_else(no_io)?;
        Ok(record.create())
    }

    /// A dialog-style filter string over the formats offering `operation` for a kind in
    /// `allowed`, led by a combined "any supported" entry.
    #[must_use]
    pub fn registered_file_types(&self, operation: Operation, allowed: DataSetKinds) -> String {
        let matching: Vec<&RegisteredFileType> = self
            .file_types
            .iter()
            .filter(|record| record.kinds(operation).intersects(allowed))
            .collect();
        let all_patterns = matching
            .iter()
            .flat_map(|record| record.extensions.iter().map(|ext| format!("*.{ext}")))
            .collect::<Vec<_>>()
            .join(" ");
        let mut filters = vec![format!("Any supported format ({all_patterns})")];
        for record in matching {
            let patterns = record
                .extensions
                .iter()
                .map(|ext| format!("*.{ext}"))
                .collect::<Vec<_>>()
                .join(" ");
            filters.push(format!("{} ({patterns})", record.name));
        }
        filters.join(";;")
    }

    /// The default extension recorded for `kind`.
    #[must_use]
    pub fn default_extension(&self, kind: DataSetKind) -> Option<&str> {
        self.default_extensions
            .iter()
            .find(|(recorded, _)| *recorded == kind)
            .map(|(_, extension)| extension.as_str())
    }

    /// Records the default extension for `kind`; a kind already holding one keeps it, with
    /// a logged warning.
    pub fn add_default_extension(&mut self, kind: DataSetKind, extension: &str) {
        if let Some(existing) = self.default_extension(kind) {
            log::warn!(
                "Default extension for {} datasets is already '{}'; ignoring '{}'.",
                kind,
                existing,
                extension
            );
            return;
        }
        self.default_extensions
            .push((kind, extension.to_lowercase()));
    }
}

static REGISTRY: OnceLock<RwLock<FileTypeRegistry>> = OnceLock::new();

/// Returns a reference to the process-wide file type registry.
///
/// # Panics
/// Panics if the underlying lock has been poisoned.
#[must_use]
pub fn global_registry() -> RwLockReadGuard<'static, FileTypeRegistry> {
    REGISTRY
        .get_or_init(|| RwLock::new(FileTypeRegistry::new()))
        .read()
        .unwrap()
}

/// Returns a mutable reference to the process-wide file type registry.
///
/// # Panics
/// Panics if the underlying lock has been poisoned.
#[must_use]
pub fn global_registry_mut() -> RwLockWriteGuard<'static, FileTypeRegistry> {
    REGISTRY
        .get_or_init(|| RwLock::new(FileTypeRegistry::new()))
        .write()
        .unwrap()
}

/// Registers a file type with the process-wide registry.
pub fn register_file_type(factory: fn() -> FileIo) {
    global_registry_mut().register(factory);
}

/// Registers the built-in file types with the process-wide registry; idempotent.
pub fn setup_default_file_types() {
    global_registry_mut().register_defaults();
}

/// Instantiates the plugin for `path` and `operation` from the process-wide registry.
///
/// # Errors
///
/// Returns [`FileIoError::NoRegisteredIo`] if no registered format claims the extension for
/// the operation.
pub fn create_io(path: &Path, operation: Operation) -> Result<FileIo, FileIoError> {
    global_registry().create_io(path, operation)
}

/// A dialog-style filter string from the process-wide registry.
#[must_use]
pub fn registered_file_types(operation: Operation, allowed: DataSetKinds) -> String {
    global_registry().registered_file_types(operation, allowed)
}

/// The default extension recorded for `kind` in the process-wide registry.
#[must_use]
pub fn default_extension(kind: DataSetKind) -> Option<String> {
    global_registry()
        .default_extension(kind)
        .map(str::to_string)
}

/// Records the default extension for `kind` in the process-wide registry.
pub fn add_default_extension(kind: DataSetKind, extension: &str) {
    global_registry_mut().add_default_extension(kind, extension);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_registry() -> FileTypeRegistry {
        let mut registry = FileTypeRegistry::new();
        registry.register_defaults();
        registry
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        let registry = test_registry();
        let io = registry
            .create_io(Path::new("/data/Scan.MHD"), Operation::Load)
            .unwrap();
        assert_eq!(io.name(), "MetaImage");
    }

    #[test]
    fn unknown_extension_fails() {
        let registry = test_registry();
        let err = registry
            .create_io(Path::new("notes.csv"), Operation::Load)
            .unwrap_err();
        assert!(matches!(err, FileIoError::NoRegisteredIo { .. }));
        assert!(registry
            .create_io(Path::new("extensionless"), Operation::Load)
            .is_err());
    }

    #[test]
    fn load_only_formats_refuse_save() {
        let registry = test_registry();
        assert!(registry
            .create_io(Path::new("vessels.txt"), Operation::Load)
            .is_ok());
        assert!(matches!(
            registry.create_io(Path::new("vessels.txt"), Operation::Save),
            Err(FileIoError::NoRegisteredIo {
                operation: Operation::Save,
                ..
            })
        ));
    }

    #[derive(Clone, Debug)]
    struct LateClaimIo {
        no_params: crate::attributes::AttributeSet,
    }

    impl crate::io::FileIoTraits for LateClaimIo {
        fn name(&self) -> &'static str {
            "Late claim"
        }

        fn extensions(&self) -> &'static [&'static str] {
            &["raw", "txt", "lateclaim"]
        }

        fn parameters(&self, _operation: Operation) -> &crate::attributes::AttributeSet {
            &self.no_params
        }

        fn supported_kinds(&self, _operation: Operation) -> DataSetKinds {
            DataSetKinds::VOLUME
        }

        fn load_data(
            &self,
            path: &Path,
            _values: &crate::attributes::ValueMap,
            _progress: &crate::progress::Progress,
        ) -> Result<crate::dataset::DataSet, FileIoError> {
            Err(FileIoError::malformed(path, "unimplemented"))
        }

        fn save_data(
            &self,
            path: &Path,
            _data_set: &mut crate::dataset::DataSet,
            _values: &crate::attributes::ValueMap,
            _progress: &crate::progress::Progress,
        ) -> Result<(), FileIoError> {
            Err(FileIoError::malformed(path, "unimplemented"))
        }
    }

    #[test]
    fn first_registration_wins_per_extension_and_operation() {
        let mut registry = test_registry();
        registry.register(|| {
            FileIo::new(LateClaimIo {
                no_params: crate::attributes::AttributeSet::new(),
            })
        });
        // the raw format already owns 'raw' for both operations
        let io = registry
            .create_io(Path::new("block.raw"), Operation::Load)
            .unwrap();
        assert_eq!(io.name(), "Raw binary");
        // the graph format owns 'txt' loading only, so saving goes to the late claim
        let io = registry
            .create_io(Path::new("block.txt"), Operation::Load)
            .unwrap();
        assert_eq!(io.name(), "Graph file");
        let io = registry
            .create_io(Path::new("block.txt"), Operation::Save)
            .unwrap();
        assert_eq!(io.name(), "Late claim");
        // an unclaimed extension is served outright
        let io = registry
            .create_io(Path::new("block.lateclaim"), Operation::Load)
            .unwrap();
        assert_eq!(io.name(), "Late claim");
    }

    #[test]
    fn compound_suffix_probed_before_single_segment() {
        let registry = test_registry();
        // no compound registration exists, so 'scan.tar.mhd' falls back to 'mhd'
        let io = registry
            .create_io(Path::new("scan.tar.mhd"), Operation::Load)
            .unwrap();
        assert_eq!(io.name(), "MetaImage");
    }

    #[test]
    fn default_extensions_first_wins() {
        let mut registry = test_registry();
        assert_eq!(registry.default_extension(DataSetKind::Volume), Some("mhd"));
        registry.add_default_extension(DataSetKind::Volume, "raw");
        assert_eq!(registry.default_extension(DataSetKind::Volume), Some("mhd"));
        registry.register_defaults();
        assert_eq!(registry.default_extension(DataSetKind::Mesh), Some("stl"));
    }

    #[test]
    fn filter_string_lists_matching_formats() {
        let registry = test_registry();
        let filter = registry.registered_file_types(Operation::Save, DataSetKinds::VOLUME);
        assert!(filter.starts_with("Any supported format ("));
        assert!(filter.contains("MetaImage (*.mhd *.mha)"));
        assert!(!filter.contains("Graph"));
    }
}
