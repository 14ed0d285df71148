use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::DataSet;

/// An ordered collection of datasets, typically loaded from a project file.
///
/// Children are shared: the same loaded [`DataSet`] may be referenced by a collection and by
/// other holders, so its lifetime is not tied to any single owner.
#[derive(Clone, Debug, Default)]
pub struct CollectionData {
    data_sets: Vec<Arc<DataSet>>,
    settings_file: Option<PathBuf>,
}

impl CollectionData {
    /// Create a collection over `data_sets`.
    #[must_use]
    pub const fn new(data_sets: Vec<Arc<DataSet>>) -> Self {
        Self {
            data_sets,
            settings_file: None,
        }
    }

    /// The child datasets, in load order.
    #[must_use]
    pub fn data_sets(&self) -> &[Arc<DataSet>] {
        &self.data_sets
    }

    /// Appends a child dataset.
    pub fn push(&mut self, data_set: Arc<DataSet>) {
        self.data_sets.push(data_set);
    }

    /// The number of child datasets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data_sets.len()
    }

    /// Returns true if the collection has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data_sets.is_empty()
    }

    /// The file additional persisted settings were loaded from, if any.
    #[must_use]
    pub fn settings_file(&self) -> Option<&Path> {
        self.settings_file.as_deref()
    }

    /// Records the file additional persisted settings were loaded from.
    pub fn set_settings_file(&mut self, path: impl Into<PathBuf>) {
        self.settings_file = Some(path.into());
    }

    /// A human-readable summary listing the children.
    #[must_use]
    pub fn info(&self) -> String {
        let mut info = format!("Datasets: {}", self.data_sets.len());
        for data_set in &self.data_sets {
            info.push_str("\n  ");
            info.push_str(data_set.name());
        }
        info
    }
}
