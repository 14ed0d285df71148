//! The dataset model: one loaded unit of scientific data plus its metadata.
//!
//! A [`DataSet`] pairs a payload ([`DataSetData`], a closed union over image volumes, surface
//! meshes, spatial graphs and collections) with a mutable metadata map. The payload variant
//! is fixed at construction, so the kind reported by [`DataSet::kind`] can never disagree
//! with the data actually held. After a load, the metadata at minimum carries [`NAME_KEY`]
//! and [`FILE_NAME_KEY`] plus every resolved load parameter.

mod collection;
mod graph;
mod image;
mod mesh;

pub use collection::CollectionData;
pub use graph::{GraphData, GraphEdge, GraphVertex};
pub use image::ImageData;
pub use mesh::MeshData;

use std::path::PathBuf;

use crate::attributes::{AttributeValue, ValueMap};

/// Metadata key holding the display name of a dataset.
pub const NAME_KEY: &str = "Name";
/// Metadata key holding the file a dataset was loaded from or saved to.
pub const FILE_NAME_KEY: &str = "FileName";

/// The kind of data a [`DataSet`] holds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DataSetKind {
    /// A volumetric image.
    Volume,
    /// A surface mesh.
    Mesh,
    /// A spatial graph.
    Graph,
    /// An ordered collection of datasets.
    Collection,
}

impl DataSetKind {
    const fn bit(self) -> u8 {
        match self {
            Self::Volume => 1,
            Self::Mesh => 1 << 1,
            Self::Graph => 1 << 2,
            Self::Collection => 1 << 3,
        }
    }
}

impl core::fmt::Display for DataSetKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Volume => write!(f, "volume"),
            Self::Mesh => write!(f, "mesh"),
            Self::Graph => write!(f, "graph"),
            Self::Collection => write!(f, "collection"),
        }
    }
}

/// A set of [`DataSetKind`]s, used as the per-operation support mask of a file I/O plugin.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct DataSetKinds(u8);

impl DataSetKinds {
    /// No kind.
    pub const NONE: Self = Self(0);
    /// Volumetric images only.
    pub const VOLUME: Self = Self(DataSetKind::Volume.bit());
    /// Surface meshes only.
    pub const MESH: Self = Self(DataSetKind::Mesh.bit());
    /// Spatial graphs only.
    pub const GRAPH: Self = Self(DataSetKind::Graph.bit());
    /// Collections only.
    pub const COLLECTION: Self = Self(DataSetKind::Collection.bit());
    /// Every kind.
    pub const ALL: Self = Self(
        DataSetKind::Volume.bit()
            | DataSetKind::Mesh.bit()
            | DataSetKind::Graph.bit()
            | DataSetKind::Collection.bit(),
    );

    /// Returns true if `kind` is in the set.
    #[must_use]
    pub const fn contains(self, kind: DataSetKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Returns true if the sets share at least one kind.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns true if the set holds no kind.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl From<DataSetKind> for DataSetKinds {
    fn from(kind: DataSetKind) -> Self {
        Self(kind.bit())
    }
}

impl core::ops::BitOr for DataSetKinds {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for DataSetKinds {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// The payload of a [`DataSet`]: a closed union over the supported kinds.
#[derive(Clone, Debug)]
pub enum DataSetData {
    /// A volumetric image.
    Image(ImageData),
    /// A surface mesh.
    Mesh(MeshData),
    /// A spatial graph.
    Graph(GraphData),
    /// An ordered collection of datasets.
    Collection(CollectionData),
}

/// One loaded unit of scientific data.
#[derive(Clone, Debug)]
pub struct DataSet {
    metadata: ValueMap,
    data: DataSetData,
}

impl DataSet {
    /// Create a dataset over `data` with empty metadata.
    #[must_use]
    pub fn new(data: DataSetData) -> Self {
        Self {
            metadata: ValueMap::new(),
            data,
        }
    }

    /// The kind matching the payload variant.
    #[must_use]
    pub const fn kind(&self) -> DataSetKind {
        match &self.data {
            DataSetData::Image(_) => DataSetKind::Volume,
            DataSetData::Mesh(_) => DataSetKind::Mesh,
            DataSetData::Graph(_) => DataSetKind::Graph,
            DataSetData::Collection(_) => DataSetKind::Collection,
        }
    }

    /// The payload.
    #[must_use]
    pub const fn data(&self) -> &DataSetData {
        &self.data
    }

    /// The payload, mutably.
    pub fn data_mut(&mut self) -> &mut DataSetData {
        &mut self.data
    }

    /// The metadata map.
    #[must_use]
    pub const fn metadata(&self) -> &ValueMap {
        &self.metadata
    }

    /// The metadata map, mutably.
    pub fn metadata_mut(&mut self) -> &mut ValueMap {
        &mut self.metadata
    }

    /// The display name from metadata, or a placeholder if none was stamped.
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata
            .get(NAME_KEY)
            .and_then(AttributeValue::as_str)
            .unwrap_or("unnamed dataset")
    }

    /// Stores the display name in metadata.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.metadata
            .insert(NAME_KEY.to_string(), AttributeValue::String(name.into()));
    }

    /// The file the dataset was loaded from or saved to, if any.
    #[must_use]
    pub fn file_name(&self) -> Option<PathBuf> {
        self.metadata
            .get(FILE_NAME_KEY)
            .and_then(AttributeValue::as_str)
            .map(PathBuf::from)
    }

    /// The image payload, if the dataset is a volume.
    #[must_use]
    pub const fn as_image(&self) -> Option<&ImageData> {
        match &self.data {
            DataSetData::Image(image) => Some(image),
            _ => None,
        }
    }

    /// The image payload, mutably, if the dataset is a volume.
    pub fn as_image_mut(&mut self) -> Option<&mut ImageData> {
        match &mut self.data {
            DataSetData::Image(image) => Some(image),
            _ => None,
        }
    }

    /// The mesh payload, if the dataset is a mesh.
    #[must_use]
    pub const fn as_mesh(&self) -> Option<&MeshData> {
        match &self.data {
            DataSetData::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// The graph payload, if the dataset is a graph.
    #[must_use]
    pub const fn as_graph(&self) -> Option<&GraphData> {
        match &self.data {
            DataSetData::Graph(graph) => Some(graph),
            _ => None,
        }
    }

    /// The collection payload, if the dataset is a collection.
    #[must_use]
    pub const fn as_collection(&self) -> Option<&CollectionData> {
        match &self.data {
            DataSetData::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    /// A human-readable summary of the payload.
    #[must_use]
    pub fn info(&self) -> String {
        match &self.data {
            DataSetData::Image(image) => image.info(),
            DataSetData::Mesh(mesh) => mesh.info(),
            DataSetData::Graph(graph) => graph.info(),
            DataSetData::Collection(collection) => collection.info(),
        }
    }

    /// A per-axis scale hint: the voxel spacing for volumes, unit scale otherwise.
    #[must_use]
    pub fn unit_distance(&self) -> [f64; 3] {
        match &self.data {
            DataSetData::Image(image) => image.spacing(),
            _ => [1.0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{FlatImage, ImageBridge};
    use crate::dispatch::ScalarType;

    #[test]
    fn kind_masks() {
        let mask = DataSetKinds::VOLUME | DataSetKinds::MESH;
        assert!(mask.contains(DataSetKind::Volume));
        assert!(mask.contains(DataSetKind::Mesh));
        assert!(!mask.contains(DataSetKind::Graph));
        assert!(mask.intersects(DataSetKinds::MESH));
        assert!(!mask.intersects(DataSetKinds::COLLECTION));
        assert!(DataSetKinds::NONE.is_empty());
        assert!(DataSetKinds::ALL.contains(DataSetKind::Collection));
        assert_eq!(DataSetKinds::from(DataSetKind::Graph), DataSetKinds::GRAPH);
    }

    #[test]
    fn kind_tag_follows_payload() {
        let flat = FlatImage::new(
            [1, 1, 1],
            [2.0, 2.0, 5.0],
            [0.0; 3],
            ScalarType::UInt8,
            1,
            vec![0],
        )
        .unwrap();
        let dataset = DataSet::new(DataSetData::Image(ImageData::new(ImageBridge::from_flat(
            flat,
        ))));
        assert_eq!(dataset.kind(), DataSetKind::Volume);
        assert!(dataset.as_image().is_some());
        assert!(dataset.as_mesh().is_none());
        assert_eq!(dataset.unit_distance(), [2.0, 2.0, 5.0]);

        let mesh = DataSet::new(DataSetData::Mesh(MeshData::new(Vec::new(), Vec::new())));
        assert_eq!(mesh.kind(), DataSetKind::Mesh);
        assert_eq!(mesh.unit_distance(), [1.0; 3]);
    }

    #[test]
    fn name_and_file_metadata() {
        let mut dataset = DataSet::new(DataSetData::Mesh(MeshData::new(Vec::new(), Vec::new())));
        assert_eq!(dataset.name(), "unnamed dataset");
        assert!(dataset.file_name().is_none());
        dataset.set_name("specimen");
        dataset.metadata_mut().insert(
            FILE_NAME_KEY.to_string(),
            AttributeValue::from("/data/specimen.stl"),
        );
        assert_eq!(dataset.name(), "specimen");
        assert_eq!(
            dataset.file_name(),
            Some(PathBuf::from("/data/specimen.stl"))
        );
    }
}
