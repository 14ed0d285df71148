/// A triangle surface mesh payload.
///
/// Vertices are shared; each triangle indexes three of them. Per-triangle normals are
/// optional and, when present, parallel to the triangle list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    vertices: Vec<[f32; 3]>,
    triangles: Vec<[u32; 3]>,
    normals: Vec<[f32; 3]>,
}

impl MeshData {
    /// Create a mesh without normals.
    #[must_use]
    pub const fn new(vertices: Vec<[f32; 3]>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            triangles,
            normals: Vec::new(),
        }
    }

    /// Create a mesh with one normal per triangle.
    #[must_use]
    pub const fn with_normals(
        vertices: Vec<[f32; 3]>,
        triangles: Vec<[u32; 3]>,
        normals: Vec<[f32; 3]>,
    ) -> Self {
        Self {
            vertices,
            triangles,
            normals,
        }
    }

    /// The shared vertex positions.
    #[must_use]
    pub fn vertices(&self) -> &[[f32; 3]] {
        &self.vertices
    }

    /// The vertex index triples.
    #[must_use]
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// The per-triangle normals; empty if the source carried none.
    #[must_use]
    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    /// The number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// The number of triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Returns true if every triangle indexes existing vertices.
    #[must_use]
    pub fn indices_valid(&self) -> bool {
        self.triangles.iter().all(|triangle| {
            triangle
                .iter()
                .all(|&index| (index as usize) < self.vertices.len())
        })
    }

    /// The axis-aligned bounding box as `(min, max)`, or [`None`] for an empty mesh.
    #[must_use]
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let mut vertices = self.vertices.iter();
        let first = *vertices.next()?;
        let mut min = first;
        let mut max = first;
        for vertex in vertices {
            for axis in 0..3 {
                min[axis] = min[axis].min(vertex[axis]);
                max[axis] = max[axis].max(vertex[axis]);
            }
        }
        Some((min, max))
    }

    /// A human-readable summary of the mesh size.
    #[must_use]
    pub fn info(&self) -> String {
        format!(
            "Vertices: {}\nTriangles: {}",
            self.vertex_count(),
            self.triangle_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> MeshData {
        MeshData::new(
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 2.0, 0.0],
                [0.0, 2.0, 0.5],
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn bounds_span_all_vertices() {
        let mesh = quad();
        assert_eq!(
            mesh.bounds(),
            Some(([0.0, 0.0, 0.0], [1.0, 2.0, 0.5]))
        );
        assert!(MeshData::default().bounds().is_none());
    }

    #[test]
    fn index_validation() {
        assert!(quad().indices_valid());
        let broken = MeshData::new(vec![[0.0; 3]], vec![[0, 0, 1]]);
        assert!(!broken.indices_valid());
    }

    #[test]
    fn info_counts() {
        assert_eq!(quad().info(), "Vertices: 4\nTriangles: 2");
    }
}
