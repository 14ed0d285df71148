/// One vertex of a spatial graph.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphVertex {
    /// The position, already scaled by the load-time spacing.
    pub position: [f64; 3],
    /// The RGB display color.
    pub color: [u8; 3],
    /// Additional per-vertex values, parallel to
    /// [`GraphData::vertex_value_names`].
    pub values: Vec<f64>,
}

/// One edge of a spatial graph, connecting two vertices by index.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphEdge {
    /// The zero-based indices of the connected vertices.
    pub vertices: [usize; 2],
    /// The RGB display color.
    pub color: [u8; 3],
    /// Additional per-edge values, parallel to [`GraphData::edge_value_names`].
    pub values: Vec<f64>,
}

/// A spatial graph payload: colored vertices in space connected by colored edges.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphData {
    vertices: Vec<GraphVertex>,
    edges: Vec<GraphEdge>,
    vertex_value_names: Vec<String>,
    edge_value_names: Vec<String>,
}

impl GraphData {
    /// Create a graph payload.
    #[must_use]
    pub const fn new(
        vertices: Vec<GraphVertex>,
        edges: Vec<GraphEdge>,
        vertex_value_names: Vec<String>,
        edge_value_names: Vec<String>,
    ) -> Self {
        Self {
            vertices,
            edges,
            vertex_value_names,
            edge_value_names,
        }
    }

    /// The vertices.
    #[must_use]
    pub fn vertices(&self) -> &[GraphVertex] {
        &self.vertices
    }

    /// The edges.
    #[must_use]
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// The names of the additional per-vertex value columns.
    #[must_use]
    pub fn vertex_value_names(&self) -> &[String] {
        &self.vertex_value_names
    }

    /// The names of the additional per-edge value columns.
    #[must_use]
    pub fn edge_value_names(&self) -> &[String] {
        &self.edge_value_names
    }

    /// Returns true if every edge references existing vertices.
    #[must_use]
    pub fn edges_valid(&self) -> bool {
        self.edges
            .iter()
            .all(|edge| edge.vertices.iter().all(|&index| index < self.vertices.len()))
    }

    /// The axis-aligned bounding box as `(min, max)`, or [`None`] for an empty graph.
    #[must_use]
    pub fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        let mut vertices = self.vertices.iter();
        let first = vertices.next()?.position;
        let mut min = first;
        let mut max = first;
        for vertex in vertices {
            for axis in 0..3 {
                min[axis] = min[axis].min(vertex.position[axis]);
                max[axis] = max[axis].max(vertex.position[axis]);
            }
        }
        Some((min, max))
    }

    /// A human-readable summary of the graph size.
    #[must_use]
    pub fn info(&self) -> String {
        format!(
            "Vertices: {}\nEdges: {}",
            self.vertices.len(),
            self.edges.len()
        )
    }
}
