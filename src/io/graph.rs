//! Spatial graph files (`.txt`, `.pdb`), load-only.
//!
//! The text layout is: `%%` comment lines, a tab-separated vertex table headed by column
//! names (`id`, `x`, `y`, `z`, `color` plus arbitrary numeric columns), a `$$` separator
//! line, then an edge table headed by `id`, `Vert_1`, `Vert_2`, `color` plus numeric columns.
//! Vertex ids must be sequential starting at 1; edges reference vertices one-based.

use std::path::Path;

use crate::attributes::{AttributeDescriptor, AttributeSet, AttributeValue, ValueKind, ValueMap};
use crate::dataset::{DataSet, DataSetData, DataSetKinds, GraphData, GraphEdge, GraphVertex};
use crate::io::{param_bool, param_vector3, FileIoError, FileIoTraits, Operation};
use crate::progress::Progress;

/// Parameter name for the per-axis scale applied to vertex positions.
pub const SPACING: &str = "Spacing";
/// Parameter name for swapping the x and y axes on load.
pub const SWAP_XY: &str = "Swap XY";

const NAMED_COLORS: [(&str, [u8; 3]); 9] = [
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("gray", [128, 128, 128]),
];

fn parse_color(token: &str) -> Option<[u8; 3]> {
    if let Some(hex) = token.strip_prefix('#') {
        if hex.len() == 6 {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            return Some([r, g, b]);
        }
        return None;
    }
    NAMED_COLORS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(token))
        .map(|(_, rgb)| *rgb)
}

/// One parsed table header: the special columns plus the remaining value columns.
struct TableHeader {
    columns: usize,
    special: Vec<usize>,
    value_names: Vec<String>,
    value_indices: Vec<usize>,
}

impl TableHeader {
    fn parse(path: &Path, line: &str, special_names: &[&str]) -> Result<Self, FileIoError> {
        let columns: Vec<&str> = line.split('\t').collect();
        let mut special = Vec::with_capacity(special_names.len());
        for &name in special_names {
            let index = columns.iter().position(|&column| column == name);
            // 'id' is informative only, the other special columns are required
            let index = match (index, name) {
                (Some(index), _) => index,
                (None, "id") => usize::MAX,
                (None, _) => {
                    return Err(FileIoError::malformed(
                        path,
                        format!("expected column '{name}' not found"),
                    ))
                }
            };
            special.push(index);
        }
        let mut value_names = Vec::new();
        let mut value_indices = Vec::new();
        for (index, &column) in columns.iter().enumerate() {
            if !special.contains(&index) {
                value_names.push(column.to_string());
                value_indices.push(index);
            }
        }
        Ok(Self {
            columns: columns.len(),
            special,
            value_names,
            value_indices,
        })
    }

    fn tokens<'a>(&self, path: &Path, line: &'a str) -> Result<Vec<&'a str>, FileIoError> {
        let tokens: Vec<&str> = line.split('\t').collect();
        if tokens.len() == self.columns {
            Ok(tokens)
        } else {
            Err(FileIoError::malformed(
                path,
                format!(
                    "line '{line}' has {} tokens instead of the {} expected from the header",
                    tokens.len(),
                    self.columns
                ),
            ))
        }
    }

    fn values(&self, path: &Path, tokens: &[&str]) -> Result<Vec<f64>, FileIoError> {
        self.value_indices
            .iter()
            .zip(&self.value_names)
            .map(|(&index, name)| {
                tokens[index].parse::<f64>().map_err(|_| {
                    FileIoError::malformed(
                        path,
                        format!("invalid value '{}' in column '{name}'", tokens[index]),
                    )
                })
            })
            .collect()
    }
}

/// The spatial graph text format.
#[derive(Clone, Debug)]
pub struct GraphFileIo {
    load_params: AttributeSet,
    no_params: AttributeSet,
}

impl GraphFileIo {
    /// Create the plugin with its declared parameters.
    #[must_use]
    pub fn new() -> Self {
        let mut load_params = AttributeSet::new();
        load_params.add(AttributeDescriptor::new(
            SPACING,
            ValueKind::Vector3,
            AttributeValue::Vector3([1.0, 1.0, 1.0]),
        ));
        load_params.add(AttributeDescriptor::new(
            SWAP_XY,
            ValueKind::Boolean,
            AttributeValue::Bool(false),
        ));
        Self {
            load_params,
            no_params: AttributeSet::new(),
        }
    }
}

impl Default for GraphFileIo {
    fn default() -> Self {
        Self::new()
    }
}

impl FileIoTraits for GraphFileIo {
    fn name(&self) -> &'static str {
        "Graph file"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["txt", "pdb"]
    }

    fn parameters(&self, operation: Operation) -> &AttributeSet {
        match operation {
            Operation::Load => &self.load_params,
            Operation::Save => &self.no_params,
        }
    }

    fn supported_kinds(&self, operation: Operation) -> DataSetKinds {
        match operation {
            Operation::Load => DataSetKinds::GRAPH,
            Operation::Save => DataSetKinds::NONE,
        }
    }

    #[allow(clippy::too_many_lines)]
    fn load_data(
        &self,
        path: &Path,
        values: &ValueMap,
        progress: &Progress,
    ) -> Result<DataSet, FileIoError> {
        let spacing = param_vector3(values, SPACING)?;
        let swap_xy = param_bool(values, SWAP_XY)?;

        let text = std::fs::read_to_string(path).map_err(|source| FileIoError::io(path, source))?;
        let all_lines: Vec<&str> = text.lines().collect();
        let total = all_lines.len().max(1);
        let mut lines = all_lines.iter().copied().enumerate();

        let vertex_header_line = lines
            .by_ref()
            .map(|(_, line)| line)
            .find(|line| !line.starts_with("%%"))
            .ok_or_else(|| FileIoError::malformed(path, "no vertex table found"))?;
        let vertex_header =
            TableHeader::parse(path, vertex_header_line, &["id", "x", "y", "z", "color"])?;
        let [id_col, x_col, y_col, z_col, color_col] = [
            vertex_header.special[0],
            vertex_header.special[1],
            vertex_header.special[2],
            vertex_header.special[3],
            vertex_header.special[4],
        ];

        let mut vertices = Vec::new();
        let mut edge_header_line = None;
        let mut in_edges = false;
        for (line_number, line) in lines.by_ref() {
            if line == "$$" {
                in_edges = true;
                continue;
            }
            if in_edges {
                edge_header_line = Some(line);
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            let tokens = vertex_header.tokens(path, line)?;
            if id_col != usize::MAX {
                let id: usize = tokens[id_col].parse().map_err(|_| {
                    FileIoError::malformed(path, format!("invalid vertex id '{}'", tokens[id_col]))
                })?;
                if id != vertices.len() + 1 {
                    return Err(FileIoError::malformed(
                        path,
                        format!(
                            "non-sequential vertex ids: id {id} while reading vertex {}",
                            vertices.len() + 1
                        ),
                    ));
                }
            }
            let parse_coord = |index: usize| {
                tokens[index].parse::<f64>().map_err(|_| {
                    FileIoError::malformed(
                        path,
                        format!("invalid vertex position value in '{line}'"),
                    )
                })
            };
            let mut position = [
                parse_coord(x_col)? * spacing[0],
                parse_coord(y_col)? * spacing[1],
                parse_coord(z_col)? * spacing[2],
            ];
            if swap_xy {
                position.swap(0, 1);
            }
            let color = parse_color(tokens[color_col]).ok_or_else(|| {
                FileIoError::malformed(path, format!("invalid color '{}'", tokens[color_col]))
            })?;
            vertices.push(GraphVertex {
                position,
                color,
                values: vertex_header.values(path, &tokens)?,
            });
            progress.emit_fraction(line_number + 1, total);
        }

        let mut edges = Vec::new();
        let mut edge_value_names = Vec::new();
        if let Some(header_line) = edge_header_line {
            let edge_header =
                TableHeader::parse(path, header_line, &["id", "Vert_1", "Vert_2", "color"])?;
            let [_, v1_col, v2_col, color_col] = [
                edge_header.special[0],
                edge_header.special[1],
                edge_header.special[2],
                edge_header.special[3],
            ];
            edge_value_names.clone_from(&edge_header.value_names);
            for (line_number, line) in lines {
                if line.trim().is_empty() {
                    continue;
                }
                let tokens = edge_header.tokens(path, line)?;
                let endpoint = |index: usize| -> Result<usize, FileIoError> {
                    let id: usize = tokens[index].parse().map_err(|_| {
                        FileIoError::malformed(
                            path,
                            format!("invalid vertex reference '{}'", tokens[index]),
                        )
                    })?;
                    if id == 0 || id > vertices.len() {
                        return Err(FileIoError::malformed(
                            path,
                            format!("edge references missing vertex {id}"),
                        ));
                    }
                    Ok(id - 1)
                };
                let color = parse_color(tokens[color_col]).ok_or_else(|| {
                    FileIoError::malformed(path, format!("invalid color '{}'", tokens[color_col]))
                })?;
                edges.push(GraphEdge {
                    vertices: [endpoint(v1_col)?, endpoint(v2_col)?],
                    color,
                    values: edge_header.values(path, &tokens)?,
                });
                progress.emit_fraction(line_number + 1, total);
            }
        }

        let graph = GraphData::new(
            vertices,
            edges,
            vertex_header.value_names,
            edge_value_names,
        );
        Ok(DataSet::new(DataSetData::Graph(graph)))
    }

    fn save_data(
        &self,
        _path: &Path,
        data_set: &mut DataSet,
        _values: &ValueMap,
        _progress: &Progress,
    ) -> Result<(), FileIoError> {
        Err(FileIoError::UnsupportedDataSet {
            name: self.name(),
            operation: Operation::Save,
            kind: data_set.kind(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{combine_attributes_with_values, extract_values};

    fn load(text: &str, values: &ValueMap) -> Result<DataSet, FileIoError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fibers.txt");
        std::fs::write(&path, text).unwrap();
        let io = GraphFileIo::new();
        let resolved = extract_values(&combine_attributes_with_values(
            io.parameters(Operation::Load),
            values,
        ));
        io.load_data(&path, &resolved, &Progress::none())
    }

    const FIBERS: &str = "%% fiber export\n%% 2026-03-14\n\
id\tx\ty\tz\tcolor\tradius\n\
1\t0\t1\t2\t#ff0000\t0.5\n\
2\t3\t4\t5\tblue\t0.25\n\
$$\n\
id\tVert_1\tVert_2\tcolor\n\
1\t1\t2\t#00ff00\n";

    #[test]
    fn vertices_edges_and_extra_columns() {
        let data_set = load(FIBERS, &ValueMap::new()).unwrap();
        let graph = data_set.as_graph().unwrap();
        assert_eq!(graph.vertices().len(), 2);
        assert_eq!(graph.vertices()[0].position, [0.0, 1.0, 2.0]);
        assert_eq!(graph.vertices()[0].color, [255, 0, 0]);
        assert_eq!(graph.vertices()[1].color, [0, 0, 255]);
        assert_eq!(graph.vertex_value_names(), ["radius"]);
        assert_eq!(graph.vertices()[1].values, [0.25]);
        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.edges()[0].vertices, [0, 1]);
        assert!(graph.edges_valid());
    }

    #[test]
    fn spacing_and_swap_scale_positions() {
        let mut values = ValueMap::new();
        values.insert(
            SPACING.to_string(),
            AttributeValue::Vector3([2.0, 1.0, 1.0]),
        );
        values.insert(SWAP_XY.to_string(), AttributeValue::Bool(true));
        let data_set = load(FIBERS, &values).unwrap();
        let graph = data_set.as_graph().unwrap();
        // x was doubled, then x and y swapped
        assert_eq!(graph.vertices()[0].position, [1.0, 0.0, 2.0]);
    }

    #[test]
    fn non_sequential_ids_fail() {
        let text = "id\tx\ty\tz\tcolor\n2\t0\t0\t0\t#000000\n";
        assert!(load(text, &ValueMap::new()).is_err());
    }

    #[test]
    fn dangling_edge_fails() {
        let text = "id\tx\ty\tz\tcolor\n1\t0\t0\t0\t#000000\n$$\n\
id\tVert_1\tVert_2\tcolor\n1\t1\t3\t#000000\n";
        assert!(load(text, &ValueMap::new()).is_err());
    }

    #[test]
    fn missing_required_column_fails() {
        let text = "id\tx\ty\tcolor\n";
        assert!(load(text, &ValueMap::new()).is_err());
    }
}
