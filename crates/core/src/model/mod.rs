//! Raw records returned by the CAD data source.
//!
//! Field names follow the source JSON so the same types read live responses
//! and cached files.

use serde::{Deserialize, Serialize};

/// A 3D position as delivered by the data source.
pub type Point = [f64; 3];

/// Triangulated faces of one part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartTessellation {
    #[serde(rename = "id")]
    pub part_id: String,
    #[serde(default)]
    pub faces: Vec<TessellatedFace>,
    /// Base64 RGBA8 base color of the part.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl PartTessellation {
    pub fn facet_count(&self) -> usize {
        self.faces.iter().map(|face| face.facets.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TessellatedFace {
    #[serde(default)]
    pub facets: Vec<Facet>,
}

/// One triangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facet {
    pub vertices: [Point; 3],
}

/// Polyline edges of one part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartEdges {
    #[serde(rename = "id")]
    pub part_id: String,
    #[serde(default)]
    pub edges: Vec<TessellatedEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TessellatedEdge {
    pub vertices: Vec<Point>,
}

/// Assembly definition as returned for one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assembly {
    pub root_assembly: RootAssembly,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RootAssembly {
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub occurrences: Vec<Occurrence>,
}

/// A component definition referenced by the assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: String,
    /// Absent for sub-assembly instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_id: Option<String>,
    #[serde(default)]
    pub name: String,
    /// Part studio element holding the part.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
}

/// A placed leaf of the flattened assembly tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Instance ids from the root down to this leaf.
    pub path: Vec<String>,
    /// Row-major 4x4 world transform. Length is checked when used.
    pub transform: Vec<f64>,
}

/// Separator used to turn an occurrence path into its string key.
pub const PATH_SEPARATOR: &str = "/";

impl Occurrence {
    /// Canonical string identity shared by the node map and motion frames.
    pub fn key(&self) -> String {
        self.path.join(PATH_SEPARATOR)
    }

    pub fn leaf_id(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }
}

/// Configuration metadata of an element.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationMetadata {
    #[serde(default)]
    pub configuration_parameters: Vec<ConfigurationParameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationParameter {
    pub parameter_id: String,
    pub parameter_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_assembly_json() {
        let json = r#"{
            "rootAssembly": {
                "instances": [
                    {"id": "I1", "partId": "JHD", "name": "Arm <1>", "elementId": "E1", "type": "Part"},
                    {"id": "I2", "name": "Sub", "type": "Assembly"}
                ],
                "occurrences": [
                    {"path": ["I1"], "transform": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,0,1], "hidden": false}
                ]
            }
        }"#;

        let assembly: Assembly = serde_json::from_str(json).unwrap();
        let root = &assembly.root_assembly;
        assert_eq!(root.instances[0].part_id.as_deref(), Some("JHD"));
        assert_eq!(root.instances[0].element_id.as_deref(), Some("E1"));
        assert!(root.instances[1].part_id.is_none());
        assert_eq!(root.occurrences[0].transform.len(), 16);
    }

    #[test]
    fn reads_tessellation_json() {
        let json = r#"[{
            "id": "JHD",
            "color": "AAAA/w==",
            "faces": [
                {"id": "F1", "facets": [
                    {"vertices": [[0,0,0],[1,0,0],[0,1,0]], "normal": [0,0,1]}
                ]},
                {"id": "F2"}
            ]
        }]"#;

        let parts: Vec<PartTessellation> = serde_json::from_str(json).unwrap();
        assert_eq!(parts[0].part_id, "JHD");
        assert_eq!(parts[0].facet_count(), 1);
        assert_eq!(parts[0].color.as_deref(), Some("AAAA/w=="));
    }

    #[test]
    fn occurrence_key_joins_path() {
        let occ = Occurrence {
            path: vec!["A".into(), "B".into()],
            transform: Vec::new(),
        };
        assert_eq!(occ.key(), "A/B");
        assert_eq!(occ.leaf_id(), Some("B"));
    }
}
