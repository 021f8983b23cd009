//! Places part geometry into world space, one node per occurrence.

use std::collections::{BTreeMap, HashMap};

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

use crate::geometry::{edge_key, GeometryLibrary, MeshGeometry, PathGeometry};
use crate::model::{Instance, Occurrence, RootAssembly};
use crate::{BakeError, Result};

/// World placement of a node.
pub type Transform = Matrix4<f64>;

/// Reads an occurrence's row-major transform. Anything but 16 values is a
/// data-integrity fault.
pub fn occurrence_transform(occurrence: &Occurrence) -> Result<Transform> {
    if occurrence.transform.len() != 16 {
        return Err(BakeError::MalformedTransform {
            path: occurrence.key(),
            len: occurrence.transform.len(),
        });
    }
    Ok(Matrix4::from_row_slice(&occurrence.transform))
}

/// Replaces everything outside `[A-Za-z0-9_.-]` with `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Geometry stored once in the scene and referenced by any number of nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Mesh(MeshGeometry),
    Path(PathGeometry),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryId(usize);

impl GeometryId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedGeometry {
    pub name: String,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub geometry: GeometryId,
    pub transform: Transform,
}

/// Named geometry nodes with their own transforms, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    geometries: Vec<NamedGeometry>,
    nodes: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_geometry(&mut self, name: impl Into<String>, geometry: Geometry) -> GeometryId {
        self.geometries.push(NamedGeometry {
            name: name.into(),
            geometry,
        });
        GeometryId(self.geometries.len() - 1)
    }

    pub fn add_node(&mut self, name: impl Into<String>, geometry: GeometryId, transform: Transform) {
        self.nodes.push(SceneNode {
            name: name.into(),
            geometry,
            transform,
        });
    }

    pub fn geometries(&self) -> &[NamedGeometry] {
        &self.geometries
    }

    pub fn geometry(&self, id: GeometryId) -> &Geometry {
        &self.geometries[id.0].geometry
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&SceneNode> {
        self.nodes.iter().find(|node| node.name == name)
    }
}

/// Scene node names created for one occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceNodes {
    pub solid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<String>,
}

/// Occurrence path string to the nodes that render it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OccurrenceNodeMap(BTreeMap<String, OccurrenceNodes>);

impl OccurrenceNodeMap {
    pub fn get(&self, path: &str) -> Option<&OccurrenceNodes> {
        self.0.get(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, path: String, nodes: OccurrenceNodes) {
        self.0.insert(path, nodes);
    }
}

/// Why an occurrence produced no node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The leaf instance id is not in the instance table.
    UnresolvedInstance(String),
    /// The instance is a sub-assembly.
    SubAssembly(String),
    /// No mesh was built for the part.
    MissingGeometry(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnresolvedInstance(id) => write!(f, "instance `{id}` not found"),
            Self::SubAssembly(id) => write!(f, "instance `{id}` is a sub-assembly"),
            Self::MissingGeometry(part_id) => write!(f, "no geometry for part `{part_id}`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedOccurrence {
    pub index: usize,
    pub path: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default)]
pub struct AssemblyReport {
    pub placed: usize,
    pub skipped: Vec<SkippedOccurrence>,
}

#[derive(Debug, Clone)]
pub struct AssembledScene {
    pub scene: SceneGraph,
    pub node_map: OccurrenceNodeMap,
    pub report: AssemblyReport,
}

/// An occurrence with its position in the assembly's occurrence list. The
/// index is part of the node names, so it is passed along explicitly.
#[derive(Debug, Clone, Copy)]
pub struct IndexedOccurrence<'a> {
    pub index: usize,
    pub occurrence: &'a Occurrence,
}

impl IndexedOccurrence<'_> {
    pub fn solid_node_name(&self, part_id: &str) -> String {
        sanitize(&format!("{part_id}_{}", self.index))
    }

    pub fn edge_node_name(&self, part_id: &str) -> String {
        sanitize(&format!("{part_id}_edges_{}", self.index))
    }
}

/// Lists occurrences together with their enumeration index.
pub fn indexed_occurrences(occurrences: &[Occurrence]) -> impl Iterator<Item = IndexedOccurrence<'_>> {
    occurrences
        .iter()
        .enumerate()
        .map(|(index, occurrence)| IndexedOccurrence { index, occurrence })
}

/// Builds the scene graph and occurrence map for an assembly.
///
/// Geometry moves out of `library` into the scene the first time a part is
/// placed. Later occurrences of the same part reference it by id.
pub fn assemble_scene(assembly: &RootAssembly, library: GeometryLibrary) -> Result<AssembledScene> {
    let instances: HashMap<&str, &Instance> = assembly
        .instances
        .iter()
        .map(|instance| (instance.id.as_str(), instance))
        .collect();

    let mut assembler = Assembler {
        library,
        scene: SceneGraph::new(),
        placed_meshes: HashMap::new(),
        placed_paths: HashMap::new(),
    };
    let mut node_map = OccurrenceNodeMap::default();
    let mut report = AssemblyReport::default();

    for entry in indexed_occurrences(&assembly.occurrences) {
        let part_id = match assembler.resolve_part(&instances, entry.occurrence) {
            Ok(part_id) => part_id,
            Err(reason) => {
                tracing::warn!(
                    index = entry.index,
                    path = %entry.occurrence.key(),
                    %reason,
                    "skipping occurrence"
                );
                report.skipped.push(SkippedOccurrence {
                    index: entry.index,
                    path: entry.occurrence.key(),
                    reason,
                });
                continue;
            }
        };

        let nodes = assembler.place(&entry, part_id)?;
        node_map.insert(entry.occurrence.key(), nodes);
        report.placed += 1;
    }

    tracing::info!(
        placed = report.placed,
        skipped = report.skipped.len(),
        nodes = assembler.scene.nodes().len(),
        "assembled scene"
    );
    Ok(AssembledScene {
        scene: assembler.scene,
        node_map,
        report,
    })
}

struct Assembler {
    library: GeometryLibrary,
    scene: SceneGraph,
    placed_meshes: HashMap<String, GeometryId>,
    placed_paths: HashMap<String, GeometryId>,
}

impl Assembler {
    fn resolve_part<'a>(
        &self,
        instances: &HashMap<&str, &'a Instance>,
        occurrence: &Occurrence,
    ) -> std::result::Result<&'a str, SkipReason> {
        let leaf_id = occurrence.leaf_id().unwrap_or_default();
        let instance: &'a Instance = instances
            .get(leaf_id)
            .copied()
            .ok_or_else(|| SkipReason::UnresolvedInstance(leaf_id.to_string()))?;
        let part_id = instance
            .part_id
            .as_deref()
            .ok_or_else(|| SkipReason::SubAssembly(leaf_id.to_string()))?;
        if !self.placed_meshes.contains_key(part_id) && self.library.mesh(part_id).is_none() {
            return Err(SkipReason::MissingGeometry(part_id.to_string()));
        }
        Ok(part_id)
    }

    fn place(&mut self, entry: &IndexedOccurrence<'_>, part_id: &str) -> Result<OccurrenceNodes> {
        let transform = occurrence_transform(entry.occurrence)?;

        let mesh = self
            .mesh_id(part_id)
            .ok_or_else(|| BakeError::msg(format!("mesh for part `{part_id}` vanished")))?;
        let solid = entry.solid_node_name(part_id);
        self.scene.add_node(solid.clone(), mesh, transform);

        let edges = self.path_id(part_id).map(|path| {
            let name = entry.edge_node_name(part_id);
            self.scene.add_node(name.clone(), path, transform);
            name
        });

        Ok(OccurrenceNodes { solid, edges })
    }

    fn mesh_id(&mut self, part_id: &str) -> Option<GeometryId> {
        if let Some(id) = self.placed_meshes.get(part_id) {
            return Some(*id);
        }
        let mesh = self.library.meshes.remove(part_id)?;
        let id = self.scene.add_geometry(part_id, Geometry::Mesh(mesh));
        self.placed_meshes.insert(part_id.to_string(), id);
        Some(id)
    }

    fn path_id(&mut self, part_id: &str) -> Option<GeometryId> {
        if let Some(id) = self.placed_paths.get(part_id) {
            return Some(*id);
        }
        let key = edge_key(part_id);
        let path = self.library.paths.remove(&key)?;
        let id = self.scene.add_geometry(key, Geometry::Path(path));
        self.placed_paths.insert(part_id.to_string(), id);
        Some(id)
    }
}
