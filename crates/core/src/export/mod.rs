//! Binary glTF (GLB) export of an assembled [`SceneGraph`].
//!
//! Every distinct geometry becomes one glTF mesh that all of its nodes point
//! at. Node matrices carry the occurrence transforms.

use std::borrow::Cow;
use std::collections::BTreeMap;

use gltf::json;
use gltf::json::validation::{Checked::Valid, USize64};
use nalgebra::Matrix4;

use crate::geometry::{LinearRgba, MeshGeometry, PathGeometry};
use crate::scene::{Geometry, NamedGeometry, SceneGraph, Transform};
use crate::{BakeError, Result};

const EDGE_BASE_COLOR: LinearRgba = [0.0, 0.0, 0.0, 1.0];

/// Serializes the scene as a self-contained GLB blob.
pub fn export_glb(scene: &SceneGraph) -> Result<Vec<u8>> {
    let mut writer = GlbWriter::default();

    let meshes: Vec<json::Index<json::Mesh>> = scene
        .geometries()
        .iter()
        .map(|geometry| writer.push_geometry(geometry))
        .collect();

    let nodes = scene
        .nodes()
        .iter()
        .map(|node| {
            writer.root.push(json::Node {
                mesh: Some(meshes[node.geometry.index()]),
                name: Some(node.name.clone()),
                matrix: column_major(&node.transform),
                ..Default::default()
            })
        })
        .collect();

    let root_scene = writer.root.push(json::Scene {
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        nodes,
    });
    writer.root.scene = Some(root_scene);

    writer.finish()
}

/// glTF wants column-major matrices and no identity matrix at all.
fn column_major(transform: &Transform) -> Option<[f32; 16]> {
    if *transform == Matrix4::identity() {
        return None;
    }
    let mut matrix = [0.0; 16];
    matrix.copy_from_slice(transform.cast::<f32>().as_slice());
    Some(matrix)
}

#[derive(Default)]
struct GlbWriter {
    root: json::Root,
    bin: Vec<u8>,
    edge_material: Option<json::Index<json::Material>>,
}

impl GlbWriter {
    fn push_geometry(&mut self, geometry: &NamedGeometry) -> json::Index<json::Mesh> {
        let primitive = match &geometry.geometry {
            Geometry::Mesh(mesh) => self.mesh_primitive(mesh),
            Geometry::Path(path) => self.path_primitive(path),
        };
        self.root.push(json::Mesh {
            extensions: Default::default(),
            extras: Default::default(),
            name: Some(geometry.name.clone()),
            primitives: vec![primitive],
            weights: None,
        })
    }

    fn mesh_primitive(&mut self, mesh: &MeshGeometry) -> json::mesh::Primitive {
        let positions = self.push_positions(&mesh.vertices, mesh.bounds());

        let mut index_bytes = Vec::with_capacity(mesh.faces.len() * 12);
        for index in mesh.faces.iter().flatten() {
            index_bytes.extend_from_slice(&index.to_le_bytes());
        }
        let view = self.push_view(&index_bytes, json::buffer::Target::ElementArrayBuffer);
        let indices = self.root.push(json::Accessor {
            buffer_view: Some(view),
            byte_offset: Some(USize64(0)),
            count: USize64::from(mesh.faces.len() * 3),
            component_type: Valid(json::accessor::GenericComponentType(
                json::accessor::ComponentType::U32,
            )),
            extensions: Default::default(),
            extras: Default::default(),
            type_: Valid(json::accessor::Type::Scalar),
            min: None,
            max: None,
            name: None,
            normalized: false,
            sparse: None,
        });

        let material = mesh.color.map(|color| self.push_material(color));
        primitive(positions, Some(indices), material, json::mesh::Mode::Triangles)
    }

    fn path_primitive(&mut self, path: &PathGeometry) -> json::mesh::Primitive {
        let points: Vec<[f32; 3]> = path.segments.iter().flatten().copied().collect();
        let positions = self.push_positions(&points, path.bounds());
        let material = match self.edge_material {
            Some(material) => material,
            None => {
                let material = self.push_material(EDGE_BASE_COLOR);
                self.edge_material = Some(material);
                material
            }
        };
        primitive(positions, None, Some(material), json::mesh::Mode::Lines)
    }

    fn push_positions(
        &mut self,
        points: &[[f32; 3]],
        bounds: Option<([f32; 3], [f32; 3])>,
    ) -> json::Index<json::Accessor> {
        let mut bytes = Vec::with_capacity(points.len() * 12);
        for coordinate in points.iter().flatten() {
            bytes.extend_from_slice(&coordinate.to_le_bytes());
        }
        let view = self.push_view(&bytes, json::buffer::Target::ArrayBuffer);
        let (min, max) = bounds.unwrap_or_default();
        self.root.push(json::Accessor {
            buffer_view: Some(view),
            byte_offset: Some(USize64(0)),
            count: USize64::from(points.len()),
            component_type: Valid(json::accessor::GenericComponentType(
                json::accessor::ComponentType::F32,
            )),
            extensions: Default::default(),
            extras: Default::default(),
            type_: Valid(json::accessor::Type::Vec3),
            min: Some(json::Value::from(min.to_vec())),
            max: Some(json::Value::from(max.to_vec())),
            name: None,
            normalized: false,
            sparse: None,
        })
    }

    fn push_view(&mut self, bytes: &[u8], target: json::buffer::Target) -> json::Index<json::buffer::View> {
        pad_to_four(&mut self.bin);
        let offset = self.bin.len();
        self.bin.extend_from_slice(bytes);
        self.root.push(json::buffer::View {
            // The single BIN chunk buffer is pushed in `finish`.
            buffer: json::Index::new(0),
            byte_length: USize64::from(bytes.len()),
            byte_offset: Some(USize64::from(offset)),
            byte_stride: None,
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            target: Some(Valid(target)),
        })
    }

    fn push_material(&mut self, color: LinearRgba) -> json::Index<json::Material> {
        let alpha_mode = if color[3] < 1.0 {
            json::material::AlphaMode::Blend
        } else {
            json::material::AlphaMode::Opaque
        };
        self.root.push(json::Material {
            alpha_mode: Valid(alpha_mode),
            pbr_metallic_roughness: json::material::PbrMetallicRoughness {
                base_color_factor: json::material::PbrBaseColorFactor(color),
                metallic_factor: json::material::StrengthFactor(0.0),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn finish(mut self) -> Result<Vec<u8>> {
        pad_to_four(&mut self.bin);
        if !self.bin.is_empty() {
            self.root.push(json::Buffer {
                byte_length: USize64::from(self.bin.len()),
                extensions: Default::default(),
                extras: Default::default(),
                name: None,
                uri: None,
            });
        }

        let json_string =
            json::serialize::to_string(&self.root).map_err(|err| BakeError::Export(err.to_string()))?;
        let mut json_length = json_string.len();
        json_length += (4 - json_length % 4) % 4;
        let mut length = 12 + 8 + json_length;
        if !self.bin.is_empty() {
            length += 8 + self.bin.len();
        }
        let length = u32::try_from(length)
            .map_err(|_| BakeError::Export("scene exceeds the binary glTF size limit".to_string()))?;

        let glb = gltf::binary::Glb {
            header: gltf::binary::Header {
                magic: *b"glTF",
                version: 2,
                length,
            },
            json: Cow::Owned(json_string.into_bytes()),
            bin: (!self.bin.is_empty()).then_some(Cow::Owned(self.bin)),
        };

        let mut out = Vec::with_capacity(length as usize);
        glb.to_writer(&mut out)
            .map_err(|err| BakeError::Export(err.to_string()))?;
        Ok(out)
    }
}

fn primitive(
    positions: json::Index<json::Accessor>,
    indices: Option<json::Index<json::Accessor>>,
    material: Option<json::Index<json::Material>>,
    mode: json::mesh::Mode,
) -> json::mesh::Primitive {
    let mut attributes = BTreeMap::new();
    attributes.insert(Valid(json::mesh::Semantic::Positions), positions);
    json::mesh::Primitive {
        attributes,
        extensions: Default::default(),
        extras: Default::default(),
        indices,
        material,
        mode: Valid(mode),
        targets: None,
    }
}

fn pad_to_four(bytes: &mut Vec<u8>) {
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::edge_key;
    use nalgebra::Vector3;

    fn triangle(color: Option<LinearRgba>) -> MeshGeometry {
        MeshGeometry {
            vertices: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            faces: vec![[0, 1, 2]],
            color,
        }
    }

    fn edge() -> PathGeometry {
        PathGeometry {
            segments: vec![[[0.0; 3], [1.0, 0.0, 0.0]], [[1.0, 0.0, 0.0], [1.0, 1.0, 0.0]]],
            colors: vec![[0, 0, 0, 255]; 2],
        }
    }

    fn sample_scene() -> SceneGraph {
        let mut scene = SceneGraph::new();
        let mesh = scene.add_geometry("P1", Geometry::Mesh(triangle(Some([0.5, 0.25, 0.0, 1.0]))));
        let path = scene.add_geometry(edge_key("P1"), Geometry::Path(edge()));
        let moved = Matrix4::new_translation(&Vector3::new(10.0, 0.0, 0.0));
        scene.add_node("P1_0", mesh, Matrix4::identity());
        scene.add_node("P1_edges_0", path, Matrix4::identity());
        scene.add_node("P1_1", mesh, moved);
        scene.add_node("P1_edges_1", path, moved);
        scene
    }

    #[test]
    fn writes_valid_glb_header() {
        let bytes = export_glb(&sample_scene()).unwrap();

        assert_eq!(&bytes[0..4], b"glTF");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize, bytes.len());
    }

    #[test]
    fn nodes_share_meshes_and_keep_names() {
        let bytes = export_glb(&sample_scene()).unwrap();
        let gltf = gltf::Gltf::from_slice(&bytes).unwrap();

        assert_eq!(gltf.meshes().count(), 2);
        let names: Vec<_> = gltf.nodes().map(|n| n.name().unwrap().to_string()).collect();
        assert_eq!(names, ["P1_0", "P1_edges_0", "P1_1", "P1_edges_1"]);

        let mesh_of = |i: usize| gltf.nodes().nth(i).unwrap().mesh().unwrap().index();
        assert_eq!(mesh_of(0), mesh_of(2));
        assert_eq!(mesh_of(1), mesh_of(3));
        assert_ne!(mesh_of(0), mesh_of(1));
    }

    #[test]
    fn node_matrices_are_column_major() {
        let bytes = export_glb(&sample_scene()).unwrap();
        let gltf = gltf::Gltf::from_slice(&bytes).unwrap();

        let moved = gltf.nodes().nth(2).unwrap().transform().matrix();
        assert_eq!(moved[3], [10.0, 0.0, 0.0, 1.0]);
        let still = gltf.nodes().next().unwrap().transform().matrix();
        assert_eq!(still[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn edges_are_black_lines() {
        let bytes = export_glb(&sample_scene()).unwrap();
        let gltf = gltf::Gltf::from_slice(&bytes).unwrap();

        let lines = gltf.meshes().nth(1).unwrap().primitives().next().unwrap();
        assert_eq!(lines.mode(), gltf::mesh::Mode::Lines);
        let black = lines.material().pbr_metallic_roughness().base_color_factor();
        assert_eq!(black, [0.0, 0.0, 0.0, 1.0]);

        let solid = gltf.meshes().next().unwrap().primitives().next().unwrap();
        assert_eq!(solid.mode(), gltf::mesh::Mode::Triangles);
        assert_eq!(solid.indices().unwrap().count() as u64, 3);
        assert_eq!(
            solid.material().pbr_metallic_roughness().base_color_factor(),
            [0.5, 0.25, 0.0, 1.0]
        );
    }

    #[test]
    fn translucent_parts_blend() {
        let mut scene = SceneGraph::new();
        let mesh = scene.add_geometry("GLASS", Geometry::Mesh(triangle(Some([1.0, 1.0, 1.0, 0.5]))));
        scene.add_node("GLASS_0", mesh, Matrix4::identity());

        let bytes = export_glb(&scene).unwrap();
        let gltf = gltf::Gltf::from_slice(&bytes).unwrap();
        let material = gltf.materials().next().unwrap();
        assert_eq!(material.alpha_mode(), gltf::material::AlphaMode::Blend);
    }

    #[test]
    fn empty_scene_has_no_bin_chunk() {
        let bytes = export_glb(&SceneGraph::new()).unwrap();

        assert_eq!(bytes.len() % 4, 0);
        let json_length = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
        assert_eq!(&bytes[16..20], b"JSON");
        assert_eq!(bytes.len(), 20 + json_length);
    }
}
