//! Renderable geometry built from raw part tessellation.
//!
//! Meshes are plain triangle soups: every facet gets its own three vertices
//! and triangle `i` is always `(3i, 3i + 1, 3i + 2)`. Nothing is welded,
//! deduplicated or validated.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::model::{PartEdges, PartTessellation, Point};
use crate::{BakeError, Result};

/// Linear-space RGBA, each channel in `[0, 1]`.
pub type LinearRgba = [f32; 4];

/// Color assigned to every edge segment.
pub const EDGE_COLOR: [u8; 4] = [0, 0, 0, 255];

/// Key of a part's edge geometry in [`GeometryLibrary::paths`].
pub fn edge_key(part_id: &str) -> String {
    format!("{part_id}_edges")
}

/// Non-indexed triangle mesh of one part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshGeometry {
    pub vertices: Vec<[f32; 3]>,
    pub faces: Vec<[u32; 3]>,
    /// One color for the whole part.
    pub color: Option<LinearRgba>,
}

impl MeshGeometry {
    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    /// Axis aligned bounds as `(min, max)`, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        bounds(self.vertices.iter())
    }
}

/// Line segments of one part's edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathGeometry {
    pub segments: Vec<[[f32; 3]; 2]>,
    /// One RGBA8 color per segment.
    pub colors: Vec<[u8; 4]>,
}

impl PathGeometry {
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        bounds(self.segments.iter().flatten())
    }
}

/// Geometry keyed by part identity. Paths use [`edge_key`].
#[derive(Debug, Clone, Default)]
pub struct GeometryLibrary {
    pub meshes: HashMap<String, MeshGeometry>,
    pub paths: HashMap<String, PathGeometry>,
}

impl GeometryLibrary {
    pub fn mesh(&self, part_id: &str) -> Option<&MeshGeometry> {
        self.meshes.get(part_id)
    }

    pub fn edges(&self, part_id: &str) -> Option<&PathGeometry> {
        self.paths.get(&edge_key(part_id))
    }
}

/// Builds one mesh per part with facets and one path per part with edges.
pub fn build_geometry(parts: &[PartTessellation], edges: &[PartEdges]) -> Result<GeometryLibrary> {
    let mut library = GeometryLibrary::default();

    for part in edges {
        match build_path(part) {
            Some(path) => {
                library.paths.insert(edge_key(&part.part_id), path);
            }
            None => tracing::debug!(part_id = %part.part_id, "part has no edge segments"),
        }
    }

    for part in parts {
        match build_mesh(part)? {
            Some(mesh) => {
                library.meshes.insert(part.part_id.clone(), mesh);
            }
            None => tracing::debug!(part_id = %part.part_id, "part has no facets"),
        }
    }

    tracing::info!(
        meshes = library.meshes.len(),
        paths = library.paths.len(),
        "built part geometry"
    );
    Ok(library)
}

/// Returns `None` when the part has no facets at all.
pub fn build_mesh(part: &PartTessellation) -> Result<Option<MeshGeometry>> {
    let facet_count = part.facet_count();
    if facet_count == 0 {
        return Ok(None);
    }

    let mut vertices = Vec::with_capacity(facet_count * 3);
    for facet in part.faces.iter().flat_map(|face| &face.facets) {
        vertices.extend(facet.vertices.iter().map(to_f32));
    }
    let faces = (0..facet_count as u32)
        .map(|i| [3 * i, 3 * i + 1, 3 * i + 2])
        .collect();
    let color = part.color.as_deref().map(decode_base_color).transpose()?;

    Ok(Some(MeshGeometry {
        vertices,
        faces,
        color,
    }))
}

/// Returns `None` when no edge of the part yields a segment.
pub fn build_path(part: &PartEdges) -> Option<PathGeometry> {
    let segments: Vec<[[f32; 3]; 2]> = part
        .edges
        .iter()
        .flat_map(|edge| edge.vertices.windows(2))
        .map(|pair| [to_f32(&pair[0]), to_f32(&pair[1])])
        .collect();
    if segments.is_empty() {
        return None;
    }

    let colors = vec![EDGE_COLOR; segments.len()];
    Some(PathGeometry { segments, colors })
}

/// Decodes a base64 RGBA8 color into linear RGBA. Alpha stays as is.
pub fn decode_base_color(encoded: &str) -> Result<LinearRgba> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|_| BakeError::InvalidColor(encoded.to_string()))?;
    let [r, g, b, a]: [u8; 4] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| BakeError::InvalidColor(encoded.to_string()))?;

    let normalize = |channel: u8| channel as f32 / 255.0;
    Ok([
        srgb_to_linear(normalize(r)),
        srgb_to_linear(normalize(g)),
        srgb_to_linear(normalize(b)),
        normalize(a),
    ])
}

/// IEC 61966-2-1 sRGB decode of one channel in `[0, 1]`.
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn to_f32(point: &Point) -> [f32; 3] {
    [point[0] as f32, point[1] as f32, point[2] as f32]
}

fn bounds<'a>(mut points: impl Iterator<Item = &'a [f32; 3]>) -> Option<([f32; 3], [f32; 3])> {
    let first = *points.next()?;
    Some(points.fold((first, first), |(mut min, mut max), p| {
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
        (min, max)
    }))
}
