//! End-to-end bake: geometry, scene, occurrence map and motion track.

use std::collections::BTreeSet;

use crate::config::BakeConfig;
use crate::export::export_glb;
use crate::geometry::build_geometry;
use crate::model::{PartEdges, PartTessellation, RootAssembly};
use crate::record::BakeArtifacts;
use crate::scene::{assemble_scene, AssemblyReport};
use crate::source::{ContentProvider, TessellationSource};
use crate::timeline::{resolve_parameter_id, sample_motion};
use crate::{BakeError, Result};

/// Artifacts of a finished run plus what was skipped along the way.
#[derive(Debug, Clone)]
pub struct BakeOutput {
    pub artifacts: BakeArtifacts,
    pub part_studios: Vec<String>,
    pub report: AssemblyReport,
}

/// Part studio element ids referenced by part instances, sorted and unique.
pub fn discover_part_studios(assembly: &RootAssembly) -> Vec<String> {
    assembly
        .instances
        .iter()
        .filter(|instance| instance.part_id.is_some())
        .filter_map(|instance| instance.element_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Faces and edges of all part studios, concatenated in the given order.
pub fn fetch_tessellation<S>(
    source: &S,
    part_studios: &[String],
) -> Result<(Vec<PartTessellation>, Vec<PartEdges>)>
where
    S: TessellationSource + ?Sized,
{
    let mut faces = Vec::new();
    let mut edges = Vec::new();
    for element_id in part_studios {
        tracing::info!(element_id = %element_id, "fetching part studio tessellation");
        faces.extend(source.tessellated_faces(element_id)?);
        edges.extend(source.tessellated_edges(element_id)?);
    }
    Ok((faces, edges))
}

/// Builds the GLB scene and occurrence map for one assembly state.
pub fn build_scene(
    assembly: &RootAssembly,
    faces: &[PartTessellation],
    edges: &[PartEdges],
) -> Result<(BakeArtifacts, AssemblyReport)> {
    let library = build_geometry(faces, edges)?;
    let assembled = assemble_scene(assembly, library)?;
    let scene_glb = export_glb(&assembled.scene)?;
    Ok((
        BakeArtifacts {
            scene_glb,
            node_map: assembled.node_map,
            motion: None,
        },
        assembled.report,
    ))
}

/// Runs a complete bake against `provider`.
///
/// The static scene comes from the assembly at the first angle. Nothing is
/// written here; callers persist [`BakeOutput::artifacts`] once the whole run
/// has succeeded.
pub fn bake<P>(config: &BakeConfig, provider: &P) -> Result<BakeOutput>
where
    P: ContentProvider + ?Sized,
{
    let angles = config.sampling.angles();
    let Some(&first_angle) = angles.first() else {
        return Err(BakeError::msg("no angles to sample"));
    };

    let parameter_id = resolve_parameter_id(&provider.configuration()?, &config.rotation_parameter)?;
    let encoded = provider.encode_configuration(&parameter_id, first_angle)?;
    let assembly = provider.assembly(Some(&encoded))?.root_assembly;

    let part_studios = match &config.part_studios {
        Some(ids) if !ids.is_empty() => ids.clone(),
        _ => discover_part_studios(&assembly),
    };
    if part_studios.is_empty() {
        return Err(BakeError::msg(
            "no part studio element ids found in the assembly; pass them explicitly",
        ));
    }
    tracing::info!(part_studios = ?part_studios, "using part studios");

    let (faces, edges) = fetch_tessellation(provider, &part_studios)?;
    let (mut artifacts, report) = build_scene(&assembly, &faces, &edges)?;

    let motion = sample_motion(
        provider,
        &config.rotation_parameter,
        &angles,
        config.document.clone(),
    )?;
    let inconsistent = motion.inconsistent_keys();
    if !inconsistent.is_empty() {
        tracing::warn!(count = inconsistent.len(), keys = ?inconsistent, "occurrence set changes between frames");
    }
    artifacts.motion = Some(motion);

    Ok(BakeOutput {
        artifacts,
        part_studios,
        report,
    })
}
