use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::scene::OccurrenceNodeMap;
use crate::timeline::MotionTrack;
use crate::Result;

/// File names of the persisted artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSettings {
    pub output_dir: PathBuf,
    pub scene_file: String,
    pub node_map_file: String,
    pub motion_file: String,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self::in_dir("out")
    }
}

impl ArtifactSettings {
    pub fn in_dir(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            scene_file: "edges.glb".to_string(),
            node_map_file: "occ2node.json".to_string(),
            motion_file: "motion.json".to_string(),
        }
    }
}

/// Everything a run produces, held in memory until it is complete.
#[derive(Debug, Clone)]
pub struct BakeArtifacts {
    pub scene_glb: Vec<u8>,
    pub node_map: OccurrenceNodeMap,
    /// Absent for scene-only conversions.
    pub motion: Option<MotionTrack>,
}

/// Writes finished [`BakeArtifacts`] to the output directory.
#[derive(Debug, Default)]
pub struct ArtifactWriter {
    settings: ArtifactSettings,
}

impl ArtifactWriter {
    pub fn new(settings: ArtifactSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ArtifactSettings {
        &self.settings
    }

    /// Writes every artifact and returns the paths written, in order.
    pub fn write(&self, artifacts: &BakeArtifacts) -> Result<Vec<PathBuf>> {
        let dir = &self.settings.output_dir;
        std::fs::create_dir_all(dir)?;

        let mut written = Vec::with_capacity(3);
        written.push(write_bytes(dir, &self.settings.scene_file, &artifacts.scene_glb)?);
        written.push(write_json(dir, &self.settings.node_map_file, &artifacts.node_map)?);
        if let Some(motion) = &artifacts.motion {
            written.push(write_json(dir, &self.settings.motion_file, motion)?);
        }

        for path in &written {
            tracing::info!(path = %path.display(), "wrote artifact");
        }
        Ok(written)
    }
}

fn write_bytes(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, bytes)?;
    Ok(path)
}

fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<PathBuf> {
    write_bytes(dir, name, serde_json::to_string_pretty(value)?.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocumentRef;

    fn track() -> MotionTrack {
        MotionTrack {
            metadata: DocumentRef {
                did: "D".into(),
                wvm: "w".into(),
                wvmid: "W".into(),
                eid: "E".into(),
            },
            angles_deg: vec![0.0],
            frames: Vec::new(),
        }
    }

    #[test]
    fn writes_all_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("out");
        let writer = ArtifactWriter::new(ArtifactSettings::in_dir(&dir));

        let written = writer
            .write(&BakeArtifacts {
                scene_glb: b"glTF".to_vec(),
                node_map: OccurrenceNodeMap::default(),
                motion: Some(track()),
            })
            .unwrap();

        assert_eq!(written.len(), 3);
        assert_eq!(std::fs::read(dir.join("edges.glb")).unwrap(), b"glTF");
        assert_eq!(std::fs::read_to_string(dir.join("occ2node.json")).unwrap(), "{}");
        let motion: MotionTrack =
            serde_json::from_str(&std::fs::read_to_string(dir.join("motion.json")).unwrap()).unwrap();
        assert_eq!(motion, track());
    }

    #[test]
    fn scene_only_run_skips_motion_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("out");
        let writer = ArtifactWriter::new(ArtifactSettings::in_dir(&dir));

        let written = writer
            .write(&BakeArtifacts {
                scene_glb: Vec::new(),
                node_map: OccurrenceNodeMap::default(),
                motion: None,
            })
            .unwrap();

        assert_eq!(written.len(), 2);
        assert!(!dir.join("motion.json").exists());
    }
}
