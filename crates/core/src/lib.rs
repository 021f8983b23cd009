//! Core library for baking tessellated CAD assemblies.
//!
//! Raw part tessellation becomes renderable geometry ([`geometry`]), which is
//! placed once per assembly occurrence into a scene graph ([`scene`]) and
//! exported as GLB ([`export`]). Independently, the assembly is sampled over
//! a rotation parameter into a keyframe track ([`timeline`]). Both outputs
//! are keyed by occurrence path so a player can join them.

pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod model;
pub mod pipeline;
pub mod record;
pub mod scene;
pub mod source;
pub mod timeline;

pub use config::{AngleSampling, BakeConfig, Credentials, DocumentRef};
pub use error::{BakeError, Result};
pub use export::export_glb;
pub use geometry::{build_geometry, GeometryLibrary, MeshGeometry, PathGeometry};
pub use model::{Assembly, Instance, Occurrence, PartEdges, PartTessellation};
pub use pipeline::{bake, build_scene, BakeOutput};
pub use record::{ArtifactSettings, ArtifactWriter, BakeArtifacts};
pub use scene::{assemble_scene, OccurrenceNodeMap, OccurrenceNodes, SceneGraph};
pub use source::{CachedProvider, ContentProvider, OnshapeClient};
pub use timeline::{sample_motion, MotionFrame, MotionTrack};
