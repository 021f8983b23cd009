//! Capability interfaces over the CAD data source.
//!
//! The pipeline only talks to these traits. [`OnshapeClient`] reaches the
//! network, [`CachedProvider`] keeps tessellation on disk in front of any
//! other provider.

use std::io::Write;
use std::path::PathBuf;

use serde::{de::DeserializeOwned, Serialize};

use crate::model::{Assembly, ConfigurationMetadata, PartEdges, PartTessellation};
use crate::scene::sanitize;
use crate::Result;

mod onshape;

pub use onshape::OnshapeClient;

/// Tessellation of the parts in one part studio element.
pub trait TessellationSource {
    fn tessellated_faces(&self, element_id: &str) -> Result<Vec<PartTessellation>>;
    fn tessellated_edges(&self, element_id: &str) -> Result<Vec<PartEdges>>;
}

/// Assembly structure, optionally for an encoded configuration.
pub trait AssemblySource {
    fn assembly(&self, configuration: Option<&str>) -> Result<Assembly>;
}

/// Configuration metadata and encoding of parameter assignments.
pub trait ConfigurationSource {
    fn configuration(&self) -> Result<ConfigurationMetadata>;

    /// Returns the opaque token for `parameter_id = degrees`.
    fn encode_configuration(&self, parameter_id: &str, degrees: f64) -> Result<String>;
}

/// Everything a bake run needs from the data source.
pub trait ContentProvider: TessellationSource + AssemblySource + ConfigurationSource {}

impl<T> ContentProvider for T where T: TessellationSource + AssemblySource + ConfigurationSource {}

/// Keeps tessellation responses as JSON files in a directory. Assembly and
/// configuration requests always go to the inner provider.
#[derive(Debug)]
pub struct CachedProvider<P> {
    inner: P,
    dir: PathBuf,
}

impl<P> CachedProvider<P> {
    pub fn new(inner: P, dir: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            dir: dir.into(),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn cache_path(&self, kind: &str, element_id: &str) -> PathBuf {
        self.dir.join(format!("{kind}-{}.json", sanitize(element_id)))
    }

    fn load_or_fetch<T, F>(&self, path: PathBuf, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        if path.exists() {
            tracing::debug!(path = %path.display(), "cache hit");
            let contents = std::fs::read_to_string(&path)?;
            return Ok(serde_json::from_str(&contents)?);
        }

        tracing::debug!(path = %path.display(), "cache miss");
        let value = fetch()?;
        std::fs::create_dir_all(&self.dir)?;
        // Readers only ever see a complete file.
        let mut staged = tempfile::NamedTempFile::new_in(&self.dir)?;
        staged.write_all(serde_json::to_string_pretty(&value)?.as_bytes())?;
        staged.persist(&path).map_err(|err| err.error)?;
        Ok(value)
    }
}

impl<P: TessellationSource> TessellationSource for CachedProvider<P> {
    fn tessellated_faces(&self, element_id: &str) -> Result<Vec<PartTessellation>> {
        self.load_or_fetch(self.cache_path("faces", element_id), || {
            self.inner.tessellated_faces(element_id)
        })
    }

    fn tessellated_edges(&self, element_id: &str) -> Result<Vec<PartEdges>> {
        self.load_or_fetch(self.cache_path("edges", element_id), || {
            self.inner.tessellated_edges(element_id)
        })
    }
}

impl<P: AssemblySource> AssemblySource for CachedProvider<P> {
    fn assembly(&self, configuration: Option<&str>) -> Result<Assembly> {
        self.inner.assembly(configuration)
    }
}

impl<P: ConfigurationSource> ConfigurationSource for CachedProvider<P> {
    fn configuration(&self) -> Result<ConfigurationMetadata> {
        self.inner.configuration()
    }

    fn encode_configuration(&self, parameter_id: &str, degrees: f64) -> Result<String> {
        self.inner.encode_configuration(parameter_id, degrees)
    }
}
