use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{BakeError, Result};

/// Name of the configuration parameter that drives the rotation.
pub const DEFAULT_ROTATION_PARAMETER: &str = "thetaDeg";

/// Number of evenly spaced keyframes sampled when no angles are given.
pub const DEFAULT_FRAME_COUNT: usize = 20;

/// Identifies one element of a CAD document: document id, workspace kind
/// (`w`, `v` or `m`), workspace/version/microversion id and element id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub did: String,
    pub wvm: String,
    pub wvmid: String,
    pub eid: String,
}

impl DocumentRef {
    /// Parses `.../documents/{did}/{w|v|m}/{wvmid}/e/{eid}`.
    pub fn from_url(url: &str) -> Result<Self> {
        let chunks: Vec<&str> = url
            .split(['/', '?', '#'])
            .filter(|chunk| !chunk.is_empty())
            .collect();
        let invalid = || BakeError::InvalidDocumentUrl(url.to_string());

        let start = chunks
            .iter()
            .position(|chunk| *chunk == "documents")
            .ok_or_else(invalid)?;
        match chunks.get(start + 1..start + 6) {
            Some([did, wvm, wvmid, "e", eid]) if matches!(*wvm, "w" | "v" | "m") => Ok(Self {
                did: did.to_string(),
                wvm: wvm.to_string(),
                wvmid: wvmid.to_string(),
                eid: eid.to_string(),
            }),
            _ => Err(invalid()),
        }
    }
}

/// How the rotation angles of a run are chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AngleSampling {
    /// Exactly these angles, in this order.
    Explicit(Vec<f64>),
    /// `count` even steps over the half-open range `[0, 360)`.
    Even { count: usize },
}

impl Default for AngleSampling {
    fn default() -> Self {
        Self::Even {
            count: DEFAULT_FRAME_COUNT,
        }
    }
}

impl AngleSampling {
    /// Parses a comma separated angle list. Blank items are ignored.
    pub fn parse_list(list: &str) -> Result<Self> {
        let angles = list
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| match item.parse::<f64>() {
                Ok(angle) if angle.is_finite() => Ok(angle),
                _ => Err(BakeError::msg(format!("invalid angle `{item}`"))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::Explicit(angles))
    }

    pub fn even(count: usize) -> Result<Self> {
        if count == 0 {
            return Err(BakeError::msg("frame count must be at least 1"));
        }
        Ok(Self::Even { count })
    }

    /// Resolves the sampling policy into concrete angles in degrees.
    pub fn angles(&self) -> Vec<f64> {
        match self {
            Self::Explicit(angles) => angles.clone(),
            Self::Even { count } => {
                let step = 360.0 / *count as f64;
                (0..*count).map(|i| i as f64 * step).collect()
            }
        }
    }
}

/// Immutable settings for one bake run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BakeConfig {
    pub document: DocumentRef,
    /// Part studio element ids to tessellate. Discovered from the assembly
    /// when absent.
    #[serde(default)]
    pub part_studios: Option<Vec<String>>,
    #[serde(default)]
    pub sampling: AngleSampling,
    #[serde(default = "default_rotation_parameter")]
    pub rotation_parameter: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl BakeConfig {
    pub fn new(document: DocumentRef) -> Self {
        Self {
            document,
            part_studios: None,
            sampling: AngleSampling::default(),
            rotation_parameter: default_rotation_parameter(),
            output_dir: default_output_dir(),
            cache_dir: None,
        }
    }
}

fn default_rotation_parameter() -> String {
    DEFAULT_ROTATION_PARAMETER.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

/// API key pair used for basic authentication against the data source.
#[derive(Clone)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub const ACCESS_KEY_VAR: &'static str = "ONSHAPE_ACCESS_KEY";
    pub const SECRET_KEY_VAR: &'static str = "ONSHAPE_SECRET_KEY";

    /// Reads the key pair from the environment, falling back to a secrets
    /// file holding the access key on its first line and the secret key on
    /// its second.
    pub fn load(secrets_file: &Path) -> Result<Self> {
        if let (Ok(access_key), Ok(secret_key)) = (
            std::env::var(Self::ACCESS_KEY_VAR),
            std::env::var(Self::SECRET_KEY_VAR),
        ) {
            return Ok(Self {
                access_key,
                secret_key,
            });
        }
        Self::from_secrets_file(secrets_file)
    }

    pub fn from_secrets_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_secrets(&contents).ok_or_else(|| {
            BakeError::msg(format!(
                "secrets file `{}` must hold an access key and a secret key on separate lines",
                path.display()
            ))
        })
    }

    fn parse_secrets(contents: &str) -> Option<Self> {
        let mut lines = contents.lines().map(str::trim);
        let access_key = lines.next().filter(|line| !line.is_empty())?;
        let secret_key = lines.next().filter(|line| !line.is_empty())?;
        Some(Self {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .finish_non_exhaustive()
    }
}
