/// Result alias that carries the custom [`BakeError`] type.
pub type Result<T> = std::result::Result<T, BakeError>;

/// Common error type for the core crate.
///
/// Only run-level faults live here. Occurrences that cannot be placed are
/// skipped and reported through [`crate::scene::SkipReason`] instead.
#[derive(Debug, thiserror::Error)]
pub enum BakeError {
    /// Free-form failure with a readable message.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed or unexpected JSON from a collaborator or cache file.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// The data source answered with a non-success status.
    #[error("request to {url} failed with status {status}: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },
    /// The data source could not be reached at all.
    #[error("transport error: {0}")]
    Transport(String),
    /// The rotation parameter is missing from the configuration.
    #[error("configuration parameter `{0}` not found")]
    ParameterNotFound(String),
    /// An occurrence transform did not carry exactly 16 values.
    #[error("occurrence `{path}` has a transform with {len} values, expected 16")]
    MalformedTransform { path: String, len: usize },
    /// A part base color could not be decoded.
    #[error("invalid base color `{0}`")]
    InvalidColor(String),
    /// The document URL does not name a document, workspace and element.
    #[error("invalid document url `{0}`")]
    InvalidDocumentUrl(String),
    /// The scene could not be serialized.
    #[error("scene export failed: {0}")]
    Export(String),
}

impl BakeError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for BakeError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for BakeError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
