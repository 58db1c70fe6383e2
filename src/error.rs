//! Error taxonomy for the drawing pipeline

use thiserror::Error;

use crate::resources::FetchError;

/// Result type alias for render operations
pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    /// A required collaborator was not configured, or the template cannot
    /// be rendered by this engine
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unknown template, unknown field, field type mismatch or a choice
    /// index that does not exist
    #[error("Lookup error: {0}")]
    Lookup(String),

    #[error("Unsupported field type `{type_name}` in field `{field}`")]
    UnsupportedFieldType { field: String, type_name: String },

    /// Image or vector fetch failed. The collaborator's error is kept as-is.
    #[error("Failed to resolve resource for field `{field}`: {source}")]
    ResourceResolution {
        field: String,
        #[source]
        source: FetchError,
    },

    #[error("Missing color reference `{reference}`: {detail}")]
    MissingReference { reference: String, detail: String },

    #[error("Field `{0}` requires data but none was resolved")]
    MissingValue(String),

    #[error("Invalid value for field `{field}`: {source}")]
    InvalidValue {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    pub(crate) fn unknown_field(name: &str) -> Self {
        RenderError::Lookup(format!("invalid field name `{}`", name))
    }
}
