/// Errors produced while merging configuration fragments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Fragment was neither a JSON object nor null.
    #[error("config fragment #{index} must be an object, found {found}")]
    NotAnObject { index: usize, found: &'static str },
    /// A recognised key held something other than a string or null.
    #[error("config fragment #{index}: field `{field}` must be a string, found {found}")]
    InvalidField {
        index: usize,
        field: &'static str,
        found: &'static str,
    },
}

/// Errors returned by the Keptn API client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The client could not be built from the configured endpoint.
    #[error("failed to construct Keptn client: {0}")]
    Construction(String),
    /// Transport failure (connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),
    /// The API answered with a non-success status.
    #[error("Keptn API returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// The response body did not match the expected event list shape.
    #[error("failed to decode events response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Short stable code used as a structured log field.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Construction(_) => "keptn.client_construction",
            Self::Network(_) => "keptn.network",
            Self::Status { .. } => "keptn.status",
            Self::Decode(_) => "keptn.decode",
        }
    }
}

/// Top-level error type for the public source API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Input configuration fragments could not be merged.
    #[error("while merging input configs: {0}")]
    Config(#[from] ConfigError),
    /// API client construction failed at stream start.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Invalid stream options.
    #[error("validation error: {0}")]
    Validation(String),
    /// Requested source is not registered.
    #[error("source not found: {name}")]
    SourceNotFound { name: String },
    /// Invalid registry setup (for example a duplicate name).
    #[error("registry error: {0}")]
    Registry(String),
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
