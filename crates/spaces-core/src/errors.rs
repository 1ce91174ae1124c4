use std::fmt;
use std::time::Duration;

use crate::catalog::FieldType;

/// Typed error hierarchy for calls against the Hugging Face API.
#[derive(Clone, Debug, thiserror::Error)]
pub enum HubError {
    #[error("a Hugging Face API token is required for this operation")]
    AuthRequired,
    #[error("unauthorized ({status}): {body}")]
    Unauthorized { status: u16, body: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("request rejected ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("cannot read local file {path}: {message}")]
    LocalFile { path: String, message: String },
}

impl HubError {
    /// Classify an HTTP status code into the appropriate error variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Unauthorized { status, body },
            404 => Self::NotFound(body),
            429 => Self::RateLimited(body),
            500..=599 => Self::ServerError { status, body },
            _ => Self::Rejected { status, body },
        }
    }

    /// HTTP status reported by the API, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status, .. }
            | Self::Rejected { status, .. }
            | Self::ServerError { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            Self::RateLimited(_) => Some(429),
            _ => None,
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AuthRequired => "auth_required",
            Self::Unauthorized { .. } => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::RateLimited(_) => "rate_limited",
            Self::Rejected { .. } => "rejected",
            Self::ServerError { .. } => "server_error",
            Self::Network(_) => "network_error",
            Self::Timeout(_) => "timeout",
            Self::Decode(_) => "decode_error",
            Self::InvalidRequest(_) => "invalid_request",
            Self::LocalFile { .. } => "local_file",
        }
    }
}

/// One problem found while checking call arguments against a schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldProblem {
    Missing(String),
    WrongType {
        field: String,
        expected: FieldType,
        found: &'static str,
    },
    Unexpected(String),
    /// An id or repository path with an empty, `.` or `..` segment.
    InvalidPath(String),
    /// A local file named by the field could not be read.
    Unreadable { field: String, reason: String },
}

impl FieldProblem {
    pub fn field(&self) -> &str {
        match self {
            Self::Missing(field) | Self::Unexpected(field) | Self::InvalidPath(field) => field,
            Self::WrongType { field, .. } | Self::Unreadable { field, .. } => field,
        }
    }
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(field) => write!(f, "missing required field '{field}'"),
            Self::WrongType {
                field,
                expected,
                found,
            } => write!(f, "field '{field}' must be a {expected}, got {found}"),
            Self::Unexpected(field) => write!(f, "unexpected field '{field}'"),
            Self::InvalidPath(field) => {
                write!(f, "field '{field}' has an empty, '.' or '..' path segment")
            }
            Self::Unreadable { field, reason } => {
                write!(f, "file named by '{field}' cannot be read: {reason}")
            }
        }
    }
}

/// Argument validation failure.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("arguments must be an object, got {0}")]
    NotAnObject(&'static str),
    #[error("{}", join_problems(.0))]
    Fields(Vec<FieldProblem>),
}

impl ArgumentError {
    /// Names of the offending fields, in schema order.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::NotAnObject(_) => Vec::new(),
            Self::Fields(problems) => problems.iter().map(FieldProblem::field).collect(),
        }
    }
}

fn join_problems(problems: &[FieldProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// JSON type name used in validation messages.
pub fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
