use thiserror::Error;

/// Errors raised anywhere in the triage core.
///
/// `Schema` is a model response that could not be coerced into the requested
/// shape. `Upstream` and `Timeout` both mean an external capability (model,
/// embedder service or document store) did not deliver; callers treat them as
/// the same failure class, see [`Error::is_upstream`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Schema error in {stage}: {message}")]
    Schema { stage: String, message: String },

    #[error("Upstream {service} unavailable: {message}")]
    Upstream { service: String, message: String },

    #[error("Upstream {service} timed out after {after_ms}ms")]
    Timeout { service: String, after_ms: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn schema(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema { stage: stage.into(), message: message.into() }
    }

    pub fn upstream(service: impl Into<String>, message: impl ToString) -> Self {
        Self::Upstream { service: service.into(), message: message.to_string() }
    }

    /// True for failures of an external capability, timeouts included.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Timeout { .. })
    }

    /// Short label used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "invalid_config",
            Self::InvalidDocument(_) => "invalid_document",
            Self::Schema { .. } => "schema",
            Self::Upstream { .. } => "upstream",
            Self::Timeout { .. } => "timeout",
            Self::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_upstream_class() {
        let err = Error::Timeout { service: "qdrant".into(), after_ms: 10_000 };
        assert!(err.is_upstream());
        assert!(err.to_string().contains("10000ms"));
    }

    #[test]
    fn schema_error_is_not_upstream() {
        let err = Error::schema("route", "missing field `tool`");
        assert!(!err.is_upstream());
        assert_eq!(err.kind(), "schema");
        assert!(err.to_string().contains("route"));
    }
}
