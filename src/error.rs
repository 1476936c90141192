//! Error types for the readiness gate operator

use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API call failed
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Invalid rule file, unknown check type, bad CLI input
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A prober could not be constructed from its target
    #[error("Probe error: {0}")]
    ProbeError(String),

    /// Certificate generation or encoding failed
    #[error("Certificate error: {0}")]
    CertError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Optimistic concurrency retries ran out
    #[error("Gave up after {attempts} conflicting writes to {object}")]
    ConflictRetriesExhausted { object: String, attempts: u32 },
}

impl Error {
    /// True when the API server rejected a write because the object's
    /// resourceVersion moved on (HTTP 409).
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::KubeError(kube::Error::Api(e)) if e.code == 409)
    }

    /// True when the object does not exist (HTTP 404).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KubeError(kube::Error::Api(e)) if e.code == 404)
    }

    /// Short label used for the reconcile error metric.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::KubeError(_) => "kube",
            Error::ConfigError(_) => "config",
            Error::ProbeError(_) => "probe",
            Error::CertError(_) => "cert",
            Error::IoError(_) => "io",
            Error::SerializationError(_) => "serialization",
            Error::ConflictRetriesExhausted { .. } => "conflict",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
pub(crate) fn api_error(code: u16, reason: &str) -> Error {
    Error::KubeError(kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("test {reason}"),
        reason: reason.to_string(),
        code,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_classification() {
        let err = api_error(409, "Conflict");
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
        assert_eq!(err.kind(), "kube");
    }

    #[test]
    fn test_not_found_classification() {
        let err = api_error(404, "NotFound");
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_non_api_errors_are_not_conflicts() {
        let err = Error::ConfigError("bad".to_string());
        assert!(!err.is_conflict());
        assert_eq!(err.kind(), "config");
    }
}
