use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Errors that can occur while provisioning nodes
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Request failed validation (bad role, missing field, duplicate name)
    #[error("validation failed: {0}")]
    Validation(String),

    /// Subnet address or mask could not be parsed or is out of range
    #[error("invalid subnet: {0}")]
    InvalidSubnet(String),

    /// A required precondition does not hold (e.g. no CA generated yet)
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Resource not found
    #[error("resource not found: {resource}")]
    NotFound {
        /// Description of the resource that wasn't found
        resource: String,
    },

    /// CA material does not look like Nebula certificate material
    #[error("invalid CA format: {0}")]
    InvalidCaFormat(String),

    /// The signing tool reported an error
    #[error("certificate issuance failed: {diagnostic}")]
    IssuanceFailed {
        /// Diagnostic text reported by the signer
        diagnostic: String,
    },

    /// Template parse or render failure
    #[error("template error: {0}")]
    Template(String),

    /// Record store failure
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Artifact file or directory I/O failure
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        /// Path being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration is invalid or unreadable
    #[error("configuration error: {0}")]
    Config(String),
}

impl ProvisionError {
    /// Shorthand for a [`ProvisionError::NotFound`]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Shorthand for a [`ProvisionError::Filesystem`]
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the caller supplied bad input
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidSubnet(_))
    }

    /// Returns true if the error is due to a missing resource
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Suggested HTTP status code for the routing layer
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::InvalidSubnet(_) => 400,
            Self::PreconditionFailed(_) => 409,
            Self::NotFound { .. } => 404,
            Self::InvalidCaFormat(_) => 422,
            Self::IssuanceFailed { .. } => 502,
            Self::Template(_)
            | Self::Persistence(_)
            | Self::Filesystem { .. }
            | Self::Config(_) => 500,
        }
    }
}

impl From<serde_json::Error> for ProvisionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_categories() {
        assert!(ProvisionError::InvalidSubnet("x".into()).is_validation());
        assert!(ProvisionError::Validation("x".into()).is_validation());
        assert!(!ProvisionError::PreconditionFailed("x".into()).is_validation());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ProvisionError::not_found("node 7").status_code(), 404);
        assert_eq!(
            ProvisionError::IssuanceFailed {
                diagnostic: "boom".into()
            }
            .status_code(),
            502
        );
        let fs = ProvisionError::filesystem(
            "/tmp/x",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert_eq!(fs.status_code(), 500);
        assert!(fs.to_string().contains("/tmp/x"));
    }
}
