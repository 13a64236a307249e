//! Error taxonomy for build orchestration and artifact resolution.

use crate::artifact::CompilationArtifact;
use crate::resolver::ArtifactFilter;

/// The build tool could not be started.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    /// The configured executable does not exist on the search path.
    #[error("build tool `{program}` not found")]
    NotFound { program: String },

    #[error("failed to start `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl SpawnError {
    pub(crate) fn from_io(program: String, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            SpawnError::NotFound { program }
        } else {
            SpawnError::Io { program, source }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SpawnError::NotFound { .. })
    }
}

/// The build tool started but did not terminate cleanly.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("process exited with code {code}")]
    Failed { code: i32 },

    #[error("process was terminated by a signal")]
    Terminated,

    #[error("process output ended without an exit status")]
    Incomplete,
}

/// Either half of a failed invocation.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Errors surfaced by the top-level operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("build invocation failed: {0}")]
    BuildInvocation(#[source] InvocationError),

    #[error("build tool produced no matching compilation artifacts (filter: {filter}, candidates: {})", .candidates.len())]
    NoMatch {
        filter: ArtifactFilter,
        candidates: Vec<CompilationArtifact>,
    },

    #[error("build tool produced more than one matching compilation artifact (filter: {filter}, matches: {})", .matches.len())]
    AmbiguousMatch {
        filter: ArtifactFilter,
        matches: Vec<CompilationArtifact>,
    },

    #[error("metadata invocation failed: {0}")]
    MetadataInvocation(#[source] InvocationError),

    #[error("build tool exited successfully but produced no metadata")]
    Metadata,

    #[error("invalid build configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for dbgbuild operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_error_classifies_not_found() {
        let err = SpawnError::from_io(
            "cargo".to_string(),
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "build tool `cargo` not found");

        let err = SpawnError::from_io(
            "cargo".to_string(),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_build_invocation_message_wraps_cause() {
        let err = BridgeError::BuildInvocation(ProcessError::Failed { code: 101 }.into());
        assert_eq!(
            err.to_string(),
            "build invocation failed: process exited with code 101"
        );
    }
}
