//! Error types for webuild-core.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for sandbox operations.
pub type Result<T> = std::result::Result<T, SandboxError>;

/// Errors that can occur while driving the sandbox.
///
/// Each kind maps to distinct user-facing guidance (see
/// [`guidance`](SandboxError::guidance)) so the caller can present
/// differentiated recovery hints. All kinds are retryable up to the
/// coordinator's retry cap; after that only a hard reset is accepted.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The runtime refused to allocate another sandbox instance.
    #[error("sandbox boot refused: {0}")]
    BootResourceLimit(String),

    /// The environment cannot provide the isolation the sandbox needs.
    #[error("sandbox isolation unavailable: {0}")]
    BootIsolationUnsupported(String),

    /// A create/update write (or its parent mkdir) failed.
    #[error("mount failed for `{path}`: {reason}")]
    MountFailure {
        /// Path of the operation that failed.
        path: String,
        /// Underlying failure description.
        reason: String,
    },

    /// A generated command or managed process could not be started.
    #[error("command `{command}` failed: {reason}")]
    CommandFailure {
        /// The command line that failed.
        command: String,
        /// Underlying failure description.
        reason: String,
    },

    /// No readiness signal arrived within the configured window.
    #[error("dev server not ready after {0:?}")]
    ServerStartTimeout(Duration),

    /// Anything without a more specific classification.
    #[error("{0}")]
    Generic(String),
}

impl SandboxError {
    /// Actionable, per-kind guidance for the user-facing surface.
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::BootResourceLimit(_) => {
                "The runtime refused to allocate another sandbox instance. \
                 Hard-reset the preview (or reload the page) to release the existing one."
            }
            Self::BootIsolationUnsupported(_) => {
                "This environment does not provide the isolation the sandbox requires. \
                 Check that cross-origin isolation (COOP/COEP) headers are enabled."
            }
            Self::MountFailure { .. } => {
                "A generated file could not be written into the sandbox. \
                 Retry the update; hard-reset the preview if it keeps failing."
            }
            Self::CommandFailure { .. } => {
                "A generated command could not be started in the sandbox. Retry the update."
            }
            Self::ServerStartTimeout(_) => {
                "The dev server did not come up in time. \
                 Retry, and hard-reset the preview if it keeps timing out."
            }
            Self::Generic(_) => {
                "The preview hit an unexpected sandbox error. \
                 Retry, then hard-reset if the error persists."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SandboxError::MountFailure {
            path: "src/App.tsx".to_string(),
            reason: "disk full".to_string(),
        };
        assert_eq!(format!("{err}"), "mount failed for `src/App.tsx`: disk full");
    }

    #[test]
    fn test_guidance_is_distinct_per_kind() {
        let errors = [
            SandboxError::BootResourceLimit("limit".into()),
            SandboxError::BootIsolationUnsupported("no isolation".into()),
            SandboxError::MountFailure {
                path: "a".into(),
                reason: "b".into(),
            },
            SandboxError::CommandFailure {
                command: "a".into(),
                reason: "b".into(),
            },
            SandboxError::ServerStartTimeout(Duration::from_secs(1)),
            SandboxError::Generic("oops".into()),
        ];
        for (i, a) in errors.iter().enumerate() {
            for b in errors.iter().skip(i + 1) {
                assert_ne!(a.guidance(), b.guidance());
            }
        }
    }
}
